//! Contiguous meter shards, each streaming to its own part files.

use crate::error::{EtlError, EtlResult};
use crate::generator::timeline::{simulate_meter, MeterContext, RecordSink};
use crate::io::csv::{concat_parts, write_csv_table, CsvSink};
use crate::records::{BillRecord, CsvTable, MeterRecord, PaymentRecord, ReadingRecord};
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Cut `meters` into at most `workers` contiguous, non-empty ranges whose
/// sizes differ by at most one.
pub fn plan_shards(meters: usize, workers: usize) -> Vec<Range<usize>> {
    let shards = workers.max(1).min(meters);
    let mut ranges = Vec::with_capacity(shards);
    let mut start = 0;
    for i in 0..shards {
        let len = meters / shards + usize::from(i < meters % shards);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

pub struct ShardSinks {
    readings: CsvSink<ReadingRecord>,
    bills: CsvSink<BillRecord>,
    payments: CsvSink<PaymentRecord>,
}

impl RecordSink for ShardSinks {
    fn reading(&mut self, row: ReadingRecord) -> EtlResult<()> {
        self.readings.write(&row)
    }

    fn bill(&mut self, row: BillRecord) -> EtlResult<()> {
        self.bills.write(&row)
    }

    fn payment(&mut self, row: PaymentRecord) -> EtlResult<()> {
        self.payments.write(&row)
    }
}

#[derive(Debug, Clone)]
pub struct ShardOutput {
    pub index: usize,
    pub meters: usize,
    pub readings: usize,
    pub bills: usize,
    pub payments: usize,
    pub reading_part: PathBuf,
    pub bill_part: PathBuf,
    pub payment_part: PathBuf,
}

fn part_path(parts_dir: &Path, stem: &str, index: usize) -> PathBuf {
    parts_dir.join(format!("{stem}-{index:04}.csv"))
}

/// Run one shard. Any failure is reported against the shard index.
pub fn run_shard(
    index: usize,
    range: Range<usize>,
    meters: &[MeterRecord],
    ctx: &MeterContext<'_>,
    parts_dir: &Path,
) -> EtlResult<ShardOutput> {
    let tag = |e: EtlError| EtlError::Shard { shard: index, reason: e.to_string() };

    let reading_part = part_path(parts_dir, "readings", index);
    let bill_part = part_path(parts_dir, "bills", index);
    let payment_part = part_path(parts_dir, "payments", index);
    let mut sinks = ShardSinks {
        readings: CsvSink::create(&reading_part).map_err(tag)?,
        bills: CsvSink::create(&bill_part).map_err(tag)?,
        payments: CsvSink::create(&payment_part).map_err(tag)?,
    };

    let meter_count = range.len();
    for meter_index in range {
        simulate_meter(meter_index, &meters[meter_index], ctx, &mut sinks).map_err(tag)?;
    }

    let ShardSinks { readings, bills, payments } = sinks;
    let output = ShardOutput {
        index,
        meters: meter_count,
        readings: readings.finish().map_err(tag)?,
        bills: bills.finish().map_err(tag)?,
        payments: payments.finish().map_err(tag)?,
        reading_part,
        bill_part,
        payment_part,
    };
    log::info!(
        "stage=generate shard={index} meters={} readings={} bills={}",
        output.meters,
        output.readings,
        output.bills
    );
    Ok(output)
}

/// Concatenate one entity's parts in shard order into its Bronze file.
pub fn merge_parts<T: Serialize + CsvTable>(parts: &[PathBuf], dest: &Path) -> EtlResult<()> {
    if parts.is_empty() {
        write_csv_table::<T>(dest, &[])?;
        return Ok(());
    }
    concat_parts(parts, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_cover_every_meter_once() {
        let ranges = plan_shards(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
        assert_eq!(plan_shards(2, 8), vec![0..1, 1..2]);
        assert!(plan_shards(0, 3).is_empty());
    }
}
