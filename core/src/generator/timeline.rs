//! One meter's full history: readings slot by slot, closing a bill and its
//! payment at each month boundary.
//!
//! Everything a meter produces is drawn from that meter's own stream, in
//! timestamp order, so the result does not depend on which shard runs it.

use crate::clock::{ReadingClock, YearMonth};
use crate::config::{GeneratorConfig, TariffConfig};
use crate::error::{EtlError, EtlResult};
use crate::generator::billing::issue_bill;
use crate::generator::payments::settle;
use crate::generator::readings::ReadingSynth;
use crate::records::{BillRecord, MeterRecord, PaymentRecord, ReadingRecord};
use crate::rng::{RngBank, StreamRng};

/// Where a meter's records go.
pub trait RecordSink {
    fn reading(&mut self, row: ReadingRecord) -> EtlResult<()>;
    fn bill(&mut self, row: BillRecord) -> EtlResult<()>;
    fn payment(&mut self, row: PaymentRecord) -> EtlResult<()>;
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub readings: Vec<ReadingRecord>,
    pub bills: Vec<BillRecord>,
    pub payments: Vec<PaymentRecord>,
}

impl RecordSink for MemorySink {
    fn reading(&mut self, row: ReadingRecord) -> EtlResult<()> {
        self.readings.push(row);
        Ok(())
    }

    fn bill(&mut self, row: BillRecord) -> EtlResult<()> {
        self.bills.push(row);
        Ok(())
    }

    fn payment(&mut self, row: PaymentRecord) -> EtlResult<()> {
        self.payments.push(row);
        Ok(())
    }
}

/// Shared, read-only state every meter simulation needs.
pub struct MeterContext<'a> {
    pub config: &'a GeneratorConfig,
    pub bank: RngBank,
    pub clock: ReadingClock,
    pub synth: ReadingSynth<'a>,
}

impl<'a> MeterContext<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self {
            config,
            bank: RngBank::new(config.seed),
            clock: ReadingClock::new(config.start_date, config.end_date, config.frequency_minutes),
            synth: ReadingSynth::new(
                &config.tables.consumption,
                &config.tables.faults,
                config.frequency_minutes,
            ),
        }
    }
}

struct MonthTally {
    month: YearMonth,
    units: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MeterTotals {
    pub readings: usize,
    pub bills: usize,
}

pub fn simulate_meter<S: RecordSink>(
    meter_index: usize,
    meter: &MeterRecord,
    ctx: &MeterContext<'_>,
    sink: &mut S,
) -> EtlResult<MeterTotals> {
    let config = ctx.config;
    let tariff = config.tables.tariffs.get(meter.tariff_category).ok_or_else(|| {
        EtlError::config("tariffs", format!("no tariff for {}", meter.tariff_category))
    })?;
    let mut rng = ctx.bank.for_meter(meter_index);
    let first_day = config.start_date.max(meter.connection_date);

    let mut totals = MeterTotals::default();
    let mut cumulative = 0.0;
    let mut tally: Option<MonthTally> = None;
    let mut previous_overdue = false;

    for at in ctx.clock.slots_from(first_day) {
        let month = YearMonth::of(at.date());
        if tally.as_ref().map(|t| t.month) != Some(month) {
            if let Some(done) = tally.take() {
                previous_overdue = close_month(meter, done, tariff, config, &mut rng, sink, previous_overdue)?;
                totals.bills += 1;
            }
            tally = Some(MonthTally { month, units: 0.0 });
        }

        let reading = ctx.synth.next_reading(meter, at, &mut cumulative, &mut rng);
        if let (Some(t), Some(energy)) = (tally.as_mut(), reading.energy_consumed_kwh) {
            if !reading.data_quality_flag.excluded_from_billing() {
                t.units += energy;
            }
        }
        sink.reading(reading)?;
        totals.readings += 1;
    }

    // The final month is billed only when the range reaches its last day.
    if let Some(done) = tally {
        if done.month.last_day() <= config.end_date {
            close_month(meter, done, tariff, config, &mut rng, sink, previous_overdue)?;
            totals.bills += 1;
        }
    }
    Ok(totals)
}

/// Bill the month and settle it. Returns whether this bill ended up overdue,
/// which drives the next month's late surcharge.
fn close_month<S: RecordSink>(
    meter: &MeterRecord,
    tally: MonthTally,
    tariff: &TariffConfig,
    config: &GeneratorConfig,
    rng: &mut StreamRng,
    sink: &mut S,
    previous_overdue: bool,
) -> EtlResult<bool> {
    let bill = issue_bill(meter, tally.month, tally.units, tariff, &config.tables.billing, previous_overdue);
    let payment = settle(&bill, &config.tables.payments, rng);
    let overdue = payment.was_overdue();
    sink.bill(bill)?;
    sink.payment(payment)?;
    Ok(overdue)
}
