//! Gold reshaper: Silver Parquet in, star schema Parquet out.

pub mod aggregates;
pub mod dimensions;
pub mod facts;
pub mod keys;

use crate::error::EtlResult;
use crate::io::file_size;
use crate::io::parquet::{read_parquet_table, write_parquet_table};
use crate::layout::{Entity, Layout};
use crate::records::{ParquetTable, SilverTables};
use crate::stage::{Stage, StageSummary};
use aggregates::*;
use dimensions::*;
use facts::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldTables {
    pub dim_meter: Vec<DimMeter>,
    pub dim_date: Vec<DimDate>,
    pub dim_time: Vec<DimTime>,
    pub dim_consumer_type: Vec<DimConsumerType>,
    pub dim_location: Vec<DimLocation>,
    pub fact_readings: Vec<FactReading>,
    pub fact_bills: Vec<FactBill>,
    pub fact_payments: Vec<FactPayment>,
    pub agg_monthly_consumption: Vec<AggMonthlyConsumption>,
    pub agg_daily_consumption: Vec<AggDailyConsumption>,
    pub agg_consumer_type_summary: Vec<AggConsumerTypeSummary>,
    pub agg_payment_summary: Vec<AggPaymentSummary>,
    pub agg_location_summary: Vec<AggLocationSummary>,
}

/// Build every Gold table from the Silver layer.
pub fn build_gold(silver: &SilverTables) -> EtlResult<GoldTables> {
    let dims = build_meter_dimensions(&silver.meters);
    let (fact_readings, skipped_readings) = build_fact_readings(&silver.readings, &dims);
    let (fact_bills, bill_keys, skipped_bills) = build_fact_bills(&silver.bills, &dims)?;
    let (fact_payments, skipped_payments) = build_fact_payments(&silver.payments, &bill_keys, &dims)?;
    let skipped = skipped_readings + skipped_bills + skipped_payments;
    if skipped > 0 {
        log::warn!(
            "stage=reshape skipped rows without a dim_meter entry: readings={skipped_readings} \
             bills={skipped_bills} payments={skipped_payments}"
        );
    }

    Ok(GoldTables {
        dim_date: build_dim_date(&silver.readings),
        dim_time: build_dim_time(),
        agg_monthly_consumption: monthly_consumption(&fact_readings),
        agg_daily_consumption: daily_consumption(&fact_readings),
        agg_consumer_type_summary: consumer_type_summary(&fact_readings, &dims),
        agg_location_summary: location_summary(&fact_readings, &dims),
        agg_payment_summary: payment_summary(&fact_payments),
        dim_meter: dims.meters,
        dim_consumer_type: dims.consumer_types,
        dim_location: dims.locations,
        fact_readings,
        fact_bills,
        fact_payments,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMeta {
    pub records: usize,
    pub size_bytes: u64,
}

/// `gold/metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldMetadata {
    pub created_at: String,
    pub source: String,
    pub destination: String,
    pub schema_type: &'static str,
    pub dimensions: BTreeMap<String, TableMeta>,
    pub facts: BTreeMap<String, TableMeta>,
    pub aggregates: BTreeMap<String, TableMeta>,
}

impl GoldMetadata {
    fn new(layout: &Layout) -> Self {
        Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            source: layout.silver_dir().display().to_string(),
            destination: layout.gold_dir().display().to_string(),
            schema_type: "star",
            dimensions: BTreeMap::new(),
            facts: BTreeMap::new(),
            aggregates: BTreeMap::new(),
        }
    }

    /// Every table name with its row count, in dimension, fact, aggregate order.
    pub fn tables(&self) -> impl Iterator<Item = (&String, &TableMeta)> {
        self.dimensions.iter().chain(self.facts.iter()).chain(self.aggregates.iter())
    }
}

fn write_table<T>(
    layout: &Layout,
    section: &mut BTreeMap<String, TableMeta>,
    name: &str,
    rows: &[T],
) -> EtlResult<()>
where
    T: Serialize + DeserializeOwned + ParquetTable,
{
    let path = layout.gold(name);
    let records = write_parquet_table(&path, rows)?;
    section.insert(name.to_string(), TableMeta { records, size_bytes: file_size(&path) });
    Ok(())
}

/// Write all thirteen tables and `metadata.json`.
pub fn write_gold(layout: &Layout, gold: &GoldTables) -> EtlResult<GoldMetadata> {
    std::fs::create_dir_all(layout.gold_dir())?;
    let mut meta = GoldMetadata::new(layout);

    let dims = &mut meta.dimensions;
    write_table(layout, dims, "dim_meter", &gold.dim_meter)?;
    write_table(layout, dims, "dim_date", &gold.dim_date)?;
    write_table(layout, dims, "dim_time", &gold.dim_time)?;
    write_table(layout, dims, "dim_consumer_type", &gold.dim_consumer_type)?;
    write_table(layout, dims, "dim_location", &gold.dim_location)?;

    let facts = &mut meta.facts;
    write_table(layout, facts, "fact_readings", &gold.fact_readings)?;
    write_table(layout, facts, "fact_bills", &gold.fact_bills)?;
    write_table(layout, facts, "fact_payments", &gold.fact_payments)?;

    let aggs = &mut meta.aggregates;
    write_table(layout, aggs, "agg_monthly_consumption", &gold.agg_monthly_consumption)?;
    write_table(layout, aggs, "agg_daily_consumption", &gold.agg_daily_consumption)?;
    write_table(layout, aggs, "agg_consumer_type_summary", &gold.agg_consumer_type_summary)?;
    write_table(layout, aggs, "agg_payment_summary", &gold.agg_payment_summary)?;
    write_table(layout, aggs, "agg_location_summary", &gold.agg_location_summary)?;

    std::fs::write(layout.gold_metadata(), serde_json::to_vec_pretty(&meta)?)?;
    Ok(meta)
}

pub fn read_silver(layout: &Layout) -> EtlResult<SilverTables> {
    Ok(SilverTables {
        meters: read_parquet_table(&layout.silver(Entity::Meters))?,
        readings: read_parquet_table(&layout.silver(Entity::Readings))?,
        bills: read_parquet_table(&layout.silver(Entity::Bills))?,
        payments: read_parquet_table(&layout.silver(Entity::Payments))?,
    })
}

#[derive(Debug, Default)]
pub struct Reshaper;

impl Reshaper {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Reshaper {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn run(&mut self, layout: &Layout) -> EtlResult<StageSummary> {
        let silver = read_silver(layout)?;
        log::info!(
            "stage=reshape meters={} readings={} bills={} payments={}",
            silver.meters.len(),
            silver.readings.len(),
            silver.bills.len(),
            silver.payments.len()
        );
        let gold = build_gold(&silver)?;
        let meta = write_gold(layout, &gold)?;

        let mut summary = StageSummary::new(self.name());
        for (table, entry) in meta.tables() {
            summary.push(table.as_str(), entry.records);
        }
        summary.excluded_rows = silver.readings.len() - gold.fact_readings.len()
            + silver.bills.len() - gold.fact_bills.len()
            + silver.payments.len() - gold.fact_payments.len();
        log::info!("stage=reshape wrote {} tables to {}", summary.tables.len(), layout.gold_dir().display());
        Ok(summary)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
