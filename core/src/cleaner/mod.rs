//! Silver cleaner: Bronze CSV in, typed Parquet and a quality report out.
//!
//! Order per table: dedup, referential integrity, then value repair.
//! Meters are cleaned first because every other table is checked
//! against their meter_numbers.

pub mod dedup;
pub mod integrity;
pub mod readings;
pub mod report;

use crate::config::CleanerConfig;
use crate::error::{EtlError, EtlResult};
use crate::io::csv::read_csv_table;
use crate::io::file_size;
use crate::io::parquet::write_parquet_table;
use crate::layout::{Entity, Layout};
use crate::records::{
    BillRecord, BronzeTables, MeterRecord, PaymentRecord, PaymentStatus, SilverTables, TariffFamily,
};
use crate::stage::{Stage, StageSummary};
use crate::types::Money;
use dedup::dedup_by_key;
use integrity::retain_known_meters;
use readings::clean_readings;
use report::{QualityReport, StorageStats};
use std::any::Any;
use std::collections::{HashMap, HashSet};

/// Clean all four Bronze tables in memory.
pub fn clean(bronze: BronzeTables, config: &CleanerConfig) -> EtlResult<(SilverTables, QualityReport)> {
    let mut report = QualityReport::new(config.missing_policy);
    let BronzeTables { meters, readings, bills, payments } = bronze;

    // Meters
    report.table("meters").bronze_rows = meters.len();
    let meters: Vec<MeterRecord> = meters.into_iter().map(trim_meter).collect();
    let (mut meters, removed) =
        dedup_by_key(meters, |m| (m.consumer_id.clone(), m.meter_number.clone()));
    report.table("meters").duplicates_removed = removed;
    for meter in &mut meters {
        let load = meter.sanctioned_load_kw;
        if !(load > 0.0 && load <= config.telemetry.max_sanctioned_load_kw) {
            meter.sanctioned_load_kw = config.telemetry.default_sanctioned_load_kw;
            report.meters_load_reset += 1;
        }
    }
    report.table("meters").silver_rows = meters.len();

    let known: HashSet<String> = meters.iter().map(|m| m.meter_number.clone()).collect();
    let families: HashMap<String, TariffFamily> = meters
        .iter()
        .map(|m| (m.meter_number.clone(), m.tariff_category.family()))
        .collect();

    // Readings
    report.table("readings").bronze_rows = readings.len();
    let (readings, removed) = dedup_by_key(readings, |r| (r.meter_number.clone(), r.timestamp));
    report.table("readings").duplicates_removed = removed;
    let (readings, excluded) = retain_known_meters("readings", readings, &known, |r| r.meter_number.as_str())?;
    report.table("readings").integrity_excluded = excluded;
    let readings = clean_readings(readings, &families, config, &mut report.readings);
    report.table("readings").silver_rows = readings.len();
    report.record_anomaly_share(readings.len());

    // Bills
    report.table("bills").bronze_rows = bills.len();
    let (bills, removed) =
        dedup_by_key(bills, |b| (b.meter_number.clone(), b.billing_month.clone()));
    report.table("bills").duplicates_removed = removed;
    let (mut bills, excluded) = retain_known_meters("bills", bills, &known, |b| b.meter_number.as_str())?;
    report.table("bills").integrity_excluded = excluded;
    for bill in &mut bills {
        report.negative_amounts_zeroed += zero_negative_bill_amounts(bill);
    }
    report.table("bills").silver_rows = bills.len();

    // Payments
    report.table("payments").bronze_rows = payments.len();
    let (payments, removed) =
        dedup_by_key(payments, |p| (p.meter_number.clone(), p.billing_month.clone()));
    report.table("payments").duplicates_removed = removed;
    let (payments, excluded) =
        retain_known_meters("payments", payments, &known, |p| p.meter_number.as_str())?;
    report.table("payments").integrity_excluded = excluded;

    let bill_ids: HashSet<&str> = bills.iter().map(|b| b.bill_id.as_str()).collect();
    let before = payments.len();
    let mut payments: Vec<PaymentRecord> =
        payments.into_iter().filter(|p| bill_ids.contains(p.bill_id.as_str())).collect();
    report.orphan_payments = before - payments.len();
    if report.orphan_payments > 0 {
        log::warn!(
            "stage=clean payments: {} rows reference bills that did not survive cleaning",
            report.orphan_payments
        );
    }
    for payment in &mut payments {
        report.negative_amounts_zeroed += normalise_payment(payment);
    }
    report.table("payments").silver_rows = payments.len();
    report.record_payment_shares(&payments);

    Ok((SilverTables { meters, readings, bills, payments }, report))
}

fn trim_meter(mut m: MeterRecord) -> MeterRecord {
    for field in [
        &mut m.consumer_id,
        &mut m.meter_number,
        &mut m.reference_no,
        &mut m.consumer_name,
        &mut m.address,
        &mut m.circle,
        &mut m.division,
        &mut m.sub_division,
        &mut m.city,
        &mut m.feeder_name,
        &mut m.meter_make,
    ] {
        let trimmed = field.trim();
        if trimmed.len() != field.len() {
            *field = trimmed.to_string();
        }
    }
    m
}

fn zero_if_negative(amount: &mut Money) -> usize {
    if amount.is_negative() {
        *amount = Money::ZERO;
        1
    } else {
        0
    }
}

/// Zero negative components, then rebuild the totals from them so
/// `total_amount == component_sum()` holds. The after-due premium keeps its
/// ratio to the total. Returns how many amounts were changed.
fn zero_negative_bill_amounts(bill: &mut BillRecord) -> usize {
    let mut changed: usize = [
        &mut bill.variable_charges,
        &mut bill.fixed_charges,
        &mut bill.gst,
        &mut bill.electricity_duty,
        &mut bill.tv_fee,
        &mut bill.late_payment_surcharge,
    ]
    .into_iter()
    .map(zero_if_negative)
    .sum();

    let total = bill.component_sum();
    if total != bill.total_amount {
        let premium = if bill.total_amount > Money::ZERO && bill.amount_after_due_date >= bill.total_amount {
            bill.amount_after_due_date.rupees() / bill.total_amount.rupees()
        } else {
            1.0
        };
        bill.total_amount = total;
        bill.amount_within_due_date = total;
        bill.amount_after_due_date = total.scale(premium);
        changed += 1;
    }
    changed + zero_if_negative(&mut bill.amount_within_due_date) + zero_if_negative(&mut bill.amount_after_due_date)
}

/// Zero negative amounts and make the status columns agree with each other.
/// Returns how many amounts were zeroed.
fn normalise_payment(p: &mut PaymentRecord) -> usize {
    let zeroed = zero_if_negative(&mut p.bill_amount) + zero_if_negative(&mut p.paid_amount);
    if p.payment_status == PaymentStatus::Unpaid {
        p.paid_amount = Money::ZERO;
        p.payment_date = None;
        p.payment_method = None;
        p.transaction_id = None;
    }
    p.outstanding_amount = (p.bill_amount - p.paid_amount).max(Money::ZERO);
    zeroed
}

fn write_silver(layout: &Layout, silver: &SilverTables) -> EtlResult<()> {
    write_parquet_table(&layout.silver(Entity::Meters), &silver.meters)?;
    write_parquet_table(&layout.silver(Entity::Readings), &silver.readings)?;
    write_parquet_table(&layout.silver(Entity::Bills), &silver.bills)?;
    write_parquet_table(&layout.silver(Entity::Payments), &silver.payments)?;
    Ok(())
}

pub struct Cleaner {
    config: CleanerConfig,
    last_report: Option<QualityReport>,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config, last_report: None }
    }

    /// Report of the most recent run, if any.
    pub fn last_report(&self) -> Option<&QualityReport> {
        self.last_report.as_ref()
    }

    fn read_bronze(layout: &Layout) -> EtlResult<BronzeTables> {
        for entity in Entity::ALL {
            let path = layout.bronze(entity);
            if !path.is_file() {
                return Err(EtlError::MissingInput { path });
            }
        }
        Ok(BronzeTables {
            meters: read_csv_table(&layout.bronze(Entity::Meters))?,
            readings: read_csv_table(&layout.bronze(Entity::Readings))?,
            bills: read_csv_table(&layout.bronze(Entity::Bills))?,
            payments: read_csv_table(&layout.bronze(Entity::Payments))?,
        })
    }
}

impl Stage for Cleaner {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn run(&mut self, layout: &Layout) -> EtlResult<StageSummary> {
        log::info!("stage=clean missing_policy={:?}", self.config.missing_policy);
        let bronze = Self::read_bronze(layout)?;
        let (silver, mut report) = clean(bronze, &self.config)?;

        std::fs::create_dir_all(layout.silver_dir())?;
        write_silver(layout, &silver)?;

        let bronze_bytes: u64 = Entity::ALL.iter().map(|e| file_size(&layout.bronze(*e))).sum();
        let silver_bytes: u64 = Entity::ALL.iter().map(|e| file_size(&layout.silver(*e))).sum();
        report.storage = Some(StorageStats::new(bronze_bytes, silver_bytes));
        std::fs::write(layout.quality_report(), serde_json::to_vec_pretty(&report)?)?;

        let mut summary = StageSummary::new(self.name());
        summary.push(Entity::Meters.stem(), silver.meters.len());
        summary.push(Entity::Readings.stem(), silver.readings.len());
        summary.push(Entity::Bills.stem(), silver.bills.len());
        summary.push(Entity::Payments.stem(), silver.payments.len());
        summary.excluded_rows = report.excluded_rows();
        log::info!(
            "stage=clean wrote {:?} excluded={} imputed={} corrected={}",
            summary.tables,
            summary.excluded_rows,
            report.readings.imputed,
            report.readings.corrected
        );
        self.last_report = Some(report);
        Ok(summary)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
