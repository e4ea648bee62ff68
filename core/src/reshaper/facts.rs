//! Fact tables: one row per Silver reading, bill and payment.
//!
//! Rows whose meter has no dim_meter entry are skipped and counted; after
//! the cleaner has run there are none.

use crate::clock::YearMonth;
use crate::error::{EtlError, EtlResult};
use crate::io::parquet::ColumnKind;
use crate::records::{
    BillRecord, ParquetTable, PaymentRecord, PaymentStatus, SilverReading, TariffCategory,
};
use crate::reshaper::dimensions::{is_peak_hour, MeterDimensions};
use crate::reshaper::keys::{date_key, time_key, KeyAllocator};
use crate::types::{round_to, Money};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactReading {
    pub meter_key: u32,
    pub date_key: i32,
    pub time_key: i32,
    pub timestamp: NaiveDateTime,
    pub energy_consumed_kwh: f64,
    pub reading_kwh: f64,
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_factor: f64,
    pub frequency_hz: f64,
    pub is_anomaly: bool,
    pub is_imputed: bool,
    pub is_peak_hour: bool,
}

impl ParquetTable for FactReading {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] =
        &[("timestamp", ColumnKind::Timestamp)];

    fn schema_sample() -> Option<Self> {
        Some(FactReading {
            meter_key: 0,
            date_key: 0,
            time_key: 0,
            timestamp: NaiveDateTime::default(),
            energy_consumed_kwh: 0.0,
            reading_kwh: 0.0,
            voltage_v: 0.0,
            current_a: 0.0,
            power_factor: 0.0,
            frequency_hz: 0.0,
            is_anomaly: false,
            is_imputed: false,
            is_peak_hour: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactBill {
    pub bill_key: u32,
    pub meter_key: u32,
    pub billing_month_key: i32,
    pub issue_date_key: i32,
    pub due_date_key: i32,
    pub units_consumed: f64,
    pub variable_charges: Money,
    pub fixed_charges: Money,
    pub gst: Money,
    pub electricity_duty: Money,
    pub tv_fee: Money,
    pub late_payment_surcharge: Money,
    pub total_amount: Money,
    pub amount_after_due_date: Money,
    /// Total over units; empty for zero-unit bills.
    pub rate_per_kwh: Option<f64>,
    pub tariff_applied: TariffCategory,
}

impl ParquetTable for FactBill {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] =
        &[("tariff_applied", ColumnKind::Category)];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPayment {
    pub payment_key: u32,
    pub bill_key: Option<u32>,
    pub meter_key: u32,
    pub billing_month_key: i32,
    pub payment_date_key: Option<i32>,
    pub bill_amount: Money,
    pub paid_amount: Money,
    pub outstanding_amount: Money,
    pub payment_percentage: f64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
}

impl ParquetTable for FactPayment {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("payment_status", ColumnKind::Category),
        ("payment_method", ColumnKind::Category),
    ];
}

fn month_key(billing_month: &str, row_id: &str) -> EtlResult<i32> {
    YearMonth::parse(billing_month).map(|m| m.key()).ok_or_else(|| {
        EtlError::Other(anyhow::anyhow!("{row_id}: billing_month '{billing_month}' is not YYYY-MM"))
    })
}

pub fn build_fact_readings(readings: &[SilverReading], dims: &MeterDimensions) -> (Vec<FactReading>, usize) {
    let mut skipped = 0;
    let mut rows = Vec::with_capacity(readings.len());
    for r in readings {
        let Some(meter_key) = dims.meter_keys.get(r.meter_number.as_str()) else {
            skipped += 1;
            continue;
        };
        rows.push(FactReading {
            meter_key,
            date_key: date_key(r.timestamp.date()),
            time_key: time_key(r.timestamp),
            timestamp: r.timestamp,
            energy_consumed_kwh: r.energy_consumed_kwh,
            reading_kwh: r.reading_kwh,
            voltage_v: r.voltage_v,
            current_a: r.current_a,
            power_factor: r.power_factor,
            frequency_hz: r.frequency_hz,
            is_anomaly: r.is_anomaly,
            is_imputed: r.is_imputed,
            is_peak_hour: is_peak_hour(r.timestamp.hour()),
        });
    }
    (rows, skipped)
}

/// Bill facts plus the bill_id → bill_key lookup used by payments.
pub fn build_fact_bills(
    bills: &[BillRecord],
    dims: &MeterDimensions,
) -> EtlResult<(Vec<FactBill>, KeyAllocator<String>, usize)> {
    let mut bill_keys = KeyAllocator::default();
    let mut skipped = 0;
    let mut rows = Vec::with_capacity(bills.len());
    for b in bills {
        let Some(meter_key) = dims.meter_keys.get(b.meter_number.as_str()) else {
            skipped += 1;
            continue;
        };
        let (bill_key, fresh) = bill_keys.assign(b.bill_id.clone());
        if !fresh {
            continue;
        }
        let rate_per_kwh = (b.units_consumed > 0.0)
            .then(|| round_to(b.total_amount.rupees() / b.units_consumed, 4));
        rows.push(FactBill {
            bill_key,
            meter_key,
            billing_month_key: month_key(&b.billing_month, &b.bill_id)?,
            issue_date_key: date_key(b.issue_date),
            due_date_key: date_key(b.due_date),
            units_consumed: b.units_consumed,
            variable_charges: b.variable_charges,
            fixed_charges: b.fixed_charges,
            gst: b.gst,
            electricity_duty: b.electricity_duty,
            tv_fee: b.tv_fee,
            late_payment_surcharge: b.late_payment_surcharge,
            total_amount: b.total_amount,
            amount_after_due_date: b.amount_after_due_date,
            rate_per_kwh,
            tariff_applied: b.tariff_applied,
        });
    }
    Ok((rows, bill_keys, skipped))
}

pub fn build_fact_payments(
    payments: &[PaymentRecord],
    bill_keys: &KeyAllocator<String>,
    dims: &MeterDimensions,
) -> EtlResult<(Vec<FactPayment>, usize)> {
    let mut payment_keys: KeyAllocator<String> = KeyAllocator::default();
    let mut skipped = 0;
    let mut rows = Vec::with_capacity(payments.len());
    for p in payments {
        let Some(meter_key) = dims.meter_keys.get(p.meter_number.as_str()) else {
            skipped += 1;
            continue;
        };
        let (payment_key, fresh) = payment_keys.assign(p.payment_id.clone());
        if !fresh {
            continue;
        }
        let payment_percentage = if p.bill_amount == Money::ZERO {
            0.0
        } else {
            round_to(p.paid_amount.rupees() / p.bill_amount.rupees() * 100.0, 2)
        };
        rows.push(FactPayment {
            payment_key,
            bill_key: bill_keys.get(p.bill_id.as_str()),
            meter_key,
            billing_month_key: month_key(&p.billing_month, &p.payment_id)?,
            payment_date_key: p.payment_date.map(date_key),
            bill_amount: p.bill_amount,
            paid_amount: p.paid_amount,
            outstanding_amount: p.outstanding_amount,
            payment_percentage,
            payment_status: p.payment_status,
            payment_method: p.payment_method.clone(),
        });
    }
    Ok((rows, skipped))
}
