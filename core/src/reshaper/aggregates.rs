//! Pre-aggregated Gold tables.
//!
//! Groups come out in ascending key order. Sums run in fact row order so
//! a reader recomputing them the same way gets identical floats.

use crate::records::{ParquetTable, PaymentStatus, TariffCategory};
use crate::reshaper::dimensions::MeterDimensions;
use crate::reshaper::facts::{FactPayment, FactReading};
use crate::types::Money;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggMonthlyConsumption {
    pub meter_key: u32,
    pub year_month: i32,
    pub total_energy_kwh: f64,
    pub avg_energy_kwh: f64,
    pub max_energy_kwh: f64,
    pub min_energy_kwh: f64,
    pub avg_voltage_v: f64,
    pub avg_power_factor: f64,
    pub reading_count: u64,
}

impl ParquetTable for AggMonthlyConsumption {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggDailyConsumption {
    pub meter_key: u32,
    pub date_key: i32,
    pub total_energy_kwh: f64,
    pub avg_energy_kwh: f64,
    pub max_energy_kwh: f64,
    pub reading_count: u64,
}

impl ParquetTable for AggDailyConsumption {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggConsumerTypeSummary {
    pub consumer_type_key: u32,
    pub tariff_category: TariffCategory,
    pub meter_count: u64,
    pub total_energy_kwh: f64,
    pub avg_energy_kwh: f64,
    pub avg_voltage_v: f64,
    pub avg_power_factor: f64,
}

impl ParquetTable for AggConsumerTypeSummary {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggPaymentSummary {
    pub billing_month_key: i32,
    pub payment_status: PaymentStatus,
    pub payment_count: u64,
    pub total_billed: Money,
    pub total_paid: Money,
    pub total_outstanding: Money,
    pub avg_payment_percentage: f64,
}

impl ParquetTable for AggPaymentSummary {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggLocationSummary {
    pub location_key: u32,
    pub circle: String,
    pub division: String,
    pub sub_division: String,
    pub meter_count: u64,
    pub total_energy_kwh: f64,
    pub avg_energy_kwh: f64,
    pub avg_voltage_v: f64,
}

impl ParquetTable for AggLocationSummary {}

/// Running totals for one group of readings.
#[derive(Debug, Clone, Default)]
struct ReadingAcc {
    count: u64,
    energy: f64,
    max_energy: Option<f64>,
    min_energy: Option<f64>,
    voltage: f64,
    power_factor: f64,
    meters: BTreeSet<u32>,
}

impl ReadingAcc {
    fn add(&mut self, r: &FactReading) {
        self.count += 1;
        self.energy += r.energy_consumed_kwh;
        self.voltage += r.voltage_v;
        self.power_factor += r.power_factor;
        self.max_energy = Some(self.max_energy.map_or(r.energy_consumed_kwh, |m| m.max(r.energy_consumed_kwh)));
        self.min_energy = Some(self.min_energy.map_or(r.energy_consumed_kwh, |m| m.min(r.energy_consumed_kwh)));
        self.meters.insert(r.meter_key);
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            sum / self.count as f64
        }
    }
}

fn group_readings<K: Ord>(
    facts: &[FactReading],
    key: impl Fn(&FactReading) -> Option<K>,
) -> BTreeMap<K, ReadingAcc> {
    let mut groups: BTreeMap<K, ReadingAcc> = BTreeMap::new();
    for r in facts {
        if let Some(k) = key(r) {
            groups.entry(k).or_default().add(r);
        }
    }
    groups
}

pub fn monthly_consumption(facts: &[FactReading]) -> Vec<AggMonthlyConsumption> {
    group_readings(facts, |r| Some((r.meter_key, r.date_key / 100)))
        .into_iter()
        .map(|((meter_key, year_month), acc)| AggMonthlyConsumption {
            meter_key,
            year_month,
            total_energy_kwh: acc.energy,
            avg_energy_kwh: acc.mean(acc.energy),
            max_energy_kwh: acc.max_energy.unwrap_or(0.0),
            min_energy_kwh: acc.min_energy.unwrap_or(0.0),
            avg_voltage_v: acc.mean(acc.voltage),
            avg_power_factor: acc.mean(acc.power_factor),
            reading_count: acc.count,
        })
        .collect()
}

pub fn daily_consumption(facts: &[FactReading]) -> Vec<AggDailyConsumption> {
    group_readings(facts, |r| Some((r.meter_key, r.date_key)))
        .into_iter()
        .map(|((meter_key, date_key), acc)| AggDailyConsumption {
            meter_key,
            date_key,
            total_energy_kwh: acc.energy,
            avg_energy_kwh: acc.mean(acc.energy),
            max_energy_kwh: acc.max_energy.unwrap_or(0.0),
            reading_count: acc.count,
        })
        .collect()
}

pub fn consumer_type_summary(facts: &[FactReading], dims: &MeterDimensions) -> Vec<AggConsumerTypeSummary> {
    let groups = group_readings(facts, |r| dims.meter(r.meter_key).map(|m| m.consumer_type_key));
    groups
        .into_iter()
        .filter_map(|(consumer_type_key, acc)| {
            let kind = dims.consumer_types.get(consumer_type_key as usize - 1)?;
            Some(AggConsumerTypeSummary {
                consumer_type_key,
                tariff_category: kind.tariff_category,
                meter_count: acc.meters.len() as u64,
                total_energy_kwh: acc.energy,
                avg_energy_kwh: acc.mean(acc.energy),
                avg_voltage_v: acc.mean(acc.voltage),
                avg_power_factor: acc.mean(acc.power_factor),
            })
        })
        .collect()
}

pub fn location_summary(facts: &[FactReading], dims: &MeterDimensions) -> Vec<AggLocationSummary> {
    let groups = group_readings(facts, |r| dims.meter(r.meter_key).map(|m| m.location_key));
    groups
        .into_iter()
        .filter_map(|(location_key, acc)| {
            let place = dims.locations.get(location_key as usize - 1)?;
            Some(AggLocationSummary {
                location_key,
                circle: place.circle.clone(),
                division: place.division.clone(),
                sub_division: place.sub_division.clone(),
                meter_count: acc.meters.len() as u64,
                total_energy_kwh: acc.energy,
                avg_energy_kwh: acc.mean(acc.energy),
                avg_voltage_v: acc.mean(acc.voltage),
            })
        })
        .collect()
}

pub fn payment_summary(facts: &[FactPayment]) -> Vec<AggPaymentSummary> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        billed: Money,
        paid: Money,
        outstanding: Money,
        percentage: f64,
    }

    let mut groups: BTreeMap<(i32, PaymentStatus), Acc> = BTreeMap::new();
    for p in facts {
        let acc = groups.entry((p.billing_month_key, p.payment_status)).or_default();
        acc.count += 1;
        acc.billed += p.bill_amount;
        acc.paid += p.paid_amount;
        acc.outstanding += p.outstanding_amount;
        acc.percentage += p.payment_percentage;
    }
    groups
        .into_iter()
        .map(|((billing_month_key, payment_status), acc)| AggPaymentSummary {
            billing_month_key,
            payment_status,
            payment_count: acc.count,
            total_billed: acc.billed,
            total_paid: acc.paid,
            total_outstanding: acc.outstanding,
            avg_payment_percentage: acc.percentage / acc.count as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fact(meter_key: u32, day: u32, hour: u32, energy: f64) -> FactReading {
        let at = NaiveDate::from_ymd_opt(2024, 1, day).unwrap().and_hms_opt(hour, 0, 0).unwrap();
        FactReading {
            meter_key,
            date_key: 20240100 + day as i32,
            time_key: hour as i32 * 100,
            timestamp: at,
            energy_consumed_kwh: energy,
            reading_kwh: 0.0,
            voltage_v: 230.0,
            current_a: 1.0,
            power_factor: 0.9,
            frequency_hz: 50.0,
            is_anomaly: false,
            is_imputed: false,
            is_peak_hour: false,
        }
    }

    #[test]
    fn daily_groups_are_sorted_by_meter_then_day() {
        let facts = vec![fact(2, 1, 0, 1.0), fact(1, 2, 0, 2.0), fact(1, 1, 0, 3.0), fact(1, 1, 1, 0.5)];
        let daily = daily_consumption(&facts);
        let keys: Vec<_> = daily.iter().map(|d| (d.meter_key, d.date_key)).collect();
        assert_eq!(keys, vec![(1, 20240101), (1, 20240102), (2, 20240101)]);
        assert_eq!(daily[0].total_energy_kwh, 3.5);
        assert_eq!(daily[0].max_energy_kwh, 3.0);
        assert_eq!(daily[0].reading_count, 2);
    }

    #[test]
    fn payment_summary_splits_by_status() {
        let p = |status, bill: f64, paid: f64| FactPayment {
            payment_key: 1,
            bill_key: Some(1),
            meter_key: 1,
            billing_month_key: 202401,
            payment_date_key: None,
            bill_amount: Money::from_rupees(bill),
            paid_amount: Money::from_rupees(paid),
            outstanding_amount: Money::from_rupees(bill - paid),
            payment_percentage: paid / bill * 100.0,
            payment_status: status,
            payment_method: None,
        };
        let facts = vec![
            p(PaymentStatus::Paid, 100.0, 100.0),
            p(PaymentStatus::Unpaid, 50.0, 0.0),
            p(PaymentStatus::Paid, 300.0, 300.0),
        ];
        let summary = payment_summary(&facts);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].payment_status, PaymentStatus::Paid);
        assert_eq!(summary[0].payment_count, 2);
        assert_eq!(summary[0].total_billed, Money::from_rupees(400.0));
        assert_eq!(summary[1].total_outstanding, Money::from_rupees(50.0));
    }
}
