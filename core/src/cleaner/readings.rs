//! Reading cleaning: energy outliers, missing intervals, telemetry bounds
//! and the rebuilt cumulative register.
//!
//! Works one meter at a time, in timestamp order. Meters keep the order in
//! which they first appear in the input.

use crate::config::{CleanerConfig, MissingPolicy};
use crate::records::{AnomalyKind, QualityFlag, ReadingRecord, SilverReading, TariffFamily};
use crate::types::round_to;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Readings are written with three decimals; half a unit of slack keeps
/// already-clamped values inside the band.
const BAND_TOLERANCE: f64 = 5e-4;
const DEFAULT_FREQUENCY_MINUTES: i64 = 15;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingStats {
    pub imputed: usize,
    pub dropped_missing: usize,
    pub corrected: usize,
    pub anomalies: BTreeMap<String, usize>,
    pub telemetry_fixed: usize,
    pub flagged: usize,
}

pub fn clean_readings(
    readings: Vec<ReadingRecord>,
    families: &HashMap<String, TariffFamily>,
    config: &CleanerConfig,
    stats: &mut ReadingStats,
) -> Vec<SilverReading> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ReadingRecord>> = HashMap::new();
    for reading in readings {
        if !groups.contains_key(&reading.meter_number) {
            order.push(reading.meter_number.clone());
        }
        groups.entry(reading.meter_number.clone()).or_default().push(reading);
    }

    let mut out = Vec::new();
    for meter in order {
        let Some(mut rows) = groups.remove(&meter) else {
            continue;
        };
        rows.sort_by_key(|r| r.timestamp);
        let family = families.get(&meter).copied();
        clean_meter(rows, family, config, stats, &mut out);
    }
    out
}

/// Most common positive gap between consecutive readings, ties to the shorter gap.
pub fn infer_frequency_minutes(rows: &[ReadingRecord]) -> Option<i64> {
    let mut gaps: BTreeMap<i64, usize> = BTreeMap::new();
    for pair in rows.windows(2) {
        let gap = (pair[1].timestamp - pair[0].timestamp).num_minutes();
        if gap > 0 {
            *gaps.entry(gap).or_default() += 1;
        }
    }
    let mut best: Option<(i64, usize)> = None;
    for (gap, count) in gaps {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((gap, count));
        }
    }
    best.map(|(gap, _)| gap)
}

fn classify(energy: f64, flag: QualityFlag, band: Option<(f64, f64)>) -> AnomalyKind {
    if energy < 0.0 {
        return AnomalyKind::Negative;
    }
    if energy == 0.0 {
        return AnomalyKind::Zero;
    }
    match band {
        Some((_, hi)) if energy > hi + BAND_TOLERANCE => {
            if flag == QualityFlag::AbnormalSpike {
                AnomalyKind::Spike
            } else {
                AnomalyKind::AboveBand
            }
        }
        Some((lo, _)) if energy < lo - BAND_TOLERANCE => AnomalyKind::BelowBand,
        _ => AnomalyKind::None,
    }
}

fn anomaly_name(kind: AnomalyKind) -> &'static str {
    match kind {
        AnomalyKind::None => "none",
        AnomalyKind::Negative => "negative",
        AnomalyKind::Zero => "zero",
        AnomalyKind::Spike => "spike",
        AnomalyKind::BelowBand => "below_band",
        AnomalyKind::AboveBand => "above_band",
    }
}

fn clean_meter(
    rows: Vec<ReadingRecord>,
    family: Option<TariffFamily>,
    config: &CleanerConfig,
    stats: &mut ReadingStats,
    out: &mut Vec<SilverReading>,
) {
    let frequency = infer_frequency_minutes(&rows)
        .or(config.default_frequency_minutes.map(i64::from))
        .unwrap_or(DEFAULT_FREQUENCY_MINUTES);
    let interval_hours = frequency as f64 / 60.0;
    let band = family.and_then(|f| config.consumption.plausible_band(f, frequency as f64 / 15.0));

    // Pass 1: correct present energies.
    let mut energy: Vec<Option<f64>> = rows.iter().map(|r| r.energy_consumed_kwh).collect();
    let mut anomalies = vec![AnomalyKind::None; rows.len()];
    for (i, row) in rows.iter().enumerate() {
        let Some(value) = energy[i] else { continue };
        let kind = classify(value, row.data_quality_flag, band);
        if kind == AnomalyKind::None {
            continue;
        }
        anomalies[i] = kind;
        energy[i] = Some(match band {
            Some((lo, hi)) => value.clamp(lo, hi),
            None => value.max(0.0),
        });
        stats.corrected += 1;
        *stats.anomalies.entry(anomaly_name(kind).to_string()).or_default() += 1;
    }

    // Pass 2: neighbours for missing rows come only from rows that had a value.
    let n = rows.len();
    let mut prev_known = vec![None; n];
    let mut next_known = vec![None; n];
    let mut last = None;
    for i in 0..n {
        prev_known[i] = last;
        if energy[i].is_some() {
            last = energy[i];
        }
    }
    last = None;
    for i in (0..n).rev() {
        next_known[i] = last;
        if energy[i].is_some() {
            last = energy[i];
        }
    }

    let t = config.telemetry;
    let mut register = 0.0;
    for (i, row) in rows.into_iter().enumerate() {
        let (value, imputed) = match energy[i] {
            Some(v) => (v, false),
            None => {
                let filled = match config.missing_policy {
                    MissingPolicy::Drop => {
                        stats.dropped_missing += 1;
                        continue;
                    }
                    MissingPolicy::Interpolate => match (prev_known[i], next_known[i]) {
                        (Some(p), Some(q)) => (p + q) / 2.0,
                        (Some(p), None) => p,
                        (None, Some(q)) => q,
                        (None, None) => 0.0,
                    },
                    MissingPolicy::CarryForward => prev_known[i].unwrap_or(0.0),
                };
                stats.imputed += 1;
                (filled, true)
            }
        };
        let value = round_to(value, 3);
        register += value;

        let mut fixed = false;
        let voltage = match row.voltage_v {
            Some(v) if v >= t.voltage.0 && v <= t.voltage.1 => v,
            Some(_) => {
                fixed = true;
                t.nominal_voltage
            }
            None => t.nominal_voltage,
        };
        let frequency_hz = match row.frequency_hz {
            Some(f) if f >= t.frequency.0 && f <= t.frequency.1 => f,
            Some(_) => {
                fixed = true;
                t.nominal_frequency
            }
            None => t.nominal_frequency,
        };
        let power_factor = match row.power_factor {
            Some(pf) if (0.0..=1.0).contains(&pf) => pf,
            Some(pf) => {
                fixed = true;
                pf.clamp(0.0, 1.0)
            }
            None => t.nominal_power_factor,
        };
        if fixed {
            stats.telemetry_fixed += 1;
        }
        let current_a = match row.current_a {
            Some(c) if !imputed => c,
            _ => round_to(value / interval_hours * 1000.0 / voltage, 2),
        };

        let anomaly = anomalies[i];
        let is_anomaly = anomaly != AnomalyKind::None || row.data_quality_flag != QualityFlag::Normal;
        if is_anomaly {
            stats.flagged += 1;
        }
        out.push(SilverReading {
            timestamp: row.timestamp,
            reading_kwh: round_to(register, 3),
            energy_consumed_kwh: value,
            original_energy_kwh: if anomaly != AnomalyKind::None { row.energy_consumed_kwh } else { None },
            voltage_v: voltage,
            current_a,
            frequency_hz,
            power_factor,
            temperature_c: row.temperature_c,
            signal_strength_dbm: row.signal_strength_dbm,
            battery_voltage_v: row.battery_voltage_v,
            data_quality_flag: row.data_quality_flag,
            anomaly,
            is_anomaly,
            is_imputed: imputed,
            meter_number: row.meter_number,
            consumer_id: row.consumer_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn reading(hour: u32, energy: Option<f64>, flag: QualityFlag) -> ReadingRecord {
        ReadingRecord {
            timestamp: at(hour),
            meter_number: "m1".into(),
            consumer_id: "c1".into(),
            reading_kwh: None,
            energy_consumed_kwh: energy,
            voltage_v: energy.map(|_| 231.0),
            current_a: energy.map(|_| 1.0),
            frequency_hz: energy.map(|_| 50.0),
            power_factor: energy.map(|_| 0.95),
            temperature_c: None,
            signal_strength_dbm: None,
            battery_voltage_v: None,
            data_quality_flag: flag,
        }
    }

    fn families() -> HashMap<String, TariffFamily> {
        HashMap::from([("m1".to_string(), TariffFamily::Residential)])
    }

    #[test]
    fn interpolation_averages_neighbours() {
        let rows = vec![
            reading(0, Some(1.0), QualityFlag::Normal),
            reading(1, None, QualityFlag::MissingReading),
            reading(2, Some(2.0), QualityFlag::Normal),
        ];
        let mut stats = ReadingStats::default();
        let out = clean_readings(rows, &families(), &CleanerConfig::default(), &mut stats);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].energy_consumed_kwh, 1.5);
        assert!(out[1].is_imputed);
        assert_eq!(out[1].voltage_v, 230.0);
        assert_eq!(out[2].reading_kwh, 4.5);
        assert_eq!(stats.imputed, 1);
    }

    #[test]
    fn carry_forward_and_drop_policies() {
        let rows = || {
            vec![
                reading(0, None, QualityFlag::MissingReading),
                reading(1, Some(1.2), QualityFlag::Normal),
                reading(2, None, QualityFlag::MissingReading),
            ]
        };
        let mut stats = ReadingStats::default();
        let carried = clean_readings(
            rows(),
            &families(),
            &CleanerConfig::with_policy(MissingPolicy::CarryForward),
            &mut stats,
        );
        assert_eq!(carried[0].energy_consumed_kwh, 0.0);
        assert_eq!(carried[2].energy_consumed_kwh, 1.2);

        let mut stats = ReadingStats::default();
        let dropped =
            clean_readings(rows(), &families(), &CleanerConfig::with_policy(MissingPolicy::Drop), &mut stats);
        assert_eq!(dropped.len(), 1);
        assert_eq!(stats.dropped_missing, 2);
    }

    #[test]
    fn outliers_are_clamped_into_band_and_register_is_monotonic() {
        // Hourly residential band: [0.252, 5.4208]
        let rows = vec![
            reading(0, Some(1.0), QualityFlag::Normal),
            reading(1, Some(-0.8), QualityFlag::NegativeReading),
            reading(2, Some(1.0), QualityFlag::Normal),
            reading(3, Some(40.0), QualityFlag::AbnormalSpike),
            reading(4, Some(0.0), QualityFlag::ZeroReading),
        ];
        let mut stats = ReadingStats::default();
        let out = clean_readings(rows, &families(), &CleanerConfig::default(), &mut stats);
        assert_eq!(out[1].anomaly, AnomalyKind::Negative);
        assert_eq!(out[1].original_energy_kwh, Some(-0.8));
        assert_eq!(out[1].energy_consumed_kwh, 0.252);
        assert_eq!(out[3].anomaly, AnomalyKind::Spike);
        assert_eq!(out[3].energy_consumed_kwh, 5.421);
        assert_eq!(out[4].anomaly, AnomalyKind::Zero);
        assert!(out.windows(2).all(|w| w[1].reading_kwh >= w[0].reading_kwh));
        assert_eq!(stats.corrected, 3);
    }

    #[test]
    fn frequency_is_the_most_common_gap() {
        let rows = vec![
            reading(0, Some(1.0), QualityFlag::Normal),
            reading(1, Some(1.0), QualityFlag::Normal),
            reading(2, Some(1.0), QualityFlag::Normal),
            reading(5, Some(1.0), QualityFlag::Normal),
        ];
        assert_eq!(infer_frequency_minutes(&rows), Some(60));
        assert_eq!(infer_frequency_minutes(&rows[..1]), None);
    }
}
