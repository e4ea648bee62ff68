//! `quality_report.json`: what the cleaner changed and what it cost on disk.

use crate::cleaner::readings::ReadingStats;
use crate::config::MissingPolicy;
use crate::records::PaymentRecord;
use crate::types::round_to;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableQuality {
    pub bronze_rows: usize,
    pub duplicates_removed: usize,
    pub integrity_excluded: usize,
    pub silver_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageStats {
    pub bronze_bytes: u64,
    pub silver_bytes: u64,
    pub reduction_pct: f64,
}

impl StorageStats {
    pub fn new(bronze_bytes: u64, silver_bytes: u64) -> Self {
        let reduction_pct = if bronze_bytes == 0 {
            0.0
        } else {
            round_to((1.0 - silver_bytes as f64 / bronze_bytes as f64) * 100.0, 2)
        };
        Self { bronze_bytes, silver_bytes, reduction_pct }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub missing_policy: MissingPolicy,
    pub tables: BTreeMap<String, TableQuality>,
    pub readings: ReadingStats,
    /// Share of Silver readings marked as anomalous, in percent.
    pub anomaly_share_pct: f64,
    /// Payments dropped because their bill did not survive cleaning.
    pub orphan_payments: usize,
    pub meters_load_reset: usize,
    pub negative_amounts_zeroed: usize,
    pub payment_status_shares: BTreeMap<String, f64>,
    /// Filled in by the stage once the Parquet files exist.
    pub storage: Option<StorageStats>,
}

impl QualityReport {
    pub fn new(missing_policy: MissingPolicy) -> Self {
        Self {
            missing_policy,
            tables: BTreeMap::new(),
            readings: ReadingStats::default(),
            anomaly_share_pct: 0.0,
            orphan_payments: 0,
            meters_load_reset: 0,
            negative_amounts_zeroed: 0,
            payment_status_shares: BTreeMap::new(),
            storage: None,
        }
    }

    pub fn table(&mut self, name: &str) -> &mut TableQuality {
        self.tables.entry(name.to_string()).or_default()
    }

    /// Rows removed across every table by dedup, integrity and the drop policy.
    pub fn excluded_rows(&self) -> usize {
        let dropped: usize = self
            .tables
            .values()
            .map(|t| t.duplicates_removed + t.integrity_excluded)
            .sum();
        dropped + self.readings.dropped_missing + self.orphan_payments
    }

    pub fn record_anomaly_share(&mut self, silver_readings: usize) {
        self.anomaly_share_pct = if silver_readings == 0 {
            0.0
        } else {
            round_to(self.readings.flagged as f64 / silver_readings as f64 * 100.0, 2)
        };
    }

    pub fn record_payment_shares(&mut self, payments: &[PaymentRecord]) {
        self.payment_status_shares.clear();
        if payments.is_empty() {
            return;
        }
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for p in payments {
            *counts.entry(p.payment_status.as_str().to_string()).or_default() += 1;
        }
        for (status, count) in counts {
            let share = round_to(count as f64 / payments.len() as f64 * 100.0, 2);
            self.payment_status_shares.insert(status, share);
        }
    }
}
