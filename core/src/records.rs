//! Row types for every Bronze and Silver table.
//!
//! Field order is column order: CSV headers and Parquet schemas are both
//! derived from these structs, and `COLUMNS` must list the fields in the
//! same order.

use crate::io::parquet::ColumnKind;
use crate::types::{BillingMonth, ConsumerId, MeterNumber, Money};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names in write order, used for headers and input checks.
pub trait CsvTable {
    const COLUMNS: &'static [&'static str];
}

/// Columns whose Parquet type differs from what the serde layout implies.
pub trait ParquetTable: Sized {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[];

    /// A row with every optional field set, traced in place of the type.
    /// Rows holding chrono values cannot be traced from the type alone.
    fn schema_sample() -> Option<Self> {
        None
    }
}

// ── Enumerations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TariffCategory {
    #[serde(rename = "A-1a")]
    A1a,
    #[serde(rename = "A-1b")]
    A1b,
    #[serde(rename = "A-2a")]
    A2a,
    #[serde(rename = "A-2b")]
    A2b,
    #[serde(rename = "B-1")]
    B1,
    #[serde(rename = "B-2")]
    B2,
}

impl TariffCategory {
    pub fn code(self) -> &'static str {
        match self {
            Self::A1a => "A-1a",
            Self::A1b => "A-1b",
            Self::A2a => "A-2a",
            Self::A2b => "A-2b",
            Self::B1 => "B-1",
            Self::B2 => "B-2",
        }
    }

    pub fn family(self) -> TariffFamily {
        match self {
            Self::A1a | Self::A1b => TariffFamily::Residential,
            Self::A2a | Self::A2b => TariffFamily::Commercial,
            Self::B1 | Self::B2 => TariffFamily::Industrial,
        }
    }

    /// `*a` tariffs are single phase.
    pub fn phase(self) -> PhaseType {
        match self {
            Self::A1a | Self::A2a => PhaseType::Single,
            _ => PhaseType::Three,
        }
    }
}

impl fmt::Display for TariffCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TariffFamily {
    Residential,
    Commercial,
    Industrial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseType {
    Single,
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterType {
    Smart,
    Conventional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterStatus {
    Active,
    Disconnected,
    Suspended,
}

impl MeterStatus {
    pub const ALL: [MeterStatus; 3] = [Self::Active, Self::Disconnected, Self::Suspended];
}

/// Per-reading marker naming the fault rule applied by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityFlag {
    Normal,
    #[serde(rename = "Missing Reading")]
    MissingReading,
    #[serde(rename = "Negative Reading")]
    NegativeReading,
    #[serde(rename = "Zero Reading")]
    ZeroReading,
    #[serde(rename = "Abnormal Spike")]
    AbnormalSpike,
    #[serde(rename = "Voltage Sag")]
    VoltageSag,
    #[serde(rename = "Frequency Variation")]
    FrequencyVariation,
    #[serde(rename = "Signal Drop")]
    SignalDrop,
    #[serde(rename = "Battery Fault")]
    BatteryFault,
}

impl QualityFlag {
    /// Readings with these flags do not count towards billed units.
    pub fn excluded_from_billing(self) -> bool {
        matches!(self, Self::MissingReading | Self::NegativeReading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Partial => "Partial",
            Self::Unpaid => "Unpaid",
        }
    }
}

/// Energy correction applied by the cleaner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    None,
    Negative,
    Zero,
    Spike,
    BelowBand,
    AboveBand,
}

// ── Bronze ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
    pub consumer_id: ConsumerId,
    pub meter_number: MeterNumber,
    pub reference_no: String,
    pub consumer_name: String,
    pub address: String,
    pub tariff_category: TariffCategory,
    pub circle: String,
    pub division: String,
    pub sub_division: String,
    pub city: String,
    pub feeder_name: String,
    pub phase_type: PhaseType,
    pub meter_type: MeterType,
    pub meter_make: String,
    pub connected_load_kw: f64,
    pub sanctioned_load_kw: f64,
    pub connection_date: NaiveDate,
    pub installation_date: NaiveDate,
    pub warranty_expiry: Option<NaiveDate>,
    pub latitude: f64,
    pub longitude: f64,
    pub status: MeterStatus,
}

impl CsvTable for MeterRecord {
    const COLUMNS: &'static [&'static str] = &[
        "consumer_id", "meter_number", "reference_no", "consumer_name", "address",
        "tariff_category", "circle", "division", "sub_division", "city", "feeder_name",
        "phase_type", "meter_type", "meter_make", "connected_load_kw", "sanctioned_load_kw",
        "connection_date", "installation_date", "warranty_expiry", "latitude", "longitude",
        "status",
    ];
}

impl ParquetTable for MeterRecord {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("circle", ColumnKind::Category),
        ("division", ColumnKind::Category),
        ("sub_division", ColumnKind::Category),
        ("city", ColumnKind::Category),
        ("feeder_name", ColumnKind::Category),
        ("meter_make", ColumnKind::Category),
        ("tariff_category", ColumnKind::Category),
        ("connection_date", ColumnKind::Date),
        ("installation_date", ColumnKind::Date),
        ("warranty_expiry", ColumnKind::Date),
    ];

    fn schema_sample() -> Option<Self> {
        Some(MeterRecord {
            consumer_id: String::new(),
            meter_number: String::new(),
            reference_no: String::new(),
            consumer_name: String::new(),
            address: String::new(),
            tariff_category: TariffCategory::A1a,
            circle: String::new(),
            division: String::new(),
            sub_division: String::new(),
            city: String::new(),
            feeder_name: String::new(),
            phase_type: PhaseType::Single,
            meter_type: MeterType::Smart,
            meter_make: String::new(),
            connected_load_kw: 0.0,
            sanctioned_load_kw: 0.0,
            connection_date: NaiveDate::default(),
            installation_date: NaiveDate::default(),
            warranty_expiry: Some(NaiveDate::default()),
            latitude: 0.0,
            longitude: 0.0,
            status: MeterStatus::Active,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub timestamp: NaiveDateTime,
    pub meter_number: MeterNumber,
    pub consumer_id: ConsumerId,
    pub reading_kwh: Option<f64>,
    pub energy_consumed_kwh: Option<f64>,
    pub voltage_v: Option<f64>,
    pub current_a: Option<f64>,
    pub frequency_hz: Option<f64>,
    pub power_factor: Option<f64>,
    pub temperature_c: Option<f64>,
    pub signal_strength_dbm: Option<f64>,
    pub battery_voltage_v: Option<f64>,
    pub data_quality_flag: QualityFlag,
}

impl CsvTable for ReadingRecord {
    const COLUMNS: &'static [&'static str] = &[
        "timestamp", "meter_number", "consumer_id", "reading_kwh", "energy_consumed_kwh",
        "voltage_v", "current_a", "frequency_hz", "power_factor", "temperature_c",
        "signal_strength_dbm", "battery_voltage_v", "data_quality_flag",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub bill_id: String,
    pub meter_number: MeterNumber,
    pub consumer_id: ConsumerId,
    pub billing_month: BillingMonth,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub units_consumed: f64,
    pub variable_charges: Money,
    pub fixed_charges: Money,
    pub gst: Money,
    pub electricity_duty: Money,
    pub tv_fee: Money,
    pub late_payment_surcharge: Money,
    pub total_amount: Money,
    pub amount_within_due_date: Money,
    pub amount_after_due_date: Money,
    pub tariff_applied: TariffCategory,
    pub reference_no: String,
}

impl BillRecord {
    pub fn component_sum(&self) -> Money {
        self.variable_charges
            + self.fixed_charges
            + self.gst
            + self.electricity_duty
            + self.tv_fee
            + self.late_payment_surcharge
    }
}

impl CsvTable for BillRecord {
    const COLUMNS: &'static [&'static str] = &[
        "bill_id", "meter_number", "consumer_id", "billing_month", "issue_date", "due_date",
        "units_consumed", "variable_charges", "fixed_charges", "gst", "electricity_duty",
        "tv_fee", "late_payment_surcharge", "total_amount", "amount_within_due_date",
        "amount_after_due_date", "tariff_applied", "reference_no",
    ];
}

impl ParquetTable for BillRecord {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("issue_date", ColumnKind::Date),
        ("due_date", ColumnKind::Date),
        ("billing_month", ColumnKind::Category),
        ("tariff_applied", ColumnKind::Category),
    ];

    fn schema_sample() -> Option<Self> {
        Some(BillRecord {
            bill_id: String::new(),
            meter_number: String::new(),
            consumer_id: String::new(),
            billing_month: String::new(),
            issue_date: NaiveDate::default(),
            due_date: NaiveDate::default(),
            units_consumed: 0.0,
            variable_charges: Money::ZERO,
            fixed_charges: Money::ZERO,
            gst: Money::ZERO,
            electricity_duty: Money::ZERO,
            tv_fee: Money::ZERO,
            late_payment_surcharge: Money::ZERO,
            total_amount: Money::ZERO,
            amount_within_due_date: Money::ZERO,
            amount_after_due_date: Money::ZERO,
            tariff_applied: TariffCategory::A1a,
            reference_no: String::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub bill_id: String,
    pub consumer_id: ConsumerId,
    pub meter_number: MeterNumber,
    pub billing_month: BillingMonth,
    pub bill_amount: Money,
    pub due_date: NaiveDate,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
    pub paid_amount: Money,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub outstanding_amount: Money,
}

impl PaymentRecord {
    /// Unpaid, or settled after the due date.
    pub fn was_overdue(&self) -> bool {
        match (self.payment_status, self.payment_date) {
            (PaymentStatus::Unpaid, _) | (_, None) => true,
            (_, Some(paid_on)) => paid_on > self.due_date,
        }
    }
}

impl CsvTable for PaymentRecord {
    const COLUMNS: &'static [&'static str] = &[
        "payment_id", "bill_id", "consumer_id", "meter_number", "billing_month",
        "bill_amount", "due_date", "payment_status", "payment_date", "paid_amount",
        "payment_method", "transaction_id", "outstanding_amount",
    ];
}

impl ParquetTable for PaymentRecord {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("due_date", ColumnKind::Date),
        ("payment_date", ColumnKind::Date),
        ("billing_month", ColumnKind::Category),
        ("payment_status", ColumnKind::Category),
        ("payment_method", ColumnKind::Category),
    ];

    fn schema_sample() -> Option<Self> {
        Some(PaymentRecord {
            payment_id: String::new(),
            bill_id: String::new(),
            consumer_id: String::new(),
            meter_number: String::new(),
            billing_month: String::new(),
            bill_amount: Money::ZERO,
            due_date: NaiveDate::default(),
            payment_status: PaymentStatus::Paid,
            payment_date: Some(NaiveDate::default()),
            paid_amount: Money::ZERO,
            payment_method: Some(String::new()),
            transaction_id: Some(String::new()),
            outstanding_amount: Money::ZERO,
        })
    }
}

// ── Silver ─────────────────────────────────────────────────────────

/// A cleaned reading: every measurement the billing path needs is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilverReading {
    pub timestamp: NaiveDateTime,
    pub meter_number: MeterNumber,
    pub consumer_id: ConsumerId,
    pub reading_kwh: f64,
    pub energy_consumed_kwh: f64,
    pub original_energy_kwh: Option<f64>,
    pub voltage_v: f64,
    pub current_a: f64,
    pub frequency_hz: f64,
    pub power_factor: f64,
    pub temperature_c: Option<f64>,
    pub signal_strength_dbm: Option<f64>,
    pub battery_voltage_v: Option<f64>,
    pub data_quality_flag: QualityFlag,
    pub anomaly: AnomalyKind,
    pub is_anomaly: bool,
    pub is_imputed: bool,
}

impl SilverReading {
    /// Back to the Bronze shape, used to feed cleaned data through the cleaner again.
    pub fn to_bronze(&self) -> ReadingRecord {
        ReadingRecord {
            timestamp: self.timestamp,
            meter_number: self.meter_number.clone(),
            consumer_id: self.consumer_id.clone(),
            reading_kwh: Some(self.reading_kwh),
            energy_consumed_kwh: Some(self.energy_consumed_kwh),
            voltage_v: Some(self.voltage_v),
            current_a: Some(self.current_a),
            frequency_hz: Some(self.frequency_hz),
            power_factor: Some(self.power_factor),
            temperature_c: self.temperature_c,
            signal_strength_dbm: self.signal_strength_dbm,
            battery_voltage_v: self.battery_voltage_v,
            data_quality_flag: self.data_quality_flag,
        }
    }
}

impl ParquetTable for SilverReading {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("timestamp", ColumnKind::Timestamp),
        ("meter_number", ColumnKind::Category),
        ("consumer_id", ColumnKind::Category),
        ("data_quality_flag", ColumnKind::Category),
        ("anomaly", ColumnKind::Category),
    ];

    fn schema_sample() -> Option<Self> {
        Some(SilverReading {
            timestamp: NaiveDateTime::default(),
            meter_number: String::new(),
            consumer_id: String::new(),
            reading_kwh: 0.0,
            energy_consumed_kwh: 0.0,
            original_energy_kwh: Some(0.0),
            voltage_v: 0.0,
            current_a: 0.0,
            frequency_hz: 0.0,
            power_factor: 0.0,
            temperature_c: Some(0.0),
            signal_strength_dbm: Some(0.0),
            battery_voltage_v: Some(0.0),
            data_quality_flag: QualityFlag::Normal,
            anomaly: AnomalyKind::None,
            is_anomaly: false,
            is_imputed: false,
        })
    }
}

// ── Whole layers ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BronzeTables {
    pub meters: Vec<MeterRecord>,
    pub readings: Vec<ReadingRecord>,
    pub bills: Vec<BillRecord>,
    pub payments: Vec<PaymentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SilverTables {
    pub meters: Vec<MeterRecord>,
    pub readings: Vec<SilverReading>,
    pub bills: Vec<BillRecord>,
    pub payments: Vec<PaymentRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_of<T: Serialize>(row: &T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let bytes = writer.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().lines().next().unwrap().to_string()
    }

    #[test]
    fn reading_columns_match_serialized_header() {
        let row = ReadingRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            meter_number: "12345678901".into(),
            consumer_id: "1234567".into(),
            reading_kwh: None,
            energy_consumed_kwh: None,
            voltage_v: None,
            current_a: None,
            frequency_hz: None,
            power_factor: None,
            temperature_c: None,
            signal_strength_dbm: None,
            battery_voltage_v: None,
            data_quality_flag: QualityFlag::MissingReading,
        };
        assert_eq!(header_of(&row), ReadingRecord::COLUMNS.join(","));
    }

    #[test]
    fn payment_overdue_rules() {
        let due = NaiveDate::from_ymd_opt(2024, 2, 19).unwrap();
        let mut payment = PaymentRecord {
            payment_id: "PAY-1".into(),
            bill_id: "BILL-1".into(),
            consumer_id: "1".into(),
            meter_number: "1".into(),
            billing_month: "2024-01".into(),
            bill_amount: Money::from_rupees(100.0),
            due_date: due,
            payment_status: PaymentStatus::Paid,
            payment_date: Some(due),
            paid_amount: Money::from_rupees(100.0),
            payment_method: Some("JazzCash".into()),
            transaction_id: Some("EP0000000001".into()),
            outstanding_amount: Money::ZERO,
        };
        assert!(!payment.was_overdue(), "paying on the due date is on time");
        payment.payment_date = due.succ_opt();
        assert!(payment.was_overdue());
        payment.payment_status = PaymentStatus::Unpaid;
        payment.payment_date = None;
        assert!(payment.was_overdue());
    }

    #[test]
    fn quality_flags_serialize_with_spaces() {
        let json = serde_json::to_string(&QualityFlag::AbnormalSpike).unwrap();
        assert_eq!(json, "\"Abnormal Spike\"");
        assert_eq!(TariffCategory::A2b.to_string(), "A-2b");
        assert_eq!(TariffCategory::B2.family(), TariffFamily::Industrial);
    }
}
