use crate::error::{EtlError, EtlResult};
use crate::records::{QualityFlag, TariffCategory, TariffFamily};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Generator run parameters ───────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub frequency_minutes: u32,
    /// Growth-rate range in percent of each division's initial count.
    pub growth_min_pct: f64,
    pub growth_max_pct: f64,
    /// Overrides the per-division ranges when set.
    pub meter_count: Option<usize>,
    pub workers: usize,
    pub seed: u64,
    pub tables: TableSet,
}

/// Unparsed generator parameters as they arrive from the command line.
#[derive(Debug, Clone)]
pub struct GeneratorArgs {
    pub start_date: String,
    pub end_date: String,
    pub frequency_minutes: i64,
    pub growth_min_pct: f64,
    pub growth_max_pct: f64,
    pub meter_count: Option<i64>,
    pub workers: i64,
    pub seed: u64,
}

impl Default for GeneratorArgs {
    fn default() -> Self {
        Self {
            start_date: "2024-01-01".into(),
            end_date: "2024-03-31".into(),
            frequency_minutes: 15,
            growth_min_pct: 0.025,
            growth_max_pct: 1.0,
            meter_count: None,
            workers: 1,
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    /// Parse and validate raw arguments. Nothing touches the disk here.
    pub fn from_args(args: &GeneratorArgs, tables: TableSet) -> EtlResult<Self> {
        let start_date = parse_date("start_date", &args.start_date)?;
        let end_date = parse_date("end_date", &args.end_date)?;
        if args.frequency_minutes <= 0 || args.frequency_minutes > 1440 {
            return Err(EtlError::config(
                "frequency",
                format!("must be between 1 and 1440 minutes, got {}", args.frequency_minutes),
            ));
        }
        let meter_count = match args.meter_count {
            Some(n) if n <= 0 => {
                return Err(EtlError::config("meters", format!("must be positive, got {n}")))
            }
            Some(n) => Some(n as usize),
            None => None,
        };
        if args.workers < 1 {
            return Err(EtlError::config("workers", format!("must be at least 1, got {}", args.workers)));
        }
        let config = Self {
            start_date,
            end_date,
            frequency_minutes: args.frequency_minutes as u32,
            growth_min_pct: args.growth_min_pct,
            growth_max_pct: args.growth_max_pct,
            meter_count,
            workers: args.workers as usize,
            seed: args.seed,
            tables,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EtlResult<()> {
        if self.end_date < self.start_date {
            return Err(EtlError::config(
                "end_date",
                format!("{} is before start date {}", self.end_date, self.start_date),
            ));
        }
        if self.frequency_minutes == 0 || self.frequency_minutes > 1440 {
            return Err(EtlError::config("frequency", "must be between 1 and 1440 minutes"));
        }
        if !(self.growth_min_pct >= 0.0) {
            return Err(EtlError::config("growth_min", "must be a non-negative percentage"));
        }
        if !(self.growth_max_pct >= self.growth_min_pct) {
            return Err(EtlError::config(
                "growth_max",
                format!("{} is below growth_min {}", self.growth_max_pct, self.growth_min_pct),
            ));
        }
        if self.meter_count == Some(0) {
            return Err(EtlError::config("meters", "must be positive"));
        }
        if self.workers == 0 {
            return Err(EtlError::config("workers", "must be at least 1"));
        }
        self.tables.validate()
    }

    /// Energy scale of one interval relative to the 15-minute baselines.
    pub fn interval_scale(&self) -> f64 {
        f64::from(self.frequency_minutes) / 15.0
    }

    /// Small fixed run used by tests.
    pub fn default_test() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default(),
            frequency_minutes: 60,
            growth_min_pct: 0.0,
            growth_max_pct: 0.0,
            meter_count: Some(1),
            workers: 1,
            seed: 42,
            tables: TableSet::default(),
        }
    }
}

fn parse_date(field: &'static str, text: &str) -> EtlResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| EtlError::config(field, format!("'{text}' is not a YYYY-MM-DD date: {e}")))
}

// ── Static tables ──────────────────────────────────────────────────

/// Every lookup table the generator and cleaner consult.
/// Any section missing from a JSON tables file keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSet {
    pub tariffs: TariffTable,
    pub circles: Vec<CircleConfig>,
    pub population: PopulationConfig,
    pub consumption: ConsumptionConfig,
    pub faults: FaultTable,
    pub billing: BillingConfig,
    pub payments: PaymentConfig,
}

impl Default for TableSet {
    fn default() -> Self {
        Self {
            tariffs: TariffTable::default(),
            circles: default_circles(),
            population: PopulationConfig::default(),
            consumption: ConsumptionConfig::default(),
            faults: FaultTable::default(),
            billing: BillingConfig::default(),
            payments: PaymentConfig::default(),
        }
    }
}

impl TableSet {
    /// Load a tables file written as JSON.
    pub fn load(path: &Path) -> EtlResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Other(anyhow::anyhow!("Cannot read {}: {e}", path.display()))
        })?;
        let tables: TableSet = serde_json::from_str(&content)?;
        tables.validate()?;
        log::info!("config: tables loaded from {}", path.display());
        Ok(tables)
    }

    pub fn validate(&self) -> EtlResult<()> {
        if self.tariffs.0.is_empty() {
            return Err(EtlError::config("tariffs", "at least one tariff is required"));
        }
        for tariff in &self.tariffs.0 {
            if tariff.slabs.is_empty() {
                return Err(EtlError::config("tariffs", format!("{} has no slabs", tariff.code)));
            }
            if tariff.min_load_kw > tariff.max_load_kw {
                return Err(EtlError::config("tariffs", format!("{} load range is inverted", tariff.code)));
            }
        }
        if self.circles.iter().all(|c| c.divisions.is_empty()) {
            return Err(EtlError::config("circles", "at least one division is required"));
        }
        for division in self.circles.iter().flat_map(|c| &c.divisions) {
            if division.min_meters > division.max_meters {
                return Err(EtlError::config(
                    "circles",
                    format!("{} meter range is inverted", division.name),
                ));
            }
        }
        if self.population.population_scale <= 0.0 {
            return Err(EtlError::config("population_scale", "must be positive"));
        }
        if self.population.meter_makes.is_empty() || self.population.sub_division_suffixes.is_empty() {
            return Err(EtlError::config("population", "meter makes and sub-division suffixes must not be empty"));
        }
        for family in [TariffFamily::Residential, TariffFamily::Commercial, TariffFamily::Industrial] {
            if self.consumption.profile(family).is_none() {
                return Err(EtlError::config("consumption", format!("no profile for {family:?}")));
            }
        }
        let fault_total: f64 = self.faults.rules.iter().map(|r| r.probability).sum();
        if self.faults.rules.iter().any(|r| r.probability < 0.0) || fault_total > 1.0 {
            return Err(EtlError::config("faults", "probabilities must be non-negative and sum to at most 1"));
        }
        if self.payments.methods.is_empty() || self.payments.timing_bands.is_empty() {
            return Err(EtlError::config("payments", "methods and timing bands must not be empty"));
        }
        Ok(())
    }
}

// ── Tariffs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffTable(pub Vec<TariffConfig>);

impl TariffTable {
    pub fn get(&self, code: TariffCategory) -> Option<&TariffConfig> {
        self.0.iter().find(|t| t.code == code)
    }

    pub fn weights(&self) -> Vec<f64> {
        self.0.iter().map(|t| t.weight).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    pub code: TariffCategory,
    pub label: String,
    pub weight: f64,
    pub min_load_kw: f64,
    pub max_load_kw: f64,
    /// Ordered brackets; the last one should be open-ended.
    pub slabs: Vec<Slab>,
    pub fixed_charge: FixedCharge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Slab {
    /// Upper bound in units, `None` for the open top bracket.
    pub upto_units: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixedCharge {
    /// `below` when connected load is under `threshold_kw`, `at_or_above` otherwise.
    Stepped { threshold_kw: f64, below: f64, at_or_above: f64 },
    PerKw { rate: f64 },
}

fn slab(upto_units: Option<f64>, rate: f64) -> Slab {
    Slab { upto_units, rate }
}

impl Default for TariffTable {
    fn default() -> Self {
        let residential = vec![
            slab(Some(100.0), 5.79),
            slab(Some(200.0), 8.11),
            slab(Some(300.0), 10.20),
            slab(Some(400.0), 16.00),
            slab(Some(500.0), 18.00),
            slab(None, 21.00),
        ];
        let commercial = vec![slab(Some(100.0), 16.00), slab(Some(300.0), 18.00), slab(None, 21.00)];
        let domestic_fixed = FixedCharge::Stepped { threshold_kw: 5.0, below: 50.0, at_or_above: 100.0 };

        let tariff = |code, label: &str, weight, min, max, slabs: &Vec<Slab>, fixed| TariffConfig {
            code,
            label: label.into(),
            weight,
            min_load_kw: min,
            max_load_kw: max,
            slabs: slabs.clone(),
            fixed_charge: fixed,
        };
        Self(vec![
            tariff(TariffCategory::A1a, "Residential Single Phase", 0.40, 1.0, 5.0, &residential, domestic_fixed),
            tariff(TariffCategory::A1b, "Residential Three Phase", 0.25, 5.0, 30.0, &residential, domestic_fixed),
            tariff(TariffCategory::A2a, "Commercial Single Phase", 0.15, 1.0, 5.0, &commercial, FixedCharge::PerKw { rate: 250.0 }),
            tariff(TariffCategory::A2b, "Commercial Three Phase", 0.10, 5.0, 50.0, &commercial, FixedCharge::PerKw { rate: 250.0 }),
            tariff(TariffCategory::B1, "Industrial Small", 0.07, 5.0, 25.0, &vec![slab(None, 14.00)], FixedCharge::PerKw { rate: 200.0 }),
            tariff(TariffCategory::B2, "Industrial Medium", 0.03, 25.0, 500.0, &vec![slab(None, 16.00)], FixedCharge::PerKw { rate: 300.0 }),
        ])
    }
}

// ── Circles and divisions ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleConfig {
    pub name: String,
    pub city: String,
    pub divisions: Vec<DivisionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivisionConfig {
    pub name: String,
    pub min_meters: u64,
    pub max_meters: u64,
}

pub fn default_circles() -> Vec<CircleConfig> {
    let circle = |name: &str, divisions: &[(&str, u64, u64)]| CircleConfig {
        name: name.into(),
        city: name.into(),
        divisions: divisions
            .iter()
            .map(|(n, lo, hi)| DivisionConfig { name: (*n).into(), min_meters: *lo, max_meters: *hi })
            .collect(),
    };
    vec![
        circle("Islamabad", &[
            ("Islamabad Division 1", 15_000, 25_000),
            ("Islamabad Division 2", 12_000, 20_000),
            ("Barakahu", 8_000, 15_000),
        ]),
        circle("Rawalpindi", &[
            ("Rawat", 10_000, 18_000),
            ("Rawalpindi City", 20_000, 35_000),
            ("Rawalpindi Cantt", 15_000, 25_000),
            ("Satellite Town", 12_000, 22_000),
            ("Westridge", 10_000, 18_000),
            ("Tariqabad", 8_000, 15_000),
        ]),
        circle("Attock", &[
            ("Taxila", 12_000, 20_000),
            ("Pindigheb", 7_000, 12_000),
            ("Attock", 10_000, 18_000),
        ]),
        circle("Jhelum", &[
            ("Jhelum Division 1", 10_000, 18_000),
            ("Jhelum Division 2", 9_000, 16_000),
            ("Gujar Khan", 8_000, 14_000),
        ]),
        circle("Chakwal", &[
            ("Chakwal", 9_000, 16_000),
            ("Talagang", 6_000, 11_000),
            ("Dhudial", 5_000, 9_000),
            ("Pind Dadan Khan", 7_000, 12_000),
        ]),
    ]
}

// ── Population attributes ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Multiplier applied to every division's meter range.
    pub population_scale: f64,
    /// Initial meters connect up to this many days before the start date.
    pub connection_history_days: i64,
    pub smart_meter_share: f64,
    pub meter_makes: Vec<String>,
    pub sub_division_suffixes: Vec<String>,
    /// Active, Disconnected, Suspended.
    pub status_weights: [f64; 3],
    pub warranty_share: f64,
    pub warranty_max_days: i64,
    pub sanctioned_factor: (f64, f64),
    pub latitude: (f64, f64),
    pub longitude: (f64, f64),
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_scale: 0.001,
            connection_history_days: 3650,
            smart_meter_share: 0.75,
            meter_makes: ["Landis+Gyr", "Siemens", "Elster", "Itron"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sub_division_suffixes: ["North", "South", "East", "West", "Central"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            status_weights: [0.6, 0.2, 0.2],
            warranty_share: 0.8,
            warranty_max_days: 1825,
            sanctioned_factor: (0.8, 1.2),
            latitude: (33.0651, 34.0651),
            longitude: (72.5169, 73.5169),
        }
    }
}

// ── Consumption model ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FamilyProfile {
    pub family: TariffFamily,
    /// kWh per 15 minutes outside peak hours.
    pub base_kwh: (f64, f64),
    /// kWh per 15 minutes during peak hours.
    pub peak_kwh: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumptionConfig {
    pub profiles: Vec<FamilyProfile>,
    /// Inclusive hour ranges `[from, to]`.
    pub peak_hours: Vec<(u32, u32)>,
    /// Indexed by month - 1.
    pub seasonal: [f64; 12],
    pub weekend_multiplier: f64,
    pub variation: (f64, f64),
    pub voltage: Normal,
    pub frequency: Normal,
    pub power_factor: Normal,
    pub temperature: Normal,
    pub afternoon_heat_c: f64,
    pub signal_dbm: Normal,
    pub battery_v: Normal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Normal {
    pub mean: f64,
    pub sd: f64,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            profiles: vec![
                FamilyProfile { family: TariffFamily::Residential, base_kwh: (0.1, 0.5), peak_kwh: (0.5, 0.8) },
                FamilyProfile { family: TariffFamily::Commercial, base_kwh: (0.3, 1.0), peak_kwh: (1.0, 1.5) },
                FamilyProfile { family: TariffFamily::Industrial, base_kwh: (1.0, 5.0), peak_kwh: (5.0, 8.0) },
            ],
            peak_hours: vec![(6, 10), (18, 23)],
            seasonal: [0.7, 0.7, 0.8, 0.9, 1.2, 1.4, 1.4, 1.3, 1.1, 0.9, 0.8, 0.7],
            weekend_multiplier: 1.1,
            variation: (0.9, 1.1),
            voltage: Normal { mean: 230.0, sd: 10.0 },
            frequency: Normal { mean: 50.0, sd: 0.2 },
            power_factor: Normal { mean: 0.95, sd: 0.03 },
            temperature: Normal { mean: 30.0, sd: 5.0 },
            afternoon_heat_c: 15.0,
            signal_dbm: Normal { mean: -70.0, sd: 10.0 },
            battery_v: Normal { mean: 3.7, sd: 0.2 },
        }
    }
}

impl ConsumptionConfig {
    pub fn profile(&self, family: TariffFamily) -> Option<&FamilyProfile> {
        self.profiles.iter().find(|p| p.family == family)
    }

    pub fn is_peak_hour(&self, hour: u32) -> bool {
        self.peak_hours.iter().any(|(from, to)| (*from..=*to).contains(&hour))
    }

    /// Plausible per-interval energy band for a tariff family.
    /// Spans the quietest off-peak reading to the busiest weekend peak reading.
    pub fn plausible_band(&self, family: TariffFamily, interval_scale: f64) -> Option<(f64, f64)> {
        let profile = self.profile(family)?;
        let season_lo = self.seasonal.iter().copied().fold(f64::INFINITY, f64::min);
        let season_hi = self.seasonal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = profile.base_kwh.0 * season_lo * self.variation.0 * interval_scale;
        let hi = profile.peak_kwh.1 * season_hi * self.weekend_multiplier * self.variation.1 * interval_scale;
        Some((lo, hi))
    }
}

// ── Fault injection ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaultRule {
    pub fault: QualityFlag,
    pub probability: f64,
}

/// Ordered fault list. One roll per reading selects at most one fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultTable {
    pub rules: Vec<FaultRule>,
    pub spike_factor: (f64, f64),
    pub sag_voltage: (f64, f64),
    pub frequency_drift_hz: (f64, f64),
    pub signal_drop_dbm: (f64, f64),
    pub battery_fault_v: (f64, f64),
}

impl Default for FaultTable {
    fn default() -> Self {
        let rule = |fault, probability| FaultRule { fault, probability };
        Self {
            rules: vec![
                rule(QualityFlag::MissingReading, 0.02),
                rule(QualityFlag::NegativeReading, 0.005),
                rule(QualityFlag::ZeroReading, 0.01),
                rule(QualityFlag::AbnormalSpike, 0.01),
                rule(QualityFlag::VoltageSag, 0.015),
                rule(QualityFlag::FrequencyVariation, 0.01),
                rule(QualityFlag::SignalDrop, 0.02),
                rule(QualityFlag::BatteryFault, 0.005),
            ],
            spike_factor: (5.0, 10.0),
            sag_voltage: (160.0, 200.0),
            frequency_drift_hz: (47.0, 53.0),
            signal_drop_dbm: (-110.0, -90.0),
            battery_fault_v: (2.5, 3.0),
        }
    }
}

impl FaultTable {
    /// A table that never injects anything.
    pub fn none() -> Self {
        Self { rules: Vec::new(), ..Self::default() }
    }

    /// Walk the cumulative thresholds; the first one above `roll` wins.
    pub fn select(&self, roll: f64) -> QualityFlag {
        let mut cumulative = 0.0;
        for rule in &self.rules {
            cumulative += rule.probability;
            if roll < cumulative {
                return rule.fault;
            }
        }
        QualityFlag::Normal
    }
}

// ── Billing and payments ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub gst_rate: f64,
    pub electricity_duty_rate: f64,
    pub tv_fee: f64,
    pub late_surcharge_rate: f64,
    pub after_due_rate: f64,
    /// Days after month end the bill is issued.
    pub issue_offset_days: i64,
    pub due_after_issue_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            gst_rate: 0.18,
            electricity_duty_rate: 0.015,
            tv_fee: 35.0,
            late_surcharge_rate: 0.05,
            after_due_rate: 0.05,
            issue_offset_days: 5,
            due_after_issue_days: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingBand {
    pub probability: f64,
    /// Days relative to the due date; negative is before it.
    pub offset_days: (i64, i64),
    /// Late payers pay `amount_after_due_date × U(1.0, premium_max)`.
    pub premium_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Wallet,
    Bank,
    Counter,
}

impl PaymentChannel {
    /// Transaction id prefix and number of trailing digits.
    pub fn transaction_format(self) -> (&'static str, u32) {
        match self {
            Self::Wallet => ("EP", 10),
            Self::Bank => ("BNK", 9),
            Self::Counter => ("CSH", 8),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodConfig {
    pub name: String,
    pub weight: f64,
    pub channel: PaymentChannel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub paid_probability: f64,
    pub partial_probability: f64,
    pub partial_fraction: (f64, f64),
    pub timing_bands: Vec<TimingBand>,
    /// Early payments that would land before the issue date pay issue + U(lo, hi) days.
    pub early_floor_days: (i64, i64),
    pub methods: Vec<PaymentMethodConfig>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        let method = |name: &str, weight, channel| PaymentMethodConfig { name: name.into(), weight, channel };
        Self {
            paid_probability: 0.85,
            partial_probability: 0.05,
            partial_fraction: (0.5, 0.95),
            timing_bands: vec![
                TimingBand { probability: 0.60, offset_days: (-14, -1), premium_max: 1.0 },
                TimingBand { probability: 0.25, offset_days: (1, 7), premium_max: 1.0 },
                TimingBand { probability: 0.15, offset_days: (8, 30), premium_max: 1.1 },
            ],
            early_floor_days: (1, 5),
            methods: vec![
                method("Bank Branch", 0.15, PaymentChannel::Bank),
                method("Bank ATM", 0.10, PaymentChannel::Bank),
                method("Bank Mobile App", 0.20, PaymentChannel::Bank),
                method("EasyPaisa", 0.15, PaymentChannel::Wallet),
                method("JazzCash", 0.12, PaymentChannel::Wallet),
                method("1Bill", 0.08, PaymentChannel::Wallet),
                method("Online Banking", 0.10, PaymentChannel::Bank),
                method("IESCO Office", 0.05, PaymentChannel::Counter),
                method("Franchise", 0.05, PaymentChannel::Counter),
            ],
        }
    }
}

// ── Cleaner ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    #[default]
    Interpolate,
    CarryForward,
    Drop,
}

impl MissingPolicy {
    pub fn parse(text: &str) -> EtlResult<Self> {
        match text.trim() {
            "interpolate" => Ok(Self::Interpolate),
            "carry-forward" => Ok(Self::CarryForward),
            "drop" => Ok(Self::Drop),
            other => Err(EtlError::config(
                "missing_policy",
                format!("'{other}' is not one of interpolate, carry-forward, drop"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TelemetryBounds {
    pub voltage: (f64, f64),
    pub nominal_voltage: f64,
    pub frequency: (f64, f64),
    pub nominal_frequency: f64,
    pub nominal_power_factor: f64,
    pub max_sanctioned_load_kw: f64,
    pub default_sanctioned_load_kw: f64,
}

impl Default for TelemetryBounds {
    fn default() -> Self {
        Self {
            voltage: (150.0, 450.0),
            nominal_voltage: 230.0,
            frequency: (45.0, 55.0),
            nominal_frequency: 50.0,
            nominal_power_factor: 0.95,
            max_sanctioned_load_kw: 5000.0,
            default_sanctioned_load_kw: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanerConfig {
    pub missing_policy: MissingPolicy,
    pub consumption: ConsumptionConfig,
    pub telemetry: TelemetryBounds,
    /// Used when a meter has too few readings to infer its interval.
    pub default_frequency_minutes: Option<u32>,
}

impl CleanerConfig {
    pub fn with_policy(missing_policy: MissingPolicy) -> Self {
        Self { missing_policy, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = GeneratorConfig::default_test();
        config.validate().unwrap();
        assert_eq!(config.tables.circles.iter().map(|c| c.divisions.len()).sum::<usize>(), 19);
    }

    #[test]
    fn fault_roll_walks_cumulative_thresholds() {
        let faults = FaultTable::default();
        assert_eq!(faults.select(0.0), QualityFlag::MissingReading);
        assert_eq!(faults.select(0.021), QualityFlag::NegativeReading);
        assert_eq!(faults.select(0.5), QualityFlag::Normal);
        assert_eq!(FaultTable::none().select(0.0), QualityFlag::Normal);
    }

    #[test]
    fn residential_band_matches_profile_extremes() {
        let consumption = ConsumptionConfig::default();
        let (lo, hi) = consumption.plausible_band(TariffFamily::Residential, 1.0).unwrap();
        assert!((lo - 0.063).abs() < 1e-9);
        assert!((hi - 1.3552).abs() < 1e-9);
    }

    #[test]
    fn peak_windows_include_both_ends() {
        let consumption = ConsumptionConfig::default();
        let peak: Vec<u32> = (0..24).filter(|h| consumption.is_peak_hour(*h)).collect();
        assert_eq!(peak, vec![6, 7, 8, 9, 10, 18, 19, 20, 21, 22, 23]);
        for hour in [5, 11, 17] {
            assert!(!consumption.is_peak_hour(hour), "{hour}");
        }
    }

    #[test]
    fn args_default_to_the_documented_growth_range() {
        let args = GeneratorArgs::default();
        assert_eq!(args.growth_min_pct, 0.025);
        assert_eq!(args.growth_max_pct, 1.0);
    }

    #[test]
    fn missing_policy_parses_cli_spelling() {
        assert_eq!(MissingPolicy::parse("carry-forward").unwrap(), MissingPolicy::CarryForward);
        assert!(MissingPolicy::parse("mean").is_err());
    }
}
