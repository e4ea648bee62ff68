//! Dimension tables. Keys are assigned over Silver row order.

use crate::clock::is_weekend;
use crate::io::parquet::ColumnKind;
use crate::records::{
    MeterRecord, MeterStatus, MeterType, ParquetTable, PhaseType, SilverReading, TariffCategory,
    TariffFamily,
};
use crate::reshaper::keys::{date_key, KeyAllocator};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimMeter {
    pub meter_key: u32,
    pub meter_number: String,
    pub consumer_id: String,
    pub consumer_type_key: u32,
    pub location_key: u32,
    pub consumer_name: String,
    pub tariff_category: TariffCategory,
    pub phase_type: PhaseType,
    pub meter_type: MeterType,
    pub meter_make: String,
    pub feeder_name: String,
    pub connected_load_kw: f64,
    pub sanctioned_load_kw: f64,
    pub connection_date: NaiveDate,
    pub status: MeterStatus,
}

impl ParquetTable for DimMeter {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("tariff_category", ColumnKind::Category),
        ("meter_make", ColumnKind::Category),
        ("connection_date", ColumnKind::Date),
    ];

    fn schema_sample() -> Option<Self> {
        Some(DimMeter {
            meter_key: 0,
            meter_number: String::new(),
            consumer_id: String::new(),
            consumer_type_key: 0,
            location_key: 0,
            consumer_name: String::new(),
            tariff_category: TariffCategory::A1a,
            phase_type: PhaseType::Single,
            meter_type: MeterType::Smart,
            meter_make: String::new(),
            feeder_name: String::new(),
            connected_load_kw: 0.0,
            sanctioned_load_kw: 0.0,
            connection_date: NaiveDate::default(),
            status: MeterStatus::Active,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimDate {
    pub date_key: i32,
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub month_name: String,
    pub day: u32,
    /// 1 = Monday
    pub day_of_week: u32,
    pub day_name: String,
    pub day_of_year: u32,
    pub week_of_year: u32,
    pub is_weekend: bool,
    pub season: String,
}

impl ParquetTable for DimDate {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("date", ColumnKind::Date),
        ("month_name", ColumnKind::Category),
        ("day_name", ColumnKind::Category),
        ("season", ColumnKind::Category),
    ];

    fn schema_sample() -> Option<Self> {
        Some(DimDate {
            date_key: 0,
            date: NaiveDate::default(),
            year: 0,
            quarter: 0,
            month: 0,
            month_name: String::new(),
            day: 0,
            day_of_week: 0,
            day_name: String::new(),
            day_of_year: 0,
            week_of_year: 0,
            is_weekend: false,
            season: String::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimTime {
    pub time_key: i32,
    pub hour: u32,
    pub am_pm: String,
    pub time_of_day: String,
    pub is_peak_hour: bool,
    pub is_off_peak: bool,
}

impl ParquetTable for DimTime {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("am_pm", ColumnKind::Category),
        ("time_of_day", ColumnKind::Category),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimConsumerType {
    pub consumer_type_key: u32,
    pub tariff_category: TariffCategory,
    pub family: TariffFamily,
    pub phase_type: PhaseType,
}

impl ParquetTable for DimConsumerType {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimLocation {
    pub location_key: u32,
    pub circle: String,
    pub division: String,
    pub sub_division: String,
    pub city: String,
}

impl ParquetTable for DimLocation {
    const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("circle", ColumnKind::Category),
        ("city", ColumnKind::Category),
    ];
}

/// Hours 17 to 22 inclusive.
pub fn is_peak_hour(hour: u32) -> bool {
    (17..=22).contains(&hour)
}

pub fn is_off_peak(hour: u32) -> bool {
    hour <= 5
}

fn time_of_day(hour: u32) -> &'static str {
    match hour {
        0..=5 => "Night",
        6..=11 => "Morning",
        12..=17 => "Afternoon",
        18..=21 => "Evening",
        _ => "Night",
    }
}

fn season(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "Winter",
        3..=5 => "Spring",
        6..=8 => "Summer",
        _ => "Fall",
    }
}

/// Meter, consumer type and location dimensions plus the meter key lookup.
#[derive(Debug, Clone, Default)]
pub struct MeterDimensions {
    pub meters: Vec<DimMeter>,
    pub consumer_types: Vec<DimConsumerType>,
    pub locations: Vec<DimLocation>,
    pub meter_keys: KeyAllocator<String>,
}

impl MeterDimensions {
    /// The dim_meter row for `meter_key`.
    pub fn meter(&self, meter_key: u32) -> Option<&DimMeter> {
        self.meters.get(meter_key.checked_sub(1)? as usize)
    }
}

pub fn build_meter_dimensions(meters: &[MeterRecord]) -> MeterDimensions {
    let mut dims = MeterDimensions::default();
    let mut type_keys: KeyAllocator<TariffCategory> = KeyAllocator::default();
    let mut location_keys: KeyAllocator<(String, String, String, String)> = KeyAllocator::default();

    for m in meters {
        let (meter_key, fresh) = dims.meter_keys.assign(m.meter_number.clone());
        if !fresh {
            continue;
        }
        let (consumer_type_key, new_type) = type_keys.assign(m.tariff_category);
        if new_type {
            dims.consumer_types.push(DimConsumerType {
                consumer_type_key,
                tariff_category: m.tariff_category,
                family: m.tariff_category.family(),
                phase_type: m.tariff_category.phase(),
            });
        }
        let place = (m.circle.clone(), m.division.clone(), m.sub_division.clone(), m.city.clone());
        let (location_key, new_place) = location_keys.assign(place);
        if new_place {
            dims.locations.push(DimLocation {
                location_key,
                circle: m.circle.clone(),
                division: m.division.clone(),
                sub_division: m.sub_division.clone(),
                city: m.city.clone(),
            });
        }
        dims.meters.push(DimMeter {
            meter_key,
            meter_number: m.meter_number.clone(),
            consumer_id: m.consumer_id.clone(),
            consumer_type_key,
            location_key,
            consumer_name: m.consumer_name.clone(),
            tariff_category: m.tariff_category,
            phase_type: m.phase_type,
            meter_type: m.meter_type,
            meter_make: m.meter_make.clone(),
            feeder_name: m.feeder_name.clone(),
            connected_load_kw: m.connected_load_kw,
            sanctioned_load_kw: m.sanctioned_load_kw,
            connection_date: m.connection_date,
            status: m.status,
        });
    }
    dims
}

/// One row per day from the first to the last reading date.
pub fn build_dim_date(readings: &[SilverReading]) -> Vec<DimDate> {
    let first = readings.iter().map(|r| r.timestamp.date()).min();
    let last = readings.iter().map(|r| r.timestamp.date()).max();
    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    let mut day = first;
    while day <= last {
        rows.push(DimDate {
            date_key: date_key(day),
            date: day,
            year: day.year(),
            quarter: (day.month() - 1) / 3 + 1,
            month: day.month(),
            month_name: day.format("%B").to_string(),
            day: day.day(),
            day_of_week: day.weekday().number_from_monday(),
            day_name: day.format("%A").to_string(),
            day_of_year: day.ordinal(),
            week_of_year: day.iso_week().week(),
            is_weekend: is_weekend(day),
            season: season(day.month()).to_string(),
        });
        day += Duration::days(1);
    }
    rows
}

pub fn build_dim_time() -> Vec<DimTime> {
    (0..24)
        .map(|hour| DimTime {
            time_key: hour as i32 * 100,
            hour,
            am_pm: if hour < 12 { "AM" } else { "PM" }.to_string(),
            time_of_day: time_of_day(hour).to_string(),
            is_peak_hour: is_peak_hour(hour),
            is_off_peak: is_off_peak(hour),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_buckets() {
        let rows = build_dim_time();
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[17].time_key, 1700);
        assert!(rows[17].is_peak_hour && rows[22].is_peak_hour && !rows[23].is_peak_hour);
        assert!(rows[5].is_off_peak && !rows[6].is_off_peak);
        assert_eq!(rows[12].am_pm, "PM");
        assert_eq!(rows[22].time_of_day, "Night");
        assert_eq!(rows[20].time_of_day, "Evening");
    }

    #[test]
    fn seasons_follow_the_calendar() {
        assert_eq!(season(1), "Winter");
        assert_eq!(season(4), "Spring");
        assert_eq!(season(7), "Summer");
        assert_eq!(season(10), "Fall");
    }
}
