//! Meter population synthesis.
//!
//! Population draws come from the `Population` stream and identity text
//! (names, addresses) from the `Identity` stream, so adding a name list
//! entry never shifts the meter attributes.

use crate::config::{CircleConfig, DivisionConfig, GeneratorConfig, TableSet};
use crate::name_generator::NameGenerator;
use crate::records::{MeterRecord, MeterStatus, MeterType, TariffFamily};
use crate::rng::{RngBank, StreamRng, StreamSlot};
use crate::types::round_to;
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;

/// Build every meter in table order: for each division, its initial meters
/// followed by its growth meters.
pub fn build_population(config: &GeneratorConfig, bank: &RngBank) -> Vec<MeterRecord> {
    let tables = &config.tables;
    let mut rng = bank.for_stream(StreamSlot::Population);
    let mut identity = bank.for_stream(StreamSlot::Identity);

    let divisions: Vec<(&CircleConfig, &DivisionConfig)> = tables
        .circles
        .iter()
        .flat_map(|c| c.divisions.iter().map(move |d| (c, d)))
        .collect();

    let span_days = (config.end_date - config.start_date).num_days();
    let history_days = tables.population.connection_history_days.max(0);
    let mut issued = IssuedNumbers::default();
    let mut meters = Vec::new();

    for (i, (circle, division)) in divisions.iter().enumerate() {
        let initial = match config.meter_count {
            Some(total) => total / divisions.len() + usize::from(i < total % divisions.len()),
            None => {
                let drawn = rng.range_inclusive(division.min_meters as i64, division.max_meters as i64);
                ((drawn as f64 * tables.population.population_scale).round() as usize).max(1)
            }
        };
        let growth_pct = rng.uniform(config.growth_min_pct, config.growth_max_pct);
        let growth = (initial as f64 * growth_pct / 100.0).floor() as usize;

        for _ in 0..initial {
            let connected = config.start_date - Duration::days(rng.range_inclusive(0, history_days));
            meters.push(synthesize_meter(&mut rng, &mut identity, tables, circle, division, connected, &mut issued));
        }
        for _ in 0..growth {
            let connected = config.start_date + Duration::days(rng.range_inclusive(0, span_days));
            meters.push(synthesize_meter(&mut rng, &mut identity, tables, circle, division, connected, &mut issued));
        }
        log::debug!(
            "stage=generate division={} initial={initial} growth={growth}",
            division.name
        );
    }
    log::info!("stage=generate population: {} meters across {} divisions", meters.len(), divisions.len());
    meters
}

#[derive(Default)]
struct IssuedNumbers {
    meters: HashSet<u64>,
    consumers: HashSet<u64>,
}

fn unique_draw(rng: &mut StreamRng, taken: &mut HashSet<u64>, lo: i64, hi: i64) -> u64 {
    loop {
        let candidate = rng.range_inclusive(lo, hi) as u64;
        if taken.insert(candidate) {
            return candidate;
        }
    }
}

fn synthesize_meter(
    rng: &mut StreamRng,
    identity: &mut StreamRng,
    tables: &TableSet,
    circle: &CircleConfig,
    division: &DivisionConfig,
    connection_date: NaiveDate,
    issued: &mut IssuedNumbers,
) -> MeterRecord {
    let population = &tables.population;
    let tariff = &tables.tariffs.0[rng.pick_weighted(&tables.tariffs.weights())];
    let connected_load_kw = round_to(rng.uniform(tariff.min_load_kw, tariff.max_load_kw), 2);

    let consumer_id = unique_draw(rng, &mut issued.consumers, 1_000_000, 9_999_999);
    let meter_number = unique_draw(rng, &mut issued.meters, 10_000_000_000, 99_999_999_999);
    let reference_no = format!(
        "11 {:05} {:07} U",
        rng.range_inclusive(10_000, 99_999),
        rng.range_inclusive(1_000_000, 9_999_999)
    );
    let sub_division = format!("{} {}", division.name, rng.choose(&population.sub_division_suffixes));
    let feeder_name = format!(
        "FD{}_{}",
        rng.range_inclusive(1000, 9999),
        sub_division.chars().take(10).collect::<String>()
    );
    let meter_type = if rng.chance(population.smart_meter_share) {
        MeterType::Smart
    } else {
        MeterType::Conventional
    };
    let meter_make = rng.choose(&population.meter_makes).clone();
    let warranty_expiry = if rng.chance(population.warranty_share) {
        Some(connection_date + Duration::days(rng.range_inclusive(0, population.warranty_max_days)))
    } else {
        None
    };
    let latitude = round_to(rng.uniform(population.latitude.0, population.latitude.1), 6);
    let longitude = round_to(rng.uniform(population.longitude.0, population.longitude.1), 6);
    let status = MeterStatus::ALL[rng.pick_weighted(&population.status_weights)];
    let (s_lo, s_hi) = population.sanctioned_factor;
    let sanctioned_load_kw = round_to(connected_load_kw * rng.uniform(s_lo, s_hi), 2);

    let consumer_name = match tariff.code.family() {
        TariffFamily::Residential => NameGenerator::full_name(identity),
        _ => NameGenerator::business_name(identity),
    };
    let address = NameGenerator::address(identity, &sub_division, &circle.city);

    MeterRecord {
        consumer_id: consumer_id.to_string(),
        meter_number: meter_number.to_string(),
        reference_no,
        consumer_name,
        address,
        tariff_category: tariff.code,
        circle: circle.name.clone(),
        division: division.name.clone(),
        sub_division,
        city: circle.city.clone(),
        feeder_name,
        phase_type: tariff.code.phase(),
        meter_type,
        meter_make,
        connected_load_kw,
        sanctioned_load_kw,
        connection_date,
        installation_date: connection_date,
        warranty_expiry,
        latitude,
        longitude,
        status,
    }
}
