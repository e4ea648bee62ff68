//! Bronze generation: schedule, billing and payment rules.

use chrono::{NaiveDate, Timelike};
use smartmeter_core::{
    config::{FaultTable, GeneratorArgs, GeneratorConfig, Normal, TableSet, TimingBand},
    error::EtlError,
    generator::Generator,
    layout::{Entity, Layout},
    records::{BronzeTables, PaymentStatus},
    stage::Stage,
    types::Money,
};
use std::collections::{HashMap, HashSet};

fn quarter_config(meters: usize, seed: u64) -> GeneratorConfig {
    let mut config = GeneratorConfig::default_test();
    config.end_date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    config.frequency_minutes = 240;
    config.meter_count = Some(meters);
    config.seed = seed;
    config
}

fn quarter_run(meters: usize, seed: u64) -> BronzeTables {
    Generator::new(quarter_config(meters, seed)).unwrap().generate_in_memory().unwrap()
}

#[test]
fn one_meter_two_days_hourly() {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let mut generator = Generator::new(GeneratorConfig::default_test()).unwrap();
    let summary = generator.run(&layout).unwrap();

    assert_eq!(summary.rows("meters"), Some(1));
    assert_eq!(summary.rows("readings"), Some(48));
    assert_eq!(summary.rows("bills"), Some(0));
    assert_eq!(summary.rows("payments"), Some(0));

    let readings = std::fs::read_to_string(layout.bronze(Entity::Readings)).unwrap();
    assert_eq!(readings.lines().count(), 49, "header plus 48 rows");
    let bills = std::fs::read_to_string(layout.bronze(Entity::Bills)).unwrap();
    assert_eq!(bills.lines().count(), 1, "empty table keeps its header");
}

#[test]
fn every_row_references_a_known_meter() {
    let tables = quarter_run(12, 5);
    let known: HashSet<_> = tables.meters.iter().map(|m| m.meter_number.as_str()).collect();
    assert_eq!(known.len(), tables.meters.len(), "meter numbers are unique");
    assert!(tables.readings.iter().all(|r| known.contains(r.meter_number.as_str())));
    assert!(tables.bills.iter().all(|b| known.contains(b.meter_number.as_str())));
    assert!(tables.payments.iter().all(|p| known.contains(p.meter_number.as_str())));
}

#[test]
fn bill_total_is_the_exact_sum_of_components() {
    let tables = quarter_run(15, 11);
    assert!(!tables.bills.is_empty());
    for bill in &tables.bills {
        assert_eq!(bill.total_amount, bill.component_sum(), "{}", bill.bill_id);
        assert_eq!(bill.amount_within_due_date, bill.total_amount);
        assert!(bill.amount_after_due_date >= bill.total_amount);
        assert_eq!(bill.tv_fee, Money::from_rupees(35.0));
        assert!(bill.due_date > bill.issue_date);
    }
}

#[test]
fn one_bill_per_meter_and_complete_month() {
    let tables = quarter_run(6, 3);
    let mut per_meter: HashMap<&str, Vec<&str>> = HashMap::new();
    for bill in &tables.bills {
        per_meter.entry(&bill.meter_number).or_default().push(&bill.billing_month);
    }
    for months in per_meter.values() {
        assert_eq!(months, &vec!["2024-01", "2024-02", "2024-03"]);
    }
    assert_eq!(tables.payments.len(), tables.bills.len());
}

#[test]
fn unpaid_bills_owe_everything() {
    let tables = quarter_run(30, 17);
    let mut saw_unpaid = false;
    for p in &tables.payments {
        match p.payment_status {
            PaymentStatus::Unpaid => {
                saw_unpaid = true;
                assert_eq!(p.outstanding_amount, p.bill_amount);
                assert_eq!(p.paid_amount, Money::ZERO);
                assert!(p.payment_date.is_none() && p.transaction_id.is_none());
            }
            PaymentStatus::Paid | PaymentStatus::Partial => {
                let expected = (p.bill_amount - p.paid_amount).max(Money::ZERO);
                assert_eq!(p.outstanding_amount, expected);
                assert!(p.payment_date.is_some());
            }
        }
    }
    assert!(saw_unpaid, "90 bills at 15% unpaid should include an unpaid one");
}

#[test]
fn late_surcharge_follows_previous_payment() {
    let tables = quarter_run(30, 23);
    let payments: HashMap<&str, _> = tables.payments.iter().map(|p| (p.bill_id.as_str(), p)).collect();
    let mut previous: HashMap<&str, bool> = HashMap::new();

    for bill in &tables.bills {
        let overdue_before = previous.get(bill.meter_number.as_str()).copied().unwrap_or(false);
        if overdue_before {
            assert!(bill.late_payment_surcharge > Money::ZERO, "{} should carry a surcharge", bill.bill_id);
        } else {
            assert_eq!(bill.late_payment_surcharge, Money::ZERO, "{}", bill.bill_id);
        }
        let payment = payments[bill.bill_id.as_str()];
        previous.insert(bill.meter_number.as_str(), payment.was_overdue());
    }
}

#[test]
fn transaction_ids_match_payment_channel() {
    let tables = quarter_run(30, 29);
    for p in tables.payments.iter().filter(|p| p.payment_status != PaymentStatus::Unpaid) {
        let method = p.payment_method.as_deref().unwrap();
        let id = p.transaction_id.as_deref().unwrap();
        let prefix = match method {
            "EasyPaisa" | "JazzCash" | "1Bill" => "EP",
            m if m.starts_with("Bank") || m == "Online Banking" => "BNK",
            _ => "CSH",
        };
        assert!(id.starts_with(prefix), "{method} paid with {id}");
    }
}

#[test]
fn late_payers_overpay_and_owe_nothing() {
    let mut config = quarter_config(10, 31);
    let rules = &mut config.tables.payments;
    rules.paid_probability = 1.0;
    rules.partial_probability = 0.0;
    rules.timing_bands = vec![TimingBand { probability: 1.0, offset_days: (8, 30), premium_max: 1.1 }];
    let tables = Generator::new(config).unwrap().generate_in_memory().unwrap();

    assert!(!tables.payments.is_empty());
    assert_eq!(tables.payments.len(), tables.bills.len());
    for p in &tables.payments {
        assert_eq!(p.payment_status, PaymentStatus::Paid);
        assert!(p.payment_date.unwrap() > p.due_date);
        assert!(p.paid_amount >= p.bill_amount, "{}", p.payment_id);
        assert_eq!(p.outstanding_amount, Money::ZERO, "{}", p.payment_id);
    }
}

#[test]
fn peak_windows_and_afternoon_heat_follow_the_hour() {
    let mut config = GeneratorConfig::default_test();
    config.tables.faults = FaultTable::none();
    let consumption = &mut config.tables.consumption;
    for profile in &mut consumption.profiles {
        profile.base_kwh = (0.1, 0.1);
        profile.peak_kwh = (0.9, 0.9);
    }
    consumption.seasonal = [1.0; 12];
    consumption.weekend_multiplier = 1.0;
    consumption.variation = (1.0, 1.0);
    consumption.temperature = Normal { mean: 30.0, sd: 0.0 };
    let tables = Generator::new(config).unwrap().generate_in_memory().unwrap();

    assert_eq!(tables.readings.len(), 48);
    for r in &tables.readings {
        let hour = r.timestamp.hour();
        let expected_kwh = if matches!(hour, 6..=10 | 18..=23) { 3.6 } else { 0.4 };
        let energy = r.energy_consumed_kwh.unwrap();
        assert!((energy - expected_kwh).abs() < 1e-9, "hour {hour}: {energy}");
        let expected_c = if hour > 12 { 45.0 } else { 30.0 };
        assert_eq!(r.temperature_c, Some(expected_c), "hour {hour}");
    }
    let at = |hour: u32| tables.readings.iter().find(|r| r.timestamp.hour() == hour).unwrap();
    assert_eq!(at(12).temperature_c, Some(30.0));
    assert_eq!(at(13).temperature_c, Some(45.0));
    assert_eq!(at(23).temperature_c, Some(45.0));
}

#[test]
fn invalid_configuration_names_the_field() {
    let check = |args: GeneratorArgs, field: &str| match GeneratorConfig::from_args(&args, TableSet::default()) {
        Err(EtlError::Config { field: f, .. }) => assert_eq!(f, field),
        other => panic!("expected config error on {field}, got {other:?}"),
    };
    check(GeneratorArgs { end_date: "2023-12-31".into(), ..GeneratorArgs::default() }, "end_date");
    check(GeneratorArgs { start_date: "01/02/2024".into(), ..GeneratorArgs::default() }, "start_date");
    check(GeneratorArgs { frequency_minutes: 0, ..GeneratorArgs::default() }, "frequency");
    check(GeneratorArgs { meter_count: Some(0), ..GeneratorArgs::default() }, "meters");
    check(GeneratorArgs { workers: 0, ..GeneratorArgs::default() }, "workers");
    check(GeneratorArgs { growth_min_pct: 2.0, growth_max_pct: 1.0, ..GeneratorArgs::default() }, "growth_max");
}

#[test]
fn invalid_configuration_writes_nothing() {
    let mut config = GeneratorConfig::default_test();
    config.workers = 0;
    assert!(Generator::new(config).is_err());
}
