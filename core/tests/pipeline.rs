//! End-to-end runs through the file layout.

use chrono::NaiveDate;
use smartmeter_core::{
    cleaner::clean,
    config::{CleanerConfig, GeneratorConfig},
    error::EtlError,
    generator::Generator,
    io::parquet::read_parquet_table,
    layout::{Entity, Layout},
    pipeline::{run_stage, Pipeline},
    records::{BillRecord, MeterRecord, PaymentRecord},
    reshaper::{
        dimensions::{DimDate, DimMeter},
        facts::{FactBill, FactPayment, FactReading},
        read_silver, Reshaper,
    },
};

fn config() -> GeneratorConfig {
    let mut config = GeneratorConfig::default_test();
    config.end_date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    config.frequency_minutes = 180;
    config.meter_count = Some(4);
    config.workers = 2;
    config
}

#[test]
fn stages_run_in_fixed_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline =
        Pipeline::build(Layout::new(dir.path()), config(), CleanerConfig::default()).unwrap();
    assert_eq!(pipeline.stage_names(), vec!["generate", "clean", "reshape"]);

    let summaries = pipeline.run_all().unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].rows("meters"), Some(4));
    assert_eq!(summaries[1].rows("readings"), summaries[2].rows("fact_readings"));
    assert_eq!(summaries[2].tables.len(), 13);
    assert!(pipeline.last_quality_report().is_some());

    let layout = pipeline.layout();
    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(layout.gold_metadata()).unwrap()).unwrap();
    assert_eq!(metadata["dimensions"]["dim_time"]["records"], 24);
    assert_eq!(metadata["facts"].as_object().unwrap().len(), 3);
    assert_eq!(metadata["aggregates"].as_object().unwrap().len(), 5);
}

#[test]
fn silver_parquet_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let mut generator = Generator::new(config()).unwrap();
    run_stage(&mut generator, &layout).unwrap();
    let mut cleaner = smartmeter_core::cleaner::Cleaner::new(CleanerConfig::default());
    run_stage(&mut cleaner, &layout).unwrap();

    let expected = clean(generator.generate_in_memory().unwrap(), &CleanerConfig::default()).unwrap().0;
    let restored = read_silver(&layout).unwrap();
    assert_eq!(restored.meters.len(), expected.meters.len());
    assert_eq!(restored.readings.len(), expected.readings.len());
    assert_eq!(restored, expected);
}

#[test]
fn gold_parquet_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline =
        Pipeline::build(Layout::new(dir.path()), config(), CleanerConfig::default()).unwrap();
    pipeline.run_all().unwrap();
    let layout = pipeline.layout();

    let gold = smartmeter_core::reshaper::build_gold(&read_silver(layout).unwrap()).unwrap();
    let facts: Vec<FactReading> = read_parquet_table(&layout.gold("fact_readings")).unwrap();
    let dates: Vec<DimDate> = read_parquet_table(&layout.gold("dim_date")).unwrap();
    assert_eq!(facts, gold.fact_readings);
    assert_eq!(dates, gold.dim_date);
    assert_eq!(dates.len(), 60);
}

#[test]
fn gold_bills_and_payments_follow_silver_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline =
        Pipeline::build(Layout::new(dir.path()), config(), CleanerConfig::default()).unwrap();
    pipeline.run_all().unwrap();
    let layout = pipeline.layout();

    let silver_meters: Vec<MeterRecord> = read_parquet_table(&layout.silver(Entity::Meters)).unwrap();
    let silver_bills: Vec<BillRecord> = read_parquet_table(&layout.silver(Entity::Bills)).unwrap();
    let silver_payments: Vec<PaymentRecord> =
        read_parquet_table(&layout.silver(Entity::Payments)).unwrap();
    let dim_meter: Vec<DimMeter> = read_parquet_table(&layout.gold("dim_meter")).unwrap();
    let fact_bills: Vec<FactBill> = read_parquet_table(&layout.gold("fact_bills")).unwrap();
    let fact_payments: Vec<FactPayment> = read_parquet_table(&layout.gold("fact_payments")).unwrap();

    assert_eq!(dim_meter.len(), silver_meters.len());
    assert_eq!(fact_bills.len(), silver_bills.len());
    assert_eq!(fact_payments.len(), silver_payments.len());
    assert!(!fact_bills.is_empty());
    for (fact, bill) in fact_bills.iter().zip(&silver_bills) {
        assert_eq!(fact.total_amount, bill.total_amount);
        assert_eq!(fact.tariff_applied, bill.tariff_applied);
        let meter = &dim_meter[fact.meter_key as usize - 1];
        assert_eq!(meter.meter_number, bill.meter_number);
        let source = silver_meters.iter().find(|m| m.meter_number == bill.meter_number).unwrap();
        assert_eq!(meter.connection_date, source.connection_date);
    }
    for (fact, payment) in fact_payments.iter().zip(&silver_payments) {
        assert_eq!(fact.payment_status, payment.payment_status);
        assert_eq!(fact.payment_method, payment.payment_method);
        assert_eq!(fact.payment_date_key.is_some(), payment.payment_date.is_some());
    }
}

#[test]
fn short_run_without_bills_still_writes_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::build(
        Layout::new(dir.path()),
        GeneratorConfig::default_test(),
        CleanerConfig::default(),
    )
    .unwrap();
    pipeline.run_all().unwrap();
    let layout = pipeline.layout();

    let bills: Vec<BillRecord> = read_parquet_table(&layout.silver(Entity::Bills)).unwrap();
    let payments: Vec<PaymentRecord> = read_parquet_table(&layout.silver(Entity::Payments)).unwrap();
    assert!(bills.is_empty() && payments.is_empty());
    let fact_bills: Vec<FactBill> = read_parquet_table(&layout.gold("fact_bills")).unwrap();
    assert!(fact_bills.is_empty());
    let facts: Vec<FactReading> = read_parquet_table(&layout.gold("fact_readings")).unwrap();
    assert_eq!(facts.len(), 48);

    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(layout.gold_metadata()).unwrap()).unwrap();
    assert_eq!(metadata["facts"]["fact_bills"]["records"], 0);
    assert_eq!(metadata["facts"]["fact_readings"]["records"], 48);
}

#[test]
fn reshape_without_silver_names_the_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    match run_stage(&mut Reshaper::new(), &layout) {
        Err(EtlError::MissingInput { path }) => assert_eq!(path, layout.silver(Entity::Meters)),
        other => panic!("expected MissingInput, got {other:?}"),
    }
}
