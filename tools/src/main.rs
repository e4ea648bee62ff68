//! etl-runner: batch runner for the smart-meter generator and ETL.
//!
//! Usage:
//!   etl-runner generate --start-date 2024-01-01 --end-date 2024-03-31 --meters 50 --workers 4
//!   etl-runner clean --missing-policy carry-forward
//!   etl-runner reshape
//!   etl-runner all --seed 7 --data-dir ./data
//!   etl-runner all --interactive

use anyhow::{bail, Context, Result};
use smartmeter_core::{
    cleaner::{report::QualityReport, Cleaner},
    config::{CleanerConfig, GeneratorArgs, GeneratorConfig, MissingPolicy, TableSet},
    generator::Generator,
    layout::Layout,
    pipeline::{run_stage, Pipeline},
    reshaper::Reshaper,
    stage::StageSummary,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

const USAGE: &str = "usage: etl-runner <generate|clean|reshape|all> [--start-date YYYY-MM-DD] \
[--end-date YYYY-MM-DD] [--frequency MIN] [--growth-min PCT] [--growth-max PCT] [--meters N] \
[--workers N] [--seed N] [--tables FILE] [--missing-policy interpolate|carry-forward|drop] \
[--data-dir DIR] [--interactive]";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1).filter(|a| !a.starts_with("--")).cloned() else {
        bail!("{USAGE}");
    };
    if !matches!(command.as_str(), "generate" | "clean" | "reshape" | "all") {
        bail!("unknown command '{command}'\n{USAGE}");
    }
    let interactive = args.iter().any(|a| a == "--interactive");

    let layout = match flag_value(&args, "--data-dir") {
        Some(dir) => Layout::new(dir),
        None => Layout::from_env_or("./data"),
    };
    let tables = match flag_value(&args, "--tables") {
        Some(path) => TableSet::load(Path::new(path))?,
        None => TableSet::default(),
    };

    let mut gen_args = generator_args(&args)?;
    let mut policy = match flag_value(&args, "--missing-policy") {
        Some(text) => MissingPolicy::parse(text)?,
        None => MissingPolicy::default(),
    };
    if interactive {
        prompt_all(&command, &mut gen_args, &mut policy)?;
    }

    let cleaner_config = CleanerConfig {
        missing_policy: policy,
        consumption: tables.consumption.clone(),
        ..CleanerConfig::default()
    };

    println!("etl-runner {command}");
    println!("  data_dir:  {}", layout.root().display());

    let summaries = match command.as_str() {
        "generate" => {
            let config = GeneratorConfig::from_args(&gen_args, tables)?;
            print_generator(&config);
            vec![run_stage(&mut Generator::new(config)?, &layout)?]
        }
        "clean" => {
            println!("  policy:    {policy:?}");
            let mut cleaner = Cleaner::new(cleaner_config);
            let summary = run_stage(&mut cleaner, &layout)?;
            if let Some(report) = cleaner.last_report() {
                print_quality(report);
            }
            vec![summary]
        }
        "reshape" => vec![run_stage(&mut Reshaper::new(), &layout)?],
        _ => {
            let config = GeneratorConfig::from_args(&gen_args, tables)?;
            print_generator(&config);
            println!("  policy:    {policy:?}");
            let mut pipeline = Pipeline::build(layout, config, cleaner_config)?;
            let summaries = pipeline.run_all()?;
            if let Some(report) = pipeline.last_quality_report() {
                print_quality(report);
            }
            summaries
        }
    };

    println!();
    for summary in &summaries {
        print_summary(summary);
    }
    Ok(())
}

fn generator_args(args: &[String]) -> Result<GeneratorArgs> {
    let defaults = GeneratorArgs::default();
    Ok(GeneratorArgs {
        start_date: flag_value(args, "--start-date").map(str::to_string).unwrap_or(defaults.start_date),
        end_date: flag_value(args, "--end-date").map(str::to_string).unwrap_or(defaults.end_date),
        frequency_minutes: parse_arg(args, "--frequency", defaults.frequency_minutes)?,
        growth_min_pct: parse_arg(args, "--growth-min", defaults.growth_min_pct)?,
        growth_max_pct: parse_arg(args, "--growth-max", defaults.growth_max_pct)?,
        meter_count: match flag_value(args, "--meters") {
            Some(text) => Some(text.parse().with_context(|| format!("--meters: '{text}' is not a number"))?),
            None => defaults.meter_count,
        },
        workers: parse_arg(args, "--workers", defaults.workers)?,
        seed: parse_arg(args, "--seed", defaults.seed)?,
    })
}

/// Ask for every run parameter on stdin. An empty answer keeps the value in brackets.
fn prompt_all(command: &str, params: &mut GeneratorArgs, policy: &mut MissingPolicy) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    if matches!(command, "generate" | "all") {
        params.start_date = prompt(&mut input, "Start date", &params.start_date)?;
        params.end_date = prompt(&mut input, "End date", &params.end_date)?;
        params.frequency_minutes = prompt_parsed(&mut input, "Reading frequency (minutes)", params.frequency_minutes)?;
        params.growth_min_pct = prompt_parsed(&mut input, "Minimum growth rate (%)", params.growth_min_pct)?;
        params.growth_max_pct = prompt_parsed(&mut input, "Maximum growth rate (%)", params.growth_max_pct)?;
        let meters = params.meter_count.map(|n| n.to_string()).unwrap_or_else(|| "per division".into());
        let answer = prompt(&mut input, "Meter count", &meters)?;
        if answer != meters {
            params.meter_count = Some(answer.parse().with_context(|| format!("'{answer}' is not a number"))?);
        }
        params.workers = prompt_parsed(&mut input, "Workers", params.workers)?;
        params.seed = prompt_parsed(&mut input, "Seed", params.seed)?;
    }
    if matches!(command, "clean" | "all") {
        let current = policy_name(*policy);
        let answer = prompt(&mut input, "Missing-value policy (interpolate/carry-forward/drop)", current)?;
        *policy = MissingPolicy::parse(&answer)?;
    }
    Ok(())
}

fn prompt(input: &mut impl BufRead, label: &str, default: &str) -> Result<String> {
    print!("{label} [{default}]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

fn prompt_parsed<T>(input: &mut impl BufRead, label: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + std::fmt::Display,
{
    let answer = prompt(input, label, &default.to_string())?;
    answer.parse().map_err(|_| anyhow::anyhow!("{label}: '{answer}' is not valid"))
}

fn policy_name(policy: MissingPolicy) -> &'static str {
    match policy {
        MissingPolicy::Interpolate => "interpolate",
        MissingPolicy::CarryForward => "carry-forward",
        MissingPolicy::Drop => "drop",
    }
}

fn print_generator(config: &GeneratorConfig) {
    println!("  range:     {} ..= {}", config.start_date, config.end_date);
    println!("  frequency: {} min", config.frequency_minutes);
    println!("  growth:    {}% - {}%", config.growth_min_pct, config.growth_max_pct);
    match config.meter_count {
        Some(n) => println!("  meters:    {n}"),
        None => println!("  meters:    per division table"),
    }
    println!("  workers:   {}", config.workers);
    println!("  seed:      {}", config.seed);
}

fn print_quality(report: &QualityReport) {
    println!();
    println!("=== QUALITY ===");
    for (table, q) in &report.tables {
        println!(
            "  {table:<10} bronze={} duplicates={} excluded={} silver={}",
            q.bronze_rows, q.duplicates_removed, q.integrity_excluded, q.silver_rows
        );
    }
    println!(
        "  readings   imputed={} corrected={} dropped={} anomaly_share={:.2}%",
        report.readings.imputed,
        report.readings.corrected,
        report.readings.dropped_missing,
        report.anomaly_share_pct
    );
    if let Some(storage) = &report.storage {
        println!(
            "  storage    bronze={}B silver={}B reduction={:.1}%",
            storage.bronze_bytes, storage.silver_bytes, storage.reduction_pct
        );
    }
}

fn print_summary(summary: &StageSummary) {
    println!("=== {} ===", summary.stage.to_uppercase());
    for t in &summary.tables {
        println!("  {:<28} {:>10}", t.table, t.rows);
    }
    if summary.excluded_rows > 0 {
        println!("  {:<28} {:>10}", "excluded rows", summary.excluded_rows);
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> Result<T> {
    match flag_value(args, flag) {
        Some(text) => text.parse().map_err(|_| anyhow::anyhow!("{flag}: '{text}' is not valid")),
        None => Ok(default),
    }
}
