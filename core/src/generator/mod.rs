//! Bronze generator: meters, readings, bills and payments as CSV.

pub mod billing;
pub mod payments;
pub mod population;
pub mod readings;
pub mod shard;
pub mod timeline;

use crate::config::GeneratorConfig;
use crate::error::{EtlError, EtlResult};
use crate::io::csv::write_csv_table;
use crate::layout::{Entity, Layout};
use crate::records::{BillRecord, BronzeTables, PaymentRecord, ReadingRecord};
use crate::rng::RngBank;
use crate::stage::{Stage, StageSummary};
use population::build_population;
use rayon::prelude::*;
use shard::{merge_parts, plan_shards, run_shard, ShardOutput};
use std::any::Any;
use timeline::{simulate_meter, MemorySink, MeterContext};

pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Rejects an invalid configuration before anything is written.
    pub fn new(config: GeneratorConfig) -> EtlResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every table in memory on the calling thread.
    /// Produces the same rows, in the same order, as the sharded file run.
    pub fn generate_in_memory(&self) -> EtlResult<BronzeTables> {
        let meters = build_population(&self.config, &RngBank::new(self.config.seed));
        let ctx = MeterContext::new(&self.config);
        let mut sink = MemorySink::default();
        for (index, meter) in meters.iter().enumerate() {
            simulate_meter(index, meter, &ctx, &mut sink)?;
        }
        Ok(BronzeTables {
            meters,
            readings: sink.readings,
            bills: sink.bills,
            payments: sink.payments,
        })
    }
}

impl Stage for Generator {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn run(&mut self, layout: &Layout) -> EtlResult<StageSummary> {
        let config = &self.config;
        log::info!(
            "stage=generate range={}..={} frequency={}min workers={} seed={}",
            config.start_date,
            config.end_date,
            config.frequency_minutes,
            config.workers,
            config.seed
        );
        std::fs::create_dir_all(layout.bronze_dir())?;
        let parts_dir = layout.parts_dir();
        if parts_dir.exists() {
            std::fs::remove_dir_all(&parts_dir)?;
        }
        std::fs::create_dir_all(&parts_dir)?;

        let meters = build_population(config, &RngBank::new(config.seed));
        write_csv_table(&layout.bronze(Entity::Meters), &meters)?;

        let ctx = MeterContext::new(config);
        let shards = plan_shards(meters.len(), config.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| EtlError::Other(anyhow::anyhow!("cannot start worker pool: {e}")))?;
        let results: Vec<EtlResult<ShardOutput>> = pool.install(|| {
            shards
                .par_iter()
                .enumerate()
                .map(|(index, range)| run_shard(index, range.clone(), &meters, &ctx, &parts_dir))
                .collect()
        });

        // Stop at the first failed shard; the other shards' parts stay on disk.
        let mut outputs = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    log::error!("stage=generate {e}");
                    return Err(e);
                }
            }
        }

        let reading_parts: Vec<_> = outputs.iter().map(|o| o.reading_part.clone()).collect();
        let bill_parts: Vec<_> = outputs.iter().map(|o| o.bill_part.clone()).collect();
        let payment_parts: Vec<_> = outputs.iter().map(|o| o.payment_part.clone()).collect();
        merge_parts::<ReadingRecord>(&reading_parts, &layout.bronze(Entity::Readings))?;
        merge_parts::<BillRecord>(&bill_parts, &layout.bronze(Entity::Bills))?;
        merge_parts::<PaymentRecord>(&payment_parts, &layout.bronze(Entity::Payments))?;
        std::fs::remove_dir_all(&parts_dir)?;

        let mut summary = StageSummary::new(self.name());
        summary.push(Entity::Meters.stem(), meters.len());
        summary.push(Entity::Readings.stem(), outputs.iter().map(|o| o.readings).sum());
        summary.push(Entity::Bills.stem(), outputs.iter().map(|o| o.bills).sum());
        summary.push(Entity::Payments.stem(), outputs.iter().map(|o| o.payments).sum());
        log::info!("stage=generate wrote {:?}", summary.tables);
        Ok(summary)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
