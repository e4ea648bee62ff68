//! The batch pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. generate  Bronze CSV
//!   2. clean     Silver Parquet + quality_report.json
//!   3. reshape   Gold Parquet + metadata.json
//!
//! RULES:
//!   - Stages share nothing but files under the data layout.
//!   - A stage that fails stops the run; earlier outputs stay on disk.

use crate::cleaner::Cleaner;
use crate::config::{CleanerConfig, GeneratorConfig};
use crate::error::EtlResult;
use crate::generator::Generator;
use crate::layout::Layout;
use crate::reshaper::Reshaper;
use crate::stage::{Stage, StageSummary};

pub struct Pipeline {
    layout: Layout,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(layout: Layout) -> Self {
        Self { layout, stages: Vec::new() }
    }

    /// All three stages, in order.
    pub fn build(layout: Layout, generator: GeneratorConfig, cleaner: CleanerConfig) -> EtlResult<Self> {
        let mut pipeline = Pipeline::new(layout);
        pipeline.register(Box::new(Generator::new(generator)?));
        pipeline.register(Box::new(Cleaner::new(cleaner)));
        pipeline.register(Box::new(Reshaper::new()));
        Ok(pipeline)
    }

    /// Register a stage. Call in execution order.
    pub fn register(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every registered stage, stopping at the first error.
    pub fn run_all(&mut self) -> EtlResult<Vec<StageSummary>> {
        let mut summaries = Vec::with_capacity(self.stages.len());
        for stage in &mut self.stages {
            log::info!("pipeline: starting stage={}", stage.name());
            let summary = stage.run(&self.layout).map_err(|e| {
                log::error!("stage={} failed: {e}", stage.name());
                e
            })?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Query the cleaner's report from the last run.
    /// Used by etl-runner to print end-of-run summaries.
    pub fn last_quality_report(&self) -> Option<&crate::cleaner::report::QualityReport> {
        self.stages
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<Cleaner>())
            .and_then(|c| c.last_report())
    }
}

/// Run one stage against `layout`, logging failures the same way `run_all` does.
pub fn run_stage(stage: &mut dyn Stage, layout: &Layout) -> EtlResult<StageSummary> {
    log::info!("pipeline: starting stage={}", stage.name());
    stage.run(layout).map_err(|e| {
        log::error!("stage={} failed: {e}", stage.name());
        e
    })
}
