//! Stage trait and run summaries.
//!
//! RULE: Every batch stage implements Stage.
//! Stages never call each other; they communicate only through the
//! files in the data layout. The pipeline runs them in a fixed order.

use crate::error::EtlResult;
use crate::layout::Layout;
use serde::Serialize;
use std::any::Any;

pub trait Stage: Send {
    /// Stable stage name, used as the log prefix.
    fn name(&self) -> &'static str;

    /// Read this stage's inputs from `layout` and write its outputs there.
    /// Re-running overwrites previous outputs.
    fn run(&mut self, layout: &Layout) -> EtlResult<StageSummary>;

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: usize,
}

/// What a stage produced, printed by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub stage: &'static str,
    pub tables: Vec<TableCount>,
    /// Rows dropped by deduplication, integrity checks or the drop policy.
    pub excluded_rows: usize,
}

impl StageSummary {
    pub fn new(stage: &'static str) -> Self {
        Self { stage, tables: Vec::new(), excluded_rows: 0 }
    }

    pub fn push(&mut self, table: impl Into<String>, rows: usize) {
        self.tables.push(TableCount { table: table.into(), rows });
    }

    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }
}
