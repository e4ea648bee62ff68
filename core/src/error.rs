use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Invalid configuration: {field}: {reason}")]
    Config { field: &'static str, reason: String },

    #[error("Missing input file: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("Column '{column}' not found in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Malformed input {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Join key mismatch: all {rows} {entity} rows reference meter_numbers absent from the meter table")]
    JoinKeyMismatch { entity: &'static str, rows: usize },

    #[error("Shard {shard} failed: {reason}")]
    Shard { shard: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Arrow conversion error: {0}")]
    SerdeArrow(#[from] serde_arrow::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EtlError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config { field, reason: reason.into() }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
