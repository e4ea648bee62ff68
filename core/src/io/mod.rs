pub mod csv;
pub mod parquet;

use std::path::Path;

/// Size on disk, zero when the file does not exist.
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
