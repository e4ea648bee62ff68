use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "SMARTMETER_DATA_DIR";

/// The four entity tables that flow Bronze → Silver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Meters,
    Readings,
    Bills,
    Payments,
}

impl Entity {
    pub const ALL: [Entity; 4] = [Self::Meters, Self::Readings, Self::Bills, Self::Payments];

    pub fn stem(self) -> &'static str {
        match self {
            Self::Meters => "meters",
            Self::Readings => "readings",
            Self::Bills => "bills",
            Self::Payments => "payments",
        }
    }
}

/// On-disk layout: `<root>/bronze`, `<root>/silver`, `<root>/gold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `SMARTMETER_DATA_DIR` wins over `fallback` when set and non-empty.
    pub fn from_env_or(fallback: impl Into<PathBuf>) -> Self {
        match std::env::var(DATA_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::new(dir),
            _ => Self::new(fallback),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.root.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.root.join("silver")
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.root.join("gold")
    }

    /// Shard part files live here until concatenation.
    pub fn parts_dir(&self) -> PathBuf {
        self.bronze_dir().join("_parts")
    }

    pub fn bronze(&self, entity: Entity) -> PathBuf {
        self.bronze_dir().join(format!("{}.csv", entity.stem()))
    }

    pub fn silver(&self, entity: Entity) -> PathBuf {
        self.silver_dir().join(format!("{}.parquet", entity.stem()))
    }

    pub fn gold(&self, table: &str) -> PathBuf {
        self.gold_dir().join(format!("{table}.parquet"))
    }

    pub fn quality_report(&self) -> PathBuf {
        self.silver_dir().join("quality_report.json")
    }

    pub fn gold_metadata(&self) -> PathBuf {
        self.gold_dir().join("metadata.json")
    }
}
