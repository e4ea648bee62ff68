//! Smart-meter synthetic data generator and Bronze → Silver → Gold ETL.

pub mod cleaner;
pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod io;
pub mod layout;
pub mod name_generator;
pub mod pipeline;
pub mod records;
pub mod reshaper;
pub mod rng;
pub mod stage;
pub mod types;
