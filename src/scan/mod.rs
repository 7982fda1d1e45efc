//! Scan scheduling over the configured asset universe

pub mod scheduler;

pub use scheduler::{AssetOutcome, CycleReport, ScanScheduler};
