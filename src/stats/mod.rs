//! Statistics and metrics for supervised sources

pub mod metrics;

pub use metrics::{ManagerStats, SourceStats, SourceStatsSnapshot};
