//! Collector loop and the state it shares with the health endpoint

pub mod cache;
pub mod health;
pub mod worker;

pub use cache::{CacheStats, DedupCache};
pub use health::{HealthReport, HealthState};
pub use worker::{Collector, CollectorHandle, CycleError, CycleSummary};
