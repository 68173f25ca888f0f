//! scanwatch: partition scan watchdog for a distributed SQL engine
//!
//! Polls the engine for running queries, counts the partitions each input
//! scans, and posts one alert per query when an input goes over the
//! configured threshold.
//!
//! # Pipeline
//!
//! - [`engine`]: query records and the REST client that fetches them
//! - [`alerts`]: partition classification and webhook delivery
//! - [`collector`]: the timer-driven cycle, dedup cache and health state
//! - [`telemetry`]: partition counters and the DogStatsD recorder
//! - [`api`]: the liveness endpoint
//!
//! # Example
//!
//! ```no_run
//! use scanwatch::alerts::PartitionClassifier;
//! use scanwatch::engine::Query;
//!
//! let classifier = PartitionClassifier::new("hive", 30);
//! let query: Query = serde_json::from_str(r#"{"queryId": "q1", "state": "RUNNING"}"#).unwrap();
//! let result = classifier.classify(&query);
//! println!("alert: {}", result.should_alert());
//! ```

pub mod alerts;
pub mod api;
pub mod collector;
pub mod config;
pub mod engine;
pub mod telemetry;

// Re-export commonly used types
pub use alerts::{Classification, PartitionClassifier};
pub use collector::{Collector, DedupCache, HealthState};
pub use config::Config;
pub use engine::{EngineClient, Query, QuerySource};
