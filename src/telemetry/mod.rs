//! Counter metrics emitted while classifying queries
//!
//! Counters go through the `metrics` facade; the daemon installs a
//! DogStatsD recorder at startup.

pub mod statsd;

pub use statsd::{install_statsd, DogStatsdRecorder, MetricsError};

/// One increment per partition id scanned, labelled `table` and `partition`
pub const QUERIED_PARTITIONS: &str = "presto.watcher.queried_partitions";

/// Incremented by the partition count of each offending input, labelled `table`
pub const QUERY_PARTITION_COUNTS: &str = "presto.watcher.query_partition_counts";

/// Register descriptions for the counters above with the installed recorder
pub fn describe() {
    metrics::describe_counter!(QUERIED_PARTITIONS, "Partitions scanned by running queries");
    metrics::describe_counter!(
        QUERY_PARTITION_COUNTS,
        "Partition counts of query inputs over the threshold"
    );
}
