//! Per-query partition threshold classification

use metrics::counter;

use crate::engine::{Input, Query};
use crate::telemetry::{QUERIED_PARTITIONS, QUERY_PARTITION_COUNTS};

/// Literal token that opts a query out of partition checks
pub const OPT_OUT_MARKER: &str = "sqlbandit:off";

/// Outcome of classifying one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Query text carries the opt-out marker; nothing was evaluated
    OptedOut,
    /// An input used another connector; evaluation stopped at that input
    NotApplicable { input_index: usize, connector_id: String },
    /// Every input was evaluated
    Evaluated {
        offending: Vec<Input>,
        total_partitions: usize,
    },
}

impl Classification {
    /// Inputs over the threshold, empty unless fully evaluated
    pub fn offending(&self) -> &[Input] {
        match self {
            Classification::Evaluated { offending, .. } => offending,
            _ => &[],
        }
    }

    pub fn should_alert(&self) -> bool {
        !self.offending().is_empty()
    }
}

/// Decides which inputs of a query scan more partitions than allowed
pub struct PartitionClassifier {
    connector_filter: String,
    threshold: usize,
}

impl PartitionClassifier {
    pub fn new(connector_filter: impl Into<String>, threshold: usize) -> Self {
        Self {
            connector_filter: connector_filter.into(),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Classify a detail record.
    ///
    /// Inputs are walked in order. The first input whose connector differs
    /// from the filter ends evaluation for the whole query, so later inputs
    /// never emit metrics or alert. Counts are strictly greater-than the
    /// threshold; a truncated partition list counts as at least its length.
    pub fn classify(&self, query: &Query) -> Classification {
        if query.query.contains(OPT_OUT_MARKER) {
            tracing::debug!(query_id = %query.query_id, "Query opted out of partition checks");
            return Classification::OptedOut;
        }

        let mut offending = Vec::new();
        let mut total_partitions = 0;

        for (idx, input) in query.inputs.iter().enumerate() {
            if input.connector_id != self.connector_filter {
                tracing::debug!(
                    query_id = %query.query_id,
                    input_index = idx,
                    connector = %input.connector_id,
                    filter = %self.connector_filter,
                    "Input connector does not match filter, skipping query"
                );
                return Classification::NotApplicable {
                    input_index: idx,
                    connector_id: input.connector_id.clone(),
                };
            }

            let table = input.table_identity();
            for partition in &input.connector_info.partition_ids {
                counter!(
                    QUERIED_PARTITIONS,
                    "table" => table.clone(),
                    "partition" => partition.clone()
                )
                .increment(1);
            }

            let count = input.partition_count();
            if count > self.threshold {
                tracing::warn!(
                    query_id = %query.query_id,
                    input_index = idx,
                    table = %table,
                    partitions = count,
                    truncated = input.connector_info.truncated,
                    "Input scans too many partitions"
                );
                counter!(QUERY_PARTITION_COUNTS, "table" => table.clone()).increment(count as u64);
                total_partitions += count;
                offending.push(input.clone());
            }
        }

        Classification::Evaluated {
            offending,
            total_partitions,
        }
    }
}
