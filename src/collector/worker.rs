//! Background collector: poll, classify, dedupe, alert

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::cache::DedupCache;
use super::health::HealthState;
use crate::alerts::{AlertSink, PartitionClassifier};
use crate::engine::{EngineError, QuerySource};

/// Polls the engine and alerts on queries over the partition threshold
pub struct Collector {
    source: Arc<dyn QuerySource>,
    classifier: PartitionClassifier,
    alerts: Arc<dyn AlertSink>,
    cache: DedupCache,
    health: Arc<HealthState>,
}

/// Counts from one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Running queries in the overview
    pub running: usize,
    /// Skipped because they were already in the cache
    pub cached: usize,
    /// Fetched in detail and classified
    pub evaluated: usize,
    pub alerted: usize,
}

impl Collector {
    pub fn new(
        source: Arc<dyn QuerySource>,
        classifier: PartitionClassifier,
        alerts: Arc<dyn AlertSink>,
        cache: DedupCache,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            source,
            classifier,
            alerts,
            cache,
            health,
        }
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    /// Run one poll cycle.
    ///
    /// The first engine error aborts the cycle, leaving the remaining
    /// queries for the next tick. Health is only refreshed when every
    /// running query was handled.
    pub async fn run_cycle(&self) -> Result<CycleSummary, CycleError> {
        let queries = self
            .source
            .list_running_queries()
            .await
            .map_err(CycleError::Overview)?;

        let mut summary = CycleSummary::default();

        for query in queries.iter().filter(|q| q.is_running()) {
            summary.running += 1;
            let query_id = &query.query_id;

            if let Some(first_seen) = self.cache.get_if_present(query_id) {
                tracing::debug!(
                    query_id = %query_id,
                    first_seen = %first_seen,
                    "Query already checked, ignoring"
                );
                summary.cached += 1;
                continue;
            }

            tracing::debug!(query_id = %query_id, "Checking new running query");
            let detail = self
                .source
                .get_query_detail(query_id)
                .await
                .map_err(|source| CycleError::Detail {
                    query_id: query_id.clone(),
                    source,
                })?;

            let classification = self.classifier.classify(&detail);
            summary.evaluated += 1;

            if classification.should_alert() {
                summary.alerted += 1;
                if let Err(e) = self
                    .alerts
                    .send_alert(&detail, classification.offending())
                    .await
                {
                    tracing::error!(query_id = %query_id, error = %e, "Failed to send alert");
                }
            }

            // Written even when delivery failed so a broken sink cannot cause repeats
            self.cache.set(query_id, chrono::Utc::now());
        }

        self.health.mark_success();

        let stats = self.cache.stats();
        tracing::debug!(
            running = summary.running,
            cached = summary.cached,
            evaluated = summary.evaluated,
            alerted = summary.alerted,
            cache_entries = stats.entry_count,
            cache_hit_rate = stats.hit_rate,
            "Collection cycle complete"
        );

        Ok(summary)
    }

    /// Start the collector on its own task.
    ///
    /// The first cycle runs immediately. Cycles never overlap: a slow cycle
    /// delays the next tick instead of bursting.
    pub fn start(self: Arc<Self>, every: Duration) -> CollectorHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            tracing::info!("Collector started with interval {:?}", every);

            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_cycle().await {
                            tracing::error!(
                                error = %e,
                                "Collection cycle failed, retrying in {:?}",
                                every
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Collector shutting down");
                        break;
                    }
                }
            }
        });

        CollectorHandle {
            handle,
            shutdown_tx,
        }
    }
}

/// Handle to a running collector task
pub struct CollectorHandle {
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl CollectorHandle {
    /// Signal the collector and wait for its in-flight cycle to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Collector task ended abnormally");
        }
    }
}

/// Collection cycle errors
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Failed to list running queries: {0}")]
    Overview(#[source] EngineError),

    #[error("Failed to fetch query {query_id}: {source}")]
    Detail {
        query_id: String,
        #[source]
        source: EngineError,
    },
}
