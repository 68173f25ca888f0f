//! Partition threshold classification and alert delivery

pub mod classifier;
pub mod notifier;

pub use classifier::{Classification, PartitionClassifier, OPT_OUT_MARKER};
pub use notifier::{AlertPayload, AlertSink, NotifierError, ReportingMetadata, WebhookNotifier};
