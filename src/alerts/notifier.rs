//! Alert delivery for queries that scan too many partitions

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::classifier::OPT_OUT_MARKER;
use crate::engine::{Input, Query};

/// Destination for partition alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, query: &Query, offending: &[Input]) -> Result<(), NotifierError>;
}

/// Metadata a reporting tool appends to its queries as a trailing comment,
/// e.g. `-- {"user": "alice", "url": "https://...", "scheduled": true}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportingMetadata {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scheduled: bool,
}

impl ReportingMetadata {
    /// Parse the last non-empty line of `query_text`.
    ///
    /// The line must be a `--` comment holding a JSON object. Anything else
    /// yields `None`.
    pub fn from_query_text(query_text: &str) -> Option<Self> {
        let last_line = query_text.lines().rev().find(|l| !l.trim().is_empty())?;
        let comment = last_line.trim().strip_prefix("--")?;
        serde_json::from_str(comment.trim()).ok()
    }
}

/// Webhook message body (Slack incoming-webhook format)
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub text: String,
    pub username: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub color: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Field {
    fn new(title: &str, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
            short,
        }
    }
}

/// Posts alerts to a Slack-compatible incoming webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
    engine_url: String,
    reporting_user: String,
}

impl WebhookNotifier {
    pub fn new(
        webhook_url: impl Into<String>,
        engine_url: impl Into<String>,
        reporting_user: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Client(e.to_string()))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            engine_url: engine_url.into().trim_end_matches('/').to_string(),
            reporting_user: reporting_user.into(),
        })
    }

    /// Build the message for one query and its offending inputs
    pub fn build_payload(&self, query: &Query, offending: &[Input]) -> AlertPayload {
        let mut attachments = Vec::with_capacity(offending.len() + 1);
        let mut total_partitions = 0;

        for input in offending {
            let count = input.partition_count();
            total_partitions += count;

            let partitions = if input.connector_info.truncated {
                format!("{}+", count)
            } else {
                count.to_string()
            };

            attachments.push(Attachment {
                color: "warning".to_string(),
                fields: vec![
                    Field::new("Schema", input.table_identity(), true),
                    Field::new("Partitions", partitions, true),
                ],
            });
        }

        if query.user() == self.reporting_user {
            match ReportingMetadata::from_query_text(&query.query) {
                Some(meta) => attachments.push(Attachment {
                    color: "439FE0".to_string(),
                    fields: vec![
                        Field::new("Mode Username", meta.user, true),
                        Field::new("Scheduled?", meta.scheduled.to_string(), true),
                        Field::new("URL", meta.url, false),
                    ],
                }),
                None => tracing::debug!(
                    query_id = %query.query_id,
                    "No reporting metadata found in query text"
                ),
            }
        }

        let text = format!(
            ":bomb: :bomb: :bomb:\nQuery <{}/ui/query.html?{}> is searching through more than *{}* partitions total! :sql_bandit:\n\
             Make sure your query has a filter for `date` and not `received_at`!\n\n\n\
             *If you want to disable this alert for your query*, add `-- {}` somewhere in your query.",
            self.engine_url, query.query_id, total_partitions, OPT_OUT_MARKER
        );

        AlertPayload {
            text,
            username: "SQLBandit".to_string(),
            attachments,
        }
    }
}

#[async_trait]
impl AlertSink for WebhookNotifier {
    async fn send_alert(&self, query: &Query, offending: &[Input]) -> Result<(), NotifierError> {
        let payload = self.build_payload(query, offending);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifierError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(query_id = %query.query_id, "Webhook notification sent");
        Ok(())
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Failed to send webhook: {0}")]
    Unreachable(String),

    #[error("Webhook returned status {0}")]
    Rejected(u16),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ConnectorInfo, QueryState, Session};
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn input(table: &str, partitions: usize, truncated: bool) -> Input {
        Input {
            connector_id: "hive".to_string(),
            schema: "web".to_string(),
            table: table.to_string(),
            connector_info: ConnectorInfo {
                partition_ids: (0..partitions).map(|i| i.to_string()).collect(),
                truncated,
            },
        }
    }

    fn query(user: &str, text: &str) -> Query {
        Query {
            query_id: "q1".to_string(),
            state: QueryState::Running,
            session: Session {
                user: user.to_string(),
            },
            query: text.to_string(),
            inputs: vec![],
        }
    }

    fn notifier(url: &str) -> WebhookNotifier {
        WebhookNotifier::new(url, "http://engine:8080/", "mode", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_reporting_metadata_parse() {
        let text = "SELECT *\nFROM events\n-- {\"user\": \"alice\", \"url\": \"https://reports/1\", \"scheduled\": true}\n";
        let meta = ReportingMetadata::from_query_text(text).unwrap();
        assert_eq!(meta.user, "alice");
        assert_eq!(meta.url, "https://reports/1");
        assert!(meta.scheduled);
    }

    #[test]
    fn test_reporting_metadata_malformed() {
        assert!(ReportingMetadata::from_query_text("").is_none());
        assert!(ReportingMetadata::from_query_text("--").is_none());
        assert!(ReportingMetadata::from_query_text("SELECT 1").is_none());
        assert!(ReportingMetadata::from_query_text("SELECT 1\n-- not json").is_none());
        assert!(ReportingMetadata::from_query_text("-- {\"user\": \"é\"").is_none());
    }

    #[test]
    fn test_payload_fields() {
        let notifier = notifier("http://unused");
        let offending = vec![input("events", 31, false), input("clicks", 40, true)];
        let payload = notifier.build_payload(&query("bob", "SELECT 1"), &offending);

        assert_eq!(payload.username, "SQLBandit");
        assert!(payload.text.contains("http://engine:8080/ui/query.html?q1"));
        assert!(payload.text.contains("*71*"));
        assert!(payload.text.contains("sqlbandit:off"));
        assert_eq!(payload.attachments.len(), 2);

        let first = &payload.attachments[0];
        assert_eq!(first.color, "warning");
        assert_eq!(first.fields[0].value, "hive.web.events");
        assert_eq!(first.fields[1].value, "31");
        assert_eq!(payload.attachments[1].fields[1].value, "40+");
    }

    #[test]
    fn test_payload_reporting_attachment() {
        let notifier = notifier("http://unused");
        let text = "SELECT 1\n-- {\"user\": \"alice\", \"url\": \"https://reports/1\", \"scheduled\": false}";

        let payload = notifier.build_payload(&query("mode", text), &[input("events", 31, false)]);
        assert_eq!(payload.attachments.len(), 2);
        let meta = &payload.attachments[1];
        assert_eq!(meta.color, "439FE0");
        assert_eq!(meta.fields[0].value, "alice");
        assert_eq!(meta.fields[1].value, "false");
        assert_eq!(meta.fields[2].value, "https://reports/1");

        // Other users never get the attachment, even with a matching comment
        let payload = notifier.build_payload(&query("bob", text), &[input("events", 31, false)]);
        assert_eq!(payload.attachments.len(), 1);

        // Reporting user without usable metadata still alerts
        let payload =
            notifier.build_payload(&query("mode", "SELECT 1"), &[input("events", 31, false)]);
        assert_eq!(payload.attachments.len(), 1);
    }

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn receive(
        State(received): State<Received>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        received.lock().push(body);
        StatusCode::OK
    }

    async fn spawn_webhook(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let app = if status.is_success() {
            Router::new()
                .route("/hook", post(receive))
                .with_state(received.clone())
        } else {
            Router::new().route("/hook", post(move || async move { status }))
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), received)
    }

    #[tokio::test]
    async fn test_send_alert() {
        let (url, received) = spawn_webhook(StatusCode::OK).await;
        let notifier = notifier(&url);

        notifier
            .send_alert(&query("bob", "SELECT 1"), &[input("events", 31, false)])
            .await
            .unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["username"], "SQLBandit");
        assert_eq!(received[0]["attachments"][0]["fields"][1]["value"], "31");
    }

    #[tokio::test]
    async fn test_send_alert_rejected() {
        let (url, _) = spawn_webhook(StatusCode::FORBIDDEN).await;
        let result = notifier(&url)
            .send_alert(&query("bob", "SELECT 1"), &[input("events", 31, false)])
            .await;
        assert!(matches!(result, Err(NotifierError::Rejected(403))));
    }
}
