//! Query records as reported by the engine's query API

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Execution state of a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Planning,
    Starting,
    Running,
    Finishing,
    Finished,
    Failed,
    /// Any state this client does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

/// Session the query was submitted under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
}

/// A query record.
///
/// The overview listing and the detail endpoint share this shape; the
/// overview omits `inputs`, so it defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub query_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: QueryState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session: Session,
    /// Raw query text
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<Input>,
}

impl Query {
    pub fn is_running(&self) -> bool {
        self.state == QueryState::Running
    }

    pub fn user(&self) -> &str {
        &self.session.user
    }
}

/// One scanned data source within a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub connector_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub schema: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub table: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connector_info: ConnectorInfo,
}

impl Input {
    /// `connector.schema.table`, used as the metric label and in alerts
    pub fn table_identity(&self) -> String {
        format!("{}.{}.{}", self.connector_id, self.schema, self.table)
    }

    /// Number of partitions the engine reported for this input.
    ///
    /// A lower bound when [`ConnectorInfo::truncated`] is set.
    pub fn partition_count(&self) -> usize {
        self.connector_info.partition_ids.len()
    }
}

/// Connector-specific scan details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub partition_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_deserialize() {
        let json = r#"{
            "query": "SELECT * FROM events",
            "queryId": "20240101_000000_00001_abcde",
            "state": "RUNNING",
            "session": {"user": "alice", "source": "cli"},
            "inputs": [{
                "connectorId": "hive",
                "schema": "web",
                "table": "events",
                "connectorInfo": {"partitionIds": ["date=2024-01-01", "date=2024-01-02"], "truncated": false}
            }]
        }"#;

        let query: Query = serde_json::from_str(json).unwrap();
        assert!(query.is_running());
        assert_eq!(query.user(), "alice");
        assert_eq!(query.inputs.len(), 1);
        assert_eq!(query.inputs[0].table_identity(), "hive.web.events");
        assert_eq!(query.inputs[0].partition_count(), 2);
        assert!(!query.inputs[0].connector_info.truncated);
    }

    #[test]
    fn test_overview_without_inputs() {
        let json = r#"[{"queryId": "q1", "state": "QUEUED"}, {"queryId": "q2", "state": "RUNNING"}]"#;

        let queries: Vec<Query> = serde_json::from_str(json).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].state, QueryState::Queued);
        assert!(queries[1].is_running());
        assert!(queries[1].inputs.is_empty());
    }

    #[test]
    fn test_unknown_state() {
        let query: Query =
            serde_json::from_str(r#"{"queryId": "q1", "state": "DISPATCHING"}"#).unwrap();
        assert_eq!(query.state, QueryState::Unknown);
        assert!(!query.is_running());
    }

    #[test]
    fn test_null_fields_default() {
        let json = r#"{
            "queryId": "q1",
            "state": "RUNNING",
            "query": null,
            "session": {"user": null},
            "inputs": [
                {"connectorId": "system", "schema": "runtime", "table": "nodes", "connectorInfo": null},
                {"connectorId": "hive", "schema": null, "table": "t",
                 "connectorInfo": {"partitionIds": null, "truncated": null}}
            ]
        }"#;

        let query: Query = serde_json::from_str(json).unwrap();
        assert!(query.is_running());
        assert_eq!(query.query, "");
        assert_eq!(query.user(), "");
        assert_eq!(query.inputs[0].connector_info, ConnectorInfo::default());
        assert_eq!(query.inputs[1].schema, "");
        assert_eq!(query.inputs[1].partition_count(), 0);
        assert!(!query.inputs[1].connector_info.truncated);

        let query: Query =
            serde_json::from_str(r#"{"queryId": "q2", "state": null, "inputs": null}"#).unwrap();
        assert_eq!(query.state, QueryState::Unknown);
        assert!(query.inputs.is_empty());
    }

    #[test]
    fn test_input_without_connector_info() {
        let input: Input = serde_json::from_str(
            r#"{"connectorId": "system", "schema": "runtime", "table": "nodes"}"#,
        )
        .unwrap();
        assert_eq!(input.partition_count(), 0);
    }
}
