//! HTTP client for the engine's query listing and query detail endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::model::Query;

/// Source of query records
///
/// Calls are never retried here; the collector decides what to do on error.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Lightweight overview of running queries. Inputs are usually absent.
    async fn list_running_queries(&self) -> Result<Vec<Query>, EngineError>;

    /// Full record for one query, including inputs
    async fn get_query_detail(&self, query_id: &str) -> Result<Query, EngineError>;
}

/// Client for the engine's REST query API
#[derive(Debug, Clone)]
pub struct EngineClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/v1/query/{id}` with the id percent-encoded as one path segment
    fn detail_url(&self, query_id: &str) -> Result<reqwest::Url, EngineError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| EngineError::Client(format!("invalid engine URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| EngineError::Client(format!("engine URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "query", query_id]);
        Ok(url)
    }

    async fn fetch<U: reqwest::IntoUrl>(&self, url: U) -> Result<reqwest::Response, EngineError> {
        self.http_client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))
    }
}

#[async_trait]
impl QuerySource for EngineClient {
    async fn list_running_queries(&self) -> Result<Vec<Query>, EngineError> {
        let url = format!("{}/v1/query?state=running", self.base_url);
        let response = self.fetch(&url).await?;

        if !response.status().is_success() {
            return Err(EngineError::Status(response.status().as_u16()));
        }

        let queries: Vec<Query> = response
            .json()
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))?;

        tracing::debug!(count = queries.len(), "Received query overview from engine");
        Ok(queries)
    }

    async fn get_query_detail(&self, query_id: &str) -> Result<Query, EngineError> {
        let url = self.detail_url(query_id)?;
        let response = self.fetch(url).await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(EngineError::NotFound(query_id.to_string()));
            }
            status if !status.is_success() => {
                return Err(EngineError::Status(status.as_u16()));
            }
            _ => {}
        }

        let query: Query = response
            .json()
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))?;

        tracing::debug!(query_id = %query_id, inputs = query.inputs.len(), "Received query detail from engine");
        Ok(query)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine unreachable: {0}")]
    Unreachable(String),

    #[error("Engine returned status {0}")]
    Status(u16),

    #[error("Malformed engine response: {0}")]
    Malformed(String),

    #[error("Query not found: {0}")]
    NotFound(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}
