//! HTTP client for the coordinator query API
//!
//! The poller only needs one call, `GET /v1/query/{queryId}`, behind the
//! [`SnapshotSource`] trait so tests can script snapshots without a server.

use async_trait::async_trait;

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::types::QuerySnapshot;

/// Anything that can produce the current snapshot of a query.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, query_id: &str) -> Result<QuerySnapshot>;
}

/// Fetches snapshots from a coordinator over HTTP
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config(
                "coordinator.base_url must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/v1/query/{queryId}` with the id percent-encoded
    pub fn query_url(&self, query_id: &str) -> String {
        format!(
            "{}/v1/query/{}",
            self.base_url,
            urlencoding::encode(query_id)
        )
    }
}

#[async_trait]
impl SnapshotSource for CoordinatorClient {
    async fn fetch(&self, query_id: &str) -> Result<QuerySnapshot> {
        let url = self.query_url(query_id);
        tracing::debug!(url = %url, "Fetching query snapshot");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Fetch(format!(
                "coordinator returned {} for {}: {}",
                status,
                query_id,
                body.trim()
            )));
        }

        let bytes = response.bytes().await?;
        let snapshot: QuerySnapshot = serde_json::from_slice(&bytes)?;
        Ok(snapshot)
    }
}
