//! Provider client abstraction for external data sources.
//!
//! Each data source (weather, satellite, parking, ...) is one implementation
//! of [`ProviderClient`]: it lists the provider's reference entries, fetches
//! current data for one entry, and maps observed features into task outputs.
//! The scheduler core is generic over this capability set, so one scheduler
//! implementation serves every backend.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::errors::ProviderError;
use crate::model::{Observation, OutputValue, ReferenceEntry};

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// List all reference entries known to the provider. Used by the
    /// reference cache refresh; the result replaces the cached set wholesale.
    async fn fetch_reference_entries(&self) -> Result<Vec<ReferenceEntry>, ProviderError>;

    /// Fetch the current measurement set for one reference entry.
    async fn fetch_current_data(&self, reference_id: &str)
        -> Result<Observation, ProviderError>;

    /// Map an observation into output values for the requested features.
    ///
    /// The default keeps the intersection of requested and observed features,
    /// in requested-feature order. Providers with derived or renamed features
    /// override this.
    fn map_outputs(
        &self,
        requested_features: &BTreeSet<String>,
        reference_id: &str,
        observation: &Observation,
    ) -> Vec<OutputValue> {
        requested_features
            .iter()
            .filter_map(|feature| {
                observation.features.get(feature).map(|value| OutputValue {
                    feature: feature.clone(),
                    value: value.clone(),
                    reference_id: reference_id.to_string(),
                    measured_at: observation.measured_at,
                })
            })
            .collect()
    }
}

/// HTTP provider client speaking the common reference/observation API:
/// `GET {base}/references` and `GET {base}/references/{id}/current`.
pub struct HttpProviderClient {
    http_client: Arc<reqwest::Client>,
    base_url: String,
    request_timeout: Duration,
}

impl HttpProviderClient {
    pub fn new(http_client: Arc<reqwest::Client>, base_url: Url, request_timeout: Duration) -> Self {
        Self {
            http_client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        url: String,
    ) -> Result<T, ProviderError> {
        let request = self.http_client.get(&url).send();

        let response = match timeout(self.request_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProviderError::HttpRequestFailed(e)),
            Err(_) => {
                return Err(ProviderError::RequestTimeout {
                    timeout_ms: self.request_timeout.as_millis() as u64,
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UnexpectedStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::DecodeFailed {
                operation: operation.to_string(),
                details: e.to_string(),
            })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn fetch_reference_entries(&self) -> Result<Vec<ReferenceEntry>, ProviderError> {
        let url = format!("{}/references", self.base_url);
        let entries: Vec<ReferenceEntry> = self.get_json("fetch_reference_entries", url).await?;
        debug!(count = entries.len(), "Fetched reference entries");
        Ok(entries)
    }

    async fn fetch_current_data(
        &self,
        reference_id: &str,
    ) -> Result<Observation, ProviderError> {
        let url = format!("{}/references/{}/current", self.base_url, reference_id);
        self.get_json("fetch_current_data", url).await
    }
}
