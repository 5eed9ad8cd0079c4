//! Callback sink abstraction for delivering finished-task results.
//!
//! Delivery is fire-and-forget from the scheduler's point of view: a failed
//! delivery is logged by the caller and never retried within the tick.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::DeliveryError;
use crate::model::ResultDelivery;

/// Only 200 and 204 count as an accepted delivery; redirects and other 2xx
/// responses indicate a misconfigured callback target.
pub fn is_delivery_success_status(status: u16) -> bool {
    status == 200 || status == 204
}

#[async_trait]
pub trait CallbackSink: Send + Sync {
    /// Deliver one result to its callback target.
    async fn deliver(&self, delivery: &ResultDelivery) -> Result<(), DeliveryError>;
}

/// HTTP callback sink posting the result as JSON to the task's callback
/// target.
pub struct HttpCallbackSink {
    http_client: Arc<reqwest::Client>,
    request_timeout: Duration,
}

impl HttpCallbackSink {
    pub fn new(http_client: Arc<reqwest::Client>, request_timeout: Duration) -> Self {
        Self {
            http_client,
            request_timeout,
        }
    }
}

#[async_trait]
impl CallbackSink for HttpCallbackSink {
    async fn deliver(&self, delivery: &ResultDelivery) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(delivery)
            .map_err(|source| DeliveryError::SerializationFailed { source })?;

        let request = self
            .http_client
            .post(&delivery.callback_target)
            .header("Content-Type", "application/json")
            .body(body)
            .send();

        let response = match timeout(self.request_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(DeliveryError::HttpRequestFailed(e)),
            Err(_) => {
                return Err(DeliveryError::RequestTimeout {
                    timeout_ms: self.request_timeout.as_millis() as u64,
                });
            }
        };

        let status = response.status().as_u16();
        if !is_delivery_success_status(status) {
            return Err(DeliveryError::Rejected { status });
        }

        debug!(
            delivery_id = %delivery.delivery_id,
            task_id = %delivery.task_id,
            status,
            "Delivered task result"
        );
        Ok(())
    }
}
