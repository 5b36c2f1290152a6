//! Outbound delivery of replication activities to remote peers.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use banyan_core::{ActivityEnvelope, Error, Result};

/// Result of one delivery attempt.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Peer acknowledged the activity (2xx).
    Accepted,
    /// Peer refused it (4xx): bad secret or unknown file. Retrying
    /// without operator action will not help.
    Rejected { status: u16, detail: String },
    /// Transport or server failure (timeout, connect error, 5xx):
    /// retryable on the next worker pass.
    Failed(String),
}

/// Transport seam for delivery, so the worker is testable without a
/// network.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Deliver one envelope to a peer's accept endpoint.
    async fn deliver(&self, base_uri: &str, envelope: &ActivityEnvelope) -> DeliveryOutcome;
}

/// Reqwest-backed delivery to `POST {base_uri}/sync/accept`.
pub struct HttpDeliveryClient {
    client: reqwest::Client,
}

impl HttpDeliveryClient {
    /// Build a client with the given per-attempt timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn accept_url(base_uri: &str) -> String {
        format!("{}/sync/accept", base_uri.trim_end_matches('/'))
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, base_uri: &str, envelope: &ActivityEnvelope) -> DeliveryOutcome {
        let url = Self::accept_url(base_uri);
        debug!(
            subsystem = "sync",
            component = "delivery",
            op = "deliver",
            link_guid = %envelope.link_guid,
            url = %url,
            "Delivering replication activity"
        );

        match self.client.post(&url).json(envelope).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    DeliveryOutcome::Accepted
                } else if status.is_client_error() {
                    let detail = response.text().await.unwrap_or_default();
                    DeliveryOutcome::Rejected {
                        status: status.as_u16(),
                        detail,
                    }
                } else {
                    DeliveryOutcome::Failed(format!("peer returned {status}"))
                }
            }
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_url_joins_cleanly() {
        assert_eq!(
            HttpDeliveryClient::accept_url("http://peer.test"),
            "http://peer.test/sync/accept"
        );
        assert_eq!(
            HttpDeliveryClient::accept_url("http://peer.test/"),
            "http://peer.test/sync/accept"
        );
    }
}
