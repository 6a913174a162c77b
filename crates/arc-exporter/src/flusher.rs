//! HTTP delivery to the Arc write endpoint.
//!
//! One [`ArcClient`] per exporter, built once with the configured timeout.
//! The client performs no retries; it classifies each outcome so the
//! hosting retry layer can decide (5xx and network errors retryable, other
//! 4xx terminal). The send is the pipeline's only suspension point, so
//! cancelling a push simply drops the in-flight request.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::TransportError;

const WRITE_PATH: &str = "/api/v1/write/msgpack";

#[derive(Debug, Clone)]
pub struct ArcClient {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl ArcClient {
    pub fn new(config: &Config) -> Self {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.flush_timeout))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build HTTP client: {e}, using reqwest defaults");
                reqwest::Client::new()
            }
        };
        ArcClient {
            client,
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// POSTs one encoded-and-compressed payload, routed to `database`.
    ///
    /// 200 and 204 are success; anything else is a classified
    /// [`TransportError`].
    pub async fn write(&self, database: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let url = format!("{}{}?database={}", self.endpoint, WRITE_PATH, database);
        let payload_size = payload.len();

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/msgpack")
            .header(CONTENT_ENCODING, "gzip")
            .body(payload);
        if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            debug!(
                status = status.as_u16(),
                payload_size, "Successfully wrote payload to Arc"
            );
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "Arc rejected write: {message}");
        Err(TransportError::Status { status, message })
    }
}
