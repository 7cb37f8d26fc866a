//! Gateway HTTP client

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::access::{AccessService, CredentialRequest, CredentialResponse, VerifyResponse};
use crate::error::{PlayerError, Result};
use crate::playlist::{PlaylistResponse, PlaylistSource, Track};
use crate::session::{CREDENTIAL_PARAM, PRODUCT_PARAM};

/// Client for the gateway's credential and playlist endpoints
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl GatewayClient {
    /// `base_url` must be absolute, e.g. `https://ar.example.com`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait(?Send)]
impl AccessService for GatewayClient {
    async fn verify(&self, credential: &str, product_id: &str) -> Result<bool> {
        let response = self
            .http
            .get(self.url("/credential/verify"))
            .query(&[(CREDENTIAL_PARAM, credential), (PRODUCT_PARAM, product_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Verify endpoint returned an error status");
            return Ok(false);
        }

        let body: VerifyResponse = response.json().await?;
        Ok(body.ok)
    }

    async fn issue(&self, email: &str, product_id: &str) -> Result<Option<String>> {
        let request = CredentialRequest {
            email: email.to_string(),
            product_id: Some(product_id.to_string()),
        };
        let response = self
            .http
            .post(self.url("/credential"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(PlayerError::Network(format!(
                "Credential service returned {}",
                status
            )));
        }

        let body: CredentialResponse = response.json().await?;
        debug!(ok = body.ok, "Credential response");
        Ok(if body.ok { body.credential } else { None })
    }
}

#[async_trait(?Send)]
impl PlaylistSource for GatewayClient {
    async fn fetch(&self, product_id: &str) -> Result<Vec<Track>> {
        let response = self
            .http
            .get(self.url("/playlist"))
            .query(&[(PRODUCT_PARAM, product_id)])
            .send()
            .await?
            .error_for_status()?;

        let body: PlaylistResponse = response.json().await?;
        Ok(body.tracks)
    }
}

/// Telemetry over a detached POST
///
/// Needs a running tokio runtime; outside one the event is dropped.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Default)]
pub struct HttpBeacon {
    http: reqwest::Client,
}

#[cfg(not(target_arch = "wasm32"))]
impl HttpBeacon {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl crate::telemetry::BeaconSink for HttpBeacon {
    fn send(&self, endpoint: &str, body: &str) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let request = self
            .http
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());

        runtime.spawn(async move {
            if let Err(e) = request.send().await {
                debug!(error = %e, "Telemetry POST failed");
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::BeaconSink;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GatewayClient::new("https://ar.example.com/");
        assert_eq!(client.base_url(), "https://ar.example.com");
        assert_eq!(client.url("/playlist"), "https://ar.example.com/playlist");
    }

    #[test]
    fn test_beacon_without_runtime_is_not_queued() {
        let beacon = HttpBeacon::new();
        assert!(!beacon.send("http://127.0.0.1:9/analytics", "{}"));
    }

    #[tokio::test]
    async fn test_beacon_inside_runtime_is_detached() {
        let beacon = HttpBeacon::new();
        let started = std::time::Instant::now();

        // Nothing listens on the discard port; the POST fails in the background.
        assert!(beacon.send(
            "http://127.0.0.1:9/analytics",
            r#"{"action":"next","index":1,"productId":"HOODIE123"}"#
        ));
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
    }
}
