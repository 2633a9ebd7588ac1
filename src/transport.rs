//! Timeout-bounded HTTP transport.
//!
//! DESIGN
//! ======
//! Every call runs the send-and-read-body exchange under a single
//! `tokio::time::timeout`. When the deadline fires the exchange future is
//! dropped, which aborts the in-flight request; on normal completion the
//! timer is dropped with it. One attempt per call, no retries.
//!
//! The transport never interprets HTTP status or body. It hands back the
//! raw status and body text so the consultation layer can apply its own
//! folding rules.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The deadline elapsed before a full response arrived.
    #[error("request timed out after {}ms, please try again later", .0.as_millis())]
    Timeout(Duration),

    /// Connection, TLS, or body-read failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request body could not be serialized to JSON.
    #[error("request body could not be encoded: {0}")]
    Encode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Network(_) => "E_NETWORK",
            Self::Encode(_) => "E_ENCODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Raw outcome of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    connect_timeout: Duration,
}

impl Transport {
    /// Build a transport whose TCP connect phase is capped at `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::HttpClientBuild`] if the TLS backend fails to
    /// initialize.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, connect_timeout })
    }

    /// `GET url`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when the deadline elapses,
    /// [`TransportError::Network`] for any other failure.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        debug!(%url, timeout_ms = timeout.as_millis(), "transport: GET");
        self.call(self.http.get(url), url, timeout).await
    }

    /// `POST url` with a JSON body, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when the deadline elapses,
    /// [`TransportError::Network`] for any other failure.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let payload = serde_json::to_vec(body).map_err(|e| TransportError::Encode(e.to_string()))?;
        debug!(%url, bytes = payload.len(), timeout_ms = timeout.as_millis(), "transport: POST");
        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        self.call(request, url, timeout).await
    }

    async fn call(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        deadline: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(TransportResponse { status, body })
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(Ok(response)) => {
                debug!(%url, status = response.status, bytes = response.body.len(), "transport: response");
                Ok(response)
            }
            Ok(Err(e)) => {
                let err = client_error(e.is_timeout(), e.to_string(), self.connect_timeout);
                warn!(%url, error = %err, code = err.error_code(), retryable = err.retryable(), "transport: request failed");
                Err(err)
            }
            Err(_) => {
                warn!(%url, timeout_ms = deadline.as_millis(), "transport: deadline elapsed, request aborted");
                Err(TransportError::Timeout(deadline))
            }
        }
    }
}

/// Map a reqwest failure. The only deadline the client itself enforces is
/// the connect timeout, so that is the duration a client-side timeout reports.
fn client_error(is_timeout: bool, message: String, connect_timeout: Duration) -> TransportError {
    if is_timeout { TransportError::Timeout(connect_timeout) } else { TransportError::Network(message) }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
