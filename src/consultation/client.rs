//! HTTP client for the remote consultation API.
//!
//! Thin wrapper over [`Transport`]. Response folding lives in the pure
//! [`fold_response`] so the precedence rules are testable without a server.

use tracing::{info, warn};

use super::types::{
    ConsultError, ConsultationMode, ConsultationReply, ConsultationRequest, Envelope, HealthCheckResponse,
    SimpleReport, WorkflowReport,
};
use crate::config::ClientConfig;
use crate::error::ErrorCode;
use crate::transport::{Transport, TransportResponse};

const HEALTH_PATH: &str = "/api/health";

// =============================================================================
// TRAIT
// =============================================================================

/// Anything that can answer a consultation. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ConsultationApi: Send + Sync {
    /// Submit one consultation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsultError`] for transport, status, or business failures.
    async fn submit(
        &self,
        request: &ConsultationRequest,
        mode: ConsultationMode,
    ) -> Result<ConsultationReply, ConsultError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ConsultationClient {
    transport: Transport,
    config: ClientConfig,
}

impl ConsultationClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ConsultError> {
        let transport = Transport::new(config.timeouts.connect)?;
        Ok(Self { transport, config })
    }

    /// `GET /api/health` with the short health timeout.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, any non-2xx status, or an unparseable body.
    pub async fn check_health(&self) -> Result<HealthCheckResponse, ConsultError> {
        let url = self.config.url(HEALTH_PATH);
        let resp = self
            .transport
            .get(&url, self.config.timeouts.health)
            .await
            .inspect_err(|e| warn!(error = %e, code = e.error_code(), retryable = e.retryable(), "consult: health check failed"))?;
        if !resp.is_success() {
            warn!(status = resp.status, "consult: health check returned non-success status");
            return Err(ConsultError::status(resp.status));
        }
        serde_json::from_str(&resp.body).map_err(ConsultError::malformed)
    }

    async fn submit_inner(
        &self,
        request: &ConsultationRequest,
        mode: ConsultationMode,
    ) -> Result<ConsultationReply, ConsultError> {
        let url = self.config.url(mode.path());
        info!(
            ?mode,
            consultation_type = %request.consultation_type,
            has_image = request.image_base64.is_some(),
            "consult: submitting"
        );
        let resp = self
            .transport
            .post_json(&url, request, self.config.timeouts.request)
            .await?;
        let reply = fold_response(&resp, mode)?;
        info!(?mode, consultation_id = reply.consultation_id(), "consult: report received");
        Ok(reply)
    }
}

#[async_trait::async_trait]
impl ConsultationApi for ConsultationClient {
    async fn submit(
        &self,
        request: &ConsultationRequest,
        mode: ConsultationMode,
    ) -> Result<ConsultationReply, ConsultError> {
        self.submit_inner(request, mode)
            .await
            .inspect_err(|e| warn!(error = %e, code = e.error_code(), retryable = e.retryable(), "consult: submission failed"))
    }
}

// =============================================================================
// FOLDING
// =============================================================================

/// Turn a raw exchange into a reply or a single error.
///
/// Precedence:
/// 1. body parses and says `success: false` with a non-empty `error` → that text
/// 2. non-2xx status → status-derived message
/// 3. 2xx but body is not an envelope, or lacks a valid report → malformed
/// 4. otherwise the typed report
pub(crate) fn fold_response(resp: &TransportResponse, mode: ConsultationMode) -> Result<ConsultationReply, ConsultError> {
    let envelope = serde_json::from_str::<Envelope>(&resp.body);

    if let Ok(env) = &envelope {
        if !env.success {
            if let Some(error) = env.error.as_deref().filter(|e| !e.trim().is_empty()) {
                return Err(ConsultError::Business(error.to_owned()));
            }
        }
    }

    if !resp.is_success() {
        return Err(ConsultError::status(resp.status));
    }

    let env = envelope.map_err(ConsultError::malformed)?;
    if !env.success {
        return Err(ConsultError::Business("unknown error".to_owned()));
    }
    let report = env.report.ok_or_else(|| ConsultError::malformed("missing report"))?;

    match mode {
        ConsultationMode::Simple => {
            let report: SimpleReport = serde_json::from_value(report).map_err(ConsultError::malformed)?;
            Ok(ConsultationReply::Simple { consultation_id: env.consultation_id, report })
        }
        ConsultationMode::Workflow => {
            let report: WorkflowReport = serde_json::from_value(report).map_err(ConsultError::malformed)?;
            Ok(ConsultationReply::Workflow { consultation_id: env.consultation_id, report })
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
