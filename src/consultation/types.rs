//! Consultation wire types and errors.
//!
//! Request and response shapes mirror the remote API's camelCase JSON. Reports
//! are validated into typed structs at the boundary; anything that does not
//! fit is a business error, never an untyped value passed downstream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::imaging::ImageError;
use crate::transport::TransportError;

// =============================================================================
// ERROR
// =============================================================================

/// Every way a consultation can fail, folded into one channel.
#[derive(Debug, thiserror::Error)]
pub enum ConsultError {
    /// Deadline elapsed or the network call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote API declared failure (`success: false`) or sent a body that
    /// does not validate.
    #[error("{0}")]
    Business(String),

    /// Non-2xx status with no business error in the body.
    #[error("request failed: HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    /// The staged image could not be read or re-encoded.
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl ConsultError {
    pub(crate) fn status(status: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_owned();
        Self::Status { status, reason }
    }

    pub(crate) fn malformed(detail: impl fmt::Display) -> Self {
        Self::Business(format!("malformed response: {detail}"))
    }
}

impl ErrorCode for ConsultError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_code(),
            Self::Business(_) => "E_BUSINESS",
            Self::Status { .. } => "E_HTTP_STATUS",
            Self::Image(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.retryable(),
            Self::Status { status, .. } => matches!(status, 429 | 500..=599),
            Self::Business(_) | Self::Image(_) => false,
        }
    }
}

// =============================================================================
// ENUMS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationType {
    Health,
    Nutrition,
    Behavior,
    #[default]
    General,
}

impl ConsultationType {
    pub const ALL: [Self; 4] = [Self::General, Self::Health, Self::Nutrition, Self::Behavior];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Nutrition => "nutrition",
            Self::Behavior => "behavior",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown consultation type '{s}' (expected health, nutrition, behavior, or general)"))
    }
}

/// Which remote route serves a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsultationMode {
    /// `/api/consultation`: plain-text report.
    #[default]
    Simple,
    /// `/api/consultation/workflow`: structured emergency and recommendation report.
    Workflow,
}

impl ConsultationMode {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Simple => "/api/consultation",
            Self::Workflow => "/api/consultation/workflow",
        }
    }
}

impl FromStr for ConsultationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "workflow" => Ok(Self::Workflow),
            other => Err(format!("unknown consultation mode '{other}' (expected 'simple' or 'workflow')")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Emergency,
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Emergency => "emergency",
        })
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Optional facts about the cat, sent flattened into the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_in_weeks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub consultation_type: ConsultationType,
    #[serde(flatten)]
    pub cat: CatProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior_changes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

impl ConsultationRequest {
    #[must_use]
    pub fn new(consultation_type: ConsultationType) -> Self {
        Self { consultation_type, ..Self::default() }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.additional_notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, data_url: Option<String>) -> Self {
        self.image_base64 = data_url;
        self
    }

    #[must_use]
    pub fn with_cat(mut self, cat: CatProfile) -> Self {
        self.cat = cat;
        self
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Outer shape shared by both consultation routes. `report` stays untyped
/// until the failure-folding rules have run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub consultation_id: Option<String>,
    #[serde(default)]
    pub report: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimpleReport {
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatInfo {
    pub name: Option<String>,
    pub age: Option<f64>,
    pub weight: Option<f64>,
    pub breed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub breed_identification: Option<String>,
    pub health_observations: Option<String>,
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAssessment {
    pub is_emergency: bool,
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub immediate_actions: Vec<String>,
    #[serde(default)]
    pub critical_symptoms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    #[serde(default)]
    pub consultation_id: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub cat_info: CatInfo,
    #[serde(default)]
    pub image_analysis: Option<ImageAnalysis>,
    #[serde(default)]
    pub emergency_assessment: Option<EmergencyAssessment>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
}

/// A validated successful consultation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsultationReply {
    Simple { consultation_id: Option<String>, report: SimpleReport },
    Workflow { consultation_id: Option<String>, report: WorkflowReport },
}

impl ConsultationReply {
    /// Message text for the conversation log.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Simple { report, .. } => report.text.clone(),
            Self::Workflow { report, .. } => super::render::render_workflow_report(report),
        }
    }

    /// Server-assigned report time, as sent.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        match self {
            Self::Simple { report, .. } => &report.timestamp,
            Self::Workflow { report, .. } => &report.timestamp,
        }
    }

    #[must_use]
    pub fn consultation_id(&self) -> Option<&str> {
        match self {
            Self::Simple { consultation_id, .. } => consultation_id.as_deref(),
            Self::Workflow { consultation_id, report } => {
                consultation_id.as_deref().or(report.consultation_id.as_deref())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub timestamp: String,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
