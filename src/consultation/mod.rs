//! Consultation: request composition, remote call, and failure folding.
//!
//! DESIGN
//! ======
//! Two remote routes share one envelope (`success`, `report`, `error`). The
//! client always parses the body, whatever the HTTP status, because the API
//! reports business errors both inside 200 responses and alongside non-2xx
//! statuses. Transport, status, and business failures all come out as one
//! [`ConsultError`] so the conversation layer has a single error path.

pub mod client;
pub mod render;
pub mod types;

pub use client::{ConsultationApi, ConsultationClient};
pub use types::{
    CatProfile, ConsultError, ConsultationMode, ConsultationReply, ConsultationRequest, ConsultationType,
    HealthCheckResponse, HealthStatus, SimpleReport, UrgencyLevel, WorkflowReport,
};
