use super::*;
use crate::consultation::types::{CatInfo, EmergencyAssessment, ImageAnalysis};

fn bare_report() -> WorkflowReport {
    WorkflowReport {
        consultation_id: Some("c-1".into()),
        timestamp: "2024-01-01T00:00:00Z".into(),
        cat_info: CatInfo::default(),
        image_analysis: None,
        emergency_assessment: None,
        recommendations: Vec::new(),
        disclaimer: None,
    }
}

#[test]
fn empty_report_has_fallback_text() {
    let text = render_workflow_report(&bare_report());
    assert!(text.contains("without any findings"));
}

#[test]
fn emergency_banner_comes_first() {
    let report = WorkflowReport {
        emergency_assessment: Some(EmergencyAssessment {
            is_emergency: true,
            urgency_level: UrgencyLevel::High,
            immediate_actions: vec!["Keep the cat warm".into()],
            critical_symptoms: vec!["Labored breathing".into()],
        }),
        recommendations: vec!["See a vet within the hour".into()],
        ..bare_report()
    };
    let text = render_workflow_report(&report);
    assert!(text.starts_with("EMERGENCY (urgency: high)"));
    assert!(text.contains("Immediate actions:\n  - Keep the cat warm"));
    assert!(text.contains("Critical symptoms:\n  - Labored breathing"));
    assert!(text.contains("Recommendations:\n  1. See a vet within the hour"));
}

#[test]
fn non_emergency_reports_urgency_only() {
    let report = WorkflowReport {
        emergency_assessment: Some(EmergencyAssessment {
            is_emergency: false,
            urgency_level: UrgencyLevel::Low,
            immediate_actions: Vec::new(),
            critical_symptoms: Vec::new(),
        }),
        ..bare_report()
    };
    let text = render_workflow_report(&report);
    assert_eq!(text, "Urgency: low");
}

#[test]
fn cat_info_and_image_analysis_render_present_fields_only() {
    let report = WorkflowReport {
        cat_info: CatInfo { name: Some("Mochi".into()), age: Some(3.0), weight: None, breed: Some("Ragdoll".into()) },
        image_analysis: Some(ImageAnalysis {
            breed_identification: Some("Ragdoll".into()),
            health_observations: None,
            confidence: Some("high".into()),
        }),
        disclaimer: Some("  Not a substitute for a veterinary exam.  ".into()),
        ..bare_report()
    };
    let text = render_workflow_report(&report);
    assert!(text.contains("Cat: Mochi, Ragdoll, 3 yr"));
    assert!(text.contains("  Breed: Ragdoll"));
    assert!(text.contains("  Confidence: high"));
    assert!(!text.contains("Observations"));
    assert!(text.ends_with("Not a substitute for a veterinary exam."));
}
