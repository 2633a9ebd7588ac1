//! Plain-text rendering of structured workflow reports.

use std::fmt::Write;

use super::types::{UrgencyLevel, WorkflowReport};

pub fn render_workflow_report(report: &WorkflowReport) -> String {
    let mut out = String::new();

    if let Some(assessment) = &report.emergency_assessment {
        if assessment.is_emergency || assessment.urgency_level == UrgencyLevel::Emergency {
            let _ = writeln!(out, "EMERGENCY (urgency: {}) - contact a veterinarian now.", assessment.urgency_level);
        } else {
            let _ = writeln!(out, "Urgency: {}", assessment.urgency_level);
        }
        push_list(&mut out, "Immediate actions", &assessment.immediate_actions);
        push_list(&mut out, "Critical symptoms", &assessment.critical_symptoms);
    }

    let cat = &report.cat_info;
    let mut facts = Vec::new();
    if let Some(name) = &cat.name {
        facts.push(name.clone());
    }
    if let Some(breed) = &cat.breed {
        facts.push(breed.clone());
    }
    if let Some(age) = cat.age {
        facts.push(format!("{age} yr"));
    }
    if let Some(weight) = cat.weight {
        facts.push(format!("{weight} kg"));
    }
    if !facts.is_empty() {
        section_break(&mut out);
        let _ = writeln!(out, "Cat: {}", facts.join(", "));
    }

    if let Some(analysis) = &report.image_analysis {
        let rows = [
            ("Breed", &analysis.breed_identification),
            ("Observations", &analysis.health_observations),
            ("Confidence", &analysis.confidence),
        ];
        if rows.iter().any(|(_, v)| v.is_some()) {
            section_break(&mut out);
            out.push_str("Image analysis:\n");
            for (label, value) in rows {
                if let Some(value) = value {
                    let _ = writeln!(out, "  {label}: {value}");
                }
            }
        }
    }

    if !report.recommendations.is_empty() {
        section_break(&mut out);
        out.push_str("Recommendations:\n");
        for (i, rec) in report.recommendations.iter().enumerate() {
            let _ = writeln!(out, "  {}. {rec}", i + 1);
        }
    }

    if let Some(disclaimer) = report.disclaimer.as_deref().filter(|d| !d.trim().is_empty()) {
        section_break(&mut out);
        out.push_str(disclaimer.trim());
        out.push('\n');
    }

    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        "The consultation finished without any findings to report.".to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

fn section_break(out: &mut String) {
    if !out.is_empty() {
        out.push('\n');
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
