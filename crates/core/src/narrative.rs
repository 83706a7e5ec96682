use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::format::human_bytes;
use crate::model::{FindingBuckets, Narrative, NarrativeOrigin, Recommendation, RunStatistics};

pub const CONSULTANT_PROMPT: &str = "You are a practice-management consultant for small law firms. \
Using the audit summary provided, write three short paragraphs for the managing partner: \
the overall state of their files and email, the most important problems, and the first \
improvements to make with the hours they would save. Be concrete and avoid jargon.";

const TOP_ITEMS: usize = 5;

/// Structured summary handed to the text generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrativeInput {
    pub sources_scanned: u64,
    pub sources_failed: u64,
    pub total_entries: u64,
    pub total_bytes: u64,
    pub wasted_bytes: u64,
    pub high_findings: u64,
    pub medium_findings: u64,
    pub low_findings: u64,
    pub top_findings: Vec<String>,
    pub top_recommendations: Vec<NarrativeRecommendation>,
    pub total_weekly_savings_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrativeRecommendation {
    pub title: String,
    pub priority: String,
    pub weekly_savings_hours: f64,
}

pub trait TextGenerator: Send + Sync {
    fn generate(&self, input: &NarrativeInput, prompt: &str) -> Result<String, GenerationError>;
}

pub fn narrative_input(
    statistics: &RunStatistics,
    findings: &FindingBuckets,
    recommendations: &[Recommendation],
    total_weekly_savings_hours: f64,
) -> NarrativeInput {
    NarrativeInput {
        sources_scanned: statistics.sources_scanned,
        sources_failed: statistics.sources_failed,
        total_entries: statistics.total_entries,
        total_bytes: statistics.total_bytes,
        wasted_bytes: statistics.wasted_bytes,
        high_findings: findings.high.len() as u64,
        medium_findings: findings.medium.len() as u64,
        low_findings: findings.low.len() as u64,
        top_findings: findings
            .iter()
            .take(TOP_ITEMS)
            .map(|finding| finding.description.clone())
            .collect(),
        top_recommendations: recommendations
            .iter()
            .take(TOP_ITEMS)
            .map(|rec| NarrativeRecommendation {
                title: rec.title.clone(),
                priority: rec.priority.label().to_string(),
                weekly_savings_hours: rec.weekly_savings_hours,
            })
            .collect(),
        total_weekly_savings_hours,
    }
}

/// Asks the generator first; any error or blank answer falls back to the template.
pub fn narrate(generator: Option<&dyn TextGenerator>, input: &NarrativeInput) -> Narrative {
    if let Some(generator) = generator {
        match generator.generate(input, CONSULTANT_PROMPT) {
            Ok(text) if !text.trim().is_empty() => {
                return Narrative {
                    text: text.trim().to_string(),
                    origin: NarrativeOrigin::Generated,
                };
            }
            Ok(_) => warn!(error = %GenerationError::Empty, "narrative fallback"),
            Err(err) => warn!(error = %err, "narrative fallback"),
        }
    } else {
        debug!("no text generator configured; using templated narrative");
    }

    Narrative {
        text: fallback_narrative(input),
        origin: NarrativeOrigin::Fallback,
    }
}

pub fn fallback_narrative(input: &NarrativeInput) -> String {
    let mut paragraphs = Vec::new();
    paragraphs.push(format!(
        "The audit covered {} source(s) holding {} entries ({}).",
        input.sources_scanned,
        input.total_entries,
        human_bytes(input.total_bytes)
    ));

    let total_findings = input.high_findings + input.medium_findings + input.low_findings;
    if total_findings == 0 {
        paragraphs.push("No organizational issues crossed their thresholds.".to_string());
    } else {
        paragraphs.push(format!(
            "It found {total_findings} issue(s): {} high, {} medium and {} low severity.",
            input.high_findings, input.medium_findings, input.low_findings
        ));
    }
    if input.wasted_bytes > 0 {
        paragraphs.push(format!(
            "Duplicate copies waste {}.",
            human_bytes(input.wasted_bytes)
        ));
    }

    match input.top_recommendations.first() {
        Some(top) => paragraphs.push(format!(
            "Start with \"{}\" (about {:.1} hours per week). Acting on every recommendation could save about {:.1} hours per week.",
            top.title, top.weekly_savings_hours, input.total_weekly_savings_hours
        )),
        None => paragraphs.push("No improvement cleared the minimum time-savings bar.".to_string()),
    }

    if input.sources_failed > 0 {
        paragraphs.push(format!(
            "{} source(s) could not be scanned and are not reflected above.",
            input.sources_failed
        ));
    }
    paragraphs.join(" ")
}
