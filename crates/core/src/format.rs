use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::ConsolidatedResult;

const SUMMARY_TOP: usize = 5;

pub fn human_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if value == 0 {
        return "0 B".to_string();
    }
    let mut size = value as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

pub fn to_json(result: &ConsolidatedResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize audit result")
}

pub fn write_json(path: &Path, result: &ConsolidatedResult) -> Result<()> {
    let payload = to_json(result)?;
    fs::write(path, payload)
        .with_context(|| format!("failed to write audit result to {}", path.display()))
}

pub fn load_result(path: &Path) -> Result<ConsolidatedResult> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Plain-text summary for terminals.
pub fn render_text_summary(result: &ConsolidatedResult) -> String {
    let stats = &result.statistics;
    let mut out = String::new();
    out.push_str(&format!(
        "Practice audit {} ({})\n\n",
        result.run_id, result.generated_at
    ));

    out.push_str("Statistics\n");
    out.push_str(&format!(
        "  sources scanned: {} ({} failed)\n  entries: {} in {} folder(s), {}\n  skipped entries: {}\n  duplicate groups: {} wasting {}\n  findings: {}\n  recommendations: {}\n  weekly savings: {:.1} h\n\n",
        stats.sources_scanned,
        stats.sources_failed,
        stats.total_entries,
        stats.total_folders,
        human_bytes(stats.total_bytes),
        stats.skipped_entries,
        stats.duplicate_groups,
        human_bytes(stats.wasted_bytes),
        stats.total_findings,
        stats.total_recommendations,
        result.total_weekly_savings_hours
    ));

    out.push_str("Top Findings\n");
    if result.findings.total() == 0 {
        out.push_str("  none\n");
    }
    for finding in result.findings.iter().take(SUMMARY_TOP) {
        out.push_str(&format!(
            "  [{}] {}: {}\n",
            finding.severity.label(),
            finding.source_id,
            finding.description
        ));
    }
    out.push('\n');

    out.push_str("Top Recommendations\n");
    if result.recommendations.is_empty() {
        out.push_str("  none\n");
    }
    for rec in result.recommendations.iter().take(SUMMARY_TOP) {
        out.push_str(&format!(
            "  [{}] {} ({:.1} h/week, {} effort)\n",
            rec.priority.label(),
            rec.title,
            rec.weekly_savings_hours,
            rec.effort.label()
        ));
    }

    if !result.failed_sources.is_empty() {
        out.push_str("\nFailed Sources\n");
        for failed in &result.failed_sources {
            out.push_str(&format!("  {}: {}\n", failed.source_id, failed.error));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{human_bytes, load_result, render_text_summary, write_json};
    use crate::model::{
        ConsolidatedResult, FailedSource, FindingBuckets, Narrative, NarrativeOrigin,
        RunStatistics, SourceKind, RESULT_VERSION,
    };

    fn empty_result() -> ConsolidatedResult {
        ConsolidatedResult {
            result_version: RESULT_VERSION.to_string(),
            run_id: "run-1".to_string(),
            generated_at: "2026-01-05T10:00:00Z".to_string(),
            reports: Vec::new(),
            findings: FindingBuckets::default(),
            recommendations: Vec::new(),
            total_weekly_savings_hours: 0.0,
            failed_sources: vec![FailedSource {
                source_id: "mail".to_string(),
                source_kind: SourceKind::Mailbox,
                error: "unreachable".to_string(),
            }],
            statistics: RunStatistics {
                sources_failed: 1,
                ..RunStatistics::default()
            },
            narrative: Narrative {
                text: "Nothing to report.".to_string(),
                origin: NarrativeOrigin::Fallback,
            },
        }
    }

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512.0 B");
        assert_eq!(human_bytes(10 * 1024 * 1024), "10.0 MB");
    }

    #[test]
    fn written_result_loads_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("result.json");
        let result = empty_result();
        write_json(&path, &result).expect("write");
        let loaded = load_result(&path).expect("load");
        assert_eq!(loaded, result);
    }

    #[test]
    fn load_reports_the_failing_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing.json");
        let err = load_result(&path).expect_err("missing file");
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn text_summary_lists_failed_sources() {
        let text = render_text_summary(&empty_result());
        assert!(text.contains("Practice audit run-1"));
        assert!(text.contains("Top Findings\n  none"));
        assert!(text.contains("Failed Sources\n  mail: unreachable"));
    }
}
