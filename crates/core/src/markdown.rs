use crate::format::human_bytes;
use crate::model::{ConsolidatedResult, Finding, NarrativeOrigin, ScanReport, TruncationReason};

pub fn render_markdown_report(result: &ConsolidatedResult) -> String {
    let stats = &result.statistics;
    let mut out = String::new();
    out.push_str("# Practice Audit Report\n\n");
    out.push_str(&format!(
        "- Result version: `{}`\n- Run id: `{}`\n- Generated at: `{}`\n- Sources scanned: {} ({} failed)\n- Entries: {} ({})\n- Wasted by duplicates: {}\n- Estimated weekly savings: {:.1} h\n\n",
        result.result_version,
        result.run_id,
        result.generated_at,
        stats.sources_scanned,
        stats.sources_failed,
        stats.total_entries,
        human_bytes(stats.total_bytes),
        human_bytes(stats.wasted_bytes),
        result.total_weekly_savings_hours
    ));

    out.push_str("## Summary\n\n");
    out.push_str(&result.narrative.text);
    if result.narrative.origin == NarrativeOrigin::Fallback {
        out.push_str("\n\n_Summary generated from a template._");
    }
    out.push_str("\n\n");

    out.push_str("## Sources\n\n");
    if result.reports.is_empty() {
        out.push_str("No sources were scanned.\n\n");
    }
    for report in &result.reports {
        render_source(&mut out, report);
    }

    out.push_str("## Findings\n\n");
    if result.findings.total() == 0 {
        out.push_str("No findings.\n\n");
    } else {
        render_findings(&mut out, "High", &result.findings.high);
        render_findings(&mut out, "Medium", &result.findings.medium);
        render_findings(&mut out, "Low", &result.findings.low);
    }

    out.push_str("## Recommendations\n\n");
    if result.recommendations.is_empty() {
        out.push_str("No recommendations generated.\n\n");
    } else {
        out.push_str("| Priority | Area | Recommendation | Source | Effort | Hours/week |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for rec in &result.recommendations {
            out.push_str(&format!(
                "| {} | {} | {} | `{}` | {} | {:.1} |\n",
                rec.priority.label(),
                rec.area,
                table_cell(&rec.title),
                rec.source_id,
                rec.effort.label(),
                rec.weekly_savings_hours
            ));
        }
        out.push('\n');
        for rec in &result.recommendations {
            if rec.actions.is_empty() {
                continue;
            }
            out.push_str(&format!("### {}\n\n{}\n\n", rec.title, rec.description));
            for action in &rec.actions {
                out.push_str(&format!("- {action}\n"));
            }
            out.push('\n');
        }
    }

    if !result.failed_sources.is_empty() {
        out.push_str("## Failed Sources\n\n");
        for failed in &result.failed_sources {
            out.push_str(&format!(
                "- `{}` ({}): {}\n",
                failed.source_id,
                failed.source_kind.label(),
                failed.error
            ));
        }
        out.push('\n');
    }

    out
}

fn render_source(out: &mut String, report: &ScanReport) {
    out.push_str(&format!(
        "### `{}` ({})\n\n",
        report.source_id,
        report.source_kind.label()
    ));
    if !report.completed {
        out.push_str(&format!(
            "Scan failed: {}\n\n",
            report.error.as_deref().unwrap_or("unknown error")
        ));
        return;
    }

    out.push_str(&format!(
        "- Entries: {} in {} folder(s), {}\n- Skipped: {}\n- Max depth: {}\n",
        report.totals.entries,
        report.totals.folders,
        human_bytes(report.totals.bytes),
        report.totals.skipped_entries,
        report.structure.max_depth
    ));
    if report.totals.unresolved_entries > 0 {
        out.push_str(&format!(
            "- Outside any listed folder: {}\n",
            report.totals.unresolved_entries
        ));
    }
    if let Some(fraction) = report.quota.and_then(|quota| quota.usage_fraction()) {
        out.push_str(&format!("- Storage used: {:.1}%\n", fraction * 100.0));
    }
    if let Some(reason) = report.truncated {
        out.push_str(&format!("- Truncated: {}\n", truncation_label(reason)));
    }
    out.push('\n');

    let categories = report.top_categories(10);
    if !categories.is_empty() {
        out.push_str("| Category | Entries | Size |\n|---|---|---|\n");
        for (category, usage) in categories {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                category.label(),
                usage.count,
                human_bytes(usage.bytes)
            ));
        }
        out.push('\n');
    }

    if !report.duplicates.is_empty() {
        out.push_str("Largest duplicate groups:\n\n");
        for group in report.duplicates.iter().take(10) {
            out.push_str(&format!(
                "- {} copies of `{}` ({} each), wasting {}\n",
                group.members.len(),
                group.kept,
                human_bytes(group.size_bytes),
                human_bytes(group.wasted_bytes)
            ));
        }
        out.push('\n');
    }

    if let Some(mailbox) = &report.mailbox {
        out.push_str(&format!(
            "Mailbox: {} message(s) analyzed, {} template candidate(s)",
            mailbox.analyzed_messages,
            mailbox.template_candidates.len()
        ));
        if let Some(hours) = mailbox.avg_response_hours {
            out.push_str(&format!(", average response {hours:.1} h"));
        }
        out.push_str("\n\n");
    }

    if !report.warnings.is_empty() {
        out.push_str("Warnings:\n\n");
        for warning in &report.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
        out.push('\n');
    }
}

fn render_findings(out: &mut String, heading: &str, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    out.push_str(&format!("### {heading}\n\n"));
    for finding in findings {
        out.push_str(&format!(
            "- `{}` {}: {} {}\n",
            finding.source_id,
            finding.kind.label(),
            finding.description,
            finding.impact
        ));
    }
    out.push('\n');
}

fn truncation_label(reason: TruncationReason) -> &'static str {
    match reason {
        TruncationReason::MaxEntries => "entry limit reached",
        TruncationReason::Deadline => "deadline reached",
        TruncationReason::Cancelled => "cancelled",
    }
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
