use crate::config::{MailboxConfig, SavingsFactors, SavingsModel};
use crate::format::human_bytes;
use crate::issues::SourceStats;
use crate::model::{
    Effort, Finding, IssueKind, MailboxInsights, Priority, Recommendation, TemplateConfidence,
};

/// Subject area whose weekly workload a recommendation draws its savings from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Intake,
    Documents,
    CaseManagement,
    Billing,
    Admin,
    Security,
}

impl Workload {
    pub fn baseline_hours(&self, model: &SavingsModel) -> f64 {
        let baselines = &model.baselines;
        match self {
            Workload::Intake => baselines.intake,
            Workload::Documents => baselines.documents,
            Workload::CaseManagement => baselines.case_management,
            Workload::Billing => baselines.billing,
            Workload::Admin => baselines.admin,
            Workload::Security => baselines.security,
        }
    }
}

/// Weekly hours recoverable for a workload at the given health (0-100).
pub fn weekly_savings(baseline_hours: f64, health_percent: f64, model: &SavingsModel) -> f64 {
    let factors = savings_factors(health_percent, model);
    baseline_hours * factors.waste * factors.optimization
}

pub fn savings_factors(health_percent: f64, model: &SavingsModel) -> SavingsFactors {
    if health_percent < model.poor_health_below {
        model.poor
    } else if health_percent < model.fair_health_below {
        model.fair
    } else {
        model.good
    }
}

/// Priority descending, then savings descending. Stable, so equal keys keep input order.
pub fn rank_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| b.weekly_savings_hours.total_cmp(&a.weekly_savings_hours))
    });
}

pub fn synthesize_recommendations(
    findings: &[Finding],
    stats: &SourceStats<'_>,
    model: &SavingsModel,
    mailbox_config: &MailboxConfig,
) -> Vec<Recommendation> {
    let mut recommendations = findings
        .iter()
        .map(|finding| finding_recommendation(finding, stats, model))
        .collect::<Vec<_>>();

    if let Some(insights) = stats.mailbox {
        recommendations.extend(mailbox_recommendations(insights, stats, model, mailbox_config));
    }

    recommendations.retain(|rec| rec.weekly_savings_hours >= model.min_weekly_savings_hours);
    rank_recommendations(&mut recommendations);
    recommendations
}

struct Playbook {
    area: &'static str,
    workload: Workload,
    title: String,
    actions: &'static [&'static str],
}

fn playbook(kind: IssueKind, stats: &SourceStats<'_>) -> Playbook {
    match kind {
        IssueKind::HighStorageUsage => Playbook {
            area: "storage_optimization",
            workload: Workload::Admin,
            title: "Free up storage before the quota runs out".to_string(),
            actions: &[
                "Remove duplicate and obsolete files",
                "Move closed matters to archive storage",
                "Review whether the current storage plan still fits",
            ],
        },
        IssueKind::ManyUncategorizedFiles => Playbook {
            area: "file_categorization",
            workload: Workload::Documents,
            title: "Implement consistent file categorization".to_string(),
            actions: &[
                "Define a category for every document type the practice handles",
                "Convert or retire file formats nobody recognizes",
                "Tag new files by matter and document type on intake",
            ],
        },
        IssueKind::ExcessiveSharedEntries => Playbook {
            area: "security",
            workload: Workload::Security,
            title: "Review external sharing permissions".to_string(),
            actions: &[
                "Audit every externally shared item",
                "Revoke links for closed matters",
                "Set sharing expiry dates by default",
            ],
        },
        IssueKind::TooManyRootEntries => Playbook {
            area: "folder_organization",
            workload: Workload::Documents,
            title: "Move top-level files into a matter-based structure".to_string(),
            actions: &[
                "Create one folder per client and matter",
                "File loose top-level documents into their matter folders",
                "Keep the top level for folders only",
            ],
        },
        IssueKind::FolderDepthTooDeep => Playbook {
            area: "folder_structure",
            workload: Workload::Admin,
            title: "Flatten the folder hierarchy".to_string(),
            actions: &[
                "Limit the hierarchy to client, matter and document type",
                "Merge single-item subfolders into their parents",
            ],
        },
        IssueKind::OvercrowdedTopLevel => Playbook {
            area: "folder_organization",
            workload: Workload::Admin,
            title: "Split crowded top-level folders".to_string(),
            actions: &[
                "Break crowded folders down by matter or year",
                "Archive inactive material out of working folders",
            ],
        },
        IssueKind::InconsistentNaming => Playbook {
            area: "naming_convention",
            workload: Workload::Documents,
            title: "Standardize file naming conventions".to_string(),
            actions: &[
                "Adopt a YYYY-MM-DD_Client_Matter_Description pattern",
                "Replace spaces and special characters with underscores",
                "Rename active matters first",
            ],
        },
        IssueKind::DuplicateWaste => Playbook {
            area: "duplicate_cleanup",
            workload: Workload::Documents,
            title: format!(
                "Remove {} duplicate group(s) to reclaim {}",
                stats.duplicates.len(),
                human_bytes(stats.wasted_bytes())
            ),
            actions: &[
                "Keep one authoritative copy of each duplicate",
                "Link to the authoritative copy instead of copying it",
            ],
        },
        IssueKind::MissingTemporalMetadata => Playbook {
            area: "naming_convention",
            workload: Workload::CaseManagement,
            title: "Add dates to document names".to_string(),
            actions: &[
                "Prefix filings and correspondence with their date",
                "Date every new version instead of overwriting",
            ],
        },
    }
}

fn finding_recommendation(
    finding: &Finding,
    stats: &SourceStats<'_>,
    model: &SavingsModel,
) -> Recommendation {
    let playbook = playbook(finding.kind, stats);
    let health = health_percent(finding.kind, stats);
    let weekly_savings_hours = weekly_savings(playbook.workload.baseline_hours(model), health, model);

    let mut priority = Priority::from(finding.severity);
    if health < model.escalate_below_health {
        priority = priority.escalated();
    }

    Recommendation {
        priority,
        area: playbook.area.to_string(),
        title: playbook.title,
        description: format!("{} {}", finding.description, finding.impact),
        weekly_savings_hours,
        effort: effort_for(finding, stats, model),
        source_id: finding.source_id.clone(),
        source_kind: finding.source_kind,
        finding: Some(finding.kind),
        health_percent: health,
        actions: playbook.actions.iter().map(|action| action.to_string()).collect(),
    }
}

/// Health (0-100) of the statistic a finding is about; 100 when there is
/// nothing to measure.
pub fn health_percent(kind: IssueKind, stats: &SourceStats<'_>) -> f64 {
    let entries = stats.totals.entries as f64;
    let nodes = stats.structure.node_count as f64;
    let healthy_share = |bad: f64, total: f64| {
        if total > 0.0 {
            (1.0 - bad / total) * 100.0
        } else {
            100.0
        }
    };

    let health = match kind {
        IssueKind::HighStorageUsage => stats
            .quota
            .and_then(|quota| quota.usage_fraction())
            .map(|usage| (1.0 - usage) * 100.0)
            .unwrap_or(100.0),
        IssueKind::ManyUncategorizedFiles => stats
            .uncategorized_fraction()
            .map(|fraction| (1.0 - fraction) * 100.0)
            .unwrap_or(100.0),
        IssueKind::ExcessiveSharedEntries => {
            healthy_share(stats.totals.shared_entries as f64, entries)
        }
        IssueKind::TooManyRootEntries => healthy_share(stats.totals.root_entries as f64, entries),
        IssueKind::FolderDepthTooDeep => {
            healthy_share(stats.structure.deep_folders.len() as f64, nodes)
        }
        IssueKind::OvercrowdedTopLevel => {
            healthy_share(stats.structure.shallow_crowded_folders.len() as f64, nodes)
        }
        IssueKind::InconsistentNaming => (1.0 - stats.naming.spaces_fraction) * 100.0,
        IssueKind::DuplicateWaste => healthy_share(stats.redundant_entries() as f64, entries),
        IssueKind::MissingTemporalMetadata => stats.naming.date_fraction * 100.0,
    };
    health.clamp(0.0, 100.0)
}

fn effort_for(finding: &Finding, stats: &SourceStats<'_>, model: &SavingsModel) -> Effort {
    if finding.kind == IssueKind::DuplicateWaste {
        let groups = stats.duplicates.len() as u64;
        return if groups <= model.easy_duplicate_groups {
            Effort::Easy
        } else if groups <= model.medium_duplicate_groups {
            Effort::Medium
        } else {
            Effort::Hard
        };
    }
    effort_from_distance(relative_distance(finding), model)
}

/// How far past its threshold the observed value is, relative to the threshold.
fn relative_distance(finding: &Finding) -> f64 {
    if finding.threshold <= 0.0 {
        return 0.0;
    }
    let distance = if finding.kind == IssueKind::MissingTemporalMetadata {
        finding.threshold - finding.observed
    } else {
        finding.observed - finding.threshold
    };
    (distance / finding.threshold).max(0.0)
}

fn effort_from_distance(distance: f64, model: &SavingsModel) -> Effort {
    if distance <= model.easy_distance {
        Effort::Easy
    } else if distance <= model.medium_distance {
        Effort::Medium
    } else {
        Effort::Hard
    }
}

fn mailbox_recommendations(
    insights: &MailboxInsights,
    stats: &SourceStats<'_>,
    model: &SavingsModel,
    config: &MailboxConfig,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let admin = Workload::Admin.baseline_hours(model);
    let base = |priority: Priority,
                area: &str,
                title: String,
                description: String,
                health: f64,
                effort: Effort,
                actions: &[&str]| Recommendation {
        priority,
        area: area.to_string(),
        title,
        description,
        weekly_savings_hours: weekly_savings(admin, health, model),
        effort,
        source_id: stats.source_id.to_string(),
        source_kind: stats.source_kind,
        finding: None,
        health_percent: health,
        actions: actions.iter().map(|action| action.to_string()).collect(),
    };

    let strong = insights
        .template_candidates
        .iter()
        .filter(|candidate| candidate.confidence == TemplateConfidence::High)
        .collect::<Vec<_>>();
    if !strong.is_empty() && insights.analyzed_messages > 0 {
        let templated = strong.iter().map(|candidate| candidate.count).sum::<u64>();
        let health = (1.0 - templated as f64 / insights.analyzed_messages as f64) * 100.0;
        let examples = strong
            .iter()
            .take(3)
            .map(|candidate| format!("\"{}\"", candidate.subject))
            .collect::<Vec<_>>()
            .join(", ");
        out.push(base(
            Priority::High,
            "email_templates",
            format!("Create templates for {} recurring email(s)", strong.len()),
            format!("Subjects such as {examples} are written again and again."),
            health.clamp(0.0, 100.0),
            Effort::Easy,
            &[
                "Save a reusable template for each recurring subject",
                "Share the templates with everyone who sends them",
            ],
        ));
    }

    if let Some(avg) = insights.avg_response_hours {
        if avg > config.slow_response_hours && avg > 0.0 {
            let health = (config.slow_response_hours / avg * 100.0).clamp(0.0, 100.0);
            out.push(base(
                Priority::Medium,
                "response_workflow",
                "Speed up client email responses".to_string(),
                format!(
                    "Replies take {avg:.1} hours on average, above the {:.0} hour target.",
                    config.slow_response_hours
                ),
                health,
                Effort::Medium,
                &[
                    "Set up auto-acknowledgements for new client emails",
                    "Assign a daily owner for the shared inbox",
                    "Track response times per matter",
                ],
            ));
        }
    }

    let folders = stats.totals.folders;
    if folders > config.max_folders {
        let health = (config.max_folders as f64 / folders as f64 * 100.0).clamp(0.0, 100.0);
        out.push(base(
            Priority::Medium,
            "folder_organization",
            "Consolidate email folders".to_string(),
            format!(
                "{folders} mail folders exist; more than {} slows down filing.",
                config.max_folders
            ),
            health,
            Effort::Medium,
            &[
                "Merge folders by client instead of by topic",
                "Use filters to file incoming mail automatically",
            ],
        ));
    }

    out
}
