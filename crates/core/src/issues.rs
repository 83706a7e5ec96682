use std::collections::BTreeMap;

use crate::config::IssueThresholds;
use crate::format::human_bytes;
use crate::model::{
    Category, CategoryUsage, DuplicateGroup, Finding, IssueKind, MailboxInsights, NamingStats,
    QuotaUsage, RuleTrace, RuleTraceStatus, ScanTotals, Severity, SourceKind, StructureAnalysis,
};

/// Read-only view of everything one scan computed, shared by the issue
/// detector and the recommendation synthesizer.
#[derive(Debug, Clone, Copy)]
pub struct SourceStats<'a> {
    pub source_id: &'a str,
    pub source_kind: SourceKind,
    pub totals: &'a ScanTotals,
    pub categories: &'a BTreeMap<Category, CategoryUsage>,
    pub duplicates: &'a [DuplicateGroup],
    pub structure: &'a StructureAnalysis,
    pub naming: &'a NamingStats,
    pub quota: Option<&'a QuotaUsage>,
    pub mailbox: Option<&'a MailboxInsights>,
}

impl SourceStats<'_> {
    pub fn uncategorized_fraction(&self) -> Option<f64> {
        if self.totals.entries == 0 {
            return None;
        }
        let other = self
            .categories
            .get(&Category::Other)
            .map(|usage| usage.count)
            .unwrap_or(0);
        Some(other as f64 / self.totals.entries as f64)
    }

    pub fn redundant_entries(&self) -> u64 {
        self.duplicates
            .iter()
            .map(DuplicateGroup::redundant_count)
            .sum()
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates
            .iter()
            .map(|group| group.wasted_bytes)
            .fold(0_u64, u64::saturating_add)
    }
}

#[derive(Debug, Default)]
pub struct IssueOutcome {
    pub findings: Vec<Finding>,
    pub rule_traces: Vec<RuleTrace>,
}

pub fn detect_issues(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> IssueOutcome {
    let mut outcome = IssueOutcome::default();
    let rules: [(IssueKind, fn(&SourceStats<'_>, &IssueThresholds) -> Option<Finding>); 9] = [
        (IssueKind::HighStorageUsage, storage_usage_rule),
        (IssueKind::ManyUncategorizedFiles, uncategorized_rule),
        (IssueKind::ExcessiveSharedEntries, shared_entries_rule),
        (IssueKind::TooManyRootEntries, root_entries_rule),
        (IssueKind::FolderDepthTooDeep, folder_depth_rule),
        (IssueKind::OvercrowdedTopLevel, overcrowded_rule),
        (IssueKind::InconsistentNaming, naming_rule),
        (IssueKind::DuplicateWaste, duplicate_rule),
        (IssueKind::MissingTemporalMetadata, temporal_rule),
    ];

    for (kind, rule) in rules {
        emit_optional(kind, rule(stats, thresholds), &mut outcome);
    }
    outcome
}

fn emit_optional(kind: IssueKind, finding: Option<Finding>, outcome: &mut IssueOutcome) {
    if let Some(finding) = finding {
        outcome.rule_traces.push(RuleTrace {
            rule_id: kind.label().to_string(),
            status: RuleTraceStatus::Emitted,
            detail: format!(
                "Observed {} against threshold {}.",
                trim_number(finding.observed),
                trim_number(finding.threshold)
            ),
        });
        outcome.findings.push(finding);
    } else {
        outcome.rule_traces.push(RuleTrace {
            rule_id: kind.label().to_string(),
            status: RuleTraceStatus::Skipped,
            detail: "Rule conditions were not met.".to_string(),
        });
    }
}

fn finding(
    stats: &SourceStats<'_>,
    kind: IssueKind,
    severity: Severity,
    observed: f64,
    threshold: f64,
    description: String,
    impact: &str,
) -> Finding {
    Finding {
        source_id: stats.source_id.to_string(),
        source_kind: stats.source_kind,
        severity,
        kind,
        description,
        impact: impact.to_string(),
        observed,
        threshold,
    }
}

fn storage_usage_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let quota = stats.quota?;
    let usage = quota.usage_fraction()?;
    if usage <= thresholds.storage_usage_ratio {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::HighStorageUsage,
        Severity::High,
        usage,
        thresholds.storage_usage_ratio,
        format!(
            "Storage is {:.1}% full ({} of {}).",
            usage * 100.0,
            human_bytes(quota.used_bytes),
            human_bytes(quota.limit_bytes)
        ),
        "Uploads and syncs will start failing once the quota is exhausted.",
    ))
}

fn uncategorized_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let fraction = stats.uncategorized_fraction()?;
    if fraction <= thresholds.uncategorized_ratio {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::ManyUncategorizedFiles,
        Severity::Medium,
        fraction,
        thresholds.uncategorized_ratio,
        format!(
            "{:.0}% of entries do not fit any known category.",
            fraction * 100.0
        ),
        "Uncategorized material is hard to locate and easy to misfile.",
    ))
}

fn shared_entries_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let shared = stats.totals.shared_entries;
    if stats.totals.entries == 0 || shared <= thresholds.shared_entries {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::ExcessiveSharedEntries,
        Severity::Medium,
        shared as f64,
        thresholds.shared_entries as f64,
        format!("{shared} entries are shared outside the practice."),
        "Broad external sharing increases the risk of exposing client data.",
    ))
}

fn root_entries_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let root = stats.totals.root_entries;
    if stats.totals.entries == 0 || root <= thresholds.root_entries {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::TooManyRootEntries,
        Severity::High,
        root as f64,
        thresholds.root_entries as f64,
        format!("{root} entries sit directly in the top-level folder."),
        "A cluttered top level slows down every search for client material.",
    ))
}

fn folder_depth_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let depth = stats.structure.max_depth;
    if stats.structure.node_count == 0 || depth < thresholds.max_folder_depth {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::FolderDepthTooDeep,
        Severity::Medium,
        depth as f64,
        thresholds.max_folder_depth as f64,
        format!("Folders are nested up to {depth} levels deep."),
        "Deep nesting makes documents hard to find and breaks long paths.",
    ))
}

fn overcrowded_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let crowded = stats.structure.shallow_crowded_folders.len() as u64;
    if crowded <= thresholds.crowded_folders {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::OvercrowdedTopLevel,
        Severity::Medium,
        crowded as f64,
        thresholds.crowded_folders as f64,
        format!("{crowded} top-level folders hold too many entries."),
        "Flat, crowded folders hide related documents among unrelated ones.",
    ))
}

fn naming_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let naming = stats.naming;
    if naming.sample_size == 0 || naming.spaces_fraction <= thresholds.spaces_ratio {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::InconsistentNaming,
        Severity::Low,
        naming.spaces_fraction,
        thresholds.spaces_ratio,
        format!(
            "{:.0}% of sampled names contain spaces.",
            naming.spaces_fraction * 100.0
        ),
        "Inconsistent names complicate search, sorting and automation.",
    ))
}

fn duplicate_rule(stats: &SourceStats<'_>, _thresholds: &IssueThresholds) -> Option<Finding> {
    if stats.duplicates.is_empty() {
        return None;
    }
    let groups = stats.duplicates.len();
    Some(finding(
        stats,
        IssueKind::DuplicateWaste,
        Severity::Medium,
        groups as f64,
        0.0,
        format!(
            "{groups} duplicate group(s) waste {}.",
            human_bytes(stats.wasted_bytes())
        ),
        "Duplicate copies drift apart and waste storage.",
    ))
}

fn temporal_rule(stats: &SourceStats<'_>, thresholds: &IssueThresholds) -> Option<Finding> {
    let naming = stats.naming;
    if naming.sample_size == 0 || naming.date_fraction >= thresholds.dated_names_ratio {
        return None;
    }
    Some(finding(
        stats,
        IssueKind::MissingTemporalMetadata,
        Severity::Low,
        naming.date_fraction,
        thresholds.dated_names_ratio,
        format!(
            "Only {:.0}% of sampled names carry a date.",
            naming.date_fraction * 100.0
        ),
        "Undated names make it hard to tell current versions from old ones.",
    ))
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.3}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{detect_issues, SourceStats};
    use crate::config::IssueThresholds;
    use crate::model::{
        Category, CategoryUsage, DuplicateGroup, FingerprintConfidence, FolderConcern, IssueKind,
        NamingStats, QuotaUsage, RuleTraceStatus, ScanTotals, Severity, SourceKind,
        StructureAnalysis,
    };

    struct Fixture {
        totals: ScanTotals,
        categories: BTreeMap<Category, CategoryUsage>,
        duplicates: Vec<DuplicateGroup>,
        structure: StructureAnalysis,
        naming: NamingStats,
        quota: Option<QuotaUsage>,
    }

    impl Fixture {
        fn empty() -> Self {
            Self {
                totals: ScanTotals::default(),
                categories: BTreeMap::new(),
                duplicates: Vec::new(),
                structure: StructureAnalysis::default(),
                naming: NamingStats::default(),
                quota: None,
            }
        }

        fn stats(&self) -> SourceStats<'_> {
            SourceStats {
                source_id: "fixture",
                source_kind: SourceKind::CloudDrive,
                totals: &self.totals,
                categories: &self.categories,
                duplicates: &self.duplicates,
                structure: &self.structure,
                naming: &self.naming,
                quota: self.quota.as_ref(),
                mailbox: None,
            }
        }
    }

    fn kinds(fixture: &Fixture) -> Vec<IssueKind> {
        detect_issues(&fixture.stats(), &IssueThresholds::default())
            .findings
            .iter()
            .map(|finding| finding.kind)
            .collect()
    }

    #[test]
    fn empty_source_yields_no_findings_but_full_trace() {
        let fixture = Fixture::empty();
        let outcome = detect_issues(&fixture.stats(), &IssueThresholds::default());
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.rule_traces.len(), 9);
        assert!(outcome
            .rule_traces
            .iter()
            .all(|trace| trace.status == RuleTraceStatus::Skipped));
    }

    #[test]
    fn quota_boundary_is_strictly_greater() {
        let mut fixture = Fixture::empty();
        fixture.quota = Some(QuotaUsage {
            used_bytes: 800,
            limit_bytes: 1000,
        });
        assert!(kinds(&fixture).is_empty());

        fixture.quota = Some(QuotaUsage {
            used_bytes: 801,
            limit_bytes: 1000,
        });
        let outcome = detect_issues(&fixture.stats(), &IssueThresholds::default());
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].kind, IssueKind::HighStorageUsage);
        assert_eq!(outcome.findings[0].severity, Severity::High);
    }

    #[test]
    fn zero_quota_limit_is_ignored() {
        let mut fixture = Fixture::empty();
        fixture.quota = Some(QuotaUsage {
            used_bytes: 10,
            limit_bytes: 0,
        });
        assert!(kinds(&fixture).is_empty());
    }

    #[test]
    fn structure_and_naming_rules_fire_on_their_thresholds() {
        let mut fixture = Fixture::empty();
        fixture.totals.entries = 100;
        fixture.totals.root_entries = 51;
        fixture.totals.shared_entries = 50;
        fixture.categories.insert(
            Category::Other,
            CategoryUsage {
                count: 21,
                bytes: 0,
            },
        );
        fixture.structure.node_count = 10;
        fixture.structure.max_depth = 8;
        fixture.structure.shallow_crowded_folders = (0..6)
            .map(|index| FolderConcern {
                location: format!("folder-{index}"),
                depth: 1,
                entries: 25,
            })
            .collect();
        fixture.naming = NamingStats {
            sample_size: 100,
            spaces_fraction: 0.31,
            date_fraction: 0.10,
            ..NamingStats::default()
        };

        let found = kinds(&fixture);
        assert_eq!(
            found,
            vec![
                IssueKind::ManyUncategorizedFiles,
                IssueKind::TooManyRootEntries,
                IssueKind::FolderDepthTooDeep,
                IssueKind::OvercrowdedTopLevel,
                IssueKind::InconsistentNaming,
            ]
        );
    }

    #[test]
    fn duplicates_and_missing_dates_fire() {
        let mut fixture = Fixture::empty();
        fixture.totals.entries = 10;
        fixture.duplicates.push(DuplicateGroup {
            fingerprint: "blake3:aa".to_string(),
            size_bytes: 4096,
            members: vec!["a".to_string(), "b".to_string()],
            kept: "a".to_string(),
            wasted_bytes: 4096,
            confidence: FingerprintConfidence::Content,
        });
        fixture.naming = NamingStats {
            sample_size: 10,
            date_fraction: 0.0,
            ..NamingStats::default()
        };

        let outcome = detect_issues(&fixture.stats(), &IssueThresholds::default());
        let found = outcome
            .findings
            .iter()
            .map(|finding| (finding.kind, finding.severity))
            .collect::<Vec<_>>();
        assert_eq!(
            found,
            vec![
                (IssueKind::DuplicateWaste, Severity::Medium),
                (IssueKind::MissingTemporalMetadata, Severity::Low),
            ]
        );
        assert!(outcome.findings[0].description.contains("4.0 KB"));
    }
}
