use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::categorize::{categorize, category_usage, EntryTraits};
use crate::config::{AuditConfig, ScanLimitsConfig};
use crate::dedupe::find_duplicates;
use crate::issues::{detect_issues, SourceStats};
use crate::mailbox::analyze_mailbox;
use crate::model::{
    extension_of, Category, CategoryUsage, DuplicateGroup, Entry, EntryFlags, Finding,
    MailboxInsights, NamingStats, QuotaUsage, Recommendation, RuleTrace, ScanPhase,
    ScanProgressEvent, ScanReport, ScanTotals, SourceKind, StructureAnalysis, TruncationReason,
    MESSAGE_CONTENT_TYPE, UNRESOLVED_LOCATION,
};
use crate::naming::analyze_naming;
use crate::recommend::synthesize_recommendations;
use crate::source::{EntrySource, FolderRecord, ListedItem, RecordLocation, SourceRecord};
use crate::structure::analyze_structure;

/// Bounds on one scan. Hitting any of them truncates the report instead of failing it.
#[derive(Debug, Clone)]
pub struct ScanLimits {
    pub max_entries: usize,
    pub deadline: Option<Instant>,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_entries: ScanLimitsConfig::default().max_entries,
            deadline: None,
            cancel_flag: None,
        }
    }
}

impl ScanLimits {
    /// The deadline starts counting now.
    pub fn from_config(config: &ScanLimitsConfig, cancel_flag: Option<Arc<AtomicBool>>) -> Self {
        Self {
            max_entries: config.max_entries,
            deadline: config
                .timeout_secs
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
            cancel_flag,
        }
    }

    fn interruption(&self) -> Option<TruncationReason> {
        if self
            .cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Some(TruncationReason::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(TruncationReason::Deadline);
        }
        None
    }
}

/// Turns one [`EntrySource`] into one sealed [`ScanReport`]. Nothing the
/// source does can make `scan` fail; problems end up in the report.
pub struct SourceScanner {
    source: Box<dyn EntrySource>,
}

impl SourceScanner {
    pub fn new<S>(source: S) -> Self
    where
        S: EntrySource + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }

    pub fn from_boxed(source: Box<dyn EntrySource>) -> Self {
        Self { source }
    }

    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn scan(&self, config: &AuditConfig, limits: &ScanLimits) -> ScanReport {
        self.scan_with_callback(config, limits, |_| {})
    }

    pub fn scan_with_callback<F>(
        &self,
        config: &AuditConfig,
        limits: &ScanLimits,
        on_event: F,
    ) -> ScanReport
    where
        F: FnMut(ScanProgressEvent),
    {
        let source = self.source.as_ref();
        let started = Instant::now();
        let mut progress = Progress::new(source.source_id(), on_event);
        let mut builder = ReportBuilder::new(source, config.limits.max_warnings);
        for warning in source.warnings() {
            builder.warn(warning);
        }

        info!(source = source.source_id(), kind = source.kind().label(), "scan started");
        progress.emit(ScanPhase::Listing, 0, 0);

        let listing = match source.open(limits.max_entries) {
            Ok(listing) => listing,
            Err(err) => {
                warn!(source = source.source_id(), error = %err, "source unavailable");
                progress.emit(ScanPhase::Sealed, 0, 0);
                return builder.fail(err.to_string());
            }
        };
        builder.totals.declared_total = listing.declared_total;

        let mut records: Vec<SourceRecord> = Vec::new();
        let mut folders: Vec<FolderRecord> = Vec::new();
        let mut needs_folders = false;
        let mut dropped_entries = 0u64;
        for item in listing.items {
            if let Some(reason) = limits.interruption() {
                builder.truncated = Some(reason);
                break;
            }
            match item {
                Ok(ListedItem::Entry(record)) => {
                    if records.len() < limits.max_entries {
                        needs_folders |=
                            matches!(record.location, RecordLocation::Parent(Some(_)));
                        records.push(record);
                        continue;
                    }
                    builder.truncated = Some(TruncationReason::MaxEntries);
                    if !needs_folders {
                        break;
                    }
                    // Past the cap only folders are kept, so parent chains of kept entries resolve.
                    dropped_entries += 1;
                }
                Ok(ListedItem::Folder(folder)) => folders.push(folder),
                Err(err) => {
                    debug!(source = source.source_id(), error = %err, "record skipped");
                    builder.totals.skipped_entries += 1;
                    builder.warn(format!("skipped record: {err}"));
                }
            }
        }
        if let Some(reason) = builder.truncated {
            info!(
                source = source.source_id(),
                reason = ?reason,
                entries = records.len(),
                dropped_entries,
                "listing truncated"
            );
        }

        progress.emit(
            ScanPhase::Categorizing,
            records.len() as u64,
            builder.totals.skipped_entries,
        );
        let mut resolver = LocationResolver::new(&folders);
        let entries = records
            .into_iter()
            .map(|record| build_entry(record, &mut resolver))
            .collect::<Vec<_>>();
        if resolver.cycles > 0 {
            builder.warn(format!(
                "{} folder parent chain(s) contained a cycle; affected entries were placed at the root.",
                resolver.cycles
            ));
        }
        builder.totals.folders = folders.len() as u64;
        builder.record_entries(&entries);
        if builder.totals.unresolved_entries > 0 {
            builder.warn(format!(
                "{} entries have a parent folder that was not listed; they are reported under {UNRESOLVED_LOCATION}.",
                builder.totals.unresolved_entries
            ));
        }

        progress.emit(
            ScanPhase::Dedupe,
            entries.len() as u64,
            builder.totals.skipped_entries,
        );
        let interrupted = matches!(
            builder.truncated,
            Some(TruncationReason::Cancelled | TruncationReason::Deadline)
        );
        if !config.dedupe.enabled {
            debug!(source = source.source_id(), "dedupe disabled");
        } else if interrupted {
            builder.warn("duplicate detection skipped because the scan was interrupted.".to_string());
        } else {
            let outcome = find_duplicates(&entries, source, &config.dedupe);
            builder.totals.dedupe_skipped_entries = outcome.skipped_entries;
            for warning in outcome.warnings {
                builder.warn(warning);
            }
            builder.duplicates = outcome.groups;
        }

        progress.emit(
            ScanPhase::Analyzing,
            entries.len() as u64,
            builder.totals.skipped_entries,
        );
        builder.structure = analyze_structure(
            entries
                .iter()
                .filter(|entry| !entry.has_unresolved_location())
                .map(|entry| entry.location.as_str()),
            &config.structure,
        );
        builder.naming = analyze_naming(&entries, &config.naming);
        if source.kind() == SourceKind::Mailbox {
            builder.mailbox = Some(analyze_mailbox(&entries, &config.mailbox));
        }
        builder.quota = source.quota();

        progress.emit(
            ScanPhase::Recommending,
            entries.len() as u64,
            builder.totals.skipped_entries,
        );
        builder.analyze(config);

        progress.emit(
            ScanPhase::Sealed,
            entries.len() as u64,
            builder.totals.skipped_entries,
        );
        let report = builder.seal();
        info!(
            source = %report.source_id,
            entries = report.totals.entries,
            skipped = report.totals.skipped_entries,
            findings = report.findings.len(),
            recommendations = report.recommendations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan sealed"
        );
        report
    }
}

struct Progress<'a, F> {
    source_id: &'a str,
    seq: u64,
    on_event: F,
}

impl<'a, F> Progress<'a, F>
where
    F: FnMut(ScanProgressEvent),
{
    fn new(source_id: &'a str, on_event: F) -> Self {
        Self {
            source_id,
            seq: 0,
            on_event,
        }
    }

    fn emit(&mut self, phase: ScanPhase, entries: u64, skipped: u64) {
        self.seq = self.seq.saturating_add(1);
        debug!(source = self.source_id, phase = ?phase, entries, "scan phase");
        (self.on_event)(ScanProgressEvent {
            seq: self.seq,
            source_id: self.source_id.to_string(),
            phase,
            entries,
            skipped,
            timestamp: now_rfc3339(),
        });
    }
}

/// Mutable state of a report while the scan runs. `seal` hands out the
/// finished report and consumes the builder.
struct ReportBuilder<'a> {
    source: &'a dyn EntrySource,
    scanned_at: String,
    max_warnings: usize,
    suppressed_warnings: u64,
    totals: ScanTotals,
    categories: BTreeMap<Category, CategoryUsage>,
    duplicates: Vec<DuplicateGroup>,
    structure: StructureAnalysis,
    naming: NamingStats,
    quota: Option<QuotaUsage>,
    mailbox: Option<MailboxInsights>,
    findings: Vec<Finding>,
    recommendations: Vec<Recommendation>,
    rule_traces: Vec<RuleTrace>,
    truncated: Option<TruncationReason>,
    warnings: Vec<String>,
}

impl<'a> ReportBuilder<'a> {
    fn new(source: &'a dyn EntrySource, max_warnings: usize) -> Self {
        Self {
            source,
            scanned_at: now_rfc3339(),
            max_warnings,
            suppressed_warnings: 0,
            totals: ScanTotals::default(),
            categories: BTreeMap::new(),
            duplicates: Vec::new(),
            structure: StructureAnalysis::default(),
            naming: NamingStats::default(),
            quota: None,
            mailbox: None,
            findings: Vec::new(),
            recommendations: Vec::new(),
            rule_traces: Vec::new(),
            truncated: None,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: String) {
        if self.warnings.len() < self.max_warnings {
            self.warnings.push(warning);
        } else {
            self.suppressed_warnings += 1;
        }
    }

    fn record_entries(&mut self, entries: &[Entry]) {
        self.totals.entries = entries.len() as u64;
        for entry in entries {
            self.totals.bytes = self.totals.bytes.saturating_add(entry.size_bytes);
            if entry.flags.shared_externally {
                self.totals.shared_entries += 1;
            }
            if entry.is_root_level() {
                self.totals.root_entries += 1;
            } else if entry.has_unresolved_location() {
                self.totals.unresolved_entries += 1;
            }
        }
        self.categories = category_usage(entries);
    }

    fn analyze(&mut self, config: &AuditConfig) {
        let stats = SourceStats {
            source_id: self.source.source_id(),
            source_kind: self.source.kind(),
            totals: &self.totals,
            categories: &self.categories,
            duplicates: &self.duplicates,
            structure: &self.structure,
            naming: &self.naming,
            quota: self.quota.as_ref(),
            mailbox: self.mailbox.as_ref(),
        };
        let outcome = detect_issues(&stats, &config.issues);
        let recommendations =
            synthesize_recommendations(&outcome.findings, &stats, &config.savings, &config.mailbox);
        self.findings = outcome.findings;
        self.rule_traces = outcome.rule_traces;
        self.recommendations = recommendations;
    }

    fn fail(self, error: String) -> ScanReport {
        let mut report = self.seal();
        report.completed = false;
        report.error = Some(error);
        report
    }

    fn seal(mut self) -> ScanReport {
        if self.suppressed_warnings > 0 {
            self.warnings.push(format!(
                "{} further warning(s) suppressed.",
                self.suppressed_warnings
            ));
        }
        ScanReport {
            source_id: self.source.source_id().to_string(),
            source_kind: self.source.kind(),
            scanned_at: self.scanned_at,
            totals: self.totals,
            categories: self.categories,
            duplicates: self.duplicates,
            structure: self.structure,
            naming: self.naming,
            quota: self.quota,
            mailbox: self.mailbox,
            findings: self.findings,
            recommendations: self.recommendations,
            rule_traces: self.rule_traces,
            truncated: self.truncated,
            warnings: self.warnings,
            completed: true,
            error: None,
        }
    }
}

/// Resolves parent-folder chains to `/`-separated paths. A chain that reaches
/// a folder nobody listed resolves to [`UNRESOLVED_LOCATION`]; a chain that
/// loops back on itself is cut at the root.
struct LocationResolver<'a> {
    folders: HashMap<&'a str, &'a FolderRecord>,
    resolved: HashMap<String, String>,
    /// Distinct loops found among the listed folders.
    cycles: u64,
}

impl<'a> LocationResolver<'a> {
    fn new(folders: &'a [FolderRecord]) -> Self {
        Self {
            folders: folders
                .iter()
                .map(|folder| (folder.id.as_str(), folder))
                .collect(),
            resolved: HashMap::new(),
            cycles: 0,
        }
    }

    fn resolve(&mut self, location: &RecordLocation) -> String {
        match location {
            RecordLocation::Path(path) => normalize_path(path),
            RecordLocation::Parent(None) => String::new(),
            RecordLocation::Parent(Some(parent)) => self.folder_path(parent),
        }
    }

    fn folder_path(&mut self, folder_id: &str) -> String {
        let mut chain: Vec<(String, String)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut base = String::new();
        let mut current = Some(folder_id.to_string());

        while let Some(id) = current.take() {
            if let Some(path) = self.resolved.get(&id) {
                base = path.clone();
                break;
            }
            if !seen.insert(id.clone()) {
                self.cycles += 1;
                return self.settle(chain, String::new());
            }
            let Some(folder) = self.folders.get(id.as_str()).copied() else {
                return self.settle(chain, UNRESOLVED_LOCATION.to_string());
            };
            chain.push((id, folder.name.replace('/', "-")));
            match &folder.location {
                RecordLocation::Parent(parent) => current = parent.clone(),
                RecordLocation::Path(path) => base = normalize_path(path),
            }
        }

        let mut path = base;
        for (id, name) in chain.into_iter().rev() {
            path = if path.is_empty() {
                name
            } else {
                format!("{path}/{name}")
            };
            self.resolved.insert(id, path.clone());
        }
        path
    }

    /// Every folder on `chain` resolves to `path` from now on.
    fn settle(&mut self, chain: Vec<(String, String)>, path: String) -> String {
        for (id, _) in chain {
            self.resolved.insert(id, path.clone());
        }
        path
    }
}

fn build_entry(record: SourceRecord, resolver: &mut LocationResolver<'_>) -> Entry {
    let is_message = record.content_type.as_deref() == Some(MESSAGE_CONTENT_TYPE);
    let mut entry = Entry {
        extension: if is_message {
            None
        } else {
            extension_of(&record.name)
        },
        location: resolver.resolve(&record.location),
        id: record.id,
        name: record.name,
        size_bytes: record.size_bytes,
        content_type: record.content_type,
        created: record.created,
        modified: record.modified,
        flags: EntryFlags {
            shared_externally: record.shared_externally,
        },
        provider_checksum: record.checksum,
        sender: record.sender,
        thread_id: record.thread_id,
        category: Category::Other,
    };
    entry.category = categorize(&EntryTraits::of(&entry));
    entry
}

fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(str::trim)
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicBool, Arc};
    use std::time::Instant;

    use super::{normalize_path, LocationResolver, ScanLimits, SourceScanner};
    use crate::config::AuditConfig;
    use crate::model::{
        Category, IssueKind, QuotaUsage, ScanPhase, SourceKind, TruncationReason,
        UNRESOLVED_LOCATION,
    };
    use crate::source::{EntrySource, FolderRecord, MemorySource, RecordLocation, SourceRecord};

    fn folder(id: &str, name: &str, parent: Option<&str>) -> FolderRecord {
        FolderRecord {
            id: id.to_string(),
            name: name.to_string(),
            location: RecordLocation::Parent(parent.map(str::to_string)),
        }
    }

    fn record(id: &str, name: &str, location: &str) -> SourceRecord {
        let mut record = SourceRecord::new(id, name, 100);
        record.location = RecordLocation::Path(location.to_string());
        record
    }

    fn child_of(id: &str, name: &str, parent: &str) -> SourceRecord {
        let mut record = SourceRecord::new(id, name, 100);
        record.location = RecordLocation::Parent(Some(parent.to_string()));
        record
    }

    #[test]
    fn resolves_parent_chains_and_cuts_cycles() {
        let folders = vec![
            folder("root", "Clients", None),
            folder("smith", "Smith/Jones", Some("root")),
            folder("loop-a", "A", Some("loop-b")),
            folder("loop-b", "B", Some("loop-a")),
        ];
        let mut resolver = LocationResolver::new(&folders);
        assert_eq!(
            resolver.resolve(&RecordLocation::Parent(Some("smith".to_string()))),
            "Clients/Smith-Jones"
        );
        assert_eq!(
            resolver.resolve(&RecordLocation::Parent(Some("unknown".to_string()))),
            UNRESOLVED_LOCATION
        );
        assert_eq!(
            resolver.resolve(&RecordLocation::Parent(Some("loop-a".to_string()))),
            ""
        );
        assert_eq!(
            resolver.resolve(&RecordLocation::Parent(Some("loop-b".to_string()))),
            ""
        );
        assert_eq!(
            resolver.resolve(&RecordLocation::Parent(Some("loop-a".to_string()))),
            ""
        );
        assert_eq!(resolver.cycles, 1);
    }

    #[test]
    fn chain_through_an_unlisted_folder_is_unresolved() {
        let folders = vec![folder("smith", "Smith", Some("shared-drive"))];
        let mut resolver = LocationResolver::new(&folders);
        assert_eq!(
            resolver.resolve(&RecordLocation::Parent(Some("smith".to_string()))),
            UNRESOLVED_LOCATION
        );
        assert_eq!(resolver.resolve(&RecordLocation::Parent(None)), "");
    }

    #[test]
    fn looping_folder_is_reported_once() {
        let source = MemorySource::new("drive", SourceKind::CloudDrive)
            .with_folder(folder("loop-a", "A", Some("loop-b")))
            .with_folder(folder("loop-b", "B", Some("loop-a")))
            .with_entry(child_of("d1", "memo.pdf", "loop-a"))
            .with_entry(child_of("d2", "letter.pdf", "loop-b"))
            .with_entry(child_of("d3", "notes.pdf", "loop-a"));
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &ScanLimits::default());
        assert_eq!(report.totals.root_entries, 3);
        let cycle_warnings = report
            .warnings
            .iter()
            .filter(|warning| warning.contains("cycle"))
            .collect::<Vec<_>>();
        assert_eq!(cycle_warnings.len(), 1);
        assert!(cycle_warnings[0].starts_with("1 folder parent chain(s)"));
    }

    #[test]
    fn folders_listed_after_capped_entries_still_resolve() {
        let mut source = MemorySource::new("drive", SourceKind::CloudDrive);
        for index in 0..60 {
            source = source.with_entry(child_of(
                &format!("d{index}"),
                &format!("Engagement {index}.pdf"),
                "f1",
            ));
        }
        let source = source.with_folder(folder("f1", "Clients", None));
        let limits = ScanLimits {
            max_entries: 55,
            ..ScanLimits::default()
        };
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &limits);
        assert!(report.completed);
        assert_eq!(report.truncated, Some(TruncationReason::MaxEntries));
        assert_eq!(report.totals.entries, 55);
        assert_eq!(report.totals.folders, 1);
        assert_eq!(report.totals.root_entries, 0);
        assert_eq!(report.totals.unresolved_entries, 0);
        assert!(report
            .findings
            .iter()
            .all(|finding| finding.kind != IssueKind::TooManyRootEntries));
    }

    #[test]
    fn unlisted_parent_is_not_counted_as_root() {
        let mut source = MemorySource::new("drive", SourceKind::CloudDrive);
        for index in 0..60 {
            source = source.with_entry(child_of(
                &format!("d{index}"),
                &format!("Engagement {index}.pdf"),
                "shared-elsewhere",
            ));
        }
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &ScanLimits::default());
        assert!(report.completed);
        assert_eq!(report.totals.root_entries, 0);
        assert_eq!(report.totals.unresolved_entries, 60);
        assert_eq!(report.structure.node_count, 0);
        assert!(report
            .findings
            .iter()
            .all(|finding| finding.kind != IssueKind::TooManyRootEntries));
        assert!(report
            .warnings
            .iter()
            .any(|warning| warning.starts_with("60 entries have a parent folder that was not listed")));
    }

    #[test]
    fn normalizes_slashes() {
        assert_eq!(normalize_path("/a//b/ "), "a/b");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn unavailable_source_seals_failed_report() {
        let scanner = SourceScanner::new(
            MemorySource::new("drive", SourceKind::CloudDrive).unavailable("token expired"),
        );
        let mut phases = Vec::new();
        let report = scanner.scan_with_callback(
            &AuditConfig::default(),
            &ScanLimits::default(),
            |event| phases.push(event.phase),
        );
        assert!(!report.completed);
        assert!(report
            .error
            .as_deref()
            .is_some_and(|error| error.contains("token expired")));
        assert_eq!(phases, vec![ScanPhase::Listing, ScanPhase::Sealed]);
    }

    #[test]
    fn max_entries_truncates_listing() {
        let mut source = MemorySource::new("fs", SourceKind::Filesystem);
        for index in 0..5 {
            source = source.with_entry(record(&format!("e{index}"), "brief.pdf", "clients"));
        }
        let limits = ScanLimits {
            max_entries: 3,
            ..ScanLimits::default()
        };
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &limits);
        assert!(report.completed);
        assert_eq!(report.totals.entries, 3);
        assert_eq!(report.truncated, Some(TruncationReason::MaxEntries));
        assert_eq!(report.totals.declared_total, Some(5));
    }

    #[test]
    fn exact_max_entries_is_not_truncated() {
        let source = MemorySource::new("fs", SourceKind::Filesystem)
            .with_entry(record("a", "a.pdf", ""))
            .with_entry(record("b", "b.pdf", ""));
        let limits = ScanLimits {
            max_entries: 2,
            ..ScanLimits::default()
        };
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &limits);
        assert_eq!(report.truncated, None);
        assert_eq!(report.totals.entries, 2);
    }

    #[test]
    fn cancellation_truncates_without_failing() {
        let source = MemorySource::new("fs", SourceKind::Filesystem)
            .with_entry(record("a", "a.pdf", ""));
        let limits = ScanLimits {
            cancel_flag: Some(Arc::new(AtomicBool::new(true))),
            ..ScanLimits::default()
        };
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &limits);
        assert!(report.completed);
        assert_eq!(report.truncated, Some(TruncationReason::Cancelled));
        assert_eq!(report.totals.entries, 0);
    }

    #[test]
    fn passed_deadline_truncates_and_skips_duplicate_detection() {
        let source = MemorySource::new("fs", SourceKind::Filesystem)
            .with_content(SourceRecord::new("a", "a.pdf", 0), vec![7_u8; 4096])
            .with_content(SourceRecord::new("b", "b.pdf", 0), vec![7_u8; 4096]);
        let limits = ScanLimits {
            deadline: Some(Instant::now()),
            ..ScanLimits::default()
        };
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &limits);
        assert!(report.completed);
        assert_eq!(report.truncated, Some(TruncationReason::Deadline));
        assert!(report.duplicates.is_empty());
        assert!(report
            .warnings
            .iter()
            .any(|warning| warning.contains("duplicate detection skipped")));
    }

    #[test]
    fn unreadable_content_is_counted_and_the_scan_still_seals() {
        let source = MemorySource::new("fs", SourceKind::Filesystem)
            .with_content(record("a", "ledger.xlsx", "accounts"), vec![1_u8; 4096])
            .with_content(record("b", "ledger copy.xlsx", "accounts"), vec![1_u8; 4096])
            .with_content(record("c", "ledger old.xlsx", "archive"), vec![1_u8; 4096])
            .with_unreadable_content("c");
        let report = SourceScanner::from_boxed(Box::new(source))
            .scan(&AuditConfig::default(), &ScanLimits::default());
        assert!(report.completed);
        assert_eq!(report.totals.entries, 3);
        assert_eq!(report.totals.dedupe_skipped_entries, 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].members, vec!["a", "b"]);
    }

    #[test]
    fn memory_source_quota_reaches_the_report() {
        let source = MemorySource::new("drive", SourceKind::CloudDrive)
            .with_entry(record("a", "brief.pdf", "clients"))
            .with_quota(QuotaUsage {
                used_bytes: 90,
                limit_bytes: 100,
            });
        assert_eq!(source.quota().map(|quota| quota.used_bytes), Some(90));
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &ScanLimits::default());
        assert_eq!(report.quota.map(|quota| quota.limit_bytes), Some(100));
        assert!(report
            .findings
            .iter()
            .any(|finding| finding.kind == IssueKind::HighStorageUsage));
    }

    #[test]
    fn broken_records_are_counted_and_skipped() {
        let source = MemorySource::new("fs", SourceKind::Filesystem)
            .with_entry(record("a", "Engagement Agreement.pdf", "clients/smith"))
            .with_broken_record("b")
            .with_entry(record("c", "photo.jpg", ""));
        let report = SourceScanner::new(source).scan(&AuditConfig::default(), &ScanLimits::default());
        assert!(report.completed);
        assert_eq!(report.totals.entries, 2);
        assert_eq!(report.totals.skipped_entries, 1);
        assert_eq!(report.totals.root_entries, 1);
        assert_eq!(report.categories[&Category::LegalContracts].count, 1);
        assert_eq!(report.categories[&Category::Images].count, 1);
        assert!(report.warnings.iter().any(|warning| warning.contains("skipped record")));
    }

    #[test]
    fn warnings_are_capped() {
        let mut source = MemorySource::new("fs", SourceKind::Filesystem);
        for index in 0..10 {
            source = source.with_broken_record(format!("bad-{index}"));
        }
        let mut config = AuditConfig::default();
        config.limits.max_warnings = 3;
        let report = SourceScanner::new(source).scan(&config, &ScanLimits::default());
        assert_eq!(report.totals.skipped_entries, 10);
        assert_eq!(report.warnings.len(), 4);
        assert!(report.warnings[3].contains("7 further"));
    }
}
