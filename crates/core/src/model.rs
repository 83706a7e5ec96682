use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const RESULT_VERSION: &str = "1.0.0";

pub const MESSAGE_CONTENT_TYPE: &str = "message/rfc822";

/// Location given to entries whose parent folder was never listed.
pub const UNRESOLVED_LOCATION: &str = "(unresolved)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Filesystem,
    CloudDrive,
    Mailbox,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Filesystem => "filesystem",
            SourceKind::CloudDrive => "cloud_drive",
            SourceKind::Mailbox => "mailbox",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EntryFlags {
    #[serde(default)]
    pub shared_externally: bool,
}

/// One scanned file or message. Built once by the scanner and never changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// `/`-separated folder path relative to the scan root; empty for root-level entries.
    pub location: String,
    #[serde(default)]
    pub flags: EntryFlags,
    #[serde(default)]
    pub provider_checksum: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub category: Category,
}

impl Entry {
    pub fn is_message(&self) -> bool {
        self.content_type.as_deref() == Some(MESSAGE_CONTENT_TYPE)
    }

    pub fn depth(&self) -> usize {
        location_depth(&self.location)
    }

    pub fn is_root_level(&self) -> bool {
        self.location.is_empty()
    }

    pub fn has_unresolved_location(&self) -> bool {
        self.location == UNRESOLVED_LOCATION
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
    }
}

pub fn location_depth(location: &str) -> usize {
    location
        .split('/')
        .filter(|component| !component.is_empty())
        .count()
}

pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Documents,
    Spreadsheets,
    Presentations,
    Images,
    Archives,
    Executables,
    Code,
    LegalContracts,
    LegalPleadings,
    LegalDiscovery,
    LegalCorrespondence,
    Billing,
    GoogleDocs,
    GoogleSheets,
    GoogleSlides,
    GoogleForms,
    GoogleFiles,
    ClientCommunication,
    CourtDeadline,
    Marketing,
    Admin,
    Other,
}

impl Category {
    pub const ALL: [Category; 22] = [
        Category::Documents,
        Category::Spreadsheets,
        Category::Presentations,
        Category::Images,
        Category::Archives,
        Category::Executables,
        Category::Code,
        Category::LegalContracts,
        Category::LegalPleadings,
        Category::LegalDiscovery,
        Category::LegalCorrespondence,
        Category::Billing,
        Category::GoogleDocs,
        Category::GoogleSheets,
        Category::GoogleSlides,
        Category::GoogleForms,
        Category::GoogleFiles,
        Category::ClientCommunication,
        Category::CourtDeadline,
        Category::Marketing,
        Category::Admin,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Documents => "documents",
            Category::Spreadsheets => "spreadsheets",
            Category::Presentations => "presentations",
            Category::Images => "images",
            Category::Archives => "archives",
            Category::Executables => "executables",
            Category::Code => "code",
            Category::LegalContracts => "legal_contracts",
            Category::LegalPleadings => "legal_pleadings",
            Category::LegalDiscovery => "legal_discovery",
            Category::LegalCorrespondence => "legal_correspondence",
            Category::Billing => "billing",
            Category::GoogleDocs => "google_docs",
            Category::GoogleSheets => "google_sheets",
            Category::GoogleSlides => "google_slides",
            Category::GoogleForms => "google_forms",
            Category::GoogleFiles => "google_files",
            Category::ClientCommunication => "client_communication",
            Category::CourtDeadline => "court_deadline",
            Category::Marketing => "marketing",
            Category::Admin => "admin",
            Category::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CategoryUsage {
    pub count: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintConfidence {
    Content,
    ProviderChecksum,
    Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateGroup {
    pub fingerprint: String,
    pub size_bytes: u64,
    /// Entry ids in scan order.
    pub members: Vec<String>,
    pub kept: String,
    pub wasted_bytes: u64,
    pub confidence: FingerprintConfidence,
}

impl DuplicateGroup {
    pub fn redundant_count(&self) -> u64 {
        (self.members.len() as u64).saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn escalated(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium | Priority::High => Priority::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl From<Severity> for Priority {
    fn from(value: Severity) -> Self {
        match value {
            Severity::High => Priority::High,
            Severity::Medium => Priority::Medium,
            Severity::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Easy,
    Medium,
    Hard,
}

impl Effort {
    pub fn label(&self) -> &'static str {
        match self {
            Effort::Easy => "easy",
            Effort::Medium => "medium",
            Effort::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    HighStorageUsage,
    ManyUncategorizedFiles,
    ExcessiveSharedEntries,
    TooManyRootEntries,
    FolderDepthTooDeep,
    OvercrowdedTopLevel,
    InconsistentNaming,
    DuplicateWaste,
    MissingTemporalMetadata,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::HighStorageUsage => "high_storage_usage",
            IssueKind::ManyUncategorizedFiles => "many_uncategorized_files",
            IssueKind::ExcessiveSharedEntries => "excessive_shared_entries",
            IssueKind::TooManyRootEntries => "too_many_root_entries",
            IssueKind::FolderDepthTooDeep => "folder_depth_too_deep",
            IssueKind::OvercrowdedTopLevel => "overcrowded_top_level",
            IssueKind::InconsistentNaming => "inconsistent_naming",
            IssueKind::DuplicateWaste => "duplicate_waste",
            IssueKind::MissingTemporalMetadata => "missing_temporal_metadata",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub source_id: String,
    pub source_kind: SourceKind,
    pub severity: Severity,
    pub kind: IssueKind,
    pub description: String,
    pub impact: String,
    pub observed: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub priority: Priority,
    pub area: String,
    pub title: String,
    pub description: String,
    pub weekly_savings_hours: f64,
    pub effort: Effort,
    pub source_id: String,
    pub source_kind: SourceKind,
    #[serde(default)]
    pub finding: Option<IssueKind>,
    #[serde(default)]
    pub health_percent: f64,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScanTotals {
    pub entries: u64,
    pub folders: u64,
    pub bytes: u64,
    pub skipped_entries: u64,
    pub dedupe_skipped_entries: u64,
    pub shared_entries: u64,
    pub root_entries: u64,
    #[serde(default)]
    pub unresolved_entries: u64,
    #[serde(default)]
    pub declared_total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderConcern {
    pub location: String,
    pub depth: usize,
    pub entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StructureAnalysis {
    pub node_count: u64,
    pub max_depth: usize,
    pub avg_depth: f64,
    pub depth_histogram: BTreeMap<usize, u64>,
    pub max_entries_per_folder: u64,
    pub avg_entries_per_folder: f64,
    pub deep_folders: Vec<FolderConcern>,
    pub shallow_crowded_folders: Vec<FolderConcern>,
}

/// Fractions in `[0, 1]` over a representative sample of entry names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NamingStats {
    pub sample_size: u64,
    pub spaces_fraction: f64,
    pub date_fraction: f64,
    pub case_marker_fraction: f64,
    pub case_number_fraction: f64,
    pub special_chars_fraction: f64,
    pub descriptive_fraction: f64,
    pub generic_fraction: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl QuotaUsage {
    pub fn usage_fraction(&self) -> Option<f64> {
        if self.limit_bytes == 0 {
            return None;
        }
        Some(self.used_bytes as f64 / self.limit_bytes as f64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateConfidence {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateCandidate {
    pub subject: String,
    pub count: u64,
    pub confidence: TemplateConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowShare {
    pub category: Category,
    pub volume: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MailboxInsights {
    pub analyzed_messages: u64,
    pub template_candidates: Vec<TemplateCandidate>,
    pub workflows: Vec<WorkflowShare>,
    #[serde(default)]
    pub avg_response_hours: Option<f64>,
    pub response_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleTrace {
    pub rule_id: String,
    pub status: RuleTraceStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleTraceStatus {
    Emitted,
    #[default]
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    MaxEntries,
    Deadline,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Listing,
    Categorizing,
    Dedupe,
    Analyzing,
    Recommending,
    Sealed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanProgressEvent {
    pub seq: u64,
    pub source_id: String,
    pub phase: ScanPhase,
    pub entries: u64,
    pub skipped: u64,
    pub timestamp: String,
}

/// Sealed per-source output of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanReport {
    pub source_id: String,
    pub source_kind: SourceKind,
    pub scanned_at: String,
    pub totals: ScanTotals,
    pub categories: BTreeMap<Category, CategoryUsage>,
    pub duplicates: Vec<DuplicateGroup>,
    pub structure: StructureAnalysis,
    pub naming: NamingStats,
    #[serde(default)]
    pub quota: Option<QuotaUsage>,
    #[serde(default)]
    pub mailbox: Option<MailboxInsights>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub rule_traces: Vec<RuleTrace>,
    #[serde(default)]
    pub truncated: Option<TruncationReason>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub completed: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScanReport {
    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates
            .iter()
            .map(|group| group.wasted_bytes)
            .fold(0_u64, u64::saturating_add)
    }

    pub fn top_categories(&self, limit: usize) -> Vec<(Category, CategoryUsage)> {
        let mut categories = self
            .categories
            .iter()
            .map(|(category, usage)| (*category, *usage))
            .collect::<Vec<_>>();
        categories.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));
        categories.truncate(limit);
        categories
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FindingBuckets {
    pub high: Vec<Finding>,
    pub medium: Vec<Finding>,
    pub low: Vec<Finding>,
}

impl FindingBuckets {
    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::High => self.high.push(finding),
            Severity::Medium => self.medium.push(finding),
            Severity::Low => self.low.push(finding),
        }
    }

    pub fn total(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    /// Findings ordered high, medium, low.
    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.high
            .iter()
            .chain(self.medium.iter())
            .chain(self.low.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedSource {
    pub source_id: String,
    pub source_kind: SourceKind,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunStatistics {
    pub sources_scanned: u64,
    pub sources_failed: u64,
    pub total_entries: u64,
    pub total_folders: u64,
    pub total_bytes: u64,
    pub skipped_entries: u64,
    pub duplicate_groups: u64,
    pub wasted_bytes: u64,
    pub total_findings: u64,
    pub total_recommendations: u64,
    pub categories: BTreeMap<Category, CategoryUsage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeOrigin {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Narrative {
    pub text: String,
    pub origin: NarrativeOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolidatedResult {
    pub result_version: String,
    pub run_id: String,
    pub generated_at: String,
    pub reports: Vec<ScanReport>,
    pub findings: FindingBuckets,
    pub recommendations: Vec<Recommendation>,
    pub total_weekly_savings_hours: f64,
    pub failed_sources: Vec<FailedSource>,
    pub statistics: RunStatistics,
    pub narrative: Narrative,
}
