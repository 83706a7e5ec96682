pub mod categorize;
pub mod config;
pub mod coordinator;
pub mod dedupe;
pub mod error;
pub mod format;
pub mod issues;
pub mod mailbox;
pub mod markdown;
pub mod model;
pub mod naming;
pub mod narrative;
pub mod recommend;
pub mod scan;
pub mod source;
pub mod structure;

pub use categorize::{categorize, category_usage, CategoryRule, EntryTraits, CATEGORY_RULES};
pub use config::{
    load_config, AuditConfig, DedupeConfig, FilesystemConfig, IssueThresholds, KeepPolicy,
    MailboxConfig, NamingConfig, SavingsModel, ScanLimitsConfig, StructureConfig,
};
pub use coordinator::{consolidate_reports, Consolidation, Coordinator, RunOptions};
pub use dedupe::{find_duplicates, ContentAccess, ContentProvider, DedupeOutcome};
pub use error::{ConfigError, EntryReadError, GenerationError, SourceUnavailableError};
pub use format::{human_bytes, load_result, render_text_summary, to_json, write_json};
pub use issues::{detect_issues, IssueOutcome, SourceStats};
pub use mailbox::analyze_mailbox;
pub use markdown::render_markdown_report;
pub use model::{
    Category, CategoryUsage, ConsolidatedResult, DuplicateGroup, Effort, Entry, FailedSource,
    Finding, FindingBuckets, IssueKind, MailboxInsights, Narrative, NarrativeOrigin, Priority,
    QuotaUsage, Recommendation, RuleTrace, RuleTraceStatus, RunStatistics, ScanPhase,
    ScanProgressEvent, ScanReport, Severity, SourceKind, TruncationReason, RESULT_VERSION,
    UNRESOLVED_LOCATION,
};
pub use naming::analyze_naming;
pub use narrative::{narrate, NarrativeInput, TextGenerator, CONSULTANT_PROMPT};
pub use recommend::{rank_recommendations, synthesize_recommendations};
pub use scan::{ScanLimits, SourceScanner};
pub use source::{
    DriveManifest, DriveManifestSource, EntrySource, FilesystemSource, FolderRecord, ListedItem,
    Listing, MailboxManifest, MailboxManifestSource, MemorySource, RecordLocation, SourceRecord,
};
pub use structure::analyze_structure;
