use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Every tunable threshold of a run. Missing fields fall back to the defaults
/// so a partial JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuditConfig {
    pub limits: ScanLimitsConfig,
    pub dedupe: DedupeConfig,
    pub structure: StructureConfig,
    pub naming: NamingConfig,
    pub issues: IssueThresholds,
    pub savings: SavingsModel,
    pub mailbox: MailboxConfig,
    pub filesystem: FilesystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanLimitsConfig {
    pub max_entries: usize,
    pub timeout_secs: Option<u64>,
    pub max_parallel_sources: usize,
    pub max_warnings: usize,
}

impl Default for ScanLimitsConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            timeout_secs: None,
            max_parallel_sources: 4,
            max_warnings: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    #[default]
    FirstSeen,
    OldestModified,
    NewestModified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupeConfig {
    pub enabled: bool,
    /// Entries must be strictly larger than this to be fingerprinted.
    pub min_size_bytes: u64,
    pub keep_policy: KeepPolicy,
    pub parallel_reads: bool,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size_bytes: 1024,
            keep_policy: KeepPolicy::FirstSeen,
            parallel_reads: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructureConfig {
    pub deep_folder_depth: usize,
    pub crowded_max_depth: usize,
    pub crowded_folder_entries: u64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            deep_folder_depth: 6,
            crowded_max_depth: 1,
            crowded_folder_entries: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NamingConfig {
    pub sample_size: usize,
    pub descriptive_min_chars: usize,
    pub generic_max_chars: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            descriptive_min_chars: 15,
            generic_max_chars: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IssueThresholds {
    pub storage_usage_ratio: f64,
    pub uncategorized_ratio: f64,
    pub shared_entries: u64,
    pub root_entries: u64,
    pub max_folder_depth: usize,
    pub crowded_folders: u64,
    pub spaces_ratio: f64,
    pub dated_names_ratio: f64,
}

impl Default for IssueThresholds {
    fn default() -> Self {
        Self {
            storage_usage_ratio: 0.80,
            uncategorized_ratio: 0.20,
            shared_entries: 50,
            root_entries: 50,
            max_folder_depth: 8,
            crowded_folders: 5,
            spaces_ratio: 0.30,
            dated_names_ratio: 0.10,
        }
    }
}

/// Weekly hours a practice spends per subject area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkloadBaselines {
    pub intake: f64,
    pub documents: f64,
    pub case_management: f64,
    pub billing: f64,
    pub admin: f64,
    pub security: f64,
}

impl Default for WorkloadBaselines {
    fn default() -> Self {
        Self {
            intake: 8.0,
            documents: 12.0,
            case_management: 6.0,
            billing: 4.0,
            admin: 10.0,
            security: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SavingsFactors {
    pub waste: f64,
    pub optimization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SavingsModel {
    pub baselines: WorkloadBaselines,
    /// Health below this uses `poor` factors.
    pub poor_health_below: f64,
    /// Health below this (and at or above `poor_health_below`) uses `fair` factors.
    pub fair_health_below: f64,
    pub poor: SavingsFactors,
    pub fair: SavingsFactors,
    pub good: SavingsFactors,
    pub min_weekly_savings_hours: f64,
    pub escalate_below_health: f64,
    pub easy_distance: f64,
    pub medium_distance: f64,
    pub easy_duplicate_groups: u64,
    pub medium_duplicate_groups: u64,
}

impl Default for SavingsModel {
    fn default() -> Self {
        Self {
            baselines: WorkloadBaselines::default(),
            poor_health_below: 40.0,
            fair_health_below: 70.0,
            poor: SavingsFactors {
                waste: 0.7,
                optimization: 0.6,
            },
            fair: SavingsFactors {
                waste: 0.4,
                optimization: 0.5,
            },
            good: SavingsFactors {
                waste: 0.15,
                optimization: 0.4,
            },
            min_weekly_savings_hours: 0.5,
            escalate_below_health: 25.0,
            easy_distance: 0.5,
            medium_distance: 1.5,
            easy_duplicate_groups: 5,
            medium_duplicate_groups: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MailboxConfig {
    pub subject_chars: usize,
    /// A subject seen more than this many times is a medium-confidence template.
    pub template_repeats: u64,
    /// A subject seen more than this many times is a high-confidence template.
    pub strong_template_repeats: u64,
    pub max_template_candidates: usize,
    pub workflow_share: f64,
    pub min_response_hours: f64,
    pub max_response_hours: f64,
    pub slow_response_hours: f64,
    pub max_folders: u64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            subject_chars: 60,
            template_repeats: 1,
            strong_template_repeats: 3,
            max_template_candidates: 50,
            workflow_share: 0.10,
            min_response_hours: 0.1,
            max_response_hours: 720.0,
            slow_response_hours: 24.0,
            max_folders: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesystemConfig {
    pub excluded_dirs: Vec<String>,
    pub excluded_extensions: Vec<String>,
    pub skip_hidden: bool,
    pub excludes: Vec<String>,
    pub max_depth: Option<usize>,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: [
                ".git",
                ".svn",
                "node_modules",
                "__pycache__",
                "venv",
                "env",
                "Library",
                "AppData",
                "Cookies",
                "Recent",
                "Temp",
                "Temporary",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
            excluded_extensions: ["tmp", "temp", "cache", "lock"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            skip_hidden: true,
            excludes: Vec::new(),
            max_depth: None,
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_entries == 0 {
            return Err(ConfigError::invalid(
                "limits.max_entries",
                "must be greater than zero",
            ));
        }
        if self.limits.max_parallel_sources == 0 {
            return Err(ConfigError::invalid(
                "limits.max_parallel_sources",
                "must be greater than zero",
            ));
        }
        if self.limits.timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "limits.timeout_secs",
                "must be greater than zero when set",
            ));
        }
        if self.naming.sample_size == 0 {
            return Err(ConfigError::invalid(
                "naming.sample_size",
                "must be greater than zero",
            ));
        }
        if self.structure.deep_folder_depth == 0 {
            return Err(ConfigError::invalid(
                "structure.deep_folder_depth",
                "must be greater than zero",
            ));
        }

        check_ratio("issues.storage_usage_ratio", self.issues.storage_usage_ratio)?;
        check_ratio("issues.uncategorized_ratio", self.issues.uncategorized_ratio)?;
        check_ratio("issues.spaces_ratio", self.issues.spaces_ratio)?;
        check_ratio("issues.dated_names_ratio", self.issues.dated_names_ratio)?;
        check_ratio("mailbox.workflow_share", self.mailbox.workflow_share)?;

        let baselines = &self.savings.baselines;
        for (field, hours) in [
            ("savings.baselines.intake", baselines.intake),
            ("savings.baselines.documents", baselines.documents),
            ("savings.baselines.case_management", baselines.case_management),
            ("savings.baselines.billing", baselines.billing),
            ("savings.baselines.admin", baselines.admin),
            ("savings.baselines.security", baselines.security),
            (
                "savings.min_weekly_savings_hours",
                self.savings.min_weekly_savings_hours,
            ),
        ] {
            check_non_negative(field, hours)?;
        }

        for (field, factors) in [
            ("savings.poor", self.savings.poor),
            ("savings.fair", self.savings.fair),
            ("savings.good", self.savings.good),
        ] {
            if !(0.0..=1.0).contains(&factors.waste) || !(0.0..=1.0).contains(&factors.optimization)
            {
                return Err(ConfigError::invalid(
                    field,
                    "waste and optimization factors must be between 0.0 and 1.0",
                ));
            }
        }

        let savings = &self.savings;
        if !(0.0 < savings.poor_health_below
            && savings.poor_health_below < savings.fair_health_below
            && savings.fair_health_below <= 100.0)
        {
            return Err(ConfigError::invalid(
                "savings.fair_health_below",
                "health bands must satisfy 0 < poor_health_below < fair_health_below <= 100",
            ));
        }
        if !(0.0..=100.0).contains(&savings.escalate_below_health) {
            return Err(ConfigError::invalid(
                "savings.escalate_below_health",
                "must be between 0 and 100",
            ));
        }
        if !(savings.easy_distance >= 0.0 && savings.easy_distance <= savings.medium_distance) {
            return Err(ConfigError::invalid(
                "savings.medium_distance",
                "effort distances must satisfy 0 <= easy_distance <= medium_distance",
            ));
        }
        if savings.easy_duplicate_groups > savings.medium_duplicate_groups {
            return Err(ConfigError::invalid(
                "savings.medium_duplicate_groups",
                "must not be smaller than easy_duplicate_groups",
            ));
        }

        let mailbox = &self.mailbox;
        if mailbox.subject_chars == 0 {
            return Err(ConfigError::invalid(
                "mailbox.subject_chars",
                "must be greater than zero",
            ));
        }
        if mailbox.template_repeats > mailbox.strong_template_repeats {
            return Err(ConfigError::invalid(
                "mailbox.strong_template_repeats",
                "must not be smaller than template_repeats",
            ));
        }
        if !(mailbox.min_response_hours >= 0.0
            && mailbox.min_response_hours < mailbox.max_response_hours)
        {
            return Err(ConfigError::invalid(
                "mailbox.max_response_hours",
                "response window must satisfy 0 <= min_response_hours < max_response_hours",
            ));
        }
        check_non_negative("mailbox.slow_response_hours", mailbox.slow_response_hours)?;

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<AuditConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AuditConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

fn check_ratio(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be within (0.0, 1.0]"))
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            "must be a finite, non-negative number",
        ))
    }
}
