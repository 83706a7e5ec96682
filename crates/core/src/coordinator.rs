use std::sync::{atomic::AtomicBool, Arc};

use chrono::{SecondsFormat, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuditConfig;
use crate::error::ConfigError;
use crate::model::{
    ConsolidatedResult, FailedSource, FindingBuckets, Recommendation, RunStatistics,
    ScanProgressEvent, ScanReport, RESULT_VERSION,
};
use crate::narrative::{narrate, narrative_input, TextGenerator};
use crate::recommend::rank_recommendations;
use crate::scan::{ScanLimits, SourceScanner};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub run_id: Option<String>,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

/// Everything a run derives from its sealed reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consolidation {
    pub findings: FindingBuckets,
    pub recommendations: Vec<Recommendation>,
    pub total_weekly_savings_hours: f64,
    pub failed_sources: Vec<FailedSource>,
    pub statistics: RunStatistics,
}

/// Runs scanners in parallel and merges their reports. Holds no state
/// between runs.
pub struct Coordinator {
    config: AuditConfig,
    generator: Option<Box<dyn TextGenerator>>,
}

impl Coordinator {
    pub fn new(config: AuditConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            generator: None,
        })
    }

    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn run(&self, scanners: &[SourceScanner], options: &RunOptions) -> ConsolidatedResult {
        self.run_with_callback(scanners, options, |_| {})
    }

    pub fn run_with_callback<F>(
        &self,
        scanners: &[SourceScanner],
        options: &RunOptions,
        on_event: F,
    ) -> ConsolidatedResult
    where
        F: Fn(ScanProgressEvent) + Sync,
    {
        let run_id = options
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(run_id = %run_id, sources = scanners.len(), "audit run started");

        let scan_one = |scanner: &SourceScanner| {
            let limits = ScanLimits::from_config(&self.config.limits, options.cancel_flag.clone());
            scanner.scan_with_callback(&self.config, &limits, &on_event)
        };
        let reports: Vec<ScanReport> = match ThreadPoolBuilder::new()
            .num_threads(self.config.limits.max_parallel_sources)
            .build()
        {
            Ok(pool) => pool.install(|| scanners.par_iter().map(&scan_one).collect()),
            Err(err) => {
                warn!(error = %err, "thread pool unavailable; scanning sequentially");
                scanners.iter().map(&scan_one).collect()
            }
        };

        let consolidation = consolidate_reports(&reports);
        let input = narrative_input(
            &consolidation.statistics,
            &consolidation.findings,
            &consolidation.recommendations,
            consolidation.total_weekly_savings_hours,
        );
        let narrative = narrate(self.generator.as_deref(), &input);

        info!(
            run_id = %run_id,
            scanned = consolidation.statistics.sources_scanned,
            failed = consolidation.statistics.sources_failed,
            findings = consolidation.statistics.total_findings,
            "audit run finished"
        );

        ConsolidatedResult {
            result_version: RESULT_VERSION.to_string(),
            run_id,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            reports,
            findings: consolidation.findings,
            recommendations: consolidation.recommendations,
            total_weekly_savings_hours: consolidation.total_weekly_savings_hours,
            failed_sources: consolidation.failed_sources,
            statistics: consolidation.statistics,
            narrative,
        }
    }
}

/// Merges sealed reports. Incomplete reports only contribute to
/// `failed_sources`.
pub fn consolidate_reports(reports: &[ScanReport]) -> Consolidation {
    let mut out = Consolidation::default();

    for report in reports {
        if !report.completed {
            out.failed_sources.push(FailedSource {
                source_id: report.source_id.clone(),
                source_kind: report.source_kind,
                error: report
                    .error
                    .clone()
                    .unwrap_or_else(|| "scan did not complete".to_string()),
            });
            out.statistics.sources_failed += 1;
            continue;
        }

        let stats = &mut out.statistics;
        stats.sources_scanned += 1;
        stats.total_entries += report.totals.entries;
        stats.total_folders += report.totals.folders;
        stats.total_bytes = stats.total_bytes.saturating_add(report.totals.bytes);
        stats.skipped_entries += report.totals.skipped_entries;
        stats.duplicate_groups += report.duplicates.len() as u64;
        stats.wasted_bytes = stats.wasted_bytes.saturating_add(report.wasted_bytes());
        for (category, usage) in &report.categories {
            let merged = stats.categories.entry(*category).or_default();
            merged.count += usage.count;
            merged.bytes = merged.bytes.saturating_add(usage.bytes);
        }

        for finding in &report.findings {
            out.findings.push(finding.clone());
        }
        out.recommendations
            .extend(report.recommendations.iter().cloned());
    }

    rank_recommendations(&mut out.recommendations);
    out.total_weekly_savings_hours = out
        .recommendations
        .iter()
        .map(|rec| rec.weekly_savings_hours)
        .sum();
    out.statistics.total_findings = out.findings.total() as u64;
    out.statistics.total_recommendations = out.recommendations.len() as u64;
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{consolidate_reports, Coordinator, RunOptions};
    use crate::config::AuditConfig;
    use crate::error::{ConfigError, GenerationError};
    use crate::model::{NarrativeOrigin, ScanPhase, SourceKind};
    use crate::narrative::{NarrativeInput, TextGenerator};
    use crate::scan::SourceScanner;
    use crate::source::{MemorySource, SourceRecord};

    struct Echo;

    impl TextGenerator for Echo {
        fn generate(&self, input: &NarrativeInput, _prompt: &str) -> Result<String, GenerationError> {
            Ok(format!("{} sources reviewed", input.sources_scanned))
        }
    }

    fn scanners() -> Vec<SourceScanner> {
        let files = MemorySource::new("files", SourceKind::Filesystem)
            .with_entry(SourceRecord::new("a.pdf", "a.pdf", 10))
            .with_entry(SourceRecord::new("b.docx", "b.docx", 20));
        let mail = MemorySource::new("mail", SourceKind::Mailbox).unavailable("login rejected");
        vec![SourceScanner::new(files), SourceScanner::new(mail)]
    }

    #[test]
    fn invalid_config_fails_before_any_scan() {
        let mut config = AuditConfig::default();
        config.limits.max_parallel_sources = 0;
        assert!(matches!(
            Coordinator::new(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn failed_sources_are_listed_not_counted() {
        let coordinator = Coordinator::new(AuditConfig::default()).expect("config");
        let result = coordinator.run(&scanners(), &RunOptions::default());

        assert_eq!(result.reports.len(), 2);
        assert_eq!(result.reports[0].source_id, "files");
        assert_eq!(result.statistics.sources_scanned, 1);
        assert_eq!(result.statistics.sources_failed, 1);
        assert_eq!(result.statistics.total_entries, 2);
        assert_eq!(result.failed_sources.len(), 1);
        assert_eq!(result.failed_sources[0].source_id, "mail");
        assert!(result.failed_sources[0].error.contains("login rejected"));
        assert_eq!(result.narrative.origin, NarrativeOrigin::Fallback);
    }

    #[test]
    fn zero_sources_yield_an_empty_result() {
        let coordinator = Coordinator::new(AuditConfig::default()).expect("config");
        let result = coordinator.run(&[], &RunOptions::default());
        assert!(result.reports.is_empty());
        assert_eq!(result.statistics.sources_scanned, 0);
        assert_eq!(result.total_weekly_savings_hours, 0.0);
        assert!(!result.narrative.text.is_empty());
    }

    #[test]
    fn generator_output_and_run_id_are_used() {
        let coordinator = Coordinator::new(AuditConfig::default())
            .expect("config")
            .with_generator(Box::new(Echo));
        let options = RunOptions {
            run_id: Some("fixed-run".to_string()),
            cancel_flag: None,
        };
        let result = coordinator.run(&scanners(), &options);
        assert_eq!(result.run_id, "fixed-run");
        assert_eq!(result.narrative.text, "1 sources reviewed");
        assert_eq!(result.narrative.origin, NarrativeOrigin::Generated);
    }

    #[test]
    fn callback_sees_every_source_seal() {
        let coordinator = Coordinator::new(AuditConfig::default()).expect("config");
        let sealed = Mutex::new(Vec::new());
        coordinator.run_with_callback(&scanners(), &RunOptions::default(), |event| {
            if event.phase == ScanPhase::Sealed {
                sealed.lock().expect("lock").push(event.source_id);
            }
        });
        let mut sealed = sealed.into_inner().expect("lock");
        sealed.sort();
        assert_eq!(sealed, vec!["files".to_string(), "mail".to_string()]);
    }

    #[test]
    fn consolidation_of_nothing_is_empty() {
        let consolidation = consolidate_reports(&[]);
        assert_eq!(consolidation.findings.total(), 0);
        assert!(consolidation.recommendations.is_empty());
        assert_eq!(consolidation.statistics.sources_failed, 0);
    }
}
