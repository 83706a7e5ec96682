use std::fs;

use anyhow::Result;
use practice_audit_core::{
    AuditConfig, Coordinator, DriveManifest, DriveManifestSource, FilesystemSource, IssueKind,
    MemorySource, QuotaUsage, RecordLocation, RunOptions, SourceKind, SourceRecord,
    SourceScanner,
};

const TEN_MB: usize = 10 * 1024 * 1024;

fn small_record(index: usize, location: &str) -> SourceRecord {
    let mut record = SourceRecord::new(
        format!("doc-{index}"),
        format!("2024-03-{:02} Smith memo {index}.pdf", index % 28 + 1),
        512,
    );
    record.location = RecordLocation::Path(location.to_string());
    record
}

fn located(id: &str, name: &str, location: &str) -> SourceRecord {
    let mut record = SourceRecord::new(id, name, 0);
    record.location = RecordLocation::Path(location.to_string());
    record
}

/// 100 entries, two 10 MB duplicate pairs, one folder nine levels deep.
fn office_share() -> MemorySource {
    let mut source = MemorySource::new("office-share", SourceKind::Filesystem);
    for index in 0..95 {
        let location = if index == 0 {
            "clients/smith/2024/q1/matters/estate/drafts/old/archive".to_string()
        } else {
            format!("clients/client-{}", index % 10)
        };
        source = source.with_entry(small_record(index, &location));
    }
    source
        .with_content(
            located("dup-a1", "2024-01-10 retainer.pdf", "clients/jones"),
            vec![1_u8; TEN_MB],
        )
        .with_content(
            located("dup-a2", "2024-01-10 retainer copy.pdf", "clients/jones/old"),
            vec![1_u8; TEN_MB],
        )
        .with_content(
            located("dup-b1", "2024-02-11 scan.pdf", "clients/brown"),
            vec![2_u8; TEN_MB],
        )
        .with_content(
            located("dup-b2", "2024-02-11 scan (1).pdf", "clients/brown"),
            vec![2_u8; TEN_MB],
        )
        .with_content(
            located("unique", "2024-02-12 ledger.pdf", "clients/brown"),
            vec![3_u8; 4096],
        )
}

#[test]
fn deep_tree_with_duplicates_yields_both_findings() -> Result<()> {
    let coordinator = Coordinator::new(AuditConfig::default())?;
    let result = coordinator.run(&[SourceScanner::new(office_share())], &RunOptions::default());

    let report = &result.reports[0];
    assert!(report.completed);
    assert_eq!(report.totals.entries, 100);
    assert_eq!(report.structure.max_depth, 9);
    assert_eq!(report.duplicates.len(), 2);
    assert_eq!(report.wasted_bytes(), 2 * TEN_MB as u64);
    assert!(report.duplicates.iter().any(|group| group.kept == "dup-a1"));
    assert!(report.duplicates.iter().any(|group| group.kept == "dup-b1"));

    let kinds = result.findings.iter().map(|finding| finding.kind).collect::<Vec<_>>();
    assert!(kinds.contains(&IssueKind::DuplicateWaste));
    assert!(kinds.contains(&IssueKind::FolderDepthTooDeep));

    let duplicate_rec = result
        .recommendations
        .iter()
        .find(|rec| rec.finding == Some(IssueKind::DuplicateWaste))
        .expect("duplicate recommendation");
    assert!(duplicate_rec.weekly_savings_hours >= 0.5);

    let total: f64 = result
        .recommendations
        .iter()
        .map(|rec| rec.weekly_savings_hours)
        .sum();
    assert!((result.total_weekly_savings_hours - total).abs() < 1e-9);
    Ok(())
}

#[test]
fn empty_source_seals_cleanly() -> Result<()> {
    let coordinator = Coordinator::new(AuditConfig::default())?;
    let empty = MemorySource::new("empty", SourceKind::CloudDrive);
    let result = coordinator.run(&[SourceScanner::new(empty)], &RunOptions::default());

    let report = &result.reports[0];
    assert!(report.completed);
    assert_eq!(report.totals.entries, 0);
    assert!(report.findings.is_empty());
    assert!(report.recommendations.is_empty());
    assert_eq!(result.statistics.sources_scanned, 1);
    assert_eq!(result.total_weekly_savings_hours, 0.0);
    Ok(())
}

#[test]
fn one_failed_source_does_not_abort_the_run() -> Result<()> {
    let coordinator = Coordinator::new(AuditConfig::default())?;
    let broken = MemorySource::new("mail", SourceKind::Mailbox).unavailable("connection refused");
    let result = coordinator.run(
        &[SourceScanner::new(broken), SourceScanner::new(office_share())],
        &RunOptions::default(),
    );

    assert_eq!(result.reports.len(), 2);
    assert_eq!(result.reports[0].source_id, "mail");
    assert_eq!(result.failed_sources.len(), 1);
    assert_eq!(result.statistics.sources_scanned, 1);
    assert_eq!(result.statistics.total_entries, 100);
    assert!(result
        .findings
        .iter()
        .all(|finding| finding.source_id == "office-share"));
    Ok(())
}

#[test]
fn repeated_runs_agree_apart_from_timestamps() -> Result<()> {
    let coordinator = Coordinator::new(AuditConfig::default())?;
    let first = coordinator.run(&[SourceScanner::new(office_share())], &RunOptions::default());
    let second = coordinator.run(&[SourceScanner::new(office_share())], &RunOptions::default());

    assert_eq!(
        serde_json::to_string(&first.statistics)?,
        serde_json::to_string(&second.statistics)?
    );
    assert_eq!(first.findings, second.findings);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.narrative, second.narrative);
    Ok(())
}

fn reception_drive() -> MemorySource {
    let mut source = MemorySource::new("reception-drive", SourceKind::CloudDrive)
        .with_quota(QuotaUsage {
            used_bytes: 95,
            limit_bytes: 100,
        });
    for index in 0..70 {
        let mut record = SourceRecord::new(
            format!("scan-{index}"),
            format!("IMG_{index:04}.jpg"),
            2048,
        );
        record.shared_externally = index % 2 == 0;
        source = source.with_entry(record);
    }
    source
        .with_content(
            located("intake-1", "intake form.docx", "forms"),
            vec![9_u8; 8192],
        )
        .with_content(
            located("intake-2", "intake form (2).docx", "forms/copies"),
            vec![9_u8; 8192],
        )
}

#[test]
fn sequential_and_parallel_runs_agree() -> Result<()> {
    let parallel = Coordinator::new(AuditConfig::default())?;
    let mut config = AuditConfig::default();
    config.limits.max_parallel_sources = 1;
    config.dedupe.parallel_reads = false;
    let sequential = Coordinator::new(config)?;
    assert_eq!(sequential.config().limits.max_parallel_sources, 1);
    assert!(parallel.config().dedupe.parallel_reads);

    let scanners = || {
        vec![
            SourceScanner::new(office_share()),
            SourceScanner::new(reception_drive()),
        ]
    };
    let first = parallel.run(&scanners(), &RunOptions::default());
    let second = sequential.run(&scanners(), &RunOptions::default());

    assert_eq!(first.reports.len(), 2);
    assert!(first.findings.total() > 0);
    assert_eq!(first.findings, second.findings);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(
        serde_json::to_string(&first.statistics)?,
        serde_json::to_string(&second.statistics)?
    );
    for (left, right) in first.reports.iter().zip(&second.reports) {
        assert_eq!(left.source_id, right.source_id);
        assert_eq!(left.duplicates, right.duplicates);
        assert_eq!(left.totals, right.totals);
    }
    Ok(())
}

#[test]
fn filesystem_scan_skips_hidden_and_excluded_entries() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    fs::create_dir_all(root.join("clients/smith"))?;
    fs::create_dir_all(root.join(".git/objects"))?;
    fs::create_dir_all(root.join("node_modules/pkg"))?;
    let body = vec![b'x'; 4096];
    fs::write(root.join("clients/smith/Engagement Agreement.pdf"), &body)?;
    fs::write(root.join("clients/smith/Engagement Agreement (copy).pdf"), &body)?;
    fs::write(root.join("clients/notes.txt"), b"call back")?;
    fs::write(root.join(".DS_Store"), b"junk")?;
    fs::write(root.join("clients/session.tmp"), b"junk")?;
    fs::write(root.join(".git/objects/abc"), b"junk")?;
    fs::write(root.join("node_modules/pkg/index.js"), b"junk")?;

    let config = AuditConfig::default();
    let source = FilesystemSource::new(root, &config.filesystem).with_id("office");
    let coordinator = Coordinator::new(config)?;
    let result = coordinator.run(&[SourceScanner::new(source)], &RunOptions::default());

    let report = &result.reports[0];
    assert!(report.completed);
    assert_eq!(report.source_id, "office");
    assert_eq!(report.totals.entries, 3);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].members.len(), 2);
    assert_eq!(report.duplicates[0].wasted_bytes, 4096);
    Ok(())
}

fn drive_with_usage(used_bytes: u64) -> DriveManifestSource {
    DriveManifestSource::from_manifest(
        "drive",
        DriveManifest {
            account: Some("office@example.com".to_string()),
            quota: Some(QuotaUsage {
                used_bytes,
                limit_bytes: 1000,
            }),
            items: Vec::new(),
        },
    )
}

#[test]
fn storage_usage_fires_only_above_eighty_percent() -> Result<()> {
    let coordinator = Coordinator::new(AuditConfig::default())?;
    let result = coordinator.run(
        &[
            SourceScanner::new(drive_with_usage(800)),
            SourceScanner::new(drive_with_usage(801)),
        ],
        &RunOptions::default(),
    );

    let fired = |index: usize| {
        result.reports[index]
            .findings
            .iter()
            .any(|finding| finding.kind == IssueKind::HighStorageUsage)
    };
    assert!(!fired(0));
    assert!(fired(1));
    Ok(())
}
