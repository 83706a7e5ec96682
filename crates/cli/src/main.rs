use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgAction;
use clap::{Args, Parser, Subcommand};
use practice_audit_core::{
    human_bytes, load_config, load_result, render_markdown_report, render_text_summary,
    write_json, AuditConfig, ConsolidatedResult, Coordinator, DriveManifestSource,
    FilesystemSource, MailboxManifestSource, RunOptions, SourceScanner,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "practice-audit",
    version,
    about = "Audit a practice's files, cloud drive and mailbox and estimate weekly time savings."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan one or more sources and write a consolidated JSON result.
    Scan(ScanArgs),
    /// Print the summary of a previously written result.
    Summarize(SummarizeArgs),
    /// Write the default configuration to a file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Directory to scan (repeatable).
    #[arg(long = "path", value_name = "DIR", action = ArgAction::Append)]
    paths: Vec<PathBuf>,

    /// Offline cloud drive listing (repeatable).
    #[arg(long = "drive-manifest", value_name = "FILE", action = ArgAction::Append)]
    drive_manifests: Vec<PathBuf>,

    /// Offline mailbox listing (repeatable).
    #[arg(long = "mailbox-manifest", value_name = "FILE", action = ArgAction::Append)]
    mailbox_manifests: Vec<PathBuf>,

    /// JSON configuration file. Defaults apply to anything it leaves out.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum entries read per source.
    #[arg(long)]
    max_entries: Option<usize>,

    /// Per-source scan deadline in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Number of sources scanned at once.
    #[arg(long)]
    parallel: Option<usize>,

    /// Exclude glob patterns for directory scans (repeatable).
    #[arg(long = "exclude", value_name = "GLOB", action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Output result path.
    #[arg(long, default_value = "practice-audit-result.json", value_name = "FILE")]
    output: PathBuf,

    /// Optional markdown report output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,

    /// Log progress events while scanning.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Args)]
struct SummarizeArgs {
    /// Result file written by `scan`.
    #[arg(long, value_name = "FILE")]
    result: PathBuf,

    /// Optional markdown report output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    #[arg(long, default_value = "practice-audit.json", value_name = "FILE")]
    output: PathBuf,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => run_scan_command(args),
        Commands::Summarize(args) => run_summarize_command(args),
        Commands::InitConfig(args) => run_init_config_command(args),
    }
}

fn run_scan_command(args: ScanArgs) -> Result<()> {
    if args.paths.is_empty() && args.drive_manifests.is_empty() && args.mailbox_manifests.is_empty()
    {
        anyhow::bail!("nothing to scan: pass --path, --drive-manifest or --mailbox-manifest");
    }

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AuditConfig::default(),
    };
    if let Some(max_entries) = args.max_entries {
        config.limits.max_entries = max_entries;
    }
    if args.timeout_secs.is_some() {
        config.limits.timeout_secs = args.timeout_secs;
    }
    if let Some(parallel) = args.parallel {
        config.limits.max_parallel_sources = parallel;
    }
    config.filesystem.excludes.extend(args.exclude);

    let mut scanners = Vec::new();
    for path in &args.paths {
        let id = format!("fs:{}", path.display());
        scanners.push(SourceScanner::new(
            FilesystemSource::new(path, &config.filesystem).with_id(id),
        ));
    }
    for path in &args.drive_manifests {
        let id = format!("drive:{}", path.display());
        scanners.push(SourceScanner::new(DriveManifestSource::from_path(id, path)));
    }
    for path in &args.mailbox_manifests {
        let id = format!("mail:{}", path.display());
        scanners.push(SourceScanner::new(MailboxManifestSource::from_path(id, path)));
    }

    let coordinator = Coordinator::new(config).context("invalid configuration")?;
    let progress = args.progress;
    let result = coordinator.run_with_callback(&scanners, &RunOptions::default(), |event| {
        if progress {
            info!(
                source = %event.source_id,
                phase = ?event.phase,
                entries = event.entries,
                skipped = event.skipped,
                "progress"
            );
        }
    });

    write_json(&args.output, &result)?;
    println!("Result written to {}", args.output.display());
    print_scan_line(&result);
    if let Some(md_path) = args.md {
        write_markdown(&md_path, &result)?;
    }
    Ok(())
}

fn run_summarize_command(args: SummarizeArgs) -> Result<()> {
    let result = load_result(&args.result)?;
    print!("{}", render_text_summary(&result));
    if let Some(md_path) = args.md {
        write_markdown(&md_path, &result)?;
    }
    Ok(())
}

fn run_init_config_command(args: InitConfigArgs) -> Result<()> {
    let payload = serde_json::to_string_pretty(&AuditConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(&args.output, payload)
        .with_context(|| format!("failed to write configuration to {}", args.output.display()))?;
    println!("Default configuration written to {}", args.output.display());
    Ok(())
}

fn print_scan_line(result: &ConsolidatedResult) {
    let stats = &result.statistics;
    println!(
        "Scanned {} source(s) ({} failed), {} entries, {}.",
        stats.sources_scanned,
        stats.sources_failed,
        stats.total_entries,
        human_bytes(stats.total_bytes)
    );
    println!(
        "{} finding(s), {} recommendation(s), about {:.1} hours/week to gain.",
        stats.total_findings, stats.total_recommendations, result.total_weekly_savings_hours
    );
    for failed in &result.failed_sources {
        println!("Failed: {} ({})", failed.source_id, failed.error);
    }
}

fn write_markdown(path: &Path, result: &ConsolidatedResult) -> Result<()> {
    fs::write(path, render_markdown_report(result))
        .with_context(|| format!("failed to write markdown report {}", path.display()))?;
    println!("Markdown report written to {}", path.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
