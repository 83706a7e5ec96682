use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::thread;

use anyhow::{anyhow, Context, Result};
use practice_audit_core::{
    write_json, AuditConfig, ConsolidatedResult, Coordinator, DriveManifestSource,
    FilesystemSource, MailboxManifestSource, RunOptions, ScanProgressEvent, SourceScanner,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub drive_manifests: Vec<PathBuf>,
    #[serde(default)]
    pub mailbox_manifests: Vec<PathBuf>,
    #[serde(default)]
    pub config: AuditConfig,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl RunRequest {
    fn scanners(&self) -> Vec<SourceScanner> {
        let mut scanners = Vec::new();
        for path in &self.paths {
            scanners.push(SourceScanner::new(
                FilesystemSource::new(path, &self.config.filesystem)
                    .with_id(format!("fs:{}", path.display())),
            ));
        }
        for path in &self.drive_manifests {
            scanners.push(SourceScanner::new(DriveManifestSource::from_path(
                format!("drive:{}", path.display()),
                path,
            )));
        }
        for path in &self.mailbox_manifests {
            scanners.push(SourceScanner::new(MailboxManifestSource::from_path(
                format!("mail:{}", path.display()),
                path,
            )));
        }
        scanners
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub status: RunStatus,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    pub total_events: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRunResponse {
    pub run_id: String,
    pub status: RunStatus,
}

#[derive(Debug)]
struct RunSession {
    status: RunStatus,
    output: Option<PathBuf>,
    result: Option<ConsolidatedResult>,
    error: Option<String>,
    events: Vec<ScanProgressEvent>,
    cancel_flag: Arc<AtomicBool>,
}

/// Background audit runs keyed by run id. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct RunService {
    sessions: Arc<Mutex<HashMap<String, RunSession>>>,
}

impl RunService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration, then runs the audit on a worker thread.
    pub fn start_run(&self, request: RunRequest) -> Result<String> {
        let coordinator =
            Coordinator::new(request.config.clone()).context("invalid run configuration")?;
        let run_id = request
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let cancel_flag = Arc::new(AtomicBool::new(false));

        {
            let mut sessions = self.lock_sessions()?;
            if sessions.contains_key(&run_id) {
                return Err(anyhow!("run already exists: {run_id}"));
            }
            sessions.insert(
                run_id.clone(),
                RunSession {
                    status: RunStatus::Running,
                    output: request.output.clone(),
                    result: None,
                    error: None,
                    events: Vec::new(),
                    cancel_flag: Arc::clone(&cancel_flag),
                },
            );
        }

        let service = self.clone();
        let thread_run_id = run_id.clone();
        thread::spawn(move || {
            let scanners = request.scanners();
            let options = RunOptions {
                run_id: Some(thread_run_id.clone()),
                cancel_flag: Some(Arc::clone(&cancel_flag)),
            };
            let result = coordinator.run_with_callback(&scanners, &options, |event| {
                service.record_event(&thread_run_id, event);
            });

            if let Some(path) = &request.output {
                if let Err(err) = write_json(path, &result) {
                    warn!(run_id = %thread_run_id, error = %err, "failed to persist run result");
                    service.update(&thread_run_id, |session| {
                        session.status = RunStatus::Failed;
                        session.error = Some(format!("{err:#}"));
                    });
                    return;
                }
            }

            info!(run_id = %thread_run_id, "run finished");
            service.update(&thread_run_id, |session| {
                session.status = if cancel_flag.load(Ordering::Relaxed) {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                };
                session.result = Some(result);
                session.error = None;
            });
        });

        Ok(run_id)
    }

    pub fn get_run(&self, run_id: &str) -> Result<RunSnapshot> {
        let sessions = self.lock_sessions()?;
        let session = find(&sessions, run_id)?;
        Ok(RunSnapshot {
            run_id: run_id.to_string(),
            status: session.status.clone(),
            output: session.output.clone(),
            error: session.error.clone(),
            total_events: session.events.len() as u64,
        })
    }

    /// Events with a sequence number above `after_seq`. Numbering is per run,
    /// starting at 1, across all sources.
    pub fn poll_events(&self, run_id: &str, after_seq: u64) -> Result<Vec<ScanProgressEvent>> {
        let sessions = self.lock_sessions()?;
        let session = find(&sessions, run_id)?;
        Ok(session
            .events
            .iter()
            .filter(|event| event.seq > after_seq)
            .cloned()
            .collect())
    }

    pub fn cancel_run(&self, run_id: &str) -> Result<CancelRunResponse> {
        let mut sessions = self.lock_sessions()?;
        let session = sessions
            .get_mut(run_id)
            .ok_or_else(|| anyhow!("run not found: {run_id}"))?;
        session.cancel_flag.store(true, Ordering::Relaxed);
        Ok(CancelRunResponse {
            run_id: run_id.to_string(),
            status: session.status.clone(),
        })
    }

    /// The finished result, or `None` while the run is still going.
    pub fn result(&self, run_id: &str) -> Result<Option<ConsolidatedResult>> {
        let sessions = self.lock_sessions()?;
        Ok(find(&sessions, run_id)?.result.clone())
    }

    fn record_event(&self, run_id: &str, mut event: ScanProgressEvent) {
        self.update(run_id, |session| {
            event.seq = session.events.len() as u64 + 1;
            session.events.push(event);
        });
    }

    fn update<F>(&self, run_id: &str, apply: F)
    where
        F: FnOnce(&mut RunSession),
    {
        if let Ok(mut sessions) = self.lock_sessions() {
            if let Some(session) = sessions.get_mut(run_id) {
                apply(session);
            }
        }
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<String, RunSession>>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("run registry lock poisoned"))
    }
}

fn find<'a>(sessions: &'a HashMap<String, RunSession>, run_id: &str) -> Result<&'a RunSession> {
    sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("run not found: {run_id}"))
}

pub fn load_result(path: impl AsRef<Path>) -> Result<ConsolidatedResult> {
    practice_audit_core::load_result(path.as_ref())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, Instant};

    use practice_audit_core::{AuditConfig, ScanPhase};

    use super::{load_result, RunRequest, RunService, RunSnapshot, RunStatus};

    fn wait_for(service: &RunService, run_id: &str) -> RunSnapshot {
        let started = Instant::now();
        loop {
            let snapshot = service.get_run(run_id).expect("run exists");
            if snapshot.status != RunStatus::Running {
                return snapshot;
            }
            assert!(started.elapsed() < Duration::from_secs(30));
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    #[test]
    fn run_records_events_and_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("clients")).expect("mkdir");
        fs::write(dir.path().join("clients/engagement.pdf"), b"signed").expect("write");
        let output = dir.path().join("result.json");

        let service = RunService::new();
        let run_id = service
            .start_run(RunRequest {
                run_id: Some("run-a".to_string()),
                paths: vec![dir.path().to_path_buf()],
                output: Some(output.clone()),
                ..RunRequest::default()
            })
            .expect("run starts");
        assert_eq!(run_id, "run-a");

        let snapshot = wait_for(&service, &run_id);
        assert_eq!(snapshot.status, RunStatus::Completed);
        assert!(snapshot.total_events >= 2);

        let events = service.poll_events(&run_id, 0).expect("events");
        let seqs = events.iter().map(|event| event.seq).collect::<Vec<_>>();
        assert_eq!(seqs, (1..=events.len() as u64).collect::<Vec<_>>());
        assert!(events.iter().any(|event| event.phase == ScanPhase::Sealed));
        let later = service.poll_events(&run_id, 1).expect("events");
        assert_eq!(later.len(), events.len() - 1);

        let result = service.result(&run_id).expect("known").expect("finished");
        assert_eq!(result.run_id, "run-a");
        assert_eq!(result.statistics.total_entries, 1);
        let persisted = load_result(&output).expect("persisted");
        assert_eq!(persisted.run_id, result.run_id);
        assert_eq!(persisted.statistics, result.statistics);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = AuditConfig::default();
        config.limits.max_parallel_sources = 0;
        let service = RunService::new();
        let err = service
            .start_run(RunRequest {
                config,
                ..RunRequest::default()
            })
            .expect_err("rejected");
        assert!(err.to_string().contains("invalid run configuration"));
    }

    #[test]
    fn missing_manifest_is_a_failed_source_not_a_failed_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = RunService::new();
        let run_id = service
            .start_run(RunRequest {
                mailbox_manifests: vec![dir.path().join("absent.json")],
                ..RunRequest::default()
            })
            .expect("run starts");
        assert_eq!(wait_for(&service, &run_id).status, RunStatus::Completed);
        let result = service.result(&run_id).expect("known").expect("finished");
        assert_eq!(result.failed_sources.len(), 1);
    }

    #[test]
    fn unknown_runs_are_errors() {
        let service = RunService::new();
        assert!(service.get_run("nope").is_err());
        assert!(service.cancel_run("nope").is_err());
        assert!(service.poll_events("nope", 0).is_err());
    }

    #[test]
    fn cancelled_run_still_seals() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = RunService::new();
        let run_id = service
            .start_run(RunRequest {
                paths: vec![dir.path().to_path_buf()],
                ..RunRequest::default()
            })
            .expect("run starts");
        let response = service.cancel_run(&run_id).expect("cancel");
        assert_eq!(response.run_id, run_id);

        let snapshot = wait_for(&service, &run_id);
        assert!(matches!(
            snapshot.status,
            RunStatus::Cancelled | RunStatus::Completed
        ));
        assert!(service.result(&run_id).expect("known").is_some());
    }
}
