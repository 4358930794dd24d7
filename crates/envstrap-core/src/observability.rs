//! Observability: tracing init and the JSONL audit log.
//!
//! Uses `config::ObservabilityConfig` for ENVSTRAP_QUIET, LOG_LEVEL, LOG_JSON and AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use serde_json::{json, Value};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize tracing. Call once at process startup; later calls are no-ops.
///
/// `RUST_LOG` wins over `ENVSTRAP_LOG_LEVEL` when set.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = cfg.filter_directive();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // Logs go to stderr so stdout stays clean for `show --json`.
    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

/// Append-only JSONL audit sink.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Open (lazily) an audit log at `path`, creating parent directories.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record: `{"ts", "event", ...fields}`. Failures are logged, never raised.
    pub fn record(&self, event: &str, fields: Value) {
        let mut record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": event,
        });
        if let (Some(obj), Value::Object(extra)) = (record.as_object_mut(), fields) {
            obj.extend(extra);
        }
        append_jsonl(&self.path, &record);
    }

    /// `step_started`: written once per step, before any destination check or spawn.
    pub fn step_started(&self, index: usize, kind: &str, program: &str, args: &[String]) {
        self.record(
            "step_started",
            json!({ "step": index, "kind": kind, "cmd": program, "args": args }),
        );
    }

    /// `step_completed`
    pub fn step_completed(
        &self,
        index: usize,
        kind: &str,
        success: bool,
        skipped: bool,
        exit_code: Option<i32>,
        duration_ms: u64,
    ) {
        self.record(
            "step_completed",
            json!({
                "step": index,
                "kind": kind,
                "success": success,
                "skipped": skipped,
                "exit_code": exit_code,
                "duration_ms": duration_ms,
            }),
        );
    }
}

fn append_jsonl(path: &Path, record: &Value) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{}", record));
    if let Err(e) = result {
        tracing::warn!("audit log {} not writable: {}", path.display(), e);
    }
}

/// Process-wide audit log from `ENVSTRAP_AUDIT_LOG`, if configured.
pub fn audit_log() -> Option<&'static AuditLog> {
    static AUDIT: OnceLock<Option<AuditLog>> = OnceLock::new();
    AUDIT
        .get_or_init(|| {
            ObservabilityConfig::from_env()
                .audit_log
                .as_deref()
                .map(AuditLog::new)
        })
        .as_ref()
}

/// Audit: run_started
pub fn audit_run_started(plan_source: &str, step_count: usize, dry_run: bool) {
    if let Some(log) = audit_log() {
        log.record(
            "run_started",
            json!({ "plan": plan_source, "steps": step_count, "dry_run": dry_run }),
        );
    }
}

/// Audit: run_completed
pub fn audit_run_completed(success: bool, failed_step: Option<usize>, duration_ms: u64) {
    if let Some(log) = audit_log() {
        log.record(
            "run_completed",
            json!({ "success": success, "failed_step": failed_step, "duration_ms": duration_ms }),
        );
    }
}
