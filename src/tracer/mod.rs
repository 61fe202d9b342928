//! Tracer — runs a target program and records what it did.
//!
//! The Coordinator and Monitor only see the [`Tracer`] trait. The shipped
//! backend, [`PythonTracer`], drives the target's own interpreter through an
//! embedded harness that hooks `sys.settrace` and reports back as JSON.

pub mod harness;
pub mod report;

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub use report::{ExecutionReport, RunStatus, StepRecord};

use crate::config::TracerConfig;

/// Infrastructure failures. A target that fails to parse or crashes is not
/// an error — that is what [`ExecutionReport::status`] is for.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: io::Error,
    },

    #[error("harness I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("unreadable harness report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Execute a source file to completion or failure.
#[async_trait]
pub trait Tracer: Send + Sync {
    async fn run(&self, source_path: &Path) -> Result<ExecutionReport, TraceError>;
}

/// Subprocess tracer for Python targets.
#[derive(Debug, Clone)]
pub struct PythonTracer {
    interpreter: String,
    max_value_len: usize,
    max_steps: Option<usize>,
}

impl PythonTracer {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self::from_config(interpreter, &TracerConfig::default())
    }

    pub fn from_config(interpreter: impl Into<String>, config: &TracerConfig) -> Self {
        Self {
            interpreter: interpreter.into(),
            max_value_len: config.max_value_len,
            max_steps: config.max_steps,
        }
    }
}

#[async_trait]
impl Tracer for PythonTracer {
    async fn run(&self, source_path: &Path) -> Result<ExecutionReport, TraceError> {
        let source =
            tokio::fs::read_to_string(source_path)
                .await
                .map_err(|source| TraceError::Read {
                    path: source_path.to_path_buf(),
                    source,
                })?;
        let script = tokio::fs::canonicalize(source_path).await?;

        let report_file = tempfile::Builder::new()
            .prefix("mend-report-")
            .suffix(".json")
            .tempfile()?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c")
            .arg(harness::SOURCE)
            .arg(report_file.path())
            .arg(&script)
            .arg(self.max_value_len.to_string())
            .arg(self.max_steps.unwrap_or(0).to_string())
            .stdin(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = script.parent() {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| TraceError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(source.as_bytes()).await {
                Ok(()) => {}
                // The interpreter died before reading; its exit status says why.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("harness closed stdin early: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let exit = child.wait().await?;
        let raw = tokio::fs::read_to_string(report_file.path()).await?;

        let report = if raw.trim().is_empty() {
            without_report(exit)
        } else {
            serde_json::from_str::<ExecutionReport>(&raw)?.normalized()
        };

        debug!(
            path = %source_path.display(),
            status = %report.status,
            steps = report.trace_history.len(),
            "trace finished"
        );
        Ok(report)
    }
}

/// The interpreter exited without the harness writing a report, e.g. a
/// hard `os._exit` or a signal.
fn without_report(exit: ExitStatus) -> ExecutionReport {
    if exit.success() {
        ExecutionReport::success(Vec::new())
    } else {
        ExecutionReport::runtime_error(
            Vec::new(),
            format!("interpreter terminated before reporting ({exit})"),
        )
    }
}
