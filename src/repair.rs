//! Repair Coordinator — verify out of place, then commit.
//!
//! Two-phase commit over one mutable file:
//! 1. ask the generator for a candidate
//! 2. write it to a scratch sibling and trace it there
//! 3. only if that run succeeds, atomically replace the target
//!
//! The scratch file is owned by a guard and removed on every exit path.
//! The target is either untouched or holds exactly the verified candidate.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};

use crate::generator::{GenerateError, GeneratorClient, RepairMode};
use crate::tracer::{ExecutionReport, TraceError, Tracer};

/// Failures that are not a normal "rejected" outcome.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("nothing to repair: the report is a success")]
    NotFailing,

    #[error("failed to read target {}: {source}", path.display())]
    ReadTarget {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write scratch file {}: {source}", path.display())]
    WriteScratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to commit to {}: {source}", path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("verification run failed to execute: {0}")]
    Verify(#[from] TraceError),
}

/// A proposed replacement and the two reports that judge it.
#[derive(Debug, Clone)]
pub struct RepairCandidate {
    pub source: String,
    pub mode: RepairMode,
    /// The failure that triggered the repair.
    pub pre_report: ExecutionReport,
    /// The candidate's own run from the scratch path.
    pub verify_report: ExecutionReport,
}

impl RepairCandidate {
    /// Committed if and only if this holds.
    pub fn is_verified(&self) -> bool {
        self.verify_report.is_success()
    }
}

/// Why a cycle ended without a commit.
#[derive(Debug)]
pub enum Rejection {
    /// The generator produced nothing usable.
    Generation(GenerateError),
    /// The candidate still failed when run.
    Verification(Box<RepairCandidate>),
}

#[derive(Debug)]
pub enum RepairOutcome {
    Applied(Box<RepairCandidate>),
    Rejected(Rejection),
}

impl RepairOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RepairOutcome::Applied(_))
    }
}

/// Sibling scratch path for a target: `dir/<stem>_candidate.<ext>`.
pub fn scratch_path_for(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".into());
    let name = match target.extension() {
        Some(ext) => format!("{stem}_candidate.{}", ext.to_string_lossy()),
        None => format!("{stem}_candidate"),
    };
    target.with_file_name(name)
}

/// Scratch file that removes itself when dropped.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    async fn create(path: PathBuf, contents: &str) -> Result<Self, RepairError> {
        // Own the path before writing so a partial write is still removed.
        let scratch = Self { path };
        tokio::fs::write(&scratch.path, contents)
            .await
            .map_err(|source| RepairError::WriteScratch {
                path: scratch.path.clone(),
                source,
            })?;
        Ok(scratch)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "failed to remove scratch file: {e}"),
        }
    }
}

/// Atomic replace: temp file in the same directory, then rename over.
fn commit(target: &Path, contents: &str) -> io::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".mend-commit-")
        .tempfile_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = std::fs::metadata(target) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Owns the verify-then-commit sequence for one target.
pub struct RepairCoordinator {
    tracer: Arc<dyn Tracer>,
    generator: GeneratorClient,
}

impl RepairCoordinator {
    pub fn new(tracer: Arc<dyn Tracer>, generator: GeneratorClient) -> Self {
        Self { tracer, generator }
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Run one repair cycle for a failing report.
    pub async fn attempt_repair(
        &self,
        report: &ExecutionReport,
        source_path: &Path,
    ) -> Result<RepairOutcome, RepairError> {
        if report.is_success() {
            return Err(RepairError::NotFailing);
        }

        let original = tokio::fs::read_to_string(source_path)
            .await
            .map_err(|source| RepairError::ReadTarget {
                path: source_path.to_path_buf(),
                source,
            })?;
        let mode = RepairMode::for_error(report.error_text());

        let candidate = match self
            .generator
            .request_fix(&original, &report.trace_history, report.error_text())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("no candidate: {e}");
                return Ok(RepairOutcome::Rejected(Rejection::Generation(e)));
            }
        };

        let scratch = ScratchFile::create(scratch_path_for(source_path), &candidate).await?;
        info!(scratch = %scratch.path.display(), "verifying candidate");
        let verify_report = self.tracer.run(&scratch.path).await?;
        drop(scratch);

        let candidate = Box::new(RepairCandidate {
            source: candidate,
            mode,
            pre_report: report.clone(),
            verify_report,
        });

        if !candidate.is_verified() {
            warn!(
                status = %candidate.verify_report.status,
                "candidate failed verification: {}",
                candidate.verify_report.error_headline()
            );
            return Ok(RepairOutcome::Rejected(Rejection::Verification(candidate)));
        }

        // Write through a symlinked target rather than replacing the link.
        let destination = tokio::fs::canonicalize(source_path)
            .await
            .map_err(|source| RepairError::Commit {
                path: source_path.to_path_buf(),
                source,
            })?;
        let contents = candidate.source.clone();
        let committed = {
            let destination = destination.clone();
            tokio::task::spawn_blocking(move || commit(&destination, &contents))
                .await
                .map_err(io::Error::other)
                .and_then(|res| res)
        };
        committed.map_err(|source| RepairError::Commit {
            path: destination,
            source,
        })?;
        log_diff(&original, &candidate.source);
        Ok(RepairOutcome::Applied(candidate))
    }
}

fn log_diff(before: &str, after: &str) {
    let diff = TextDiff::from_lines(before, after);
    let (mut added, mut removed) = (0usize, 0usize);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    info!(added, removed, "candidate committed");
    if tracing::enabled!(tracing::Level::DEBUG) {
        let mut unified = diff.unified_diff();
        unified.context_radius(3).header("before", "after");
        debug!("applied diff:\n{unified}");
    }
}
