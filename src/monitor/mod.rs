//! Change Monitor — turns change notifications into repair cycles.
//!
//! Filters by path, debounces save bursts, and refuses to start a cycle
//! while another one holds the repair guard. Notifications that lose are
//! dropped, never queued.

pub mod watcher;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::repair::{Rejection, RepairCoordinator, RepairOutcome};

pub use watcher::{run, watch_target, ChangeEvent, ChangeKind, WatchError};

/// Observable phase of the repair guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    Idle,
    Repairing,
}

/// Per-target repair flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct RepairState {
    repairing: Arc<AtomicBool>,
}

impl RepairState {
    pub fn phase(&self) -> RepairPhase {
        if self.repairing.load(Ordering::Acquire) {
            RepairPhase::Repairing
        } else {
            RepairPhase::Idle
        }
    }

    /// `Idle → Repairing`, or `None` if a cycle already holds it.
    pub fn try_acquire(&self) -> Option<RepairGuard> {
        self.repairing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RepairGuard {
                state: self.clone(),
            })
    }
}

/// Holds the state in `Repairing`; dropping it returns to `Idle`.
#[derive(Debug)]
pub struct RepairGuard {
    state: RepairState,
}

impl Drop for RepairGuard {
    fn drop(&mut self) {
        self.state.repairing.store(false, Ordering::Release);
    }
}

/// What `on_change` did with one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDisposition {
    /// Not the watched target.
    IgnoredPath,
    /// Too soon after the last accepted notification.
    Debounced,
    /// A cycle is already running.
    Busy,
    IntegrityOk,
    Repaired,
    Rejected,
    /// Tracer infrastructure, I/O, or an internal panic.
    Failed,
}

pub struct ChangeMonitor {
    target: PathBuf,
    canonical: Option<PathBuf>,
    coordinator: RepairCoordinator,
    state: RepairState,
    debounce: Duration,
    settle: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl ChangeMonitor {
    pub fn new(target: impl Into<PathBuf>, coordinator: RepairCoordinator) -> Self {
        let target = target.into();
        let canonical = std::fs::canonicalize(&target).ok();
        Self {
            target,
            canonical,
            coordinator,
            state: RepairState::default(),
            debounce: Duration::from_secs(1),
            settle: Duration::from_secs(1),
            last_accepted: Mutex::new(None),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Hold time after a failing scan before the guard is released, so the
    /// notification from our own commit is dropped.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn state(&self) -> &RepairState {
        &self.state
    }

    async fn is_target(&self, path: &Path) -> bool {
        if path == self.target {
            return true;
        }
        match &self.canonical {
            Some(canonical) => {
                path == canonical
                    || tokio::fs::canonicalize(path)
                        .await
                        .is_ok_and(|p| &p == canonical)
            }
            None => false,
        }
    }

    /// Debounce then guard, atomically with respect to other notifications.
    fn admit(&self) -> Result<RepairGuard, ChangeDisposition> {
        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < self.debounce {
                return Err(ChangeDisposition::Debounced);
            }
        }
        let guard = self.state.try_acquire().ok_or(ChangeDisposition::Busy)?;
        *last = Some(now);
        Ok(guard)
    }

    /// Handle one notification.
    pub async fn on_change(&self, path: &Path) -> ChangeDisposition {
        if !self.is_target(path).await {
            return ChangeDisposition::IgnoredPath;
        }
        let guard = match self.admit() {
            Ok(guard) => guard,
            Err(disposition) => return disposition,
        };

        let span = info_span!("cycle", id = %Uuid::new_v4());
        let disposition = AssertUnwindSafe(self.run_cycle())
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|panic| {
                error!(
                    "internal failure during repair cycle: {}",
                    panic_message(panic.as_ref())
                );
                ChangeDisposition::Failed
            });

        // A healthy scan writes nothing, so there is no echo to absorb.
        if disposition != ChangeDisposition::IntegrityOk && !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        drop(guard);
        disposition
    }

    async fn run_cycle(&self) -> ChangeDisposition {
        info!(target_file = %self.target.display(), "change detected, scanning");

        let report = match self.coordinator.tracer().run(&self.target).await {
            Ok(report) => report,
            Err(e) => {
                error!("integrity check could not run: {e}");
                return ChangeDisposition::Failed;
            }
        };

        if report.is_success() {
            info!(steps = report.trace_history.len(), "integrity OK");
            return ChangeDisposition::IntegrityOk;
        }

        warn!(
            status = %report.status,
            "failure detected: {}",
            report.error_headline()
        );
        info!("activating repair");

        match self.coordinator.attempt_repair(&report, &self.target).await {
            Ok(RepairOutcome::Applied(candidate)) => {
                info!(mode = %candidate.mode, "fix verified, target repaired");
                ChangeDisposition::Repaired
            }
            Ok(RepairOutcome::Rejected(Rejection::Verification(candidate))) => {
                warn!(
                    "candidate rejected, it failed during verification:\n{}",
                    candidate.verify_report.error_text()
                );
                ChangeDisposition::Rejected
            }
            Ok(RepairOutcome::Rejected(Rejection::Generation(e))) => {
                warn!("repair aborted: {e}");
                ChangeDisposition::Rejected
            }
            Err(e) => {
                error!("repair cycle failed: {e}");
                ChangeDisposition::Failed
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
