//! Poll driver: reconcile once, then sync on a fixed interval.
//!
//! The loop is strictly sequential. A failed tick is reported and retried on
//! the next interval; a failed reconciliation ends the run before any tick.
//! Shutdown is observed only while sleeping between ticks, never in the middle
//! of a git command.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::target::{Credentials, RepositoryTarget};
use crate::core::types::MirrorEvent;
use crate::error::ReconcileError;
use crate::events::EventSink;
use crate::io::git::Vcs;
use crate::reconcile::ensure_ready;
use crate::sync::{SyncOptions, sync};

/// Poll driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Sleep between ticks.
    pub interval: Duration,
    /// Stop after this many ticks. Runs until shutdown when `None`.
    pub max_ticks: Option<u64>,
    pub sync: SyncOptions,
}

/// Why `run_loop` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    Shutdown,
    MaxTicks,
}

/// Summary of a poll driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub ticks: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Revision reported by the most recent successful tick.
    pub last_revision: Option<String>,
    pub stop: LoopStop,
}

/// Cloneable stop signal shared between the host and the poll driver.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake a sleeping loop.
    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleep for up to `timeout`. Returns true when shutdown was requested.
    ///
    /// A timeout too large to express as a deadline waits for shutdown only.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while !*stopped {
            let Some(deadline) = deadline else {
                stopped = cvar
                    .wait(stopped)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = match cvar.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *stopped
    }
}

/// Reconcile `target`, then sync it every `config.interval` until stopped.
///
/// Returns an error only when reconciliation fails. Sync failures are emitted
/// as [`MirrorEvent::SyncFailed`] and counted in the outcome.
pub fn run_loop<V: Vcs>(
    vcs: &V,
    target: &RepositoryTarget,
    credentials: Option<&Credentials>,
    config: &LoopConfig,
    shutdown: &Shutdown,
    sink: &mut impl EventSink,
) -> Result<LoopOutcome, ReconcileError> {
    let ready = match ensure_ready(vcs, target, credentials, &mut *sink) {
        Ok(ready) => ready,
        Err(err) => {
            sink.emit(MirrorEvent::ReconcileFailed {
                kind: err.kind(),
                error: err.to_string(),
            });
            return Err(err);
        }
    };
    let target = &ready.target;
    info!(
        path = %target.local_path.display(),
        branch = %target.branch,
        cloned = ready.was_cloned(),
        "mirror ready"
    );

    let mut outcome = LoopOutcome {
        ticks: 0,
        succeeded: 0,
        failed: 0,
        last_revision: None,
        stop: LoopStop::Shutdown,
    };

    loop {
        if shutdown.is_triggered() {
            outcome.stop = LoopStop::Shutdown;
            return Ok(outcome);
        }

        outcome.ticks += 1;
        match sync(vcs, target, credentials, config.sync, &mut *sink) {
            Ok(result) => {
                debug!(tick = outcome.ticks, revision = %result.revision, "tick succeeded");
                outcome.succeeded += 1;
                outcome.last_revision = Some(result.revision);
            }
            Err(err) => {
                warn!(tick = outcome.ticks, stage = %err.stage, "tick failed");
                outcome.failed += 1;
                sink.emit(MirrorEvent::SyncFailed {
                    stage: err.stage,
                    error: err.source.to_string(),
                });
            }
        }

        if config.max_ticks.is_some_and(|max| outcome.ticks >= max) {
            outcome.stop = LoopStop::MaxTicks;
            return Ok(outcome);
        }

        sink.emit(MirrorEvent::PollWait {
            seconds: config.interval.as_secs(),
        });
        if shutdown.wait(config.interval) {
            outcome.stop = LoopStop::Shutdown;
            return Ok(outcome);
        }
    }
}
