//! Shared value types for the mirror engine.
//!
//! These are plain data: snapshots of on-disk state, per-tick results, and the
//! events the engine reports to its host.

use std::fmt;

use chrono::{DateTime, Utc};

/// Snapshot of a local checkout, recomputed on every check and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCheckoutState {
    /// Whether version-control metadata exists at the local path.
    pub exists: bool,
    pub current_remote: String,
    pub current_branch: String,
    /// Uncommitted or untracked (non-ignored) changes are present.
    pub is_dirty: bool,
    pub head_revision: String,
}

/// Outcome of one successful sync step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub revision: String,
    pub timestamp: DateTime<Utc>,
}

/// The ordered steps of a sync tick, used to say which one failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Reset,
    Clean,
    Revision,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Fetch => "fetch",
            SyncStage::Reset => "reset",
            SyncStage::Clean => "clean",
            SyncStage::Revision => "revision",
        };
        f.write_str(name)
    }
}

/// Structured events emitted by the engine and the poll driver.
///
/// No variant carries credentials: repository names are URL paths and error
/// text is redacted before it is stored in an error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    Cloned {
        repo_name: String,
    },
    Fetched {
        branch: String,
        result: String,
    },
    Reset {
        result: String,
    },
    Revision {
        sha: String,
    },
    SyncFinished {
        repo_path: String,
        timestamp: DateTime<Utc>,
    },
    PollWait {
        seconds: u64,
    },
    SyncFailed {
        stage: SyncStage,
        error: String,
    },
    ReconcileFailed {
        kind: &'static str,
        error: String,
    },
}
