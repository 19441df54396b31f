//! Error types for the VCS adapter, the reconciliation engine, and the sync step.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::SyncStage;

/// Failures reported by a [`Vcs`](crate::io::git::Vcs) implementation.
///
/// `CommandFailed`, `TimedOut`, and `Spawn` all mean "a VCS command did not
/// succeed". Command lines and stderr are redacted before they are stored.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("no repository found in {}", path.display())]
    NotARepository { path: PathBuf },

    #[error("checkout at {} has a detached HEAD", path.display())]
    DetachedHead { path: PathBuf },

    #[error("`{command}` failed (exit status {}): {stderr}", display_status(*exit_status))]
    CommandFailed {
        command: String,
        exit_status: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn display_status(status: Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// Reasons the engine refuses to treat a directory as a mirror.
///
/// Every variant is fatal at startup; the poll loop never starts.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("repository not found in {}", path.display())]
    NotARepository { path: PathBuf },

    #[error("requested repo {requested} and destination cloned repo {local} are different")]
    RepositoryMismatch { requested: String, local: String },

    #[error("requested branch {requested} and destination branch {local} are different")]
    BranchMismatch { requested: String, local: String },

    #[error("there are uncommitted changes at {} that syncing would override", path.display())]
    UncommittedChanges { path: PathBuf },

    #[error(transparent)]
    Vcs(VcsError),
}

impl ReconcileError {
    /// Stable name of the failure kind, used in events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::NotARepository { .. } => "NotARepository",
            ReconcileError::RepositoryMismatch { .. } => "RepositoryMismatch",
            ReconcileError::BranchMismatch { .. } => "BranchMismatch",
            ReconcileError::UncommittedChanges { .. } => "UncommittedChanges",
            ReconcileError::Vcs(_) => "VcsCommandFailed",
        }
    }
}

impl From<VcsError> for ReconcileError {
    fn from(err: VcsError) -> Self {
        match err {
            VcsError::NotARepository { path } => ReconcileError::NotARepository { path },
            other => ReconcileError::Vcs(other),
        }
    }
}

/// A sync tick that stopped at `stage`. Non-fatal to the poll loop.
#[derive(Debug, Error)]
#[error("sync {stage} step failed: {source}")]
pub struct SyncError {
    pub stage: SyncStage,
    #[source]
    pub source: VcsError,
}

impl SyncError {
    pub fn new(stage: SyncStage, source: VcsError) -> Self {
        Self { stage, source }
    }
}
