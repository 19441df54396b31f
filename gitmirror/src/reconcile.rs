//! Startup reconciliation: clone a fresh mirror or vet an existing checkout.
//!
//! An existing checkout is accepted only when it tracks the requested remote,
//! sits on the requested branch, and holds no local changes. The checks run in
//! that order and each stops before anything on disk is mutated, so a refused
//! directory is left exactly as it was found.

use tracing::{debug, info, instrument};

use crate::core::remote::{repo_name, same_repository};
use crate::core::target::{Credentials, RepositoryTarget};
use crate::core::types::{LocalCheckoutState, MirrorEvent};
use crate::error::ReconcileError;
use crate::events::EventSink;
use crate::io::git::Vcs;

/// A target that passed reconciliation and may now be synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyMirror {
    /// The requested target, with the branch spelled as it is on disk.
    pub target: RepositoryTarget,
    /// State of the pre-existing checkout; `None` when it was just cloned.
    pub checkout: Option<LocalCheckoutState>,
}

impl ReadyMirror {
    pub fn was_cloned(&self) -> bool {
        self.checkout.is_none()
    }
}

/// Initialize `target.local_path` or validate the checkout already there.
///
/// A fresh directory gets a metadata-only clone; the first sync step
/// materializes the files. An existing checkout is never modified here.
#[instrument(skip_all, fields(path = %target.local_path.display(), branch = %target.branch))]
pub fn ensure_ready<V: Vcs>(
    vcs: &V,
    target: &RepositoryTarget,
    credentials: Option<&Credentials>,
    sink: &mut impl EventSink,
) -> Result<ReadyMirror, ReconcileError> {
    let path = &target.local_path;
    let requested_name = repo_name(&target.remote_url);

    if !vcs.has_checkout(path) {
        debug!("no checkout found, cloning");
        vcs.clone_no_checkout(&target.remote_url, &target.branch, path, credentials)?;
        info!(repo = %requested_name, "cloned without checkout");
        sink.emit(MirrorEvent::Cloned {
            repo_name: requested_name,
        });
        return Ok(ReadyMirror {
            target: target.clone(),
            checkout: None,
        });
    }

    let (current_remote, current_branch) = vcs.remote_and_branch(path)?;

    if !same_repository(&current_remote, &target.remote_url) {
        return Err(ReconcileError::RepositoryMismatch {
            requested: requested_name,
            local: repo_name(&current_remote),
        });
    }

    if current_branch.to_lowercase() != target.branch.to_lowercase() {
        return Err(ReconcileError::BranchMismatch {
            requested: target.branch.clone(),
            local: current_branch,
        });
    }

    if vcs.is_dirty(path)? {
        return Err(ReconcileError::UncommittedChanges { path: path.clone() });
    }

    let head_revision = vcs.head_revision(path)?;
    debug!(head = %head_revision, "existing checkout accepted");
    Ok(ReadyMirror {
        target: RepositoryTarget {
            branch: current_branch.clone(),
            ..target.clone()
        },
        checkout: Some(LocalCheckoutState {
            exists: true,
            current_remote,
            current_branch,
            is_dirty: false,
            head_revision,
        }),
    })
}
