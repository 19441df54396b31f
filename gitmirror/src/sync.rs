//! One sync tick: fetch, hard reset, clean, read the revision.
//!
//! The steps run strictly in order and the first failure ends the tick. Reset
//! and clean are not transactional: a failure between them can leave
//! untracked residue until the next successful clean.

use chrono::Utc;
use tracing::instrument;

use crate::core::remote::repo_name;
use crate::core::target::{Credentials, RepositoryTarget};
use crate::core::types::{MirrorEvent, SyncResult, SyncStage};
use crate::error::SyncError;
use crate::events::EventSink;
use crate::io::git::{Vcs, tracking_ref};

/// Options for the clean step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Remove ignored files as well as untracked ones.
    pub clean_ignored: bool,
}

/// Make the checkout at `target.local_path` match the remote branch tip.
///
/// Local commits, tracked modifications, and untracked files are discarded.
/// Must only be called after [`ensure_ready`](crate::reconcile::ensure_ready)
/// has accepted the target.
#[instrument(skip_all, fields(path = %target.local_path.display(), branch = %target.branch))]
pub fn sync<V: Vcs>(
    vcs: &V,
    target: &RepositoryTarget,
    credentials: Option<&Credentials>,
    options: SyncOptions,
    sink: &mut impl EventSink,
) -> Result<SyncResult, SyncError> {
    let path = &target.local_path;
    let branch = &target.branch;

    let fetched = vcs
        .fetch(path, branch, credentials)
        .map_err(|e| SyncError::new(SyncStage::Fetch, e))?;
    sink.emit(MirrorEvent::Fetched {
        branch: branch.clone(),
        result: fetched,
    });

    let reset = vcs
        .hard_reset(path, &tracking_ref(branch))
        .map_err(|e| SyncError::new(SyncStage::Reset, e))?;
    sink.emit(MirrorEvent::Reset { result: reset });

    vcs.clean_untracked(path, options.clean_ignored)
        .map_err(|e| SyncError::new(SyncStage::Clean, e))?;

    let revision = vcs
        .head_revision(path)
        .map_err(|e| SyncError::new(SyncStage::Revision, e))?;
    sink.emit(MirrorEvent::Revision {
        sha: revision.clone(),
    });

    let timestamp = Utc::now();
    sink.emit(MirrorEvent::SyncFinished {
        repo_path: repo_name(&target.remote_url),
        timestamp,
    });
    Ok(SyncResult {
        revision,
        timestamp,
    })
}
