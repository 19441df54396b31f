//! Fill the gaps of a configured target.
//!
//! The branch may fall back to a naming convention; the remote may not. A
//! missing remote can only be learned from a checkout already on disk.

use tracing::debug;

use crate::core::remote::strip_credentials;
use crate::core::target::{DEFAULT_BRANCH, PartialTarget, RepositoryTarget};
use crate::error::ReconcileError;
use crate::io::git::Vcs;

/// Turn a partial target into a complete one.
///
/// Touches the disk only when the remote URL is unset.
pub fn resolve<V: Vcs>(vcs: &V, partial: &PartialTarget) -> Result<RepositoryTarget, ReconcileError> {
    let local_path = partial.local_path.clone();
    let (remote_url, branch) = match (&partial.remote_url, &partial.branch) {
        (Some(remote), Some(branch)) => (remote.clone(), branch.clone()),
        (Some(remote), None) => {
            debug!(branch = DEFAULT_BRANCH, "branch unset, using default");
            (remote.clone(), DEFAULT_BRANCH.to_string())
        }
        (None, branch) => {
            let (recorded, current_branch) = vcs.remote_and_branch(&local_path)?;
            let (remote, _) = strip_credentials(&recorded);
            debug!(path = %local_path.display(), "remote read from existing checkout");
            (remote, branch.clone().unwrap_or(current_branch))
        }
    };
    Ok(RepositoryTarget {
        remote_url,
        branch,
        local_path,
    })
}
