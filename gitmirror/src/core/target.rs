//! The mirrored repository target and the credentials that travel beside it.

use std::fmt;
use std::path::PathBuf;

/// Branch used when the configuration leaves it unset.
///
/// This is a naming convention, not a lookup of the remote's default branch.
pub const DEFAULT_BRANCH: &str = "master";

/// A fully resolved mirror target: which remote branch lands in which directory.
///
/// `remote_url` never carries credentials; those live in [`Credentials`] and are
/// injected by the VCS adapter only when it talks to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub remote_url: String,
    pub branch: String,
    pub local_path: PathBuf,
}

/// A target as it comes out of configuration, before gaps are filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTarget {
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub local_path: PathBuf,
}

impl PartialTarget {
    /// Build a partial target, treating blank strings as unset.
    pub fn new(
        remote_url: Option<String>,
        branch: Option<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remote_url: non_blank(remote_url),
            branch: non_blank(branch),
            local_path: local_path.into(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Username/password pair for HTTP(S) remotes.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_become_unset() {
        let partial = PartialTarget::new(Some("  ".to_string()), Some(String::new()), "/tmp/m");
        assert_eq!(partial.remote_url, None);
        assert_eq!(partial.branch, None);
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
