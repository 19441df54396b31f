//! Remote URL handling: identity comparison, display names, and credentials.
//!
//! Three remote spellings are understood:
//!
//! - URLs with a scheme (`https://host/team/repo.git`, `ssh://git@host/repo`)
//! - scp-like ssh shorthand (`git@host:team/repo.git`)
//! - anything else is treated as a filesystem path to a repository
//!
//! Identity ignores the scheme, any user info, letter case, and a
//! trailing `.git` suffix, so `https://Host/Team/Repo` and
//! `ssh://git@host/team/repo.git` name the same repository.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::target::Credentials;

static SCP_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[^@/]+@)?([^:/]{2,}):(.+)$").unwrap());

static USERINFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z][A-Za-z0-9+.\-]*://)[^/@\s]+@").unwrap());

/// Normalized `(authority, path)` pair used to decide whether two remotes match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    /// Host (and non-default port), without user info. Empty for local paths.
    pub authority: String,
    /// Repository path, lowercased, without trailing `/` or `.git`.
    pub path: String,
}

enum Parsed {
    Url(Url),
    ScpLike { host: String, path: String },
    Local(String),
}

fn parse(remote: &str) -> Parsed {
    let remote = remote.trim();
    if remote.contains("://")
        && let Ok(url) = Url::parse(remote)
    {
        return Parsed::Url(url);
    }
    if let Some(caps) = SCP_LIKE_RE.captures(remote) {
        return Parsed::ScpLike {
            host: caps[1].to_string(),
            path: format!("/{}", caps[2].trim_start_matches('/')),
        };
    }
    Parsed::Local(remote.to_string())
}

/// Compute the comparison identity of a remote.
pub fn identity(remote: &str) -> RemoteIdentity {
    let (authority, path) = match parse(remote) {
        Parsed::Url(url) => {
            let host = url.host_str().unwrap_or_default().to_string();
            let authority = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            };
            (authority, url.path().to_string())
        }
        Parsed::ScpLike { host, path } => (host, path),
        Parsed::Local(path) => (String::new(), path),
    };
    RemoteIdentity {
        authority: authority.to_lowercase(),
        path: normalize_path(&path),
    }
}

fn normalize_path(path: &str) -> String {
    let lowered = path.to_lowercase();
    let trimmed = lowered.trim_end_matches('/');
    let stripped = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    stripped.trim_end_matches('/').to_string()
}

/// True when both spellings name the same remote repository.
pub fn same_repository(a: &str, b: &str) -> bool {
    identity(a) == identity(b)
}

/// Human-facing repository name: the path part of the remote, never user info.
pub fn repo_name(remote: &str) -> String {
    match parse(remote) {
        Parsed::Url(url) => url.path().to_string(),
        Parsed::ScpLike { path, .. } => path,
        Parsed::Local(path) => path,
    }
}

/// Split user info out of a remote URL.
///
/// Returns the URL without user info and, when a username was embedded, the
/// percent-decoded credentials.
pub fn strip_credentials(remote: &str) -> (String, Option<Credentials>) {
    let Parsed::Url(mut url) = parse(remote) else {
        return (remote.trim().to_string(), None);
    };
    if url.username().is_empty() && url.password().is_none() {
        return (remote.trim().to_string(), None);
    }
    let credentials = Credentials::new(
        decode(url.username()),
        url.password().map(decode).unwrap_or_default(),
    );
    // Both setters only fail for cannot-be-a-base URLs, which never carry user info.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    (url.to_string(), Some(credentials))
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Replace any `scheme://user[:pass]@` user info in `text` with `scheme://***@`.
pub fn redact(text: &str) -> String {
    USERINFO_RE.replace_all(text, "${1}***@").into_owned()
}
