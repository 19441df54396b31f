//! VCS adapter: the handful of git operations a mirror needs.
//!
//! The engine talks to [`Vcs`] only, so tests can swap in a scripted fake and
//! a library binding could replace the subprocess implementation. [`GitCli`]
//! shells out to the `git` binary with a per-command timeout.
//!
//! Credentials never appear on a git command line. When a command talks to
//! the remote they are handed to git through the child's environment and an
//! inline `credential.helper` (git 2.31+ for `GIT_CONFIG_COUNT`).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::process::{CommandOutput, DEFAULT_OUTPUT_LIMIT_BYTES, run_with_timeout};
use crate::core::remote::redact;
use crate::core::target::Credentials;
use crate::error::VcsError;

/// Remote name used for the mirrored repository.
pub const ORIGIN: &str = "origin";

const USERNAME_ENV: &str = "GITMIRROR_USERNAME";
const PASSWORD_ENV: &str = "GITMIRROR_PASSWORD";

/// Answers `get` requests from the two variables above and ignores `store`/`erase`.
const CREDENTIAL_HELPER: &str = "!f() { test \"$1\" = get || return 0; \
echo \"username=${GITMIRROR_USERNAME}\"; echo \"password=${GITMIRROR_PASSWORD}\"; }; f";

/// Reported when a fetch found nothing new.
const FETCH_UP_TO_DATE: &str = "already up to date";

/// Capability set the reconciliation engine and sync step rely on.
///
/// All calls block until the underlying operation finishes or times out.
pub trait Vcs {
    /// True when version-control metadata exists at `path`.
    fn has_checkout(&self, path: &Path) -> bool;

    /// Recorded remote URL and current branch of the checkout at `path`.
    fn remote_and_branch(&self, path: &Path) -> Result<(String, String), VcsError>;

    /// Clone `remote` at `branch` into `path` without materializing files.
    fn clone_no_checkout(
        &self,
        remote: &str,
        branch: &str,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<(), VcsError>;

    /// Fetch `branch` from the recorded remote into its remote-tracking ref.
    /// Returns the command's report.
    fn fetch(
        &self,
        path: &Path,
        branch: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, VcsError>;

    /// Move HEAD, index, and working tree to `reference`. Returns the command's report.
    fn hard_reset(&self, path: &Path, reference: &str) -> Result<String, VcsError>;

    /// Delete untracked files and directories; ignored ones too when asked.
    fn clean_untracked(&self, path: &Path, include_ignored: bool) -> Result<(), VcsError>;

    fn head_revision(&self, path: &Path) -> Result<String, VcsError>;

    /// True when tracked modifications or untracked (non-ignored) files exist.
    ///
    /// A checkout that was cloned but never materialized only counts as dirty
    /// when untracked files were added to it.
    fn is_dirty(&self, path: &Path) -> Result<bool, VcsError>;
}

/// Name of the remote-tracking ref that mirrors `branch`.
pub fn tracking_ref(branch: &str) -> String {
    format!("{ORIGIN}/{branch}")
}

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }
}

/// [`Vcs`] implementation backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: PathBuf::from("git"),
            timeout,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Parsed status entries, including untracked files.
    pub fn status_porcelain(&self, path: &Path) -> Result<Vec<StatusEntry>, VcsError> {
        // Optional locks off: status must not rewrite the index of a checkout it only inspects.
        let out = self.run_capture(
            Some(path),
            &["--no-optional-locks", "status", "--porcelain=v1"],
        )?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(entry) = parse_status_line(line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// True once a reset or checkout has written the index.
    ///
    /// A `--no-checkout` clone has no index until the first sync materializes it.
    pub fn has_index(&self, path: &Path) -> Result<bool, VcsError> {
        let index = self.run_capture(Some(path), &["rev-parse", "--git-path", "index"])?;
        Ok(path.join(index).is_file())
    }

    fn command(
        &self,
        workdir: Option<&Path>,
        args: &[&str],
        credentials: Option<&Credentials>,
    ) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        // Never block on an interactive credential prompt.
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        if let Some(creds) = credentials {
            // The empty entry clears helpers inherited from user or system config.
            cmd.env("GIT_CONFIG_COUNT", "2")
                .env("GIT_CONFIG_KEY_0", "credential.helper")
                .env("GIT_CONFIG_VALUE_0", "")
                .env("GIT_CONFIG_KEY_1", "credential.helper")
                .env("GIT_CONFIG_VALUE_1", CREDENTIAL_HELPER)
                .env(USERNAME_ENV, &creds.username)
                .env(PASSWORD_ENV, &creds.password);
        }
        cmd
    }

    fn run(
        &self,
        workdir: Option<&Path>,
        args: &[&str],
        credentials: Option<&Credentials>,
    ) -> Result<CommandOutput, VcsError> {
        let cmd = self.command(workdir, args, credentials);
        let command = redact(&format!("git {}", args.join(" ")));
        let output = run_with_timeout(cmd, self.timeout, self.output_limit_bytes).map_err(
            |source| VcsError::Spawn {
                command: command.clone(),
                source,
            },
        )?;
        if output.timed_out() {
            return Err(VcsError::TimedOut {
                command,
                timeout_secs: self.timeout.as_secs(),
            });
        }
        if !output.success() {
            return Err(VcsError::CommandFailed {
                command,
                exit_status: output.exit_code(),
                stderr: redact(&output.stderr_text()),
            });
        }
        Ok(output)
    }

    fn run_capture(&self, workdir: Option<&Path>, args: &[&str]) -> Result<String, VcsError> {
        Ok(self.run(workdir, args, None)?.stdout_text())
    }
}

impl Vcs for GitCli {
    fn has_checkout(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn remote_and_branch(&self, path: &Path) -> Result<(String, String), VcsError> {
        if !self.has_checkout(path) {
            return Err(VcsError::NotARepository {
                path: path.to_path_buf(),
            });
        }
        let remote_key = format!("remote.{ORIGIN}.url");
        let remote = self.run_capture(Some(path), &["config", "--get", &remote_key])?;
        let branch = self.run_capture(Some(path), &["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch == "HEAD" {
            warn!("detached HEAD detected");
            return Err(VcsError::DetachedHead {
                path: path.to_path_buf(),
            });
        }
        debug!(remote = %redact(&remote), branch = %branch, "read checkout identity");
        Ok((remote, branch))
    }

    #[instrument(skip_all, fields(branch = %branch, path = %path.display()))]
    fn clone_no_checkout(
        &self,
        remote: &str,
        branch: &str,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<(), VcsError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| VcsError::Spawn {
                command: format!("mkdir {}", parent.display()),
                source,
            })?;
        }
        let dest = path.to_string_lossy();
        self.run(
            None,
            &["clone", "--no-checkout", "-b", branch, "--", remote, &dest],
            credentials,
        )?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch = %branch, path = %path.display()))]
    fn fetch(
        &self,
        path: &Path,
        branch: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, VcsError> {
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{ORIGIN}/{branch}");
        let output = self.run(Some(path), &["fetch", ORIGIN, &refspec], credentials)?;
        // git writes its ref-update summary to stderr.
        let report = redact(&output.stderr_text());
        if report.is_empty() {
            return Ok(FETCH_UP_TO_DATE.to_string());
        }
        Ok(report)
    }

    #[instrument(skip_all, fields(reference = %reference, path = %path.display()))]
    fn hard_reset(&self, path: &Path, reference: &str) -> Result<String, VcsError> {
        self.run_capture(Some(path), &["reset", "--hard", reference])
    }

    #[instrument(skip_all, fields(include_ignored = include_ignored, path = %path.display()))]
    fn clean_untracked(&self, path: &Path, include_ignored: bool) -> Result<(), VcsError> {
        let flags = if include_ignored { "-fdxq" } else { "-fdq" };
        self.run_capture(Some(path), &["clean", flags])?;
        Ok(())
    }

    fn head_revision(&self, path: &Path) -> Result<String, VcsError> {
        self.run_capture(Some(path), &["rev-parse", "HEAD"])
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn is_dirty(&self, path: &Path) -> Result<bool, VcsError> {
        let materialized = self.has_index(path)?;
        let entries = self.status_porcelain(path)?;
        // Without an index every tracked file reads as a staged deletion.
        let changed = entries
            .iter()
            .filter(|e| materialized || e.is_untracked())
            .count();
        if !materialized {
            debug!("checkout not yet materialized");
        }
        if changed > 0 {
            warn!(changed, "worktree not clean");
        }
        Ok(changed > 0)
    }
}

fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Some(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return None;
    }
    let code = line.get(..2)?.to_string();
    let mut path = line.get(3..)?.trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Some(StatusEntry { code, path })
}
