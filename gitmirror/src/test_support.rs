//! Test-only helpers: a scripted in-memory VCS and real throwaway git remotes.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::core::target::Credentials;
use crate::core::types::MirrorEvent;
use crate::error::VcsError;
use crate::events::EventSink;
use crate::io::git::{ORIGIN, Vcs};

/// Sink that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<MirrorEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: MirrorEvent) {
        self.events.push(event);
    }
}

/// A successful call made against [`FakeVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    HasCheckout,
    RemoteAndBranch,
    Clone {
        remote: String,
        branch: String,
        authenticated: bool,
    },
    Fetch {
        branch: String,
        authenticated: bool,
    },
    HardReset {
        reference: String,
    },
    Clean {
        include_ignored: bool,
    },
    HeadRevision,
    IsDirty,
}

impl VcsCall {
    /// Calls that change the checkout or its metadata.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            VcsCall::Clone { .. }
                | VcsCall::Fetch { .. }
                | VcsCall::HardReset { .. }
                | VcsCall::Clean { .. }
        )
    }
}

/// Operation selector for [`FakeVcs::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOp {
    Clone,
    Fetch,
    HardReset,
    Clean,
    HeadRevision,
}

/// Local checkout simulated by [`FakeVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCheckout {
    pub remote: String,
    pub branch: String,
    pub head: String,
    pub dirty: bool,
}

impl FakeCheckout {
    pub fn clean(remote: &str, branch: &str, head: &str) -> Self {
        Self {
            remote: remote.to_string(),
            branch: branch.to_string(),
            head: head.to_string(),
            dirty: false,
        }
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }
}

#[derive(Debug)]
struct FakeState {
    checkout: Option<FakeCheckout>,
    remote_tip: String,
    fetched_tip: Option<String>,
    calls: Vec<VcsCall>,
    failures: Vec<FakeOp>,
}

/// In-memory [`Vcs`] for a single local path and a single remote branch.
///
/// Only successful calls are recorded. Failures injected with
/// [`fail_next`](Self::fail_next) fire once each, in the order queued.
#[derive(Debug)]
pub struct FakeVcs {
    state: RefCell<FakeState>,
}

impl FakeVcs {
    /// No checkout on disk yet; the remote branch tip is `remote_tip`.
    pub fn empty(remote_tip: &str) -> Self {
        Self::build(None, remote_tip)
    }

    pub fn with_checkout(checkout: FakeCheckout, remote_tip: &str) -> Self {
        Self::build(Some(checkout), remote_tip)
    }

    fn build(checkout: Option<FakeCheckout>, remote_tip: &str) -> Self {
        Self {
            state: RefCell::new(FakeState {
                checkout,
                remote_tip: remote_tip.to_string(),
                fetched_tip: None,
                calls: Vec::new(),
                failures: Vec::new(),
            }),
        }
    }

    pub fn fail_next(&self, op: FakeOp) {
        self.state.borrow_mut().failures.push(op);
    }

    pub fn set_remote_tip(&self, tip: &str) {
        self.state.borrow_mut().remote_tip = tip.to_string();
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.state.borrow().calls.clone()
    }

    pub fn mutations(&self) -> Vec<VcsCall> {
        self.calls().into_iter().filter(VcsCall::is_mutation).collect()
    }

    pub fn head(&self) -> Option<String> {
        self.state.borrow().checkout.as_ref().map(|c| c.head.clone())
    }

    fn take_failure(&self, op: FakeOp) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        if let Some(idx) = state.failures.iter().position(|f| *f == op) {
            state.failures.remove(idx);
            return Err(VcsError::CommandFailed {
                command: format!("git {op:?}").to_lowercase(),
                exit_status: Some(128),
                stderr: "fatal: injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, call: VcsCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn not_a_repository(path: &Path) -> VcsError {
        VcsError::NotARepository {
            path: path.to_path_buf(),
        }
    }
}

impl Vcs for FakeVcs {
    fn has_checkout(&self, _path: &Path) -> bool {
        self.record(VcsCall::HasCheckout);
        self.state.borrow().checkout.is_some()
    }

    fn remote_and_branch(&self, path: &Path) -> Result<(String, String), VcsError> {
        let found = self
            .state
            .borrow()
            .checkout
            .as_ref()
            .map(|c| (c.remote.clone(), c.branch.clone()));
        let found = found.ok_or_else(|| Self::not_a_repository(path))?;
        self.record(VcsCall::RemoteAndBranch);
        Ok(found)
    }

    fn clone_no_checkout(
        &self,
        remote: &str,
        branch: &str,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<(), VcsError> {
        self.take_failure(FakeOp::Clone)?;
        {
            let mut state = self.state.borrow_mut();
            if state.checkout.is_some() {
                return Err(VcsError::CommandFailed {
                    command: format!("git clone {}", path.display()),
                    exit_status: Some(128),
                    stderr: "fatal: destination path already exists".to_string(),
                });
            }
            let tip = state.remote_tip.clone();
            state.checkout = Some(FakeCheckout::clean(remote, branch, &tip));
            state.fetched_tip = Some(tip);
        }
        self.record(VcsCall::Clone {
            remote: remote.to_string(),
            branch: branch.to_string(),
            authenticated: credentials.is_some(),
        });
        Ok(())
    }

    fn fetch(
        &self,
        path: &Path,
        branch: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, VcsError> {
        self.take_failure(FakeOp::Fetch)?;
        let tip = {
            let mut state = self.state.borrow_mut();
            if state.checkout.is_none() {
                return Err(Self::not_a_repository(path));
            }
            let tip = state.remote_tip.clone();
            state.fetched_tip = Some(tip.clone());
            tip
        };
        self.record(VcsCall::Fetch {
            branch: branch.to_string(),
            authenticated: credentials.is_some(),
        });
        Ok(format!("{tip} -> {ORIGIN}/{branch}"))
    }

    fn hard_reset(&self, path: &Path, reference: &str) -> Result<String, VcsError> {
        self.take_failure(FakeOp::HardReset)?;
        let report = {
            let mut state = self.state.borrow_mut();
            let tip = state.fetched_tip.clone().ok_or_else(|| VcsError::CommandFailed {
                command: format!("git reset --hard {reference}"),
                exit_status: Some(128),
                stderr: format!("fatal: ambiguous argument '{reference}'"),
            })?;
            let checkout = state
                .checkout
                .as_mut()
                .ok_or_else(|| Self::not_a_repository(path))?;
            checkout.head = tip.clone();
            checkout.dirty = false;
            format!("HEAD is now at {tip}")
        };
        self.record(VcsCall::HardReset {
            reference: reference.to_string(),
        });
        Ok(report)
    }

    fn clean_untracked(&self, path: &Path, include_ignored: bool) -> Result<(), VcsError> {
        self.take_failure(FakeOp::Clean)?;
        if self.state.borrow().checkout.is_none() {
            return Err(Self::not_a_repository(path));
        }
        self.record(VcsCall::Clean { include_ignored });
        Ok(())
    }

    fn head_revision(&self, path: &Path) -> Result<String, VcsError> {
        self.take_failure(FakeOp::HeadRevision)?;
        let head = self.head().ok_or_else(|| Self::not_a_repository(path))?;
        self.record(VcsCall::HeadRevision);
        Ok(head)
    }

    fn is_dirty(&self, path: &Path) -> Result<bool, VcsError> {
        let dirty = self
            .state
            .borrow()
            .checkout
            .as_ref()
            .map(|c| c.dirty)
            .ok_or_else(|| Self::not_a_repository(path))?;
        self.record(VcsCall::IsDirty);
        Ok(dirty)
    }
}

/// Run git in `dir` with a fixed identity, returning trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "-c", "core.autocrlf=false"])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Mirror Test")
        .env("GIT_AUTHOR_EMAIL", "mirror@example.com")
        .env("GIT_COMMITTER_NAME", "Mirror Test")
        .env("GIT_COMMITTER_EMAIL", "mirror@example.com")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// A bare repository plus a working clone used to publish commits to it.
///
/// Everything lives in one temp directory that is removed on drop.
pub struct TestRemote {
    temp: TempDir,
    bare: PathBuf,
    work: PathBuf,
    branch: String,
}

impl TestRemote {
    /// Create a remote whose `branch` holds one commit with a README.
    pub fn new(branch: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let bare = temp.path().join("remote.git");
        let work = temp.path().join("publisher");
        fs::create_dir_all(&bare).context("create bare dir")?;
        fs::create_dir_all(&work).context("create work dir")?;

        git(&bare, &["init", "--bare", "--quiet"])?;
        git(&work, &["init", "--quiet"])?;
        let head = format!("refs/heads/{branch}");
        git(&work, &["symbolic-ref", "HEAD", &head])?;
        git(&work, &["remote", "add", ORIGIN, &bare.to_string_lossy()])?;

        let remote = Self {
            temp,
            bare,
            work,
            branch: branch.to_string(),
        };
        remote.commit_file("README.md", "# mirror test\n", "initial commit")?;
        Ok(remote)
    }

    /// Remote URL to hand to the mirror (a filesystem path).
    pub fn url(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// A not-yet-existing directory inside the temp dir for a mirror checkout.
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Write `name`, commit it, push, and return the new tip.
    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Result<String> {
        let path = self.work.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        git(&self.work, &["add", "-A"])?;
        git(&self.work, &["commit", "--quiet", "-m", message])?;
        git(&self.work, &["push", "--quiet", ORIGIN, &self.branch])?;
        self.tip()
    }

    /// Current tip of the published branch.
    pub fn tip(&self) -> Result<String> {
        let reference = format!("refs/heads/{}", self.branch);
        git(&self.bare, &["rev-parse", &reference])
    }
}

/// Snapshot a directory tree as sorted `(relative path, bytes)` pairs.
///
/// Symlinks are not followed; a link is recorded by its target path.
pub fn snapshot_dir(root: &Path) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let path = entry.path();
        let file_type = entry.file_type();
        let bytes = if file_type.is_symlink() {
            let target = fs::read_link(path).with_context(|| format!("readlink {}", path.display()))?;
            target.to_string_lossy().into_owned().into_bytes()
        } else if file_type.is_file() {
            fs::read(path).with_context(|| format!("read {}", path.display()))?
        } else {
            continue;
        };
        let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        out.push((rel, bytes));
    }
    out.sort();
    Ok(out)
}
