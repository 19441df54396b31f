//! End-to-end mirror tests against real git repositories.
//!
//! Each test publishes commits to a throwaway bare remote and drives
//! `resolve`, `ensure_ready`, and `sync` through the real `GitCli`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use gitmirror::core::target::{Credentials, PartialTarget, RepositoryTarget};
use gitmirror::core::types::MirrorEvent;
use gitmirror::error::ReconcileError;
use gitmirror::io::git::{GitCli, Vcs};
use gitmirror::looping::{LoopConfig, LoopStop, Shutdown, run_loop};
use gitmirror::reconcile::ensure_ready;
use gitmirror::resolve::resolve;
use gitmirror::sync::{SyncOptions, sync};
use gitmirror::test_support::{RecordingSink, TestRemote, git, snapshot_dir};

fn cli() -> GitCli {
    GitCli::new(Duration::from_secs(60))
}

fn target(remote: &TestRemote, path: &Path) -> RepositoryTarget {
    RepositoryTarget {
        remote_url: remote.url(),
        branch: remote.branch().to_string(),
        local_path: path.to_path_buf(),
    }
}

/// Clone and sync once so `path` holds a clean checkout of the remote tip.
fn mirror_once(vcs: &GitCli, target: &RepositoryTarget) {
    let mut sink = RecordingSink::default();
    let ready = ensure_ready(vcs, target, None, &mut sink).expect("ready");
    sync(vcs, &ready.target, None, SyncOptions::default(), &mut sink).expect("sync");
}

#[test]
fn fresh_directory_is_cloned_and_synced_to_remote_tip() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    let mut sink = RecordingSink::default();

    let ready = ensure_ready(&vcs, &target, None, &mut sink).expect("ready");
    assert!(ready.was_cloned());
    assert!(path.join(".git").is_dir());

    let result = sync(&vcs, &ready.target, None, SyncOptions::default(), &mut sink).expect("sync");
    assert_eq!(result.revision, remote.tip().expect("tip"));
    assert_eq!(
        fs::read_to_string(path.join("README.md")).expect("readme"),
        "# mirror test\n"
    );
    assert!(matches!(sink.events.first(), Some(MirrorEvent::Cloned { .. })));
    assert!(matches!(sink.events.last(), Some(MirrorEvent::SyncFinished { .. })));
}

#[test]
fn later_remote_commits_arrive_on_next_sync() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    mirror_once(&vcs, &target);

    let tip = remote
        .commit_file("docs/notes.md", "new\n", "add notes")
        .expect("commit");
    let mut sink = RecordingSink::default();
    let ready = ensure_ready(&vcs, &target, None, &mut sink).expect("ready again");
    assert!(!ready.was_cloned());
    let result = sync(&vcs, &ready.target, None, SyncOptions::default(), &mut sink).expect("sync");

    assert_eq!(result.revision, tip);
    assert_eq!(vcs.head_revision(&path).expect("head"), tip);
    assert!(path.join("docs/notes.md").is_file());
}

#[test]
fn clone_that_was_never_synced_is_ready_on_restart() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();

    ensure_ready(&vcs, &target, None, &mut RecordingSink::default()).expect("clone");
    assert!(!vcs.is_dirty(&path).expect("status"));
    let ready =
        ensure_ready(&vcs, &target, None, &mut RecordingSink::default()).expect("restart");
    assert!(!ready.was_cloned());

    let result = sync(
        &vcs,
        &ready.target,
        None,
        SyncOptions::default(),
        &mut RecordingSink::default(),
    )
    .expect("sync");
    assert_eq!(result.revision, remote.tip().expect("tip"));
    assert!(path.join("README.md").is_file());
}

#[test]
fn untracked_file_in_never_synced_clone_refuses() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    ensure_ready(&vcs, &target, None, &mut RecordingSink::default()).expect("clone");

    fs::write(path.join("dropped-in.txt"), "mine\n").expect("write");
    let err = ensure_ready(&vcs, &target, None, &mut RecordingSink::default())
        .expect_err("untracked file");
    assert!(matches!(err, ReconcileError::UncommittedChanges { .. }));
    assert!(path.join("dropped-in.txt").is_file());
}

#[test]
fn fetch_event_reports_the_ref_update() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    mirror_once(&vcs, &target);
    remote
        .commit_file("next.txt", "next\n", "next")
        .expect("commit");

    let mut sink = RecordingSink::default();
    sync(&vcs, &target, None, SyncOptions::default(), &mut sink).expect("sync");
    let report = sink
        .events
        .iter()
        .find_map(|e| match e {
            MirrorEvent::Fetched { result, .. } => Some(result.clone()),
            _ => None,
        })
        .expect("fetched event");
    assert!(report.contains("origin/main"), "report: {report}");
}

#[test]
fn repeated_sync_without_remote_change_is_stable() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    mirror_once(&vcs, &target);
    let before = snapshot_dir(&path).expect("snapshot");

    let result = sync(
        &vcs,
        &target,
        None,
        SyncOptions::default(),
        &mut RecordingSink::default(),
    )
    .expect("sync");

    assert_eq!(result.revision, remote.tip().expect("tip"));
    let after = snapshot_dir(&path).expect("snapshot");
    let worktree = |snap: Vec<(std::path::PathBuf, Vec<u8>)>| {
        snap.into_iter()
            .filter(|(p, _)| !p.starts_with(".git"))
            .collect::<Vec<_>>()
    };
    assert_eq!(worktree(before), worktree(after));
}

#[test]
fn remote_without_git_suffix_is_the_same_repository() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));

    let unsuffixed = remote.url().trim_end_matches(".git").to_string();
    let requested = RepositoryTarget {
        remote_url: unsuffixed,
        branch: "main".to_string(),
        local_path: path.clone(),
    };
    let ready =
        ensure_ready(&vcs, &requested, None, &mut RecordingSink::default()).expect("accepted");
    assert!(!ready.was_cloned());
}

#[test]
fn branch_name_matches_case_insensitively() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));

    let requested = RepositoryTarget {
        branch: "Main".to_string(),
        ..target(&remote, &path)
    };
    let mut sink = RecordingSink::default();
    let ready = ensure_ready(&vcs, &requested, None, &mut sink).expect("accepted");
    assert_eq!(ready.target.branch, "main");

    let result = sync(&vcs, &ready.target, None, SyncOptions::default(), &mut sink).expect("sync");
    assert_eq!(result.revision, remote.tip().expect("tip"));
}

#[test]
fn untracked_file_refuses_and_leaves_directory_untouched() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));
    remote
        .commit_file("later.txt", "later\n", "remote moves on")
        .expect("commit");

    fs::write(path.join("scratch.txt"), "local work\n").expect("write scratch");
    let before = snapshot_dir(&path).expect("snapshot");

    let mut sink = RecordingSink::default();
    let err = ensure_ready(&vcs, &target(&remote, &path), None, &mut sink)
        .expect_err("dirty checkout");

    assert!(matches!(err, ReconcileError::UncommittedChanges { .. }));
    assert_eq!(err.kind(), "UncommittedChanges");
    assert!(sink.events.is_empty());
    assert_eq!(snapshot_dir(&path).expect("snapshot"), before);
}

#[test]
fn tracked_modification_refuses() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));

    fs::write(path.join("README.md"), "edited\n").expect("edit");
    let err = ensure_ready(
        &vcs,
        &target(&remote, &path),
        None,
        &mut RecordingSink::default(),
    )
    .expect_err("dirty checkout");
    assert!(matches!(err, ReconcileError::UncommittedChanges { .. }));
    assert_eq!(
        fs::read_to_string(path.join("README.md")).expect("readme"),
        "edited\n"
    );
}

#[test]
fn different_remote_refuses_and_leaves_directory_untouched() {
    let remote = TestRemote::new("main").expect("remote");
    let other = TestRemote::new("main").expect("other remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));
    let before = snapshot_dir(&path).expect("snapshot");

    let requested = RepositoryTarget {
        remote_url: other.url(),
        ..target(&remote, &path)
    };
    let err = ensure_ready(&vcs, &requested, None, &mut RecordingSink::default())
        .expect_err("mismatch");

    assert!(matches!(err, ReconcileError::RepositoryMismatch { .. }));
    assert_eq!(snapshot_dir(&path).expect("snapshot"), before);
}

#[test]
fn different_branch_refuses_and_leaves_directory_untouched() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));
    let before = snapshot_dir(&path).expect("snapshot");

    let requested = RepositoryTarget {
        branch: "release".to_string(),
        ..target(&remote, &path)
    };
    let err = ensure_ready(&vcs, &requested, None, &mut RecordingSink::default())
        .expect_err("mismatch");

    match err {
        ReconcileError::BranchMismatch { requested, local } => {
            assert_eq!(requested, "release");
            assert_eq!(local, "main");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(snapshot_dir(&path).expect("snapshot"), before);
}

#[test]
fn directory_without_git_metadata_is_cloned_into_when_empty() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    fs::create_dir_all(&path).expect("mkdir");
    let vcs = cli();

    let ready = ensure_ready(
        &vcs,
        &target(&remote, &path),
        None,
        &mut RecordingSink::default(),
    )
    .expect("ready");
    assert!(ready.was_cloned());
}

#[test]
fn sync_discards_local_commits_and_untracked_files() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    mirror_once(&vcs, &target);

    fs::write(path.join("local.txt"), "local\n").expect("write");
    git(&path, &["add", "local.txt"]).expect("add");
    git(&path, &["commit", "--quiet", "-m", "local only"]).expect("commit");
    fs::create_dir_all(path.join("junk")).expect("mkdir");
    fs::write(path.join("junk/untracked.bin"), [0u8, 1, 2]).expect("write junk");

    let result = sync(
        &vcs,
        &target,
        None,
        SyncOptions::default(),
        &mut RecordingSink::default(),
    )
    .expect("sync");

    assert_eq!(result.revision, remote.tip().expect("tip"));
    assert!(!path.join("local.txt").exists());
    assert!(!path.join("junk").exists());
    assert!(!vcs.is_dirty(&path).expect("status"));
}

#[test]
fn ignored_files_survive_unless_asked() {
    let remote = TestRemote::new("main").expect("remote");
    remote
        .commit_file(".gitignore", "*.cache\n", "ignore caches")
        .expect("commit");
    let path = remote.mirror_path("mirror");
    let target = target(&remote, &path);
    let vcs = cli();
    mirror_once(&vcs, &target);

    fs::write(path.join("build.cache"), "cached\n").expect("write cache");
    sync(
        &vcs,
        &target,
        None,
        SyncOptions::default(),
        &mut RecordingSink::default(),
    )
    .expect("sync");
    assert!(path.join("build.cache").exists());

    sync(
        &vcs,
        &target,
        None,
        SyncOptions {
            clean_ignored: true,
        },
        &mut RecordingSink::default(),
    )
    .expect("sync");
    assert!(!path.join("build.cache").exists());
}

#[test]
fn resolve_learns_remote_and_branch_from_checkout() {
    let remote = TestRemote::new("trunk").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    mirror_once(&vcs, &target(&remote, &path));

    let resolved =
        resolve(&vcs, &PartialTarget::new(None, None, path.clone())).expect("resolved");
    assert_eq!(resolved.remote_url, remote.url());
    assert_eq!(resolved.branch, "trunk");
}

#[test]
fn resolve_without_remote_or_checkout_fails() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("nothing-here");
    let err = resolve(&cli(), &PartialTarget::new(None, None, path)).expect_err("no remote");
    assert!(matches!(err, ReconcileError::NotARepository { .. }));
}

#[test]
fn bounded_poll_loop_tracks_the_remote() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let vcs = cli();
    let config = LoopConfig {
        interval: Duration::ZERO,
        max_ticks: Some(2),
        sync: SyncOptions::default(),
    };
    let outcome = run_loop(
        &vcs,
        &target(&remote, &path),
        None,
        &config,
        &Shutdown::new(),
        &mut RecordingSink::default(),
    )
    .expect("loop");

    assert_eq!(outcome.stop, LoopStop::MaxTicks);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.last_revision, Some(remote.tip().expect("tip")));
}

#[test]
fn credentials_never_reach_events_or_errors() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let creds = Credentials::new("alice", "hunter2");
    let vcs = cli();
    let mut sink = RecordingSink::default();

    let ready = ensure_ready(&vcs, &target(&remote, &path), Some(&creds), &mut sink).expect("ready");
    sync(&vcs, &ready.target, Some(&creds), SyncOptions::default(), &mut sink).expect("sync");
    assert!(!format!("{:?}", sink.events).contains("hunter2"));

    // Nothing listens on port 1, so git fails fast with the URL in its stderr.
    let unreachable = RepositoryTarget {
        remote_url: "https://127.0.0.1:1/r.git".to_string(),
        branch: "main".to_string(),
        local_path: remote.mirror_path("unreachable"),
    };
    let err = ensure_ready(&vcs, &unreachable, Some(&creds), &mut sink).expect_err("offline");
    assert!(!err.to_string().contains("hunter2"));
    assert!(!format!("{err:?}").contains("hunter2"));
}

#[test]
fn authenticated_clone_records_plain_remote_url() {
    let remote = TestRemote::new("main").expect("remote");
    let path = remote.mirror_path("mirror");
    let creds = Credentials::new("alice", "hunter2");
    let vcs = cli();
    ensure_ready(
        &vcs,
        &target(&remote, &path),
        Some(&creds),
        &mut RecordingSink::default(),
    )
    .expect("ready");

    let recorded = git(&path, &["config", "--get", "remote.origin.url"]).expect("config");
    assert_eq!(recorded, remote.url());
    assert!(!recorded.contains("hunter2"));
}
