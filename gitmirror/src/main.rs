//! `gitmirror`: keep a directory mirroring one branch of a remote repository.
//!
//! The first argument of every subcommand is a TOML config file naming the
//! remote, branch, local path, and poll interval.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use gitmirror::core::types::MirrorEvent;
use gitmirror::error::ReconcileError;
use gitmirror::events::{EventSink, TracingSink};
use gitmirror::exit_codes;
use gitmirror::io::config::{LoadedConfig, load_config};
use gitmirror::io::git::GitCli;
use gitmirror::logging;
use gitmirror::looping::{LoopConfig, LoopStop, Shutdown, run_loop};
use gitmirror::reconcile::ensure_ready;
use gitmirror::resolve::resolve;
use gitmirror::sync::{SyncOptions, sync};

#[derive(Parser)]
#[command(
    name = "gitmirror",
    version,
    about = "Mirror one branch of a remote git repository into a local directory"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the local directory, then sync on every poll interval.
    Run {
        /// Path to the mirror config file.
        config: PathBuf,
        /// Stop after this many sync ticks instead of running forever.
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Reconcile the local directory (cloning it if absent) and exit.
    Check {
        /// Path to the mirror config file.
        config: PathBuf,
    },
    /// Reconcile, run a single sync tick, and exit.
    Sync {
        /// Path to the mirror config file.
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Run { config, .. } | Command::Check { config } | Command::Sync { config } => {
                config
            }
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let loaded = load_config(cli.command.config_path())?.resolve()?;
    logging::init(loaded.log_directory.as_deref())?;

    let vcs = GitCli::new(loaded.command_timeout).with_binary(&loaded.git_binary);
    let mut sink = TracingSink;
    let target = match resolve(&vcs, &loaded.target) {
        Ok(target) => target,
        Err(err) => return Ok(refuse(err, &mut sink)),
    };
    let credentials = loaded.credentials.as_ref();

    match cli.command {
        Command::Run { max_ticks, .. } => {
            let config = loop_config(&loaded, max_ticks);
            match run_loop(
                &vcs,
                &target,
                credentials,
                &config,
                &Shutdown::new(),
                &mut sink,
            ) {
                Ok(outcome) => {
                    info!(
                        ticks = outcome.ticks,
                        succeeded = outcome.succeeded,
                        failed = outcome.failed,
                        stopped_by_limit = outcome.stop == LoopStop::MaxTicks,
                        "poll loop finished"
                    );
                    Ok(exit_codes::OK)
                }
                // run_loop already reported the failure through the sink.
                Err(_) => Ok(exit_codes::NOT_READY),
            }
        }
        Command::Check { .. } => match ensure_ready(&vcs, &target, credentials, &mut sink) {
            Ok(ready) => {
                info!(cloned = ready.was_cloned(), "mirror ready");
                Ok(exit_codes::OK)
            }
            Err(err) => Ok(refuse(err, &mut sink)),
        },
        Command::Sync { .. } => {
            let ready = match ensure_ready(&vcs, &target, credentials, &mut sink) {
                Ok(ready) => ready,
                Err(err) => return Ok(refuse(err, &mut sink)),
            };
            let options = SyncOptions {
                clean_ignored: loaded.clean_ignored,
            };
            match sync(&vcs, &ready.target, credentials, options, &mut sink) {
                Ok(_) => Ok(exit_codes::OK),
                Err(err) => {
                    sink.emit(MirrorEvent::SyncFailed {
                        stage: err.stage,
                        error: err.source.to_string(),
                    });
                    Ok(exit_codes::SYNC_FAILED)
                }
            }
        }
    }
}

fn loop_config(loaded: &LoadedConfig, max_ticks: Option<u64>) -> LoopConfig {
    LoopConfig {
        interval: loaded.poll_interval,
        max_ticks,
        sync: SyncOptions {
            clean_ignored: loaded.clean_ignored,
        },
    }
}

fn refuse(err: ReconcileError, sink: &mut impl EventSink) -> i32 {
    sink.emit(MirrorEvent::ReconcileFailed {
        kind: err.kind(),
        error: err.to_string(),
    });
    exit_codes::NOT_READY
}
