//! Delivery of [`MirrorEvent`]s to the host.

use tracing::{error, info};

use crate::core::types::MirrorEvent;

/// Receiver for engine events.
pub trait EventSink {
    fn emit(&mut self, event: MirrorEvent);
}

impl<F: FnMut(MirrorEvent)> EventSink for F {
    fn emit(&mut self, event: MirrorEvent) {
        self(event);
    }
}

/// Forwards events to `tracing`, failures at error level and the rest at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: MirrorEvent) {
        match event {
            MirrorEvent::Cloned { repo_name } => info!(repo = %repo_name, "cloned"),
            MirrorEvent::Fetched { branch, result } => {
                info!(branch = %branch, result = %result, "fetched");
            }
            MirrorEvent::Reset { result } => info!(result = %result, "reset"),
            MirrorEvent::Revision { sha } => info!(sha = %sha, "revision"),
            MirrorEvent::SyncFinished {
                repo_path,
                timestamp,
            } => info!(repo = %repo_path, at = %timestamp.to_rfc3339(), "finished syncing"),
            MirrorEvent::PollWait { seconds } => info!(seconds, "polling"),
            MirrorEvent::SyncFailed { stage, error } => {
                error!(stage = %stage, error = %error, "sync failed");
            }
            MirrorEvent::ReconcileFailed { kind, error } => {
                error!(kind, error = %error, "mirror not ready");
            }
        }
    }
}
