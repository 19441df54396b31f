//! Keep a local directory mirroring one branch of a remote git repository.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure logic and values (targets, remote identity, events).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (config files, processes, git).
//!   The engine reaches git only through the [`io::git::Vcs`] trait.
//!
//! Orchestration modules ([`resolve`], [`reconcile`], [`sync`], [`looping`])
//! combine the two: fill in the target, vet or create the checkout once, then
//! fetch, reset, and clean on every tick.

pub mod core;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod reconcile;
pub mod resolve;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
