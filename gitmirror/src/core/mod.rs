//! Pure logic and value types shared by the mirror engine.
//!
//! Core modules never touch the filesystem or spawn processes. Everything here
//! is deterministic and tested in isolation.

pub mod remote;
pub mod target;
pub mod types;
