//! Side-effecting adapters: configuration files, processes, and git.

pub mod config;
pub mod git;
pub mod process;
