//! Stable exit codes for the `gitmirror` binary.

/// Command finished normally.
pub const OK: i32 = 0;
/// Invalid configuration, logging setup failure, or other host errors.
pub const INVALID: i32 = 1;
/// The local directory was refused as a mirror (startup precondition failed).
pub const NOT_READY: i32 = 2;
/// `gitmirror sync` ran its single tick and the tick failed.
pub const SYNC_FAILED: i32 = 3;
