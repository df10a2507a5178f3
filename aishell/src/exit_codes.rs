//! Stable exit codes for the `ai-shell` binary.

/// Session ended normally (exit keyword, empty goal, oracle had nothing more).
pub const OK: i32 = 0;
/// A turn failed fatally (oracle transport, sandbox exec fault) or another error occurred.
pub const FAULT: i32 = 1;
/// Startup configuration is invalid or incomplete (e.g. missing API credential).
pub const CONFIG: i32 = 2;
/// The sandbox container is missing or not running.
pub const SANDBOX_UNAVAILABLE: i32 = 3;
