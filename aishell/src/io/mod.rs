//! I/O adapters for the session loop.

pub mod config;
pub mod console;
pub mod env;
pub mod liveness;
pub mod oracle;
pub mod process;
pub mod sandbox;
