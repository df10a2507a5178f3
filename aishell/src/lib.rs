//! Interactive command agent that drives a container sandbox one command at a time.
//!
//! A session asks an oracle (an LLM) for the next shell command that advances the
//! user's goal, gates destructive commands behind an explicit confirmation, runs the
//! command inside a named container, and feeds the captured output back to the
//! oracle through an append-only transcript. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (proposal decoding, transcript records,
//!   output truncation, input classification). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config and env files, process spawning,
//!   the container sandbox, the oracle HTTP client, the console). Each collaborator
//!   sits behind a trait so tests can script it.
//!
//! [`session`] composes the two into the interactive turn loop.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
