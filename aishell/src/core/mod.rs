//! Deterministic, pure logic shared by the session loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod input;
pub mod proposal;
pub mod redact;
pub mod transcript;
pub mod truncate;
