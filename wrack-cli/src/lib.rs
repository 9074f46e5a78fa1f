//! Wrack CLI library
//!
//! The `wrack` binary is a thin dispatcher: every leaf command validates
//! its options, makes exactly one call into the platform libraries, and
//! prints a one-line confirmation with the resulting ID. Command
//! definitions live in [`cli`], connection state in [`context`].

pub mod cli;
pub mod context;
pub mod format;
