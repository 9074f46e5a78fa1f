//! Command tree and handlers
//!
//! [`commands`] declares the clap command hierarchy; [`handlers`] executes
//! each leaf command against the platform libraries.

mod commands;
mod handlers;

pub use commands::*;
pub use handlers::*;
