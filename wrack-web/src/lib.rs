//! Wrack REST API server
//!
//! A thin HTTP surface over the catalog: preparation and artifact
//! creation for studies, plus a status endpoint. Requests are refused
//! with 503 while the platform's maintenance flag is set.

pub mod api;
pub mod gate;
pub mod server;

pub use api::{create_router, AppState};
pub use server::serve;
