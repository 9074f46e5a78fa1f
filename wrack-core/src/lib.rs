//! Wrack Core Library
//!
//! Shared configuration and error types for the wrack data-management
//! platform. This crate is used by the storage, web, and CLI components.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    default_config_path, Config, EbiConfig, MainConfig, PostgresConfig, RedisConfig,
    WebserverConfig, CONFIG_ENV_VAR,
};
pub use error::*;
