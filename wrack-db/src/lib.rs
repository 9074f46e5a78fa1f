//! Wrack storage layer
//!
//! Access to the two backing stores of the platform: the Postgres catalog
//! holding studies, templates, data objects and their registered files, and
//! the Redis instance holding maintenance flags.
//!
//! Consumers talk to the stores through the [`DataStore`] and
//! [`KeyValueStore`] traits so handlers can be exercised against the
//! in-memory doubles in [`testing`]. The production implementations are
//! [`PgStore`] and [`RedisKv`].
//!
//! The expected catalog layout lives in `schema.sql` at the crate root.

pub mod kv;
pub mod metadata;
pub mod pg;
pub mod store;
pub mod testing;
pub mod types;
pub mod util;

pub use kv::{oauth_token_key, KeyValueStore, RedisKv, MAINTENANCE_KEY, SYSMESSAGE_KEY};
pub use metadata::MetadataTemplate;
pub use pg::PgStore;
pub use store::DataStore;
pub use types::{
    Filepath, PreprocessedSpec, ProcessedSpec, ReferenceSpec, StoredFilepath, Vocabularies,
};
