//! Shared connection state for command handlers
//!
//! Nothing here is ambient: `main` builds one [`Context`] and hands it
//! to every handler by reference. Construction fails up front when
//! either backend is unreachable, before any command logic runs.

use std::sync::Arc;

use tracing::debug;

use wrack_core::{Config, Result};
use wrack_db::{DataStore, KeyValueStore, PgStore, RedisKv, Vocabularies};

/// Configuration plus live handles to the platform services.
pub struct Context {
    pub config: Config,
    pub store: Arc<dyn DataStore>,
    pub kv: Arc<dyn KeyValueStore>,
    /// Controlled vocabularies, fetched once at startup
    pub vocab: Vocabularies,
}

impl Context {
    /// Connect to Postgres and Redis and fetch the vocabularies.
    pub async fn connect(config: Config) -> Result<Self> {
        let store = PgStore::connect(&config).await?;
        let kv = RedisKv::connect(&config).await?;
        kv.ping().await?;
        let vocab = store.vocabularies().await?;
        debug!(
            "context ready: {} filepath types, {} data types, {} artifact types",
            vocab.filepath_types.len(),
            vocab.data_types.len(),
            vocab.artifact_types.len()
        );
        Ok(Self {
            config,
            store: Arc::new(store),
            kv: Arc::new(kv),
            vocab,
        })
    }
}
