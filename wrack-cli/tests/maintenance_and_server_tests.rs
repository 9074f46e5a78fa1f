//! Maintenance flag and webserver bootstrap tests

use std::path::Path;
use std::sync::Arc;

use wrack_cli::cli::{
    generate_completion, handle_maintenance, handle_webserver, MaintenanceCommands,
    WebserverCommands,
};
use wrack_cli::context::Context;
use wrack_core::{Config, EbiConfig, MainConfig, PostgresConfig, RedisConfig, WebserverConfig};
use wrack_db::testing::{MemoryKv, RecordingStore};
use wrack_db::{DataStore, KeyValueStore, MAINTENANCE_KEY, SYSMESSAGE_KEY};

fn test_config(working_dir: &Path) -> Config {
    Config {
        main: MainConfig {
            test_environment: true,
            base_data_dir: None,
            working_dir: working_dir.to_path_buf(),
        },
        postgres: PostgresConfig {
            user: "postgres".to_string(),
            password: None,
            database: "wrack_test".to_string(),
            host: "localhost".to_string(),
            port: 5432,
        },
        redis: RedisConfig::default(),
        webserver: WebserverConfig::default(),
        ebi: EbiConfig {
            dropbox_url: "https://dropbox.example.org/upload".to_string(),
            center_name: "CCME-COLORADO".to_string(),
        },
    }
}

async fn test_context(kv: &MemoryKv, working_dir: &Path) -> Context {
    let store = RecordingStore::new();
    Context {
        config: test_config(working_dir),
        vocab: store.vocabularies().await.unwrap(),
        store: Arc::new(store),
        kv: Arc::new(kv.clone()),
    }
}

#[tokio::test]
async fn test_lock_status_unlock_flow() {
    let dir = tempfile::tempdir().unwrap();
    let kv = MemoryKv::new();
    let ctx = test_context(&kv, dir.path()).await;

    handle_maintenance(
        &ctx,
        MaintenanceCommands::Lock {
            time: 3600,
            message: "down for upgrades".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        kv.get(MAINTENANCE_KEY).await.unwrap().as_deref(),
        Some("down for upgrades")
    );
    assert_eq!(kv.ttl(MAINTENANCE_KEY).await.unwrap(), Some(3600));

    // Status reads both flags without touching them.
    handle_maintenance(&ctx, MaintenanceCommands::Status)
        .await
        .unwrap();
    assert_eq!(
        kv.get(MAINTENANCE_KEY).await.unwrap().as_deref(),
        Some("down for upgrades")
    );

    handle_maintenance(&ctx, MaintenanceCommands::Unlock)
        .await
        .unwrap();
    assert_eq!(kv.get(MAINTENANCE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_sysmessage_set_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let kv = MemoryKv::new();
    let ctx = test_context(&kv, dir.path()).await;

    handle_maintenance(
        &ctx,
        MaintenanceCommands::Sysmessage {
            time: 600,
            message: "maintenance window tonight".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        kv.get(SYSMESSAGE_KEY).await.unwrap().as_deref(),
        Some("maintenance window tonight")
    );
    assert_eq!(kv.ttl(SYSMESSAGE_KEY).await.unwrap(), Some(600));
    // The two flags are independent.
    assert_eq!(kv.get(MAINTENANCE_KEY).await.unwrap(), None);

    handle_maintenance(&ctx, MaintenanceCommands::ClearSysmessage)
        .await
        .unwrap();
    assert_eq!(kv.get(SYSMESSAGE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_webserver_start_reports_busy_port() {
    let dir = tempfile::tempdir().unwrap();
    let kv = MemoryKv::new();
    let ctx = test_context(&kv, dir.path()).await;

    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let err = handle_webserver(&ctx, WebserverCommands::Start { port })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("already in use"));
    assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));
}

#[test]
fn test_completion_generation_smoke() {
    // Writes the script to stdout; only asserts it does not panic.
    generate_completion(clap_complete::Shell::Bash);
}
