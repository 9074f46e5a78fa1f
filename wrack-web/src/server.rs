//! HTTP server startup and graceful shutdown

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use wrack_core::{Result, WrackError};

use crate::api::{create_router, AppState};

/// Bind `addr` and run the API server until interrupted.
///
/// A bind failure on a busy port is reported as [`WrackError::AddrInUse`]
/// so callers can print a hint instead of a raw OS error.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            WrackError::AddrInUse {
                addr: addr.to_string(),
            }
        } else {
            WrackError::Io(e)
        }
    })?;

    info!("Wrack API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
