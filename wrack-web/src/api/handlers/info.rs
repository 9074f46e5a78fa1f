//! Root and status handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use wrack_db::{MAINTENANCE_KEY, SYSMESSAGE_KEY};

use crate::api::error::ApiError;
use crate::api::{ApiResponse, AppState};

/// System status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version
    pub version: String,
    /// Server uptime in seconds
    pub uptime: u64,
    /// Maintenance flag text, when set
    pub maintenance: Option<String>,
    /// System banner message, when set
    pub sysmessage: Option<String>,
}

/// Root endpoint handler
pub(crate) async fn root() -> Json<ApiResponse<serde_json::Value>> {
    let data = serde_json::json!({
        "service": "Wrack API Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    Json(ApiResponse::success(data))
}

/// Status endpoint handler.
///
/// Reachable during maintenance so operators can read the flag.
pub(crate) async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatusResponse>>, ApiError> {
    let maintenance = state.kv.get(MAINTENANCE_KEY).await?;
    let sysmessage = state.kv.get(SYSMESSAGE_KEY).await?;

    let response = StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        maintenance,
        sysmessage,
    };
    Ok(Json(ApiResponse::success(response)))
}
