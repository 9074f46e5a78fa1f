//! API module for the wrack server
//!
//! Contains the REST API implementation with Axum router and handlers.

pub(crate) mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use wrack_db::{DataStore, KeyValueStore, Vocabularies};

use crate::gate::{bearer_auth, maintenance_gate};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog access
    pub store: Arc<dyn DataStore>,
    /// Maintenance flag storage
    pub kv: Arc<dyn KeyValueStore>,
    /// Controlled vocabularies fetched at startup
    pub vocab: Arc<Vocabularies>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        store: Arc<dyn DataStore>,
        kv: Arc<dyn KeyValueStore>,
        vocab: Vocabularies,
    ) -> Self {
        Self {
            store,
            kv,
            vocab: Arc::new(vocab),
            start_time: Instant::now(),
        }
    }
}

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T> {
    #[serde(rename = "success")]
    Success { data: T },
    #[serde(rename = "error")]
    Error { error: String },
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create an error response
    pub fn error(error: String) -> Self {
        Self::Error { error }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    info!("Setting up API router...");

    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024)); // templates can be large

    // Mutating routes sit behind bearer auth and the maintenance gate;
    // the status endpoint stays reachable so operators can see the flag.
    // The maintenance layer is added last so it runs first.
    let gated = Router::new()
        .route(
            "/api/v1/study/:study_id/preparation",
            post(handlers::preparation::create_preparation),
        )
        .route(
            "/api/v1/study/:study_id/preparation/:prep_id/artifact",
            post(handlers::preparation::create_artifact),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            maintenance_gate,
        ));

    Router::new()
        .merge(gated)
        // System status endpoint
        .route("/api/v1/status", get(handlers::info::get_status))
        // Root endpoint
        .route("/", get(handlers::info::root))
        .layer(middleware_stack)
        .with_state(state)
}

/// Error handling utilities
pub mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use tracing::error;

    use super::ApiResponse;
    use wrack_core::WrackError;

    /// Custom error type for API responses
    #[derive(Debug)]
    pub struct ApiError {
        pub status_code: StatusCode,
        pub message: String,
    }

    impl ApiError {
        /// Create a new API error
        pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
            Self {
                status_code,
                message: message.into(),
            }
        }

        /// Create a bad request error
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::new(StatusCode::BAD_REQUEST, message)
        }

        /// Create a not found error
        pub fn not_found(message: impl Into<String>) -> Self {
            Self::new(StatusCode::NOT_FOUND, message)
        }

        /// Create an unauthorized error
        pub fn unauthorized(message: impl Into<String>) -> Self {
            Self::new(StatusCode::UNAUTHORIZED, message)
        }

        /// Create a not acceptable error (invalid values, bad templates)
        pub fn not_acceptable(message: impl Into<String>) -> Self {
            Self::new(StatusCode::NOT_ACCEPTABLE, message)
        }

        /// Create a conflict error
        pub fn conflict(message: impl Into<String>) -> Self {
            Self::new(StatusCode::CONFLICT, message)
        }

        /// Create an internal server error
        pub fn internal_error(message: impl Into<String>) -> Self {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }

        /// Create a service unavailable error
        pub fn service_unavailable(message: impl Into<String>) -> Self {
            Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            error!("API Error {}: {}", self.status_code, self.message);

            let response: ApiResponse<()> = ApiResponse::error(self.message);

            (self.status_code, Json(response)).into_response()
        }
    }

    /// Convert WrackError to ApiError
    impl From<WrackError> for ApiError {
        fn from(err: WrackError) -> Self {
            match err {
                WrackError::UnknownId { .. } => Self::not_found(err.to_string()),
                WrackError::UnknownValue { .. } => Self::not_acceptable(err.to_string()),
                WrackError::Duplicate(msg) => Self::conflict(msg),
                WrackError::InvalidInput(msg) => Self::not_acceptable(msg),
                WrackError::Parse(msg) => Self::not_acceptable(msg),
                WrackError::DatabaseUnavailable(msg) | WrackError::KeyValueUnavailable(msg) => {
                    Self::service_unavailable(msg)
                }
                _ => Self::internal_error(err.to_string()),
            }
        }
    }
}
