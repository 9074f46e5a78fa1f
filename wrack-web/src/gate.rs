//! Request gates for the mutating routes
//!
//! Two middlewares guard every POST route: [`bearer_auth`] checks the
//! access token against the key-value store, and [`maintenance_gate`]
//! refuses work while the maintenance flag is set. Read-only routes
//! bypass both so operators can still see server status during a
//! maintenance window.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use wrack_db::{oauth_token_key, MAINTENANCE_KEY};

use crate::api::error::ApiError;
use crate::api::AppState;

/// Reject a request with 503 while the maintenance flag is set.
pub(crate) async fn maintenance_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(message) = state.kv.get(MAINTENANCE_KEY).await? {
        return Err(ApiError::service_unavailable(format!(
            "Platform is under maintenance: {}",
            message
        )));
    }
    Ok(next.run(request).await)
}

/// Reject a request with 401 unless it carries a known bearer token.
pub(crate) async fn bearer_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Missing or malformed Authorization header"))?;

    if state.kv.get(&oauth_token_key(token)).await?.is_none() {
        return Err(ApiError::unauthorized("Invalid access token"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use crate::api::{create_router, AppState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::util::ServiceExt;
    use wrack_db::testing::{MemoryKv, RecordingStore};
    use wrack_db::{oauth_token_key, DataStore, KeyValueStore, MAINTENANCE_KEY};

    const TOKEN: &str = "c4c4fa8a06f1b0ff";

    async fn test_router(store: &RecordingStore, locked: bool) -> Router {
        let kv = MemoryKv::new();
        kv.set_with_expiry(&oauth_token_key(TOKEN), "wrack-test-client", 3600)
            .await
            .unwrap();
        if locked {
            kv.set_with_expiry(MAINTENANCE_KEY, "upgrading the catalog", 3600)
                .await
                .unwrap();
        }
        let vocab = store.vocabularies().await.unwrap();
        let state = AppState::new(Arc::new(store.clone()), Arc::new(kv), vocab);
        create_router(state)
    }

    fn prep_request(token: Option<&str>) -> Request<Body> {
        let body = serde_json::json!({"S1": {"barcode": "AAAA"}});
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/study/1/preparation?data_type=16S")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_gate_rejects_mutations_during_maintenance() {
        let store = RecordingStore::new();
        let router = test_router(&store, true).await;

        // The maintenance answer wins even without credentials.
        let response = router.oneshot(prep_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("upgrading the catalog"));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_gate_leaves_status_reachable() {
        let store = RecordingStore::new();
        let router = test_router(&store, true).await;

        let request = Request::builder()
            .uri("/api/v1/status")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["data"]["maintenance"], "upgrading the catalog");
    }

    #[tokio::test]
    async fn test_gate_passes_requests_when_unlocked() {
        let store = RecordingStore::new();
        let router = test_router(&store, false).await;

        let response = router.oneshot(prep_request(Some(TOKEN))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_auth_rejects_missing_header() {
        let store = RecordingStore::new();
        let router = test_router(&store, false).await;

        let response = router.oneshot(prep_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_rejects_unknown_token() {
        let store = RecordingStore::new();
        let router = test_router(&store, false).await;

        let response = router
            .oneshot(prep_request(Some("not-a-registered-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.call_count(), 0);
    }
}
