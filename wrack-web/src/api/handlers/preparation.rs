//! Study preparation handlers
//!
//! Preparations are created by POSTing a template as a JSON object keyed
//! by sample name; artifacts attach uploaded files to an existing
//! preparation. Both answer 201 with the new object's ID.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use wrack_db::{metadata::MetadataTemplate, Filepath, Vocabularies};

use crate::api::error::ApiError;
use crate::api::{ApiResponse, AppState};

/// Response for creation endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    /// ID of the created object
    pub id: i64,
}

/// Query parameters for preparation creation
#[derive(Debug, Deserialize)]
pub struct PrepCreateQuery {
    /// Data type of the preparation, validated against the catalog
    pub data_type: String,
}

/// Request body for artifact creation
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactCreateRequest {
    /// Artifact type, validated against the catalog
    pub artifact_type: String,
    /// `[filename, filepath type]` pairs, resolved against the study's
    /// upload directory
    pub filepaths: Vec<(String, String)>,
}

/// Create a preparation on a study from a JSON template body.
pub(crate) async fn create_preparation(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    Query(query): Query<PrepCreateQuery>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedResponse>>), ApiError> {
    if !state.store.study_exists(study_id).await? {
        return Err(ApiError::not_found(format!(
            "Study {} does not exist",
            study_id
        )));
    }
    if !state.vocab.data_types.contains_key(&query.data_type) {
        return Err(ApiError::not_acceptable(format!(
            "Unknown data type '{}', known types: {}",
            query.data_type,
            Vocabularies::names(&state.vocab.data_types)
        )));
    }

    let template = MetadataTemplate::from_json(&body)?;

    let id = state
        .store
        .create_prep_template(study_id, None, &query.data_type, &template)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreatedResponse { id })),
    ))
}

/// Attach an artifact built from uploaded files to a preparation.
pub(crate) async fn create_artifact(
    State(state): State<AppState>,
    Path((study_id, prep_id)): Path<(i64, i64)>,
    Json(request): Json<ArtifactCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedResponse>>), ApiError> {
    if !state.store.study_exists(study_id).await? {
        return Err(ApiError::not_found(format!(
            "Study {} does not exist",
            study_id
        )));
    }
    match state.store.prep_template_study(prep_id).await? {
        None => {
            return Err(ApiError::not_found(format!(
                "Preparation {} does not exist",
                prep_id
            )));
        }
        Some(owner) if owner != study_id => {
            return Err(ApiError::conflict(format!(
                "Preparation {} is not associated with study {}",
                prep_id, study_id
            )));
        }
        Some(_) => {}
    }
    if let Some(artifact_id) = state.store.prep_template_artifact(prep_id).await? {
        return Err(ApiError::conflict(format!(
            "Preparation {} already has artifact {}",
            prep_id, artifact_id
        )));
    }
    if !state.vocab.artifact_types.contains_key(&request.artifact_type) {
        return Err(ApiError::not_acceptable(format!(
            "Unknown artifact type '{}', known types: {}",
            request.artifact_type,
            Vocabularies::names(&state.vocab.artifact_types)
        )));
    }
    if request.filepaths.is_empty() {
        return Err(ApiError::not_acceptable("At least one file is required"));
    }

    let uploads = state.store.uploads_dir(study_id).await?;
    let mut filepaths = Vec::with_capacity(request.filepaths.len());
    for (name, fp_type) in &request.filepaths {
        if !state.vocab.filepath_types.contains_key(fp_type) {
            return Err(ApiError::not_acceptable(format!(
                "Unknown filepath type '{}', known types: {}",
                fp_type,
                Vocabularies::names(&state.vocab.filepath_types)
            )));
        }
        let path = uploads.join(name);
        if !path.is_file() {
            return Err(ApiError::not_acceptable(format!(
                "File '{}' does not exist in the study upload directory",
                name
            )));
        }
        filepaths.push(Filepath::new(path, fp_type.clone()));
    }

    let id = state
        .store
        .create_artifact(prep_id, &request.artifact_type, &filepaths)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreatedResponse { id })),
    ))
}
