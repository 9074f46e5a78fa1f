//! The catalog access trait
//!
//! Everything the CLI and web layer do against Postgres goes through
//! [`DataStore`], so handlers can run against
//! [`RecordingStore`](crate::testing::RecordingStore) in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use wrack_core::Result;

use crate::metadata::MetadataTemplate;
use crate::types::{Filepath, PreprocessedSpec, ProcessedSpec, ReferenceSpec, StoredFilepath, Vocabularies};

/// Parameter set tables the loader accepts
pub const SUPPORTED_PARAMS_TABLES: &[&str] = &[
    "preprocessed_sequence_illumina_params",
    "preprocessed_sequence_454_params",
    "processed_params_sortmerna",
    "processed_params_uclust",
];

/// Catalog operations backed by Postgres in production.
///
/// Creation methods return the new object's ID. Methods taking
/// [`Filepath`] lists register the files under the matching mountpoint as
/// part of the operation.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Cheap connectivity check, used at startup.
    async fn ping(&self) -> Result<()>;

    /// Known filepath types, value to row ID.
    async fn filepath_types(&self) -> Result<BTreeMap<String, i64>>;

    /// Known data types, value to row ID.
    async fn data_types(&self) -> Result<BTreeMap<String, i64>>;

    /// Known artifact types, value to row ID.
    async fn artifact_types(&self) -> Result<BTreeMap<String, i64>>;

    /// Fetch all controlled vocabularies in one go.
    async fn vocabularies(&self) -> Result<Vocabularies> {
        Ok(Vocabularies {
            filepath_types: self.filepath_types().await?,
            data_types: self.data_types().await?,
            artifact_types: self.artifact_types().await?,
        })
    }

    /// Create a study owned by `owner` (an account email).
    async fn create_study(&self, owner: &str, title: &str, info: &Value) -> Result<i64>;

    /// Create a raw data entry linked to `study_ids` and register its files.
    async fn create_raw_data(
        &self,
        filetype: &str,
        study_ids: &[i64],
        filepaths: &[Filepath],
    ) -> Result<i64>;

    /// Create a preprocessed data entry and register its files.
    async fn create_preprocessed_data(&self, spec: &PreprocessedSpec) -> Result<i64>;

    /// Create a processed data entry and register its files.
    async fn create_processed_data(&self, spec: &ProcessedSpec) -> Result<i64>;

    /// Attach a sample template to a study. The template ID equals the
    /// study ID.
    async fn create_sample_template(
        &self,
        study_id: i64,
        template: &MetadataTemplate,
    ) -> Result<i64>;

    /// Create a prep template for a study.
    ///
    /// `raw_data_id` is set when loading against an existing raw data
    /// entry; preparations created through the web API start unlinked.
    async fn create_prep_template(
        &self,
        study_id: i64,
        raw_data_id: Option<i64>,
        data_type: &str,
        template: &MetadataTemplate,
    ) -> Result<i64>;

    /// Create a reference database entry and register its files.
    async fn create_reference(&self, spec: &ReferenceSpec) -> Result<i64>;

    /// Store a named parameter set in `table`.
    async fn create_parameters(&self, table: &str, name: &str, values: &Value) -> Result<i64>;

    async fn study_exists(&self, study_id: i64) -> Result<bool>;

    /// Upload directory for a study, created if missing.
    async fn uploads_dir(&self, study_id: i64) -> Result<PathBuf>;

    /// Most recent preprocessed data entry of a study, if any.
    async fn latest_preprocessed_data(&self, study_id: i64) -> Result<Option<i64>>;

    /// Registered files of a preprocessed data entry, with absolute paths.
    async fn preprocessed_filepaths(&self, preprocessed_data_id: i64)
        -> Result<Vec<StoredFilepath>>;

    /// Replace the registered files of a preprocessed data entry.
    async fn update_preprocessed_filepaths(
        &self,
        preprocessed_data_id: i64,
        filepaths: &[Filepath],
    ) -> Result<()>;

    /// Record the EBI submission status of a preprocessed data entry.
    async fn set_ebi_status(&self, preprocessed_data_id: i64, status: &str) -> Result<()>;

    async fn prep_template_exists(&self, prep_id: i64) -> Result<bool>;

    /// Study a preparation belongs to, `None` for an unknown preparation.
    async fn prep_template_study(&self, prep_id: i64) -> Result<Option<i64>>;

    /// Artifact already attached to a preparation, if any.
    async fn prep_template_artifact(&self, prep_id: i64) -> Result<Option<i64>>;

    /// Create an artifact on a preparation and register its files.
    async fn create_artifact(
        &self,
        prep_id: i64,
        artifact_type: &str,
        filepaths: &[Filepath],
    ) -> Result<i64>;
}
