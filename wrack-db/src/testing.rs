//! Test doubles for the storage traits
//!
//! [`RecordingStore`] is an in-memory catalog that records every mutating
//! call, and [`MemoryKv`] an in-memory flag store. Handlers run against
//! them in tests without Postgres or Redis.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use wrack_core::{Result, WrackError};

use crate::kv::KeyValueStore;
use crate::metadata::MetadataTemplate;
use crate::store::DataStore;
use crate::types::{
    Filepath, PreprocessedSpec, ProcessedSpec, ReferenceSpec, StoredFilepath, Vocabularies,
};

/// One mutating call against a [`RecordingStore`], with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateStudy {
        owner: String,
        title: String,
        info: Value,
    },
    CreateRawData {
        filetype: String,
        study_ids: Vec<i64>,
        filepaths: Vec<Filepath>,
    },
    CreatePreprocessedData(PreprocessedSpec),
    CreateProcessedData(ProcessedSpec),
    CreateSampleTemplate {
        study_id: i64,
        sample_count: usize,
    },
    CreatePrepTemplate {
        study_id: i64,
        raw_data_id: Option<i64>,
        data_type: String,
        sample_count: usize,
    },
    CreateReference(ReferenceSpec),
    CreateParameters {
        table: String,
        name: String,
        values: Value,
    },
    UpdatePreprocessedFilepaths {
        preprocessed_data_id: i64,
        filepaths: Vec<Filepath>,
    },
    SetEbiStatus {
        preprocessed_data_id: i64,
        status: String,
    },
    CreateArtifact {
        prep_id: i64,
        artifact_type: String,
        filepaths: Vec<Filepath>,
    },
}

/// In-memory catalog double.
///
/// Comes seeded with study 1, prep template 1, and the standard
/// vocabularies, mirroring a freshly initialized test catalog. Creation
/// calls are recorded and answered with ascending IDs; lookups answer
/// from the seeded state.
#[derive(Clone)]
pub struct RecordingStore {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    vocab: Vocabularies,
    studies: Arc<Mutex<BTreeSet<i64>>>,
    preps: Arc<Mutex<BTreeMap<i64, i64>>>,
    prep_artifacts: Arc<Mutex<BTreeMap<i64, i64>>>,
    preprocessed: Arc<Mutex<BTreeMap<i64, Vec<StoredFilepath>>>>,
    study_preprocessed: Arc<Mutex<BTreeMap<i64, Vec<i64>>>>,
    ebi_statuses: Arc<Mutex<BTreeMap<i64, String>>>,
    uploads_root: PathBuf,
    next_id: Arc<AtomicI64>,
    fail_next: Arc<Mutex<Option<WrackError>>>,
}

impl Default for RecordingStore {
    fn default() -> Self {
        let mut filepath_types = BTreeMap::new();
        for (id, name) in [
            "raw_forward_seqs",
            "raw_reverse_seqs",
            "raw_barcodes",
            "preprocessed_fasta",
            "preprocessed_fastq",
            "preprocessed_demux",
            "reference_seqs",
            "reference_tax",
            "reference_tree",
            "log",
        ]
        .iter()
        .enumerate()
        {
            filepath_types.insert(name.to_string(), id as i64 + 1);
        }

        let mut data_types = BTreeMap::new();
        for (id, name) in ["16S", "18S", "ITS", "Metagenomic"].iter().enumerate() {
            data_types.insert(name.to_string(), id as i64 + 1);
        }

        let mut artifact_types = BTreeMap::new();
        for (id, name) in ["FASTQ", "SFF", "FASTA", "Demultiplexed", "BIOM"]
            .iter()
            .enumerate()
        {
            artifact_types.insert(name.to_string(), id as i64 + 1);
        }

        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            vocab: Vocabularies {
                filepath_types,
                data_types,
                artifact_types,
            },
            studies: Arc::new(Mutex::new(BTreeSet::from([1]))),
            preps: Arc::new(Mutex::new(BTreeMap::from([(1, 1)]))),
            prep_artifacts: Arc::new(Mutex::new(BTreeMap::new())),
            preprocessed: Arc::new(Mutex::new(BTreeMap::new())),
            study_preprocessed: Arc::new(Mutex::new(BTreeMap::new())),
            ebi_statuses: Arc::new(Mutex::new(BTreeMap::new())),
            uploads_root: std::env::temp_dir().join("wrack-test-uploads"),
            next_id: Arc::new(AtomicI64::new(2)),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Seed an additional existing study.
    pub fn with_study(self, study_id: i64) -> Self {
        self.studies.lock().unwrap().insert(study_id);
        self
    }

    /// Seed an additional prep template belonging to `study_id`.
    pub fn with_prep(self, study_id: i64, prep_id: i64) -> Self {
        self.studies.lock().unwrap().insert(study_id);
        self.preps.lock().unwrap().insert(prep_id, study_id);
        self
    }

    /// Seed an artifact already attached to a prep template.
    pub fn with_prep_artifact(self, prep_id: i64, artifact_id: i64) -> Self {
        self.prep_artifacts.lock().unwrap().insert(prep_id, artifact_id);
        self
    }

    /// Seed a preprocessed data entry with registered files.
    pub fn with_preprocessed(
        self,
        study_id: i64,
        preprocessed_data_id: i64,
        files: Vec<StoredFilepath>,
    ) -> Self {
        self.studies.lock().unwrap().insert(study_id);
        self.preprocessed
            .lock()
            .unwrap()
            .insert(preprocessed_data_id, files);
        self.study_preprocessed
            .lock()
            .unwrap()
            .entry(study_id)
            .or_default()
            .push(preprocessed_data_id);
        self
    }

    /// Root directory `uploads_dir` resolves under.
    pub fn with_uploads_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.uploads_root = root.into();
        self
    }

    /// Make the next recorded call fail with `err`.
    pub fn fail_next(&self, err: WrackError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// EBI status last recorded for an entry.
    pub fn ebi_status(&self, preprocessed_data_id: i64) -> Option<String> {
        self.ebi_statuses
            .lock()
            .unwrap()
            .get(&preprocessed_data_id)
            .cloned()
    }

    fn record(&self, call: RecordedCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn ensure_study(&self, study_id: i64) -> Result<()> {
        if self.studies.lock().unwrap().contains(&study_id) {
            Ok(())
        } else {
            Err(WrackError::UnknownId {
                kind: "Study".to_string(),
                id: study_id,
            })
        }
    }

    fn ensure_preprocessed(&self, preprocessed_data_id: i64) -> Result<()> {
        if self
            .preprocessed
            .lock()
            .unwrap()
            .contains_key(&preprocessed_data_id)
        {
            Ok(())
        } else {
            Err(WrackError::UnknownId {
                kind: "Preprocessed data".to_string(),
                id: preprocessed_data_id,
            })
        }
    }
}

#[async_trait]
impl DataStore for RecordingStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn filepath_types(&self) -> Result<BTreeMap<String, i64>> {
        Ok(self.vocab.filepath_types.clone())
    }

    async fn data_types(&self) -> Result<BTreeMap<String, i64>> {
        Ok(self.vocab.data_types.clone())
    }

    async fn artifact_types(&self) -> Result<BTreeMap<String, i64>> {
        Ok(self.vocab.artifact_types.clone())
    }

    async fn create_study(&self, owner: &str, title: &str, info: &Value) -> Result<i64> {
        self.record(RecordedCall::CreateStudy {
            owner: owner.to_string(),
            title: title.to_string(),
            info: info.clone(),
        })?;
        let id = self.next_id();
        self.studies.lock().unwrap().insert(id);
        Ok(id)
    }

    async fn create_raw_data(
        &self,
        filetype: &str,
        study_ids: &[i64],
        filepaths: &[Filepath],
    ) -> Result<i64> {
        self.record(RecordedCall::CreateRawData {
            filetype: filetype.to_string(),
            study_ids: study_ids.to_vec(),
            filepaths: filepaths.to_vec(),
        })?;
        Ok(self.next_id())
    }

    async fn create_preprocessed_data(&self, spec: &PreprocessedSpec) -> Result<i64> {
        self.record(RecordedCall::CreatePreprocessedData(spec.clone()))?;
        let id = self.next_id();
        self.preprocessed.lock().unwrap().insert(id, Vec::new());
        self.study_preprocessed
            .lock()
            .unwrap()
            .entry(spec.study_id)
            .or_default()
            .push(id);
        Ok(id)
    }

    async fn create_processed_data(&self, spec: &ProcessedSpec) -> Result<i64> {
        self.record(RecordedCall::CreateProcessedData(spec.clone()))?;
        Ok(self.next_id())
    }

    async fn create_sample_template(
        &self,
        study_id: i64,
        template: &MetadataTemplate,
    ) -> Result<i64> {
        self.record(RecordedCall::CreateSampleTemplate {
            study_id,
            sample_count: template.len(),
        })?;
        Ok(study_id)
    }

    async fn create_prep_template(
        &self,
        study_id: i64,
        raw_data_id: Option<i64>,
        data_type: &str,
        template: &MetadataTemplate,
    ) -> Result<i64> {
        self.record(RecordedCall::CreatePrepTemplate {
            study_id,
            raw_data_id,
            data_type: data_type.to_string(),
            sample_count: template.len(),
        })?;
        let id = self.next_id();
        self.preps.lock().unwrap().insert(id, study_id);
        Ok(id)
    }

    async fn create_reference(&self, spec: &ReferenceSpec) -> Result<i64> {
        self.record(RecordedCall::CreateReference(spec.clone()))?;
        Ok(self.next_id())
    }

    async fn create_parameters(&self, table: &str, name: &str, values: &Value) -> Result<i64> {
        self.record(RecordedCall::CreateParameters {
            table: table.to_string(),
            name: name.to_string(),
            values: values.clone(),
        })?;
        Ok(self.next_id())
    }

    async fn study_exists(&self, study_id: i64) -> Result<bool> {
        Ok(self.studies.lock().unwrap().contains(&study_id))
    }

    async fn uploads_dir(&self, study_id: i64) -> Result<PathBuf> {
        let dir = self.uploads_root.join(study_id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    async fn latest_preprocessed_data(&self, study_id: i64) -> Result<Option<i64>> {
        self.ensure_study(study_id)?;
        Ok(self
            .study_preprocessed
            .lock()
            .unwrap()
            .get(&study_id)
            .and_then(|ids| ids.last().copied()))
    }

    async fn preprocessed_filepaths(
        &self,
        preprocessed_data_id: i64,
    ) -> Result<Vec<StoredFilepath>> {
        self.ensure_preprocessed(preprocessed_data_id)?;
        Ok(self.preprocessed.lock().unwrap()[&preprocessed_data_id].clone())
    }

    async fn update_preprocessed_filepaths(
        &self,
        preprocessed_data_id: i64,
        filepaths: &[Filepath],
    ) -> Result<()> {
        self.ensure_preprocessed(preprocessed_data_id)?;
        self.record(RecordedCall::UpdatePreprocessedFilepaths {
            preprocessed_data_id,
            filepaths: filepaths.to_vec(),
        })?;
        let stored = filepaths
            .iter()
            .map(|fp| StoredFilepath {
                id: self.next_id(),
                path: fp.path.clone(),
                fp_type: fp.fp_type.clone(),
            })
            .collect();
        self.preprocessed
            .lock()
            .unwrap()
            .insert(preprocessed_data_id, stored);
        Ok(())
    }

    async fn set_ebi_status(&self, preprocessed_data_id: i64, status: &str) -> Result<()> {
        self.ensure_preprocessed(preprocessed_data_id)?;
        self.record(RecordedCall::SetEbiStatus {
            preprocessed_data_id,
            status: status.to_string(),
        })?;
        self.ebi_statuses
            .lock()
            .unwrap()
            .insert(preprocessed_data_id, status.to_string());
        Ok(())
    }

    async fn prep_template_exists(&self, prep_id: i64) -> Result<bool> {
        Ok(self.preps.lock().unwrap().contains_key(&prep_id))
    }

    async fn prep_template_study(&self, prep_id: i64) -> Result<Option<i64>> {
        Ok(self.preps.lock().unwrap().get(&prep_id).copied())
    }

    async fn prep_template_artifact(&self, prep_id: i64) -> Result<Option<i64>> {
        Ok(self.prep_artifacts.lock().unwrap().get(&prep_id).copied())
    }

    async fn create_artifact(
        &self,
        prep_id: i64,
        artifact_type: &str,
        filepaths: &[Filepath],
    ) -> Result<i64> {
        self.record(RecordedCall::CreateArtifact {
            prep_id,
            artifact_type: artifact_type.to_string(),
            filepaths: filepaths.to_vec(),
        })?;
        let id = self.next_id();
        self.prep_artifacts.lock().unwrap().insert(prep_id, id);
        Ok(id)
    }
}

/// In-memory flag store double.
///
/// Expiry is recorded and reported back but never enforced; tests assert
/// on the TTL a flag was set with.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, (String, u64)>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl_seconds));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_recording_store_records_in_order() {
        let store = RecordingStore::new();

        let study_id = store
            .create_study("test@wrack.example", "First study", &json!({}))
            .await
            .unwrap();
        store
            .create_parameters("processed_params_uclust", "defaults", &json!({"similarity": 0.97}))
            .await
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            RecordedCall::CreateStudy {
                owner: "test@wrack.example".to_string(),
                title: "First study".to_string(),
                info: json!({}),
            }
        );
        assert!(store.study_exists(study_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_recording_store_seeded_state() {
        let store = RecordingStore::new().with_study(7).with_prep(7, 3);

        assert!(store.study_exists(1).await.unwrap());
        assert!(store.study_exists(7).await.unwrap());
        assert!(!store.study_exists(99).await.unwrap());
        assert!(store.prep_template_exists(3).await.unwrap());
        assert_eq!(store.prep_template_study(3).await.unwrap(), Some(7));
        assert_eq!(store.prep_template_study(1).await.unwrap(), Some(1));
        assert_eq!(store.prep_template_study(42).await.unwrap(), None);

        let vocab = store.vocabularies().await.unwrap();
        assert!(vocab.filepath_types.contains_key("preprocessed_demux"));
        assert!(vocab.data_types.contains_key("16S"));
        assert!(vocab.artifact_types.contains_key("FASTQ"));
    }

    #[tokio::test]
    async fn test_recording_store_fail_next() {
        let store = RecordingStore::new();
        store.fail_next(WrackError::Database("connection reset".to_string()));

        let err = store
            .create_study("test@wrack.example", "Doomed", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WrackError::Database(_)));

        // The call is still recorded, and the failure is one-shot.
        assert_eq!(store.call_count(), 1);
        store
            .create_study("test@wrack.example", "Fine", &json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_kv_flow() {
        let kv = MemoryKv::new();

        kv.set_with_expiry("maintenance", "down for upgrades", 3600)
            .await
            .unwrap();
        assert_eq!(
            kv.get("maintenance").await.unwrap().as_deref(),
            Some("down for upgrades")
        );
        assert_eq!(kv.ttl("maintenance").await.unwrap(), Some(3600));

        kv.delete("maintenance").await.unwrap();
        assert_eq!(kv.get("maintenance").await.unwrap(), None);
        assert_eq!(kv.ttl("maintenance").await.unwrap(), None);
    }
}
