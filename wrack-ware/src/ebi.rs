//! EBI submission staging and hand-off
//!
//! A submission stages everything under a fresh directory in the working
//! dir: the demux index, per-sample FASTQs, and a manifest naming them.
//! With `send` the manifest is posted to the configured dropbox endpoint;
//! without it the staged directory is the deliverable, left in place for
//! inspection.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use wrack_core::{Config, Result, WrackError};
use wrack_db::DataStore;

use crate::demux::{extract_per_sample, DemuxIndex, DEMUX_FILENAME};

/// What the submission asks EBI to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbiAction {
    Submit,
    Validate,
    Modify,
}

impl EbiAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EbiAction::Submit => "submit",
            EbiAction::Validate => "validate",
            EbiAction::Modify => "modify",
        }
    }
}

impl fmt::Display for EbiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EbiAction {
    type Err = WrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submit" => Ok(EbiAction::Submit),
            "validate" => Ok(EbiAction::Validate),
            "modify" => Ok(EbiAction::Modify),
            other => Err(WrackError::InvalidInput(format!(
                "unknown EBI action '{}', expected one of: submit, validate, modify",
                other
            ))),
        }
    }
}

/// The staged `submission.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionManifest {
    pub preprocessed_data_id: i64,
    pub action: String,
    pub center_name: String,
    pub total_sequences: u64,
    pub samples: BTreeMap<String, u64>,
    pub files: Vec<String>,
    pub generated_at: String,
}

/// What a submission run produced
#[derive(Debug)]
pub struct SubmissionSummary {
    pub preprocessed_data_id: i64,
    pub action: EbiAction,
    pub staging_dir: PathBuf,
    pub sample_count: usize,
    pub total_sequences: u64,
    pub sent: bool,
}

/// Stage an EBI submission for a preprocessed data entry.
///
/// Requires a registered demux index; without one the caller is told to
/// generate it first. `fastq_dir` supplies already-cut per-sample FASTQs,
/// otherwise they are cut from the registered demultiplexed FASTQ.
pub async fn submit_to_ebi(
    store: &dyn DataStore,
    config: &Config,
    preprocessed_data_id: i64,
    action: EbiAction,
    send: bool,
    fastq_dir: Option<&Path>,
) -> Result<SubmissionSummary> {
    let files = store.preprocessed_filepaths(preprocessed_data_id).await?;
    let demux = files
        .iter()
        .find(|fp| fp.fp_type == "preprocessed_demux")
        .ok_or_else(|| {
            WrackError::InvalidInput(format!(
                "preprocessed data {} has no demux file; run 'wrack ware generate_demux' first",
                preprocessed_data_id
            ))
        })?;
    let index = DemuxIndex::load(&demux.path)?;

    // Timestamp plus a random tail so same-second submissions never collide.
    let staging_dir = config.main.working_dir.join(format!(
        "ebi_submission_{}_{}_{:04x}",
        preprocessed_data_id,
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u16>()
    ));
    let per_sample_dir = staging_dir.join("per_sample");
    std::fs::create_dir_all(&per_sample_dir)?;
    std::fs::copy(&demux.path, staging_dir.join(DEMUX_FILENAME))?;

    let per_sample = match fastq_dir {
        Some(dir) => {
            let mut staged = Vec::new();
            for source in collect_prepared_fastqs(&index, dir)? {
                let dest = per_sample_dir.join(source.file_name().unwrap_or_default());
                std::fs::copy(&source, &dest)?;
                staged.push(dest);
            }
            staged
        }
        None => {
            let fastq = files
                .iter()
                .find(|fp| fp.fp_type == "preprocessed_fastq")
                .ok_or_else(|| {
                    WrackError::InvalidInput(format!(
                        "preprocessed data {} has no registered FASTQ to cut samples from; \
                         pass a prepared per-sample directory instead",
                        preprocessed_data_id
                    ))
                })?;
            extract_per_sample(&index, &fastq.path, &per_sample_dir)?
        }
    };

    let mut staged_files = vec![DEMUX_FILENAME.to_string()];
    for path in &per_sample {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            staged_files.push(format!("per_sample/{}", name));
        }
    }

    let manifest = SubmissionManifest {
        preprocessed_data_id,
        action: action.to_string(),
        center_name: config.ebi.center_name.clone(),
        total_sequences: index.total_sequences,
        samples: index.samples.iter().map(|(k, v)| (k.clone(), v.count)).collect(),
        files: staged_files,
        generated_at: Utc::now().to_rfc3339(),
    };
    let manifest_file = std::fs::File::create(staging_dir.join("submission.json"))?;
    serde_json::to_writer_pretty(manifest_file, &manifest)?;

    let mut sent = false;
    if send {
        if action == EbiAction::Submit {
            store
                .set_ebi_status(preprocessed_data_id, "submitting")
                .await?;
        }
        match post_manifest(config, action, &manifest).await {
            Ok(()) => {
                if action == EbiAction::Submit {
                    store
                        .set_ebi_status(preprocessed_data_id, "submitted")
                        .await?;
                }
                sent = true;
            }
            Err(err) => {
                if action == EbiAction::Submit {
                    store.set_ebi_status(preprocessed_data_id, "failed").await?;
                }
                return Err(err);
            }
        }
    }

    tracing::info!(
        "staged EBI {} for preprocessed data {} at {}",
        action,
        preprocessed_data_id,
        staging_dir.display()
    );
    Ok(SubmissionSummary {
        preprocessed_data_id,
        action,
        staging_dir,
        sample_count: index.samples.len(),
        total_sequences: index.total_sequences,
        sent,
    })
}

fn collect_prepared_fastqs(index: &DemuxIndex, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::with_capacity(index.samples.len());
    for sample in index.samples.keys() {
        let path = dir.join(format!("{}.fastq.gz", sample));
        if !path.is_file() {
            return Err(WrackError::InvalidInput(format!(
                "{} is missing from the prepared FASTQ directory",
                path.display()
            )));
        }
        sources.push(path);
    }
    Ok(sources)
}

async fn post_manifest(
    config: &Config,
    action: EbiAction,
    manifest: &SubmissionManifest,
) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| WrackError::Ebi(e.to_string()))?;

    let response = client
        .post(&config.ebi.dropbox_url)
        .query(&[("action", action.as_str())])
        .json(manifest)
        .send()
        .await
        .map_err(|e| WrackError::Ebi(e.to_string()))?;

    if !response.status().is_success() {
        return Err(WrackError::Ebi(format!(
            "dropbox endpoint returned {}",
            response.status()
        )));
    }
    Ok(())
}
