//! Post-pipeline update of preprocessed data entries
//!
//! After split libraries re-runs, the entry's registered files are
//! replaced with the contents of the fresh output directory.

use std::path::Path;

use wrack_core::{Result, WrackError};
use wrack_db::{DataStore, Filepath};

use crate::demux::DEMUX_FILENAME;

/// Split-libraries outputs and the filepath type each registers as
const OUTPUT_FILES: &[(&str, &str)] = &[
    ("seqs.fna", "preprocessed_fasta"),
    ("seqs.fastq", "preprocessed_fastq"),
    (DEMUX_FILENAME, "preprocessed_demux"),
    ("split_library_log.txt", "log"),
];

/// Point a preprocessed data entry at a new split-libraries output
/// directory. Without an explicit entry the study's most recent one is
/// updated. Returns the updated entry's ID.
pub async fn update_preprocessed_data(
    store: &dyn DataStore,
    study_id: i64,
    preprocessed_data_id: Option<i64>,
    sl_out_dir: &Path,
) -> Result<i64> {
    let target = match preprocessed_data_id {
        Some(id) => id,
        None => store
            .latest_preprocessed_data(study_id)
            .await?
            .ok_or_else(|| {
                WrackError::InvalidInput(format!(
                    "study {} has no preprocessed data to update",
                    study_id
                ))
            })?,
    };

    let mut filepaths = Vec::new();
    for (name, fp_type) in OUTPUT_FILES {
        let path = sl_out_dir.join(name);
        if path.is_file() {
            filepaths.push(Filepath::new(path, *fp_type));
        }
    }

    if filepaths.is_empty() {
        return Err(WrackError::InvalidInput(format!(
            "directory {} has no split libraries output",
            sl_out_dir.display()
        )));
    }
    if !filepaths.iter().any(|fp| fp.fp_type == "preprocessed_demux") {
        return Err(WrackError::InvalidInput(format!(
            "directory {} has no {}; run 'wrack ware generate_demux' first",
            sl_out_dir.display(),
            DEMUX_FILENAME
        )));
    }

    store
        .update_preprocessed_filepaths(target, &filepaths)
        .await?;
    tracing::info!(
        "replaced registered files on preprocessed data {} with {} outputs",
        target,
        filepaths.len()
    );
    Ok(target)
}
