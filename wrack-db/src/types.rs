//! Value types passed between the CLI, web layer, and stores

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A file queued for registration, tagged with its filepath type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filepath {
    pub path: PathBuf,
    pub fp_type: String,
}

impl Filepath {
    pub fn new(path: impl Into<PathBuf>, fp_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fp_type: fp_type.into(),
        }
    }
}

/// A registered file as recorded in the catalog.
///
/// `path` is absolute, resolved against the mountpoint the file lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFilepath {
    pub id: i64,
    pub path: PathBuf,
    pub fp_type: String,
}

/// Controlled vocabularies fetched from the catalog once at startup.
///
/// Maps vocabulary value to its row ID. Option validation happens against
/// these sets rather than hard-coded lists so deployments can extend them.
#[derive(Debug, Clone, Default)]
pub struct Vocabularies {
    pub filepath_types: BTreeMap<String, i64>,
    pub data_types: BTreeMap<String, i64>,
    pub artifact_types: BTreeMap<String, i64>,
}

impl Vocabularies {
    /// Comma-separated vocabulary values, for error messages
    pub fn names(vocab: &BTreeMap<String, i64>) -> String {
        vocab.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Arguments for creating a preprocessed data entry
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedSpec {
    pub study_id: i64,
    pub params_table: String,
    pub params_id: i64,
    pub prep_template_id: Option<i64>,
    pub data_type: Option<String>,
    pub submitted_to_insdc: bool,
    pub filepaths: Vec<Filepath>,
}

/// Arguments for creating a processed data entry.
///
/// Exactly one of `preprocessed_data_id` and `study_id` links the entry to
/// its parent; the stores reject specs carrying neither.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSpec {
    pub params_table: String,
    pub params_id: i64,
    pub preprocessed_data_id: Option<i64>,
    pub study_id: Option<i64>,
    pub processed_date: Option<NaiveDateTime>,
    pub filepaths: Vec<Filepath>,
}

/// Arguments for creating a reference database entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpec {
    pub name: String,
    pub version: String,
    pub sequence_fp: PathBuf,
    pub taxonomy_fp: Option<PathBuf>,
    pub tree_fp: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_names_joined_sorted() {
        let mut vocab = BTreeMap::new();
        vocab.insert("raw_forward_seqs".to_string(), 1);
        vocab.insert("raw_barcodes".to_string(), 2);
        assert_eq!(
            Vocabularies::names(&vocab),
            "raw_barcodes, raw_forward_seqs"
        );
    }
}
