//! Tab-separated metadata template parsing
//!
//! Sample and prep templates arrive as TSV files with a `sample_name`
//! column identifying each row. Parsing is strict: ragged rows, duplicate
//! samples, and templates without a `sample_name` column are rejected
//! before anything touches the catalog.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use wrack_core::{Result, WrackError};

/// Column every template must carry
pub const SAMPLE_NAME_COLUMN: &str = "sample_name";

/// One template row: the sample identifier plus its metadata columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub sample_id: String,
    pub values: BTreeMap<String, String>,
}

impl MetadataRecord {
    /// Metadata columns as a JSON object, as stored in the catalog
    pub fn values_json(&self) -> Value {
        serde_json::to_value(&self.values).unwrap_or(Value::Null)
    }
}

/// A parsed sample or prep template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTemplate {
    headers: Vec<String>,
    samples: Vec<MetadataRecord>,
}

impl MetadataTemplate {
    /// Parse a template from a file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WrackError::Parse(format!("cannot read template {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a template from TSV content.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let header_line = lines
            .next()
            .ok_or_else(|| WrackError::Parse("template is empty".to_string()))?;
        let headers: Vec<String> = header_line.split('\t').map(|h| h.trim().to_string()).collect();

        let sample_col = headers
            .iter()
            .position(|h| h == SAMPLE_NAME_COLUMN)
            .ok_or_else(|| {
                WrackError::Parse(format!("template has no '{}' column", SAMPLE_NAME_COLUMN))
            })?;

        let mut seen = BTreeSet::new();
        let mut samples = Vec::new();
        for (idx, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
            if fields.len() != headers.len() {
                return Err(WrackError::Parse(format!(
                    "row {} has {} fields, expected {}",
                    idx + 2,
                    fields.len(),
                    headers.len()
                )));
            }

            let sample_id = fields[sample_col].to_string();
            if sample_id.is_empty() {
                return Err(WrackError::Parse(format!("row {} has an empty sample name", idx + 2)));
            }
            if !seen.insert(sample_id.clone()) {
                return Err(WrackError::Parse(format!("duplicate sample '{}'", sample_id)));
            }

            let values = headers
                .iter()
                .zip(&fields)
                .filter(|(h, _)| h.as_str() != SAMPLE_NAME_COLUMN)
                .map(|(h, f)| (h.clone(), f.to_string()))
                .collect();
            samples.push(MetadataRecord { sample_id, values });
        }

        if samples.is_empty() {
            return Err(WrackError::Parse("template has no samples".to_string()));
        }

        Ok(Self { headers, samples })
    }

    /// Build a template from a JSON object keyed by sample name.
    ///
    /// This is the REST representation: each value is an object of
    /// metadata columns. Scalars are stringified the way the TSV parser
    /// would read them; every sample must carry the same columns.
    pub fn from_json(data: &Value) -> Result<Self> {
        let map = data.as_object().ok_or_else(|| {
            WrackError::Parse("template body must be a JSON object keyed by sample name".to_string())
        })?;
        if map.is_empty() {
            return Err(WrackError::Parse("template has no samples".to_string()));
        }

        let mut headers: Option<Vec<String>> = None;
        let mut samples = Vec::with_capacity(map.len());
        for (sample_id, columns) in map {
            if sample_id.is_empty() {
                return Err(WrackError::Parse(
                    "template has an empty sample name".to_string(),
                ));
            }
            let columns = columns.as_object().ok_or_else(|| {
                WrackError::Parse(format!("sample '{}' is not a column map", sample_id))
            })?;

            let values: BTreeMap<String, String> = columns
                .iter()
                .map(|(column, value)| (column.clone(), json_scalar_to_string(value)))
                .collect();

            let cols: Vec<String> = values.keys().cloned().collect();
            match &headers {
                None => headers = Some(cols),
                Some(expected) if *expected != cols => {
                    return Err(WrackError::Parse(format!(
                        "sample '{}' does not carry the same columns as the rest",
                        sample_id
                    )));
                }
                Some(_) => {}
            }

            samples.push(MetadataRecord {
                sample_id: sample_id.clone(),
                values,
            });
        }

        let mut headers = headers.unwrap_or_default();
        headers.insert(0, SAMPLE_NAME_COLUMN.to_string());
        Ok(Self { headers, samples })
    }

    /// Metadata column names, `sample_name` excluded, in file order
    pub fn columns(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.as_str() != SAMPLE_NAME_COLUMN)
            .map(String::as_str)
            .collect()
    }

    pub fn samples(&self) -> &[MetadataRecord] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn json_scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "sample_name\tphysical_location\tdescription\n\
                            S1\tfreezer_a\tcontrol\n\
                            S2\tfreezer_b\ttreatment\n";

    #[test]
    fn test_parse_template() {
        let template = MetadataTemplate::parse(TEMPLATE).unwrap();
        assert_eq!(template.len(), 2);
        assert_eq!(template.columns(), vec!["physical_location", "description"]);

        let s1 = &template.samples()[0];
        assert_eq!(s1.sample_id, "S1");
        assert_eq!(s1.values["physical_location"], "freezer_a");
        assert_eq!(s1.values["description"], "control");
    }

    #[test]
    fn test_parse_skips_blank_lines_and_crlf() {
        let content = "sample_name\tcolor\r\n\r\nS1\tred\r\n\nS2\tblue\r\n";
        let template = MetadataTemplate::parse(content).unwrap();
        assert_eq!(template.len(), 2);
        assert_eq!(template.samples()[1].values["color"], "blue");
    }

    #[test]
    fn test_sample_name_column_anywhere() {
        let content = "description\tsample_name\nctl\tS1\n";
        let template = MetadataTemplate::parse(content).unwrap();
        assert_eq!(template.samples()[0].sample_id, "S1");
        assert_eq!(template.samples()[0].values["description"], "ctl");
    }

    #[test]
    fn test_missing_sample_name_column() {
        let err = MetadataTemplate::parse("barcode\tprimer\nAAAA\tGGGG\n").unwrap_err();
        match err {
            WrackError::Parse(msg) => assert!(msg.contains("sample_name")),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn test_ragged_row_rejected() {
        let content = "sample_name\tcolor\nS1\tred\textra\n";
        let err = MetadataTemplate::parse(content).unwrap_err();
        match err {
            WrackError::Parse(msg) => assert!(msg.contains("row 2")),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let content = "sample_name\tcolor\nS1\tred\nS1\tblue\n";
        let err = MetadataTemplate::parse(content).unwrap_err();
        match err {
            WrackError::Parse(msg) => assert!(msg.contains("duplicate sample 'S1'")),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn test_empty_template_rejected() {
        assert!(MetadataTemplate::parse("").is_err());
        assert!(MetadataTemplate::parse("sample_name\tcolor\n").is_err());
    }

    #[test]
    fn test_values_json_round_trip() {
        let template = MetadataTemplate::parse(TEMPLATE).unwrap();
        let json = template.samples()[0].values_json();
        assert_eq!(json["physical_location"], "freezer_a");
    }

    #[test]
    fn test_from_json_object() {
        let body = serde_json::json!({
            "S2": {"barcode": "CCCC", "run_prefix": 2},
            "S1": {"barcode": "AAAA", "run_prefix": 1},
        });
        let template = MetadataTemplate::from_json(&body).unwrap();

        assert_eq!(template.len(), 2);
        assert_eq!(template.columns(), vec!["barcode", "run_prefix"]);
        // JSON object keys come back sorted.
        assert_eq!(template.samples()[0].sample_id, "S1");
        assert_eq!(template.samples()[0].values["barcode"], "AAAA");
        assert_eq!(template.samples()[0].values["run_prefix"], "1");
    }

    #[test]
    fn test_from_json_rejects_mismatched_columns() {
        let body = serde_json::json!({
            "S1": {"barcode": "AAAA"},
            "S2": {"primer": "GGGG"},
        });
        let err = MetadataTemplate::from_json(&body).unwrap_err();
        match err {
            WrackError::Parse(msg) => assert!(msg.contains("same columns")),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(MetadataTemplate::from_json(&serde_json::json!([])).is_err());
        assert!(MetadataTemplate::from_json(&serde_json::json!({})).is_err());
        assert!(
            MetadataTemplate::from_json(&serde_json::json!({"S1": "not a map"})).is_err()
        );
    }
}
