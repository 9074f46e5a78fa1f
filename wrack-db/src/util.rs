//! Small helpers shared across the storage layer

use flate2::Crc;
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use wrack_core::{Result, WrackError};

/// Strip characters that must never reach a SQL literal.
///
/// Free-text fields (titles, parameter set names) pass through here before
/// being bound, matching what the catalog expects of stored values.
pub fn scrub_data(value: &str) -> String {
    value.replace(['\'', ';'], "")
}

/// CRC32 checksum of a file, read in chunks.
pub fn compute_checksum(path: &Path) -> Result<u32> {
    let mut file = File::open(path)?;
    let mut crc = Crc::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        crc.update(&buf[..n]);
    }
    Ok(crc.sum())
}

/// Canonical JSON rendering of a parameter set: object keys sorted,
/// no whitespace. Two equal parameter sets always serialize identically,
/// which lets the catalog deduplicate on the stored string.
pub fn canonical_params_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&sort_keys(value))?)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sort_keys(v))).collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Registered name for a file owned by a catalog object: `<id>_<basename>`.
pub fn prefixed_filename(object_id: i64, path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WrackError::InvalidInput(format!("{} has no file name", path.display())))?;
    Ok(format!("{}_{}", object_id, name))
}

/// Move or copy `src` to `dst`.
///
/// Moves fall back to copy-and-remove when the rename crosses filesystems,
/// which is the common case between upload and mountpoint volumes.
pub fn transfer_file(src: &Path, dst: &Path, keep_source: bool) -> Result<()> {
    if keep_source {
        std::fs::copy(src, dst)?;
        return Ok(());
    }
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dst)?;
            std::fs::remove_file(src)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_scrub_data_removes_quotes_and_semicolons() {
        assert_eq!(scrub_data("it's"), "its");
        assert_eq!(scrub_data("select 1; drop"), "select 1 drop");
        assert_eq!(scrub_data("clean title"), "clean title");
    }

    #[test]
    fn test_checksum_empty_file_is_zero() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(compute_checksum(file.path()).unwrap(), 0);
    }

    #[test]
    fn test_checksum_stable_and_content_sensitive() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"@seq1\nACGT\n+\nIIII\n").unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        b.write_all(b"@seq1\nACGT\n+\nIIII\n").unwrap();
        let mut c = tempfile::NamedTempFile::new().unwrap();
        c.write_all(b"@seq2\nTTTT\n+\nIIII\n").unwrap();

        let ca = compute_checksum(a.path()).unwrap();
        let cb = compute_checksum(b.path()).unwrap();
        let cc = compute_checksum(c.path()).unwrap();
        assert_eq!(ca, cb);
        assert_ne!(ca, cc);
    }

    #[test]
    fn test_canonical_params_json_sorts_keys() {
        let params = json!({"similarity": 0.97, "max_rejects": 32, "enable_rev_strand_match": true});
        assert_eq!(
            canonical_params_json(&params).unwrap(),
            r#"{"enable_rev_strand_match":true,"max_rejects":32,"similarity":0.97}"#
        );
    }

    #[test]
    fn test_canonical_params_json_nested() {
        let params = json!({"b": {"z": 1, "a": 2}, "a": [{"y": 1, "x": 2}]});
        assert_eq!(
            canonical_params_json(&params).unwrap(),
            r#"{"a":[{"x":2,"y":1}],"b":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn test_prefixed_filename() {
        let name = prefixed_filename(7, Path::new("/uploads/1/seqs.fastq.gz")).unwrap();
        assert_eq!(name, "7_seqs.fastq.gz");
    }

    #[test]
    fn test_prefixed_filename_rejects_bare_root() {
        assert!(prefixed_filename(7, Path::new("/")).is_err());
    }

    #[test]
    fn test_transfer_file_move_and_copy() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "payload").unwrap();

        let copied = dir.path().join("copied.txt");
        transfer_file(&src, &copied, true).unwrap();
        assert!(src.exists());
        assert_eq!(std::fs::read_to_string(&copied).unwrap(), "payload");

        let moved = dir.path().join("moved.txt");
        transfer_file(&src, &moved, false).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&moved).unwrap(), "payload");
    }
}
