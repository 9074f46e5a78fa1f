//! Demultiplex index generation
//!
//! Split-libraries output is one large FASTQ whose labels name the sample
//! each read belongs to (`@<sample>_<read number> ...`). The demux index
//! summarizes that file as JSON: per-sample read counts plus the byte
//! ranges each sample's records occupy in the uncompressed stream, so a
//! consumer can slice out one sample without scanning the whole file.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use wrack_core::{Result, WrackError};

/// Name of the index file written next to the split-libraries output
pub const DEMUX_FILENAME: &str = "seqs.demux";

const INPUT_CANDIDATES: &[&str] = &["seqs.fastq", "seqs.fastq.gz"];

/// Index entry for one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleIndex {
    pub count: u64,
    /// `(start, length)` byte ranges, contiguous runs merged
    pub segments: Vec<(u64, u64)>,
}

/// The demux index, serialized as `seqs.demux`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxIndex {
    pub version: u32,
    /// File the byte ranges refer to
    pub input: String,
    pub total_sequences: u64,
    pub samples: BTreeMap<String, SampleIndex>,
}

impl DemuxIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            WrackError::InvalidInput(format!("cannot open demux index {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

struct FastqRecord {
    sample: String,
    start: u64,
    len: u64,
    raw: String,
}

struct FastqReader<R: BufRead> {
    reader: R,
    offset: u64,
}

impl<R: BufRead> FastqReader<R> {
    fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    fn required_line(&mut self, what: &str) -> Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(WrackError::Parse(format!(
                "truncated record at offset {}: missing {}",
                self.offset, what
            )));
        }
        self.offset += n as u64;
        Ok(line)
    }

    fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        let mut header = String::new();
        let n = self.reader.read_line(&mut header)?;
        if n == 0 {
            return Ok(None);
        }
        let start = self.offset;
        self.offset += n as u64;

        let trimmed = header.trim_end();
        let label = trimmed
            .strip_prefix('@')
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| {
                WrackError::Parse(format!("malformed header at offset {}: '{}'", start, trimmed))
            })?;
        let sample = label
            .rsplit_once('_')
            .map(|(prefix, _)| prefix.to_string())
            .ok_or_else(|| {
                WrackError::Parse(format!("label '{}' has no sample prefix", label))
            })?;

        let seq = self.required_line("sequence")?;
        let plus = self.required_line("separator")?;
        let qual = self.required_line("quality")?;

        if !plus.starts_with('+') {
            return Err(WrackError::Parse(format!(
                "record '{}' has no '+' separator",
                label
            )));
        }
        if seq.trim_end().len() != qual.trim_end().len() {
            return Err(WrackError::Parse(format!(
                "record '{}' quality length does not match sequence length",
                label
            )));
        }

        let len = self.offset - start;
        let mut raw = header;
        raw.push_str(&seq);
        raw.push_str(&plus);
        raw.push_str(&qual);
        Ok(Some(FastqRecord {
            sample,
            start,
            len,
            raw,
        }))
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn find_input(sl_out_dir: &Path) -> Result<PathBuf> {
    INPUT_CANDIDATES
        .iter()
        .map(|name| sl_out_dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            WrackError::InvalidInput(format!(
                "directory {} has no seqs.fastq or seqs.fastq.gz",
                sl_out_dir.display()
            ))
        })
}

/// Build the demux index for a split-libraries output directory.
///
/// Writes `seqs.demux` next to the input and returns its path.
pub fn generate_demux_file(sl_out_dir: &Path) -> Result<PathBuf> {
    let input = find_input(sl_out_dir)?;
    let mut reader = FastqReader::new(open_reader(&input)?);

    let mut samples: BTreeMap<String, SampleIndex> = BTreeMap::new();
    let mut total = 0u64;
    while let Some(record) = reader.next_record()? {
        total += 1;
        let entry = samples.entry(record.sample).or_insert_with(|| SampleIndex {
            count: 0,
            segments: Vec::new(),
        });
        entry.count += 1;
        match entry.segments.last_mut() {
            Some((start, len)) if *start + *len == record.start => *len += record.len,
            _ => entry.segments.push((record.start, record.len)),
        }
    }

    if total == 0 {
        return Err(WrackError::Parse(format!(
            "{} contains no sequences",
            input.display()
        )));
    }

    let index = DemuxIndex {
        version: 1,
        input: input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(INPUT_CANDIDATES[0])
            .to_string(),
        total_sequences: total,
        samples,
    };

    let out_path = sl_out_dir.join(DEMUX_FILENAME);
    index.write_to(&out_path)?;
    tracing::debug!(
        "indexed {} sequences across {} samples into {}",
        total,
        index.samples.len(),
        out_path.display()
    );
    Ok(out_path)
}

/// Split a demultiplexed FASTQ into per-sample `<sample>.fastq.gz` files.
///
/// Records route by their label; the result is checked against the index
/// counts so a stale index fails loudly instead of shipping short files.
pub fn extract_per_sample(
    index: &DemuxIndex,
    fastq_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest_dir)?;
    let mut reader = FastqReader::new(open_reader(fastq_path)?);

    let mut writers: BTreeMap<String, GzEncoder<File>> = BTreeMap::new();
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    while let Some(record) = reader.next_record()? {
        if !writers.contains_key(&record.sample) {
            let file = File::create(dest_dir.join(format!("{}.fastq.gz", record.sample)))?;
            writers.insert(
                record.sample.clone(),
                GzEncoder::new(file, Compression::default()),
            );
        }
        // contains_key check above makes this lookup infallible
        if let Some(writer) = writers.get_mut(&record.sample) {
            writer.write_all(record.raw.as_bytes())?;
        }
        *counts.entry(record.sample).or_default() += 1;
    }

    for (sample, entry) in &index.samples {
        let written = counts.get(sample).copied().unwrap_or(0);
        if written != entry.count {
            return Err(WrackError::Parse(format!(
                "demux index is stale: sample '{}' has {} records, index says {}",
                sample, written, entry.count
            )));
        }
    }

    let mut paths = Vec::with_capacity(writers.len());
    for (sample, writer) in writers {
        writer.finish()?;
        paths.push(dest_dir.join(format!("{}.fastq.gz", sample)));
    }
    Ok(paths)
}
