//! Wrack processing flows
//!
//! The pieces that sit between the catalog and the outside world:
//! demultiplex index generation over split-libraries output, staging and
//! sending of EBI submissions, and the post-pipeline update of
//! preprocessed data entries.

pub mod demux;
pub mod ebi;
pub mod update;

pub use demux::{generate_demux_file, DemuxIndex, DEMUX_FILENAME};
pub use ebi::{submit_to_ebi, EbiAction, SubmissionSummary};
pub use update::update_preprocessed_data;
