//! CLI command and subcommand definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use wrack_ware::EbiAction;

/// Wrack platform CLI
#[derive(Parser, Debug)]
#[command(name = "wrack")]
#[command(version, about = "Wrack data-management platform CLI", long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: $WRACK_CONFIG_FP, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Catalog loading commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// EBI submission commands
    Ebi {
        #[command(subcommand)]
        command: EbiCommands,
    },

    /// Maintenance mode commands
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },

    /// Webserver commands
    Webserver {
        #[command(subcommand)]
        command: WebserverCommands,
    },

    /// Pipeline file commands
    Ware {
        #[command(subcommand)]
        command: WareCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Load a study into the catalog
    #[command(name = "load_study")]
    LoadStudy {
        /// Email of the study owner
        #[arg(long)]
        owner: String,

        /// Study title
        #[arg(long)]
        title: String,

        /// Path to a TOML file with the study information
        #[arg(long, value_parser = existing_file)]
        info: PathBuf,
    },

    /// Load raw sequence files as a new raw data entry
    #[command(name = "load_raw")]
    LoadRaw {
        /// Path to a file to register, repeatable
        #[arg(long, required = true, value_parser = existing_file)]
        fp: Vec<PathBuf>,

        /// Filepath type of each --fp, in the same order
        #[arg(long = "fp_type", required = true)]
        fp_type: Vec<String>,

        /// File type of the raw data
        #[arg(long)]
        filetype: String,

        /// ID of a study the raw data belongs to, repeatable
        #[arg(long, required = true)]
        study: Vec<i64>,
    },

    /// Load a directory of preprocessed files
    #[command(name = "load_preprocessed")]
    LoadPreprocessed {
        /// ID of the study the data belongs to
        #[arg(long = "study_id")]
        study_id: i64,

        /// Name of the preprocessing parameters table
        #[arg(long = "params_table")]
        params_table: String,

        /// Directory whose files are registered
        #[arg(long, value_parser = existing_dir)]
        filedir: PathBuf,

        /// Filepath type of every registered file
        #[arg(long)]
        filepathtype: String,

        /// Row ID in the parameters table
        #[arg(long = "params_id")]
        params_id: i64,

        /// ID of the prep template the data derives from
        #[arg(long = "prep_template_id")]
        prep_template_id: Option<i64>,

        /// Mark the data as submitted to INSDC
        #[arg(long)]
        insdc: bool,

        /// Data type, required when no prep template is given
        #[arg(long = "data_type")]
        data_type: Option<String>,
    },

    /// Load processed files
    #[command(name = "load_processed")]
    LoadProcessed {
        /// Path to a file to register, repeatable
        #[arg(long, required = true, value_parser = existing_file)]
        fp: Vec<PathBuf>,

        /// Filepath type of each --fp, in the same order
        #[arg(long = "fp_type", required = true)]
        fp_type: Vec<String>,

        /// Name of the processing parameters table
        #[arg(long = "processed_params_table")]
        processed_params_table: String,

        /// Row ID in the parameters table
        #[arg(long = "processed_params_id")]
        processed_params_id: i64,

        /// ID of the preprocessed data the files derive from
        #[arg(long = "preprocessed_data_id")]
        preprocessed_data_id: Option<i64>,

        /// ID of the study, when no preprocessed data is given
        #[arg(long = "study_id")]
        study_id: Option<i64>,

        /// Processing timestamp "YYYY-MM-DD HH:MM:SS", defaults to now
        #[arg(long = "processed_date")]
        processed_date: Option<String>,
    },

    /// Load a sample template for a study
    #[command(name = "load_sample_template")]
    LoadSampleTemplate {
        /// Path to the template TSV
        #[arg(value_parser = existing_file)]
        fp: PathBuf,

        /// ID of the study the template describes
        #[arg(long)]
        study: i64,
    },

    /// Load a prep template for a raw data entry
    #[command(name = "load_prep_template")]
    LoadPrepTemplate {
        /// Path to the template TSV
        #[arg(value_parser = existing_file)]
        fp: PathBuf,

        /// ID of the raw data the preparation applies to
        #[arg(long = "raw_data")]
        raw_data: i64,

        /// ID of the study
        #[arg(long)]
        study: i64,

        /// Data type of the preparation
        #[arg(long = "data_type")]
        data_type: String,
    },

    /// Load a reference database
    #[command(name = "load_reference_db")]
    LoadReferenceDb {
        /// Name of the reference database
        #[arg(long)]
        name: String,

        /// Version of the reference database
        #[arg(long)]
        version: String,

        /// Path to the reference sequences
        #[arg(long = "seq_fp", value_parser = existing_file)]
        seq_fp: PathBuf,

        /// Path to the reference taxonomy
        #[arg(long = "tax_fp", value_parser = existing_file)]
        tax_fp: Option<PathBuf>,

        /// Path to the reference phylogenetic tree
        #[arg(long = "tree_fp", value_parser = existing_file)]
        tree_fp: Option<PathBuf>,
    },

    /// Load a parameter set from a TOML file
    #[command(name = "load_parameters")]
    LoadParameters {
        /// Path to the parameter file
        #[arg(value_parser = existing_file)]
        fp: PathBuf,

        /// Parameters table the set belongs to
        #[arg(long)]
        table: String,

        /// Name of the parameter set
        #[arg(long)]
        name: String,
    },

    /// Point a preprocessed data entry at fresh split-libraries output
    #[command(name = "update_preprocessed_data")]
    UpdatePreprocessedData {
        /// Split-libraries output directory
        #[arg(value_parser = existing_dir)]
        sl_out_dir: PathBuf,

        /// ID of the study
        #[arg(long)]
        study: i64,

        /// Preprocessed data to update, defaults to the study's latest
        #[arg(long = "preprocessed_data")]
        preprocessed_data: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum EbiCommands {
    /// Stage a submission for EBI, optionally transferring it
    Submit {
        /// ID of the preprocessed data to submit
        #[arg(long = "preprocessed_data_id")]
        preprocessed_data_id: i64,

        /// EBI action to request (submit, validate, modify)
        #[arg(long, value_parser = parse_ebi_action)]
        action: EbiAction,

        /// Transfer the staged submission to the EBI dropbox
        #[arg(long, overrides_with = "no_send")]
        send: bool,

        /// Stage locally without transferring (default)
        #[arg(long, overrides_with = "send")]
        no_send: bool,

        /// Directory of already-demultiplexed per-sample FASTQ files
        #[arg(long, value_parser = existing_dir)]
        fastq_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MaintenanceCommands {
    /// Lock the platform into maintenance mode
    Lock {
        /// Seconds the lock stays up
        #[arg(long)]
        time: u64,

        /// Message shown to users while locked
        #[arg(long)]
        message: String,
    },

    /// Clear the maintenance lock
    Unlock,

    /// Post the system banner message
    Sysmessage {
        /// Seconds the banner stays up
        #[arg(long)]
        time: u64,

        /// Banner text
        #[arg(long)]
        message: String,
    },

    /// Clear the system banner message
    #[command(name = "clear_sysmessage")]
    ClearSysmessage,

    /// Show maintenance and banner state
    Status,
}

#[derive(Subcommand, Debug)]
pub enum WebserverCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on
        #[arg(long, default_value_t = 21174)]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
pub enum WareCommands {
    /// Build the demux index for a split-libraries output directory
    #[command(name = "generate_demux")]
    GenerateDemux {
        /// Split-libraries output directory
        #[arg(value_parser = existing_dir)]
        sl_out_dir: PathBuf,
    },
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("file '{}' does not exist", value))
    }
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("directory '{}' does not exist", value))
    }
}

fn parse_ebi_action(value: &str) -> Result<EbiAction, String> {
    EbiAction::from_str(value).map_err(|e| e.to_string())
}
