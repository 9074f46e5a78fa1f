//! Command execution handlers
//!
//! Each handler validates its options against the startup vocabulary
//! snapshot, makes one call into the platform libraries, and prints a
//! confirmation line with the resulting ID.

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use wrack_db::store::SUPPORTED_PARAMS_TABLES;
use wrack_db::{
    Filepath, MetadataTemplate, PreprocessedSpec, ProcessedSpec, ReferenceSpec, Vocabularies,
    MAINTENANCE_KEY, SYSMESSAGE_KEY,
};
use wrack_web::AppState;

use crate::context::Context;
use crate::format::{format_status_report, format_success, FlagState};

use super::commands::*;

/// Handle db commands
pub async fn handle_db(ctx: &Context, command: DbCommands) -> Result<()> {
    match command {
        DbCommands::LoadStudy { owner, title, info } => {
            let content = std::fs::read_to_string(&info)?;
            let parsed: toml::Value = toml::from_str(&content)?;
            let info = serde_json::to_value(parsed)?;

            let id = ctx.store.create_study(&owner, &title, &info).await?;
            println!("{}", format_success(&format!("Loaded study: {}", id)));
        }
        DbCommands::LoadRaw {
            fp,
            fp_type,
            filetype,
            study,
        } => {
            check_vocab(&ctx.vocab.artifact_types, &filetype, "filetype")?;
            let filepaths = zip_filepaths(fp, fp_type, &ctx.vocab.filepath_types)?;

            let id = ctx.store.create_raw_data(&filetype, &study, &filepaths).await?;
            println!("{}", format_success(&format!("Loaded raw data: {}", id)));
        }
        DbCommands::LoadPreprocessed {
            study_id,
            params_table,
            filedir,
            filepathtype,
            params_id,
            prep_template_id,
            insdc,
            data_type,
        } => {
            check_params_table(&params_table)?;
            check_vocab(&ctx.vocab.filepath_types, &filepathtype, "filepath type")?;
            if let Some(data_type) = &data_type {
                check_vocab(&ctx.vocab.data_types, data_type, "data type")?;
            }
            if prep_template_id.is_none() && data_type.is_none() {
                bail!("either --prep_template_id or --data_type is required");
            }
            let filepaths = scan_dir(&filedir, &filepathtype)?;

            let spec = PreprocessedSpec {
                study_id,
                params_table,
                params_id,
                prep_template_id,
                data_type,
                submitted_to_insdc: insdc,
                filepaths,
            };
            let id = ctx.store.create_preprocessed_data(&spec).await?;
            println!("{}", format_success(&format!("Loaded preprocessed data: {}", id)));
        }
        DbCommands::LoadProcessed {
            fp,
            fp_type,
            processed_params_table,
            processed_params_id,
            preprocessed_data_id,
            study_id,
            processed_date,
        } => {
            check_params_table(&processed_params_table)?;
            let filepaths = zip_filepaths(fp, fp_type, &ctx.vocab.filepath_types)?;
            match (preprocessed_data_id, study_id) {
                (None, None) => {
                    bail!("either --preprocessed_data_id or --study_id is required")
                }
                (Some(_), Some(_)) => {
                    bail!("--preprocessed_data_id and --study_id are mutually exclusive")
                }
                _ => {}
            }
            let processed_date = processed_date.as_deref().map(parse_processed_date).transpose()?;

            let spec = ProcessedSpec {
                params_table: processed_params_table,
                params_id: processed_params_id,
                preprocessed_data_id,
                study_id,
                processed_date,
                filepaths,
            };
            let id = ctx.store.create_processed_data(&spec).await?;
            println!("{}", format_success(&format!("Loaded processed data: {}", id)));
        }
        DbCommands::LoadSampleTemplate { fp, study } => {
            let template = MetadataTemplate::from_path(&fp)?;

            let id = ctx.store.create_sample_template(study, &template).await?;
            println!("{}", format_success(&format!("Loaded sample template: {}", id)));
        }
        DbCommands::LoadPrepTemplate {
            fp,
            raw_data,
            study,
            data_type,
        } => {
            check_vocab(&ctx.vocab.data_types, &data_type, "data type")?;
            let template = MetadataTemplate::from_path(&fp)?;

            let id = ctx
                .store
                .create_prep_template(study, Some(raw_data), &data_type, &template)
                .await?;
            println!("{}", format_success(&format!("Loaded prep template: {}", id)));
        }
        DbCommands::LoadReferenceDb {
            name,
            version,
            seq_fp,
            tax_fp,
            tree_fp,
        } => {
            let spec = ReferenceSpec {
                name,
                version,
                sequence_fp: seq_fp,
                taxonomy_fp: tax_fp,
                tree_fp,
            };
            let id = ctx.store.create_reference(&spec).await?;
            println!("{}", format_success(&format!("Loaded reference database: {}", id)));
        }
        DbCommands::LoadParameters { fp, table, name } => {
            check_params_table(&table)?;
            let content = std::fs::read_to_string(&fp)?;
            let parsed: toml::Value = toml::from_str(&content)?;
            let values = serde_json::to_value(parsed)?;

            let id = ctx.store.create_parameters(&table, &name, &values).await?;
            println!("{}", format_success(&format!("Loaded parameter set: {}", id)));
        }
        DbCommands::UpdatePreprocessedData {
            sl_out_dir,
            study,
            preprocessed_data,
        } => {
            let id = wrack_ware::update_preprocessed_data(
                ctx.store.as_ref(),
                study,
                preprocessed_data,
                &sl_out_dir,
            )
            .await?;
            println!("{}", format_success(&format!("Updated preprocessed data: {}", id)));
        }
    }

    Ok(())
}

/// Handle ebi commands
pub async fn handle_ebi(ctx: &Context, command: EbiCommands) -> Result<()> {
    match command {
        EbiCommands::Submit {
            preprocessed_data_id,
            action,
            send,
            no_send: _,
            fastq_dir,
        } => {
            let summary = wrack_ware::submit_to_ebi(
                ctx.store.as_ref(),
                &ctx.config,
                preprocessed_data_id,
                action,
                send,
                fastq_dir.as_deref(),
            )
            .await?;

            println!(
                "{}",
                format_success(&format!(
                    "Staged EBI {} for preprocessed data {} at {} ({} samples, {} sequences)",
                    summary.action,
                    summary.preprocessed_data_id,
                    summary.staging_dir.display(),
                    summary.sample_count,
                    summary.total_sequences,
                ))
            );
            if summary.sent {
                println!("{}", format_success("Sent to the EBI dropbox"));
            } else {
                println!("Transfer skipped; pass --send to deliver the staged submission");
            }
        }
    }

    Ok(())
}

/// Handle maintenance commands
pub async fn handle_maintenance(ctx: &Context, command: MaintenanceCommands) -> Result<()> {
    match command {
        MaintenanceCommands::Lock { time, message } => {
            ctx.kv.set_with_expiry(MAINTENANCE_KEY, &message, time).await?;
            println!(
                "{}",
                format_success(&format!("Platform locked for {} seconds", time))
            );
        }
        MaintenanceCommands::Unlock => {
            ctx.kv.delete(MAINTENANCE_KEY).await?;
            println!("{}", format_success("Platform unlocked"));
        }
        MaintenanceCommands::Sysmessage { time, message } => {
            ctx.kv.set_with_expiry(SYSMESSAGE_KEY, &message, time).await?;
            println!(
                "{}",
                format_success(&format!("System message set for {} seconds", time))
            );
        }
        MaintenanceCommands::ClearSysmessage => {
            ctx.kv.delete(SYSMESSAGE_KEY).await?;
            println!("{}", format_success("System message cleared"));
        }
        MaintenanceCommands::Status => {
            let maintenance = flag_state(ctx, MAINTENANCE_KEY).await?;
            let sysmessage = flag_state(ctx, SYSMESSAGE_KEY).await?;
            println!("{}", format_status_report(&maintenance, &sysmessage));
        }
    }

    Ok(())
}

/// Handle webserver commands
pub async fn handle_webserver(ctx: &Context, command: WebserverCommands) -> Result<()> {
    match command {
        WebserverCommands::Start { port } => {
            let addr = format!("{}:{}", ctx.config.webserver.bind, port);
            let state = AppState::new(ctx.store.clone(), ctx.kv.clone(), ctx.vocab.clone());
            wrack_web::serve(state, &addr).await?;
        }
    }

    Ok(())
}

/// Handle ware commands
pub async fn handle_ware(command: WareCommands) -> Result<()> {
    match command {
        WareCommands::GenerateDemux { sl_out_dir } => {
            let path = wrack_ware::generate_demux_file(&sl_out_dir)?;
            println!(
                "{}",
                format_success(&format!("Generated demux index at {}", path.display()))
            );
        }
    }

    Ok(())
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

async fn flag_state(ctx: &Context, key: &str) -> Result<FlagState> {
    Ok(match ctx.kv.get(key).await? {
        Some(message) => Some((message, ctx.kv.ttl(key).await?)),
        None => None,
    })
}

fn check_vocab(vocab: &BTreeMap<String, i64>, value: &str, what: &str) -> Result<()> {
    if vocab.contains_key(value) {
        Ok(())
    } else {
        bail!(
            "unknown {} '{}', expected one of: {}",
            what,
            value,
            Vocabularies::names(vocab)
        )
    }
}

fn check_params_table(table: &str) -> Result<()> {
    if SUPPORTED_PARAMS_TABLES.contains(&table) {
        Ok(())
    } else {
        bail!(
            "unknown parameters table '{}', expected one of: {}",
            table,
            SUPPORTED_PARAMS_TABLES.join(", ")
        )
    }
}

fn zip_filepaths(
    fp: Vec<PathBuf>,
    fp_type: Vec<String>,
    vocab: &BTreeMap<String, i64>,
) -> Result<Vec<Filepath>> {
    if fp.len() != fp_type.len() {
        bail!(
            "--fp and --fp_type must be given the same number of times ({} vs {})",
            fp.len(),
            fp_type.len()
        );
    }
    for fp_type in &fp_type {
        check_vocab(vocab, fp_type, "filepath type")?;
    }
    Ok(fp
        .into_iter()
        .zip(fp_type)
        .map(|(path, fp_type)| Filepath::new(path, fp_type))
        .collect())
}

// Registration order is the sorted directory listing, so repeat runs over
// the same directory register files in the same order.
fn scan_dir(dir: &Path, fp_type: &str) -> Result<Vec<Filepath>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    if paths.is_empty() {
        bail!("{} contains no files to register", dir.display());
    }
    Ok(paths
        .into_iter()
        .map(|path| Filepath::new(path, fp_type))
        .collect())
}

fn parse_processed_date(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        anyhow::anyhow!(
            "invalid --processed_date '{}': {} (expected YYYY-MM-DD HH:MM:SS)",
            raw,
            e
        )
    })
}
