//! Output formatting utilities for the CLI

use colored::*;
use tabled::{settings::Style, Table, Tabled};

/// Format success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

/// State of one ephemeral platform flag: message plus remaining TTL.
pub type FlagState = Option<(String, Option<u64>)>;

/// Format the maintenance/banner status report.
///
/// One headline naming the maintenance state, then a table with both
/// flags, their messages and their remaining lifetimes.
pub fn format_status_report(maintenance: &FlagState, sysmessage: &FlagState) -> String {
    #[derive(Tabled)]
    struct FlagRow {
        #[tabled(rename = "Flag")]
        flag: String,
        #[tabled(rename = "Message")]
        message: String,
        #[tabled(rename = "Expires")]
        expires: String,
    }

    fn flag_row(name: &str, state: &FlagState) -> FlagRow {
        match state {
            Some((message, Some(ttl))) => FlagRow {
                flag: name.to_string(),
                message: message.clone(),
                expires: format!("in {} seconds", ttl),
            },
            Some((message, None)) => FlagRow {
                flag: name.to_string(),
                message: message.clone(),
                expires: "never".to_string(),
            },
            None => FlagRow {
                flag: name.to_string(),
                message: "(not set)".dimmed().to_string(),
                expires: "-".to_string(),
            },
        }
    }

    let headline = if maintenance.is_some() {
        "Platform is in maintenance mode".red().bold().to_string()
    } else {
        "Platform is not in maintenance mode".green().to_string()
    };

    let rows = vec![
        flag_row("maintenance", maintenance),
        flag_row("sysmessage", sysmessage),
    ];
    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!("{}\n{}", headline, table)
}
