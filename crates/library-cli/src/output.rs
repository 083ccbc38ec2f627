//! Output formatting for the CLI.
//!
//! Command results go to stdout. Prompts and notices go to stderr so that
//! `--format json` output stays machine readable.

use clap::ValueEnum;
use serde::Serialize;
use step_flow::NoticeLevel;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "status": "success", "message": message })
            );
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::json!({ "status": "error", "message": message })
            );
        }
    }
}

/// Print a notice raised while prompting.
pub fn print_notice(level: NoticeLevel, message: &str, format: &OutputFormat) {
    match (format, level) {
        (OutputFormat::Text, NoticeLevel::Info) => eprintln!("{}", message),
        (OutputFormat::Text, NoticeLevel::Warning) => eprintln!("Warning: {}", message),
        (OutputFormat::Text, NoticeLevel::Error) => eprintln!("Error: {}", message),
        (OutputFormat::Json, level) => {
            let level = match level {
                NoticeLevel::Info => "info",
                NoticeLevel::Warning => "warning",
                NoticeLevel::Error => "error",
            };
            eprintln!(
                "{}",
                serde_json::json!({ "status": "notice", "level": level, "message": message })
            );
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(50));
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    print_divider();
}
