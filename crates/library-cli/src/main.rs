//! Template Library CLI - browse, upload and download templates from the terminal.

mod commands;
mod config_file;
mod download_flow;
mod library_client;
mod output;
mod terminal_prompt;
mod upload_flow;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Template Library CLI - log in to the template library and fetch templates.
#[derive(Parser)]
#[command(name = "template-library")]
#[command(about = "Template Library client for authentication, template uploads and downloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the identity broker
    Login,

    /// Forget the stored session
    Logout,

    /// Check whether the stored session is still valid
    Status,

    /// Change the template library REST API endpoint
    SetEndpoint {
        /// Endpoint URL, e.g. https://template-library-radon.xlab.si/api
        url: String,
    },

    /// List templates
    Templates,

    /// List the versions of a template
    Versions {
        /// Template name
        template: String,
    },

    /// Download template version files interactively
    Download,

    /// Create a template or a new template version interactively
    Upload,

    /// Run the upload and download actions of a JSON config file
    RunConfig {
        /// Path to the JSON config file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match commands::Context::load(cli.format) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| ctx.config.log_level.clone());
    library_config_and_utils::init_logging(&level);
    debug!(endpoint = %ctx.config.api_endpoint, "Configuration loaded");

    let result = match cli.command {
        Commands::Login => commands::login(&ctx).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Status => commands::status(&ctx).await,
        Commands::SetEndpoint { url } => commands::set_endpoint(&ctx, &url).await,
        Commands::Templates => commands::templates_list(&ctx).await,
        Commands::Versions { template } => commands::versions_list(&ctx, &template).await,
        Commands::Download => commands::download(&ctx).await,
        Commands::Upload => commands::upload(&ctx).await,
        Commands::RunConfig { file } => commands::run_config(&ctx, &file).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "template-library",
            "versions",
            "web",
            "--format",
            "json",
            "--log-level",
            "debug",
        ]);

        assert!(matches!(cli.command, Commands::Versions { ref template } if template == "web"));
        assert_eq!(cli.format, output::OutputFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_set_endpoint_subcommand_name() {
        let cli = Cli::parse_from(["template-library", "set-endpoint", "https://x.example/api"]);
        assert!(matches!(cli.command, Commands::SetEndpoint { ref url } if url == "https://x.example/api"));
    }

    #[test]
    fn test_run_config_takes_file_path() {
        let cli = Cli::parse_from(["template-library", "run-config", "library.json"]);
        assert!(matches!(cli.command, Commands::RunConfig { ref file } if file == &PathBuf::from("library.json")));

        let cli = Cli::parse_from(["template-library", "upload"]);
        assert!(matches!(cli.command, Commands::Upload));
    }
}
