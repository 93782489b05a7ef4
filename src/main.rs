use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod sandbox;
mod template;
mod templates;

#[derive(Parser)]
#[command(name = "opensandbox-runtime")]
#[command(
    author,
    version,
    about = "Agent-sandbox runtime core - template merging and sandbox lifecycle"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = config::CONFIG_FILE, env = "OPENSANDBOX_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config and base template into the current directory
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration and initialize the sandbox service
    Check,

    /// Print the base workload template
    Template,

    /// Render the workload for a sandbox request
    Render {
        /// Container image
        #[arg(long)]
        image: String,

        /// Sandbox id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Entrypoint as a shell-quoted command line
        #[arg(long)]
        command: Option<String>,

        /// Metadata label as KEY=VALUE (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,

        /// Environment variable as KEY=VALUE (repeatable)
        #[arg(short, long)]
        env: Vec<String>,

        /// Resource limit as NAME=QUANTITY (repeatable)
        #[arg(long = "resource")]
        resources: Vec<String>,

        /// Sandbox lifetime in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Create through an in-memory provider and print the sandbox as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log filter: `--verbose` wins, then `server.log_level` from the config file.
fn log_filter(verbose: bool, config_path: &Path) -> EnvFilter {
    if verbose {
        return EnvFilter::new("opensandbox_runtime=debug");
    }

    let level = config::AppConfig::load(config_path)
        .map(|c| c.server.log_level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());
    EnvFilter::try_new(format!("opensandbox_runtime={level}"))
        .unwrap_or_else(|_| EnvFilter::new("opensandbox_runtime=info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so rendered output on stdout stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(cli.verbose, &cli.config))
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force).await?;
        }
        Commands::Check => {
            commands::check::run(&cli.config).await?;
        }
        Commands::Template => {
            commands::template::run(&cli.config).await?;
        }
        Commands::Render {
            image,
            id,
            command,
            labels,
            env,
            resources,
            timeout_secs,
            json,
        } => {
            let args = commands::render::RenderArgs {
                image,
                id,
                command,
                labels,
                env,
                resources,
                timeout_secs,
                json,
            };
            commands::render::run(&cli.config, args).await?;
        }
    }

    Ok(())
}
