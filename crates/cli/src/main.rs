//! Jan-Seva CLI
//!
//! Answers welfare-scheme questions from verified sources and manages the
//! research cache and provider credentials.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, CacheCommand, ProvidersCommand};
use seva_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Jan-Seva - verified answers about government welfare schemes
#[derive(Parser, Debug)]
#[command(name = "seva")]
#[command(about = "Verified answers about government welfare schemes", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SEVA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SEVA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a query from candidate sources
    Ask(AskCommand),

    /// Inspect or maintain the research cache
    Cache(CacheCommand),

    /// List configured provider families and credentials
    Providers(ProvidersCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.workspace, cli.config)?.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.log_json,
    );
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Jan-Seva CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Config: {:?}", config);

    config.ensure_seva_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Cache(_) => "cache",
        Commands::Providers(_) => "providers",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Cache(cmd) => cmd.execute(&config),
        Commands::Providers(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.map_err(Into::into)
}
