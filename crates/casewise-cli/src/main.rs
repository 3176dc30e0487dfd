use anyhow::{Context, Result};
use casewise_infrastructure::ConfigService;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod wiring;

#[derive(Parser)]
#[command(name = "casewise")]
#[command(about = "CaseWise - guided diagnostic case sessions", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/casewise/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work through a case interactively
    Run {
        /// Case id (a directory under the cases root)
        #[arg(long)]
        case: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// List the cases available under the cases root
    Cases,
    /// Inspect and maintain the session store
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List stored sessions, most recent first
    List {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        case: Option<String>,
        /// Only sessions that have not completed
        #[arg(long)]
        active: bool,
    },
    /// Aggregate statistics
    Stats,
    /// Delete sessions not updated within the given number of hours
    Purge {
        #[arg(long)]
        older_than_hours: u64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration if none exists
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match cli.config {
        Some(path) => ConfigService::new(path),
        None => ConfigService::default_location().context("Failed to locate config directory")?,
    };
    let config = config_service
        .get_config()
        .with_context(|| format!("Failed to load {}", config_service.path().display()))?;

    logging::init_logging(config.log_level.as_deref(), cli.json_logs);

    match cli.command {
        Commands::Run { case, user } => commands::run::run(&config, &case, user.as_deref()).await?,
        Commands::Cases => commands::cases::list(&config).await?,
        Commands::Sessions { action } => match action {
            SessionsAction::List { user, case, active } => {
                commands::sessions::list(&config, user.as_deref(), case.as_deref(), active).await?
            }
            SessionsAction::Stats => commands::sessions::stats(&config).await?,
            SessionsAction::Purge { older_than_hours } => {
                commands::sessions::purge(&config, older_than_hours).await?
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config::init(&config_service)?,
            ConfigAction::Show => commands::config::show(&config)?,
        },
    }

    Ok(())
}
