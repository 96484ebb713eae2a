// Contract Sentinel - CLI entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use contract_sentinel::commands::{self, config::ConfigAction, config::SettingsArgs};
use contract_sentinel::AppState;

#[derive(Parser)]
#[command(name = "contract-sentinel")]
#[command(about = "Chat with a local model about smart contracts and analyze them for vulnerabilities", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.contract-sentinel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-run overrides; not saved to the config file
    #[command(flatten)]
    overrides: SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat {
        /// Load the model on the first message instead of at startup
        #[arg(long)]
        lazy: bool,
    },
    /// Analyze a contract file and print the findings
    Analyze {
        /// Contract source file
        file: PathBuf,
        /// Contract language (inferred from the extension if omitted)
        #[arg(long)]
        language: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SENTINEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();

    match cli.command.unwrap_or(Commands::Chat { lazy: false }) {
        Commands::Config { action } => {
            commands::config::run(cli.config, action, &mut stdout)?;
        }
        Commands::Analyze {
            file,
            language,
            json,
        } => {
            let config = commands::config::load_config(cli.config, cli.overrides)?;
            let state = AppState::from_config(config)?;
            commands::analyze::run(&state, &file, language.as_deref(), json, &mut stdout).await?;
        }
        Commands::Chat { lazy } => {
            let config = commands::config::load_config(cli.config, cli.overrides)?;
            let state = AppState::from_config(config)?;
            let stdin = BufReader::new(tokio::io::stdin());
            commands::chat::run(&state, stdin, &mut stdout, !lazy).await?;
        }
    }

    Ok(())
}
