//! Config Commands
//!
//! Loading the effective configuration and the `config` subcommand.

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use sentinel_llm::{EngineBackend, VariantPreference};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::storage::config::ConfigService;
use crate::utils::error::AppResult;

/// Settings flags shared by `config set` and the global overrides
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Inference backend (ollama, openai_compatible)
    #[arg(long)]
    pub backend: Option<EngineBackend>,
    /// Engine base URL
    #[arg(long)]
    pub base_url: Option<String>,
    /// Bearer token for OpenAI-compatible servers
    #[arg(long)]
    pub api_key: Option<String>,
    /// Model identifier for the full variant
    #[arg(long)]
    pub full_model: Option<String>,
    /// Model identifier for the reduced variant
    #[arg(long)]
    pub reduced_model: Option<String>,
    /// Model variant (auto, full, reduced)
    #[arg(long)]
    pub variant: Option<VariantPreference>,
    /// Streaming progress cadence in milliseconds
    #[arg(long)]
    pub progress_interval_ms: Option<u64>,
    /// Sampling temperature for contract analysis
    #[arg(long)]
    pub analysis_temperature: Option<f32>,
}

impl From<SettingsArgs> for SettingsUpdate {
    fn from(args: SettingsArgs) -> Self {
        SettingsUpdate {
            backend: args.backend,
            base_url: args.base_url,
            api_key: args.api_key,
            full_model: args.full_model,
            reduced_model: args.reduced_model,
            variant: args.variant,
            progress_interval_ms: args.progress_interval_ms,
            analysis_temperature: args.analysis_temperature,
            ..SettingsUpdate::default()
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print the config file path and contents
    Show,
    /// Print the config file path
    Path,
    /// Update and persist settings
    Set(SettingsArgs),
    /// Restore the default settings
    Reset,
}

/// Open the config file, from `path` or the default location.
pub fn open_config(path: Option<PathBuf>) -> AppResult<ConfigService> {
    match path {
        Some(path) => ConfigService::open(path),
        None => ConfigService::new(),
    }
}

/// Effective configuration: the stored file with per-run overrides applied.
/// Overrides are not persisted.
pub fn load_config(path: Option<PathBuf>, overrides: SettingsArgs) -> AppResult<AppConfig> {
    let service = open_config(path)?;
    let mut config = service.get_config_clone();
    config.apply_update(overrides.into());
    config
        .validate()
        .map_err(crate::utils::error::AppError::validation)?;
    Ok(config)
}

/// Run a `config` subcommand, writing its report to `out`.
pub fn run(path: Option<PathBuf>, action: ConfigAction, out: &mut dyn Write) -> AppResult<()> {
    let mut service = open_config(path)?;

    match action {
        ConfigAction::Show => {
            writeln!(out, "# {}", service.path().display())?;
            writeln!(out, "{}", serde_json::to_string_pretty(service.get_config())?)?;
        }
        ConfigAction::Path => {
            writeln!(out, "{}", service.path().display())?;
        }
        ConfigAction::Set(args) => {
            let updated = service.update_config(args.into())?;
            tracing::info!(path = %service.path().display(), "Configuration updated");
            writeln!(out, "{}", serde_json::to_string_pretty(&updated)?)?;
        }
        ConfigAction::Reset => {
            service.reset()?;
            writeln!(out, "Configuration reset: {}", service.path().display())?;
        }
    }

    Ok(())
}
