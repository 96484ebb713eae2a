//! Settings Models
//!
//! Application configuration and settings data structures.

use serde::{Deserialize, Serialize};
use sentinel_llm::{EngineBackend, EngineConfig, VariantPreference, ANALYSIS_TEMPERATURE};

/// Default system prompt seeding every conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a smart contract analysis agent, aim to find \
vulnerabilities and suggest improvements for the contract. That is your only purpose.";

/// Default assistant greeting shown when a conversation starts
pub const DEFAULT_GREETING: &str = "Hello 👋\nI'm your smart contract analysis assistant. \
You can load a contract for analysis with /contract <path>, or just ask a question to get started.";

/// Default progress cadence in milliseconds
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Inference engine connection and model selection
    pub engine: EngineConfig,
    /// Streaming progress cadence in milliseconds
    pub progress_interval_ms: u64,
    /// Sampling temperature for contract analysis
    pub analysis_temperature: f32,
    /// System message seeding every conversation
    pub system_prompt: String,
    /// Assistant greeting shown after the system message
    pub greeting: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            analysis_temperature: ANALYSIS_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub backend: Option<EngineBackend>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub full_model: Option<String>,
    pub reduced_model: Option<String>,
    pub variant: Option<VariantPreference>,
    pub progress_interval_ms: Option<u64>,
    pub analysis_temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub greeting: Option<String>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(backend) = update.backend {
            self.engine.backend = backend;
        }
        if let Some(base_url) = update.base_url {
            self.engine.base_url = Some(base_url);
        }
        if let Some(api_key) = update.api_key {
            self.engine.api_key = Some(api_key);
        }
        if let Some(model) = update.full_model {
            self.engine.models.full = model;
        }
        if let Some(model) = update.reduced_model {
            self.engine.models.reduced = model;
        }
        if let Some(variant) = update.variant {
            self.engine.variant = variant;
        }
        if let Some(interval) = update.progress_interval_ms {
            self.progress_interval_ms = interval;
        }
        if let Some(temperature) = update.analysis_temperature {
            self.analysis_temperature = temperature;
        }
        if let Some(prompt) = update.system_prompt {
            self.system_prompt = prompt;
        }
        if let Some(greeting) = update.greeting {
            self.greeting = greeting;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(base_url) = &self.engine.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(format!(
                    "Invalid base_url: {}. Must start with http:// or https://",
                    base_url
                ));
            }
        }

        if self.engine.models.full.trim().is_empty() || self.engine.models.reduced.trim().is_empty() {
            return Err("Model identifiers must not be empty".to_string());
        }

        if !(10..=10_000).contains(&self.progress_interval_ms) {
            return Err(format!(
                "progress_interval_ms must be between 10 and 10000, got {}",
                self.progress_interval_ms
            ));
        }

        if !(0.0..=2.0).contains(&self.analysis_temperature) {
            return Err(format!(
                "analysis_temperature must be between 0.0 and 2.0, got {}",
                self.analysis_temperature
            ));
        }

        if self.system_prompt.trim().is_empty() {
            return Err("system_prompt must not be empty".to_string());
        }

        Ok(())
    }
}
