//! Application State
//!
//! Wires configuration to an engine loader, the model session, and the
//! conversation service. One `AppState` per process.

use std::sync::Arc;

use serde::Serialize;
use sentinel_llm::{
    build_loader, resolve_model, EngineLoader, ModelSession, ModelVariant, RuntimeCapabilities,
    SessionState,
};

use crate::models::settings::AppConfig;
use crate::services::conversation::{ConversationOptions, ConversationService};
use crate::utils::error::{AppError, AppResult};

/// Snapshot of the application for `/status` and `config` output
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub backend: String,
    pub base_url: String,
    pub model: String,
    pub variant: ModelVariant,
    pub session: SessionState,
    pub contract: Option<String>,
    pub has_analysis: bool,
    pub streaming: bool,
    pub analyzing: bool,
}

/// Application state shared by the commands
pub struct AppState {
    config: AppConfig,
    variant: ModelVariant,
    conversation: Arc<ConversationService>,
}

impl AppState {
    /// Build the state for the running host using the configured backend
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;
        let loader = build_loader(&config.engine)?;
        Ok(Self::with_loader(config, loader, &RuntimeCapabilities::detect()))
    }

    /// Build the state around an explicit loader
    pub fn with_loader(
        config: AppConfig,
        loader: Arc<dyn EngineLoader>,
        caps: &RuntimeCapabilities,
    ) -> Self {
        let (variant, model_id) = resolve_model(&config.engine, caps);
        tracing::info!(
            backend = loader.backend(),
            model = %model_id,
            variant = %variant,
            os = caps.os,
            "Selected model variant"
        );

        let session = Arc::new(ModelSession::new(loader, model_id));
        let conversation = Arc::new(ConversationService::new(
            session,
            ConversationOptions::from(&config),
        ));

        Self {
            config,
            variant,
            conversation,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn model_id(&self) -> &str {
        self.conversation.session().model_id()
    }

    pub fn conversation(&self) -> &Arc<ConversationService> {
        &self.conversation
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            backend: self.config.engine.backend.to_string(),
            base_url: self.config.engine.resolved_base_url().to_string(),
            model: self.model_id().to_string(),
            variant: self.variant,
            session: self.conversation.session_state().await,
            contract: self.conversation.contract().map(|c| c.name().to_string()),
            has_analysis: self.conversation.analysis().is_some(),
            streaming: self.conversation.is_streaming(),
            analyzing: self.conversation.is_analyzing(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.model_id())
            .field("variant", &self.variant)
            .finish()
    }
}
