//! Engine Loader Factory
//!
//! Maps an [`EngineConfig`] to the loader for its backend, and resolves the
//! model identifier for the configured variant.

use std::sync::Arc;

use crate::engine::EngineLoader;
use crate::ollama::OllamaLoader;
use crate::openai_compat::OpenAiCompatLoader;
use crate::types::{EngineBackend, EngineConfig, LlmResult};
use crate::variant::{select_variant, ModelVariant, RuntimeCapabilities};

/// Create the loader for the configured backend.
pub fn build_loader(config: &EngineConfig) -> LlmResult<Arc<dyn EngineLoader>> {
    let base_url = config.resolved_base_url();
    let loader: Arc<dyn EngineLoader> = match config.backend {
        EngineBackend::Ollama => Arc::new(OllamaLoader::new(base_url)?),
        EngineBackend::OpenaiCompatible => {
            Arc::new(OpenAiCompatLoader::new(base_url, config.api_key.clone())?)
        }
    };
    Ok(loader)
}

/// Pick the variant for this host and return it with its model identifier.
pub fn resolve_model(config: &EngineConfig, caps: &RuntimeCapabilities) -> (ModelVariant, String) {
    let variant = select_variant(config.variant, caps);
    (variant, config.models.model_for(variant).to_string())
}
