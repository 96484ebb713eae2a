//! Contract Sentinel LLM
//!
//! Inference engine abstraction and the chat orchestration core:
//! - `session` - single-flight model initialization (`ModelSession`)
//! - `formatter` - conversation history to model messages
//! - `collector` - streaming completion with interval-based progress
//! - `analysis` - JSON-constrained contract analysis
//!
//! Engine backends:
//! - Ollama (native SDK)
//! - OpenAI-compatible local servers (llama.cpp, MLC LLM, vLLM)

pub mod analysis;
pub mod collector;
pub mod engine;
pub mod error;
pub mod factory;
pub mod formatter;
pub mod http_client;
pub mod ollama;
pub mod openai_compat;
pub mod session;
pub mod streaming_adapters;
pub mod types;
pub mod variant;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use analysis::{build_analysis_prompt, parse_analysis, AnalysisRequester, ANALYSIS_TEMPERATURE};
pub use collector::{
    CollectedResponse, ProgressSink, StreamHandle, StreamingCollector, DEFAULT_PROGRESS_INTERVAL,
};
pub use engine::{EngineLoader, FragmentStream, InferenceEngine, ProgressCallback};
pub use error::{ChatError, ChatResult};
pub use factory::{build_loader, resolve_model};
pub use formatter::{format_for_model, strip_reasoning};
pub use http_client::build_http_client;
pub use ollama::{OllamaEngine, OllamaLoader};
pub use openai_compat::{OpenAiCompatEngine, OpenAiCompatLoader};
pub use session::{ModelSession, SessionState};
pub use types::*;
pub use variant::{
    select_variant, ModelCatalog, ModelVariant, RuntimeCapabilities, VariantPreference,
    DEFAULT_FULL_MODEL, DEFAULT_REDUCED_MODEL,
};

// Re-export streaming adapters
pub use streaming_adapters::OpenAiCompatAdapter;
