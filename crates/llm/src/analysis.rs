//! Structured Analysis Requester
//!
//! One non-streaming request per analysis, constrained to a JSON object and
//! sampled at low temperature. The response either deserializes into an
//! [`AnalysisResult`] or the call fails with [`ChatError::AnalysisParse`];
//! there is no fallback result and no automatic retry.

use sentinel_core::contract::{AnalysisResult, ContractDescriptor};

use crate::engine::InferenceEngine;
use crate::error::{ChatError, ChatResult};
use crate::formatter::{strip_reasoning, REASONING_OPEN};
use crate::types::{CompletionOptions, Message, ResponseFormat};

/// Sampling temperature for analysis requests.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

const RESPONSE_SHAPE: &str = r#"{
  "vulnerabilities": [
    {
      "type": "string",
      "severity": "low|medium|high|critical",
      "description": "string",
      "location": "string",
      "recommendation": "string"
    }
  ],
  "suggestions": [
    {
      "type": "string",
      "description": "string",
      "location": "string",
      "code": "string (optional)"
    }
  ],
  "summary": "string"
}"#;

/// Build the instruction prompt for `contract`.
pub fn build_analysis_prompt(contract: &ContractDescriptor) -> String {
    let language = contract.language();
    format!(
        "Analyze the following {language} smart contract for security vulnerabilities, \
         optimization opportunities, and best practices:\n\n\
         ```{language}\n{source}\n```\n\n\
         Provide a detailed analysis in JSON format with the following structure:\n{shape}\n",
        language = language,
        source = contract.source(),
        shape = RESPONSE_SHAPE,
    )
}

/// Parse a raw model response into an [`AnalysisResult`].
///
/// A leading reasoning span is ignored; tags elsewhere are kept as data.
/// Empty output is parsed as `{}` and
/// therefore rejected.
pub fn parse_analysis(raw: &str) -> ChatResult<AnalysisResult> {
    let body = if raw.trim_start().starts_with(REASONING_OPEN) {
        strip_reasoning(raw)
    } else {
        raw.trim().to_string()
    };
    let body = if body.is_empty() { "{}" } else { body.as_str() };

    serde_json::from_str::<AnalysisResult>(body).map_err(|e| ChatError::AnalysisParse {
        message: e.to_string(),
        raw: raw.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct AnalysisRequester {
    temperature: f32,
}

impl Default for AnalysisRequester {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisRequester {
    pub fn new() -> Self {
        Self {
            temperature: ANALYSIS_TEMPERATURE,
        }
    }

    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Request a structured analysis of `contract`.
    pub async fn analyze(
        &self,
        engine: &dyn InferenceEngine,
        contract: &ContractDescriptor,
    ) -> ChatResult<AnalysisResult> {
        if contract.source().trim().is_empty() {
            return Err(ChatError::invalid_input(format!(
                "contract {} has no source",
                contract.name()
            )));
        }

        let messages = vec![Message::user(build_analysis_prompt(contract))];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            response_format: ResponseFormat::JsonObject,
            include_usage: false,
        };

        tracing::info!(
            contract = contract.name(),
            language = contract.language(),
            model = engine.model(),
            "Requesting contract analysis"
        );
        let completion = engine
            .complete(messages, options)
            .await
            .map_err(ChatError::Transport)?;

        tracing::debug!(
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "Analysis response received"
        );

        let raw = completion.content.unwrap_or_default();
        match parse_analysis(&raw) {
            Ok(result) => {
                tracing::info!(
                    contract = contract.name(),
                    vulnerabilities = result.vulnerabilities.len(),
                    suggestions = result.suggestions.len(),
                    "Contract analysis complete"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::error!(contract = contract.name(), "Failed to parse JSON response: {}", e);
                Err(e)
            }
        }
    }
}
