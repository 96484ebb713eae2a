//! OpenAI-Compatible SSE Stream Adapter
//!
//! Handles the chat-completions chunk format served by llama.cpp, MLC LLM,
//! vLLM and similar local servers. `finish_reason` is remembered and
//! reported with `data: [DONE]`, because the usage chunk requested through
//! `stream_options.include_usage` arrives between the two.

use sentinel_core::streaming::{AdapterError, StreamAdapter, StreamEvent};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ChunkEvent {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        message: String,
        #[serde(default)]
        code: Option<serde_json::Value>,
    },
    Plain(String),
}

/// Adapter for OpenAI-compatible SSE chunks
#[derive(Debug, Default)]
pub struct OpenAiCompatAdapter {
    finish_reason: Option<String>,
    completed: bool,
}

impl OpenAiCompatAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` has been seen.
    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

impl StreamAdapter for OpenAiCompatAdapter {
    fn engine_name(&self) -> &'static str {
        "openai_compatible"
    }

    fn adapt(&mut self, input: &str) -> Result<Vec<StreamEvent>, AdapterError> {
        let trimmed = input.trim();

        // SSE comments and non-data fields carry nothing we need
        if trimmed.is_empty() || trimmed.starts_with(':') || trimmed.starts_with("event:") {
            return Ok(vec![]);
        }

        let json_str = match trimmed.strip_prefix("data:") {
            Some(rest) => rest.trim_start(),
            None => trimmed,
        };

        if json_str == "[DONE]" {
            if self.completed {
                return Ok(vec![]);
            }
            self.completed = true;
            return Ok(vec![StreamEvent::Complete {
                stop_reason: self.finish_reason.take(),
            }]);
        }

        let event: ChunkEvent =
            serde_json::from_str(json_str).map_err(|e| AdapterError::ParseError(e.to_string()))?;

        if let Some(error) = event.error {
            let (message, code) = match error {
                ErrorBody::Detailed { message, code } => {
                    (message, code.map(|c| c.to_string().trim_matches('"').to_string()))
                }
                ErrorBody::Plain(message) => (message, None),
            };
            return Ok(vec![StreamEvent::Error { message, code }]);
        }

        let mut events = vec![];

        for choice in event.choices {
            if let Some(delta) = choice.delta {
                if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                    events.push(StreamEvent::ThinkingDelta { content: reasoning });
                }
                if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                    events.push(StreamEvent::TextDelta { content });
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
        }

        if let Some(usage) = event.usage {
            events.push(StreamEvent::Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        }

        Ok(events)
    }

    fn reset(&mut self) {
        self.finish_reason = None;
        self.completed = false;
    }
}
