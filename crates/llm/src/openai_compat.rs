//! OpenAI-Compatible Engine
//!
//! Inference over any local server that speaks the OpenAI chat-completions
//! protocol (llama.cpp server, MLC LLM serve, vLLM, LM Studio). Streaming
//! responses are read as SSE lines and converted by
//! [`OpenAiCompatAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use sentinel_core::streaming::{StreamAdapter, StreamEvent};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::engine::{
    classify_connection_error, parse_http_error, EngineLoader, FragmentStream, InferenceEngine,
    ProgressCallback,
};
use crate::http_client::build_http_client;
use crate::streaming_adapters::OpenAiCompatAdapter;
use crate::types::{
    Completion, CompletionOptions, LlmError, LlmResult, LoadProgress, Message, ResponseFormat,
    StopReason, UsageStats,
};

const ENGINE_NAME: &str = "openai_compatible";

/// Buffered events between the HTTP body and the consumer
const STREAM_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Connection details shared by the loader and its engines
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
            .header("Content-Type", "application/json")
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    fn send_error(&self, e: reqwest::Error) -> LlmError {
        classify_connection_error(e.to_string(), &self.base_url)
    }
}

/// Split complete lines off the front of `buffer`.
///
/// Bytes after the last newline stay buffered, so multi-byte characters
/// split across network chunks decode correctly.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line[..line.len() - 1]);
        let text = text.trim_end_matches('\r');
        if !text.trim().is_empty() {
            lines.push(text.to_string());
        }
    }
    lines
}

/// Take the unterminated final line left in `buffer` once the body has ended.
fn take_tail(buffer: &mut Vec<u8>) -> Option<String> {
    let rest = std::mem::take(buffer);
    let text = String::from_utf8_lossy(&rest);
    let text = text.trim_end_matches(['\r', '\n']);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Run one SSE line through the adapter and forward its events.
///
/// Returns `false` once the pump should stop.
async fn forward_line(
    adapter: &mut OpenAiCompatAdapter,
    line: &str,
    tx: &mpsc::Sender<LlmResult<StreamEvent>>,
) -> bool {
    let events = match adapter.adapt(line) {
        Ok(events) => events,
        Err(e) => {
            let _ = tx
                .send(Err(LlmError::ParseError {
                    message: e.to_string(),
                }))
                .await;
            return false;
        }
    };
    for event in events {
        let done = matches!(event, StreamEvent::Complete { .. });
        if tx.send(Ok(event)).await.is_err() || done {
            return false;
        }
    }
    true
}

/// A model served by an OpenAI-compatible server
pub struct OpenAiCompatEngine {
    endpoint: Endpoint,
    model: String,
}

impl OpenAiCompatEngine {
    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        stream: bool,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });

        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if options.response_format == ResponseFormat::JsonObject {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        if stream && options.include_usage {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }
}

#[async_trait]
impl InferenceEngine for OpenAiCompatEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<FragmentStream> {
        let body = self.build_request_body(&messages, &options, true);

        let response = self
            .endpoint
            .post("chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.endpoint.send_error(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;
            return Err(parse_http_error(status, &body_text, ENGINE_NAME));
        }

        let (tx, rx) = mpsc::channel::<LlmResult<StreamEvent>>(STREAM_BUFFER);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut adapter = OpenAiCompatAdapter::new();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(LlmError::NetworkError {
                                message: e.to_string(),
                            }))
                            .await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                for line in drain_lines(&mut buffer) {
                    if !forward_line(&mut adapter, &line, &tx).await {
                        return;
                    }
                }
            }

            if let Some(line) = take_tail(&mut buffer) {
                if !forward_line(&mut adapter, &line, &tx).await {
                    return;
                }
            }

            // Body ended without [DONE]; treat whatever arrived as the response
            if !adapter.is_complete() {
                let _ = tx.send(Ok(StreamEvent::complete())).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<Completion> {
        let body = self.build_request_body(&messages, &options, false);

        let response = self
            .endpoint
            .post("chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.endpoint.send_error(e))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, ENGINE_NAME));
        }

        parse_completion(&body_text, &self.model)
    }
}

fn parse_completion(body_text: &str, requested_model: &str) -> LlmResult<Completion> {
    let response: ChatResponse =
        serde_json::from_str(body_text).map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse response: {}", e),
        })?;

    let choice = response.choices.into_iter().next();
    let (content, stop_reason) = match choice {
        Some(choice) => (
            choice.message.content,
            choice
                .finish_reason
                .as_deref()
                .map(StopReason::from)
                .unwrap_or(StopReason::EndTurn),
        ),
        None => (None, StopReason::EndTurn),
    };

    let usage = response
        .usage
        .map(|u| UsageStats {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(Completion {
        content,
        stop_reason,
        usage,
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

/// Connects to an OpenAI-compatible server and checks it serves the model
pub struct OpenAiCompatLoader {
    endpoint: Endpoint,
}

impl OpenAiCompatLoader {
    pub fn new(base_url: &str, api_key: Option<String>) -> LlmResult<Self> {
        url::Url::parse(base_url).map_err(|e| LlmError::InvalidRequest {
            message: format!("Invalid server URL {}: {}", base_url, e),
        })?;
        Ok(Self {
            endpoint: Endpoint {
                client: build_http_client()?,
                base_url: base_url.to_string(),
                api_key,
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    async fn list_models(&self) -> LlmResult<Vec<String>> {
        let response = self
            .endpoint
            .get("models")
            .send()
            .await
            .map_err(|e| self.endpoint.send_error(e))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;
        if status != 200 {
            return Err(parse_http_error(status, &body_text, ENGINE_NAME));
        }

        let list: ModelList = serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse model list: {}", e),
        })?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl EngineLoader for OpenAiCompatLoader {
    fn backend(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn load(
        &self,
        model_id: &str,
        progress: ProgressCallback,
    ) -> LlmResult<Arc<dyn InferenceEngine>> {
        progress(LoadProgress::stage(format!(
            "Connecting to {}",
            self.endpoint.base_url
        )));

        let models = self.list_models().await?;
        if !models.iter().any(|m| m == model_id) {
            tracing::warn!(
                model = %model_id,
                available = ?models,
                "Server does not serve the requested model"
            );
            return Err(LlmError::ModelNotFound {
                model: model_id.to_string(),
            });
        }

        progress(LoadProgress::bytes(format!("Model {} ready", model_id), 1, 1));

        Ok(Arc::new(OpenAiCompatEngine {
            endpoint: self.endpoint.clone(),
            model: model_id.to_string(),
        }))
    }
}
