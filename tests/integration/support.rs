//! Test doubles shared by the integration tests.
//!
//! `FakeEngine` streams a fixed reply split into fragments and answers
//! completions from a queue. `FakeLoader` hands out one engine and can fail
//! its first load.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use sentinel_core::StreamEvent;
use sentinel_llm::{
    Completion, CompletionOptions, EngineLoader, FragmentStream, InferenceEngine, LlmError,
    LlmResult, LoadProgress, Message, ProgressCallback, StopReason, UsageStats,
};
use tokio::sync::Notify;

pub const VALID_ANALYSIS: &str = r#"{
  "vulnerabilities": [
    {"type": "reentrancy", "severity": "high", "description": "External call before state update", "location": "withdraw()", "recommendation": "Update balances before the call"}
  ],
  "suggestions": [
    {"type": "gas", "description": "Cache the array length", "location": "loop in distribute()"},
    {"type": "style", "description": "Use custom errors", "location": "require statements", "code": "error Unauthorized();"}
  ],
  "summary": "The withdraw function is vulnerable to reentrancy."
}"#;

pub struct FakeEngine {
    fragments: Vec<String>,
    gap: Duration,
    fail_stream: Option<LlmError>,
    completions: Mutex<VecDeque<LlmResult<String>>>,
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<(Vec<Message>, CompletionOptions)>>,
}

impl FakeEngine {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            gap: Duration::ZERO,
            fail_stream: None,
            completions: Mutex::new(VecDeque::new()),
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    pub fn failing_stream(mut self, error: LlmError) -> Self {
        self.fail_stream = Some(error);
        self
    }

    pub fn with_completion(self, content: &str) -> Self {
        self.completions
            .lock()
            .unwrap()
            .push_back(Ok(content.to_string()));
        self
    }

    pub fn with_completion_error(self, error: LlmError) -> Self {
        self.completions.lock().unwrap().push_back(Err(error));
        self
    }

    /// Hold every completion until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<(Vec<Message>, CompletionOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<FragmentStream> {
        self.requests.lock().unwrap().push((messages, options));

        let mut events: Vec<LlmResult<StreamEvent>> = self
            .fragments
            .iter()
            .map(|f| Ok(StreamEvent::text(f.clone())))
            .collect();
        match &self.fail_stream {
            Some(err) => events.push(Err(err.clone())),
            None => events.push(Ok(StreamEvent::complete())),
        }

        let gap = self.gap;
        let stream = futures_util::stream::iter(events).then(move |event| async move {
            if !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
            event
        });
        Ok(Box::pin(stream))
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<Completion> {
        self.requests.lock().unwrap().push((messages, options));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.completions.lock().unwrap().pop_front();
        let content = next.unwrap_or_else(|| {
            Err(LlmError::Other {
                message: "no completion queued".to_string(),
            })
        })?;
        Ok(Completion {
            content: Some(content),
            stop_reason: StopReason::EndTurn,
            usage: UsageStats {
                input_tokens: 10,
                output_tokens: 20,
            },
            model: "fake-model".to_string(),
        })
    }
}

pub struct FakeLoader {
    engine: Arc<FakeEngine>,
    fail_first: Option<LlmError>,
    loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        Self {
            engine,
            fail_first: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(engine: Arc<FakeEngine>, error: LlmError) -> Self {
        Self {
            fail_first: Some(error),
            ..Self::new(engine)
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    fn backend(&self) -> &'static str {
        "fake"
    }

    async fn load(
        &self,
        _model_id: &str,
        progress: ProgressCallback,
    ) -> LlmResult<Arc<dyn InferenceEngine>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        progress(LoadProgress::stage("Loading model"));
        if attempt == 0 {
            if let Some(err) = &self.fail_first {
                return Err(err.clone());
            }
        }
        progress(LoadProgress::bytes("Model ready", 1, 1));
        let engine: Arc<dyn InferenceEngine> = self.engine.clone();
        Ok(engine)
    }
}
