//! Scripted engine and loader doubles for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use sentinel_core::streaming::StreamEvent;

use crate::engine::{EngineLoader, FragmentStream, InferenceEngine, ProgressCallback};
use crate::types::{
    Completion, CompletionOptions, LlmError, LlmResult, LoadProgress, Message, StopReason,
    UsageStats,
};

type Step = (Duration, LlmResult<StreamEvent>);

/// Engine that replays a fixed script.
pub struct ScriptedEngine {
    model: String,
    steps: Vec<Step>,
    open_error: Option<LlmError>,
    completions: Mutex<VecDeque<LlmResult<Completion>>>,
    requests: Mutex<Vec<(Vec<Message>, CompletionOptions)>>,
}

impl ScriptedEngine {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            steps: Vec::new(),
            open_error: None,
            completions: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Emit each fragment `gap` after the previous one, then complete.
    pub fn with_fragments(mut self, fragments: &[&str], gap: Duration) -> Self {
        for fragment in fragments {
            self.steps.push((gap, Ok(StreamEvent::text(*fragment))));
        }
        self.steps.push((Duration::ZERO, Ok(StreamEvent::complete())));
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn failing_open(mut self, error: LlmError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_completion(self, content: &str) -> Self {
        self.push_completion(Ok(Completion {
            content: Some(content.to_string()),
            stop_reason: StopReason::EndTurn,
            usage: UsageStats {
                input_tokens: 12,
                output_tokens: 34,
            },
            model: self.model.clone(),
        }));
        self
    }

    pub fn with_completion_error(self, error: LlmError) -> Self {
        self.push_completion(Err(error));
        self
    }

    fn push_completion(&self, completion: LlmResult<Completion>) {
        self.completions.lock().unwrap().push_back(completion);
    }

    pub fn requests(&self) -> Vec<(Vec<Message>, CompletionOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<FragmentStream> {
        self.requests.lock().unwrap().push((messages, options));
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        let steps = self.steps.clone();
        let stream = futures_util::stream::iter(steps).then(|(delay, item)| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<Completion> {
        self.requests.lock().unwrap().push((messages, options));
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Other {
                    message: "no scripted completion".to_string(),
                })
            })
    }
}

/// Loader that counts loads and can fail the first attempt.
pub struct ScriptedLoader {
    delay: Duration,
    fail_first: Option<LlmError>,
    engine: Option<Arc<dyn InferenceEngine>>,
    loads: AtomicUsize,
}

impl ScriptedLoader {
    pub fn succeeding(delay: Duration) -> Self {
        Self {
            delay,
            fail_first: None,
            engine: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(delay: Duration, error: LlmError) -> Self {
        Self {
            fail_first: Some(error),
            ..Self::succeeding(delay)
        }
    }

    pub fn with_engine(delay: Duration, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine: Some(engine),
            ..Self::succeeding(delay)
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    async fn load(
        &self,
        model_id: &str,
        progress: ProgressCallback,
    ) -> LlmResult<Arc<dyn InferenceEngine>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        progress(LoadProgress::stage("Loading model"));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if attempt == 0 {
            if let Some(err) = &self.fail_first {
                return Err(err.clone());
            }
        }
        progress(LoadProgress::bytes("Model ready", 1, 1));
        Ok(self
            .engine
            .clone()
            .unwrap_or_else(|| Arc::new(ScriptedEngine::new(model_id))))
    }
}
