//! Streaming Response Collector
//!
//! Opens a streaming completion and accumulates text fragments in arrival
//! order. Progress is published on a fixed wall-clock interval rather than
//! per fragment, so the observer's update rate is bounded no matter how fast
//! tokens arrive. Ticks fire even when nothing new arrived; observers may see
//! the same snapshot more than once.
//!
//! The final snapshot is not published: the returned [`CollectedResponse`]
//! is the terminal value.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sentinel_core::streaming::StreamEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::engine::InferenceEngine;
use crate::error::{ChatError, ChatResult};
use crate::types::{CompletionOptions, LlmError, Message, UsageStats};

/// Default progress cadence.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Receives accumulated-text snapshots.
///
/// Publishing must not block; the collector keeps reading fragments while
/// observers catch up.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, text: &str);
}

impl ProgressSink for watch::Sender<String> {
    fn publish(&self, text: &str) {
        self.send_replace(text.to_string());
    }
}

impl ProgressSink for mpsc::UnboundedSender<String> {
    fn publish(&self, text: &str) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(text.to_string());
    }
}

/// Outcome of a completed stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedResponse {
    /// Concatenation of every text fragment, in arrival order
    pub text: String,
    /// Token usage, when the engine reported it
    pub usage: Option<UsageStats>,
    /// Number of non-empty text fragments received
    pub fragments: usize,
    /// Stop reason reported with the final sentinel
    pub stop_reason: Option<String>,
}

/// A collector running on its own task.
pub struct StreamHandle {
    /// Latest published snapshot
    pub progress: watch::Receiver<String>,
    /// Resolves to the collected response
    pub task: JoinHandle<ChatResult<CollectedResponse>>,
}

#[derive(Debug, Clone)]
pub struct StreamingCollector {
    interval: Duration,
}

impl Default for StreamingCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingCollector {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Use a custom progress cadence. A zero interval falls back to the default.
    pub fn with_interval(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_PROGRESS_INTERVAL
        } else {
            interval
        };
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stream a chat completion for `messages`, publishing snapshots to `sink`.
    ///
    /// Failing to open the stream yields [`ChatError::Transport`]; a failure
    /// after it opened yields [`ChatError::Stream`] carrying the partial text.
    pub async fn collect(
        &self,
        engine: &dyn InferenceEngine,
        messages: Vec<Message>,
        sink: &dyn ProgressSink,
    ) -> ChatResult<CollectedResponse> {
        let options = CompletionOptions {
            include_usage: true,
            ..CompletionOptions::default()
        };

        tracing::debug!(
            engine = engine.name(),
            model = engine.model(),
            messages = messages.len(),
            "Opening chat stream"
        );
        let mut stream = engine
            .stream_chat(messages, options)
            .await
            .map_err(ChatError::Transport)?;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut text = String::new();
        let mut fragments = 0usize;
        let mut usage = None;
        let mut stop_reason = None;

        loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => {
                    sink.publish(&text);
                }

                next = stream.next() => match next {
                    Some(Ok(StreamEvent::TextDelta { content })) => {
                        if !content.is_empty() {
                            text.push_str(&content);
                            fragments += 1;
                        }
                    }
                    Some(Ok(StreamEvent::ThinkingDelta { .. })) => {}
                    Some(Ok(StreamEvent::Usage { input_tokens, output_tokens })) => {
                        usage = Some(UsageStats { input_tokens, output_tokens });
                    }
                    Some(Ok(StreamEvent::Error { message, code })) => {
                        tracing::warn!(code = ?code, "Chat stream reported an error: {}", message);
                        return Err(ChatError::Stream {
                            source: LlmError::Other { message },
                            partial: text,
                        });
                    }
                    Some(Ok(StreamEvent::Complete { stop_reason: reason })) => {
                        stop_reason = reason;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(fragments, "Chat stream failed: {}", e);
                        return Err(ChatError::Stream { source: e, partial: text });
                    }
                    None => break,
                },
            }
        }

        match usage {
            Some(u) => tracing::info!(
                fragments,
                input_tokens = u.input_tokens,
                output_tokens = u.output_tokens,
                "Chat stream complete"
            ),
            None => tracing::info!(fragments, "Chat stream complete"),
        }

        Ok(CollectedResponse {
            text,
            usage,
            fragments,
            stop_reason,
        })
    }

    /// Run [`collect`](Self::collect) on a spawned task, observing progress
    /// through a watch channel.
    pub fn spawn(&self, engine: Arc<dyn InferenceEngine>, messages: Vec<Message>) -> StreamHandle {
        let (tx, progress) = watch::channel(String::new());
        let collector = self.clone();
        let task = tokio::spawn(async move { collector.collect(engine.as_ref(), messages, &tx).await });
        StreamHandle { progress, task }
    }
}
