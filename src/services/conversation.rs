//! Conversation Service
//!
//! Owns the displayed conversation and drives chat turns and contract
//! analyses through the shared [`ModelSession`]. History is append-only.
//! Every failure is logged and replaced by a fixed assistant message in the
//! history; the error itself is still returned to the caller.
//!
//! Chat turns and analyses may overlap. Each keeps its own accumulator and
//! only touches shared state when it settles. An analysis result is kept for
//! display only if no newer analysis started and the contract did not change
//! while it was in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sentinel_core::{AnalysisResult, ChatMessage, ChatRole, ContractDescriptor};
use sentinel_llm::{
    format_for_model, AnalysisRequester, ChatError, ChatResult, ModelSession, ProgressSink,
    SessionState, StreamingCollector,
};

use crate::models::settings::{AppConfig, DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT};

/// Appended when a chat turn fails
pub const CHAT_FALLBACK_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Appended when an analysis fails
pub const ANALYSIS_FALLBACK_MESSAGE: &str =
    "Sorry, I encountered an error while analyzing the contract. Please try again.";

/// Conversation seed and request tuning
#[derive(Debug, Clone)]
pub struct ConversationOptions {
    pub system_prompt: String,
    pub greeting: String,
    pub progress_interval: Duration,
    pub analysis_temperature: f32,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ConversationOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            greeting: config.greeting.clone(),
            progress_interval: Duration::from_millis(config.progress_interval_ms),
            analysis_temperature: config.analysis_temperature,
        }
    }
}

#[derive(Debug, Default)]
struct ConversationState {
    history: Vec<ChatMessage>,
    contract: Option<ContractDescriptor>,
    analysis: Option<AnalysisResult>,
    /// Bumped by every analysis request and every contract change
    analysis_generation: u64,
    streaming: usize,
    analyzing: usize,
}

#[derive(Clone, Copy)]
enum Activity {
    Streaming,
    Analyzing,
}

/// Decrements an in-flight counter when the operation settles or is dropped
struct InFlight<'a> {
    state: &'a Mutex<ConversationState>,
    activity: Activity,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a Mutex<ConversationState>, activity: Activity) -> Self {
        {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            match activity {
                Activity::Streaming => guard.streaming += 1,
                Activity::Analyzing => guard.analyzing += 1,
            }
        }
        Self { state, activity }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match self.activity {
            Activity::Streaming => guard.streaming = guard.streaming.saturating_sub(1),
            Activity::Analyzing => guard.analyzing = guard.analyzing.saturating_sub(1),
        }
    }
}

/// Format the assistant message that follows a successful analysis.
pub fn analysis_summary(contract: &ContractDescriptor, result: &AnalysisResult) -> String {
    format!(
        "I've analyzed the {} contract. Here's what I found:\n \n{} I've identified {} vulnerabilities and {} suggestions for improvement.",
        contract.name(),
        result.summary,
        result.vulnerabilities.len(),
        result.suggestions.len()
    )
}

/// Format the user message that records an analysis request.
pub fn analysis_request_message(contract: &ContractDescriptor) -> String {
    format!(
        "Analyze this {} contract named \"{}\"",
        contract.language(),
        contract.name()
    )
}

pub struct ConversationService {
    session: Arc<ModelSession>,
    collector: StreamingCollector,
    analyzer: AnalysisRequester,
    state: Mutex<ConversationState>,
}

impl ConversationService {
    pub fn new(session: Arc<ModelSession>, options: ConversationOptions) -> Self {
        let system_prompt = if options.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            options.system_prompt
        };
        let greeting = if options.greeting.trim().is_empty() {
            DEFAULT_GREETING.to_string()
        } else {
            options.greeting
        };

        let state = ConversationState {
            history: vec![ChatMessage::system(system_prompt), ChatMessage::assistant(greeting)],
            ..ConversationState::default()
        };

        Self {
            session,
            collector: StreamingCollector::with_interval(options.progress_interval),
            analyzer: AnalysisRequester::with_temperature(options.analysis_temperature),
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.state().history.extend(messages);
    }

    pub fn session(&self) -> &Arc<ModelSession> {
        &self.session
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    /// Load the model now instead of on the first request.
    pub async fn warm_up(&self) -> ChatResult<()> {
        self.session.ensure_ready().await.map(|_| ())
    }

    /// Full history, including system messages and every analysis marker.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.state().history.clone()
    }

    /// History as shown to the user: no system messages, and only the most
    /// recent analysis marker.
    pub fn visible_messages(&self) -> Vec<ChatMessage> {
        let state = self.state();
        let last_marker = state
            .history
            .iter()
            .rposition(|m| m.role() == ChatRole::Analysis);

        state
            .history
            .iter()
            .enumerate()
            .filter(|(i, m)| match m.role() {
                ChatRole::Analysis => Some(*i) == last_marker,
                role => role.is_user_visible(),
            })
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn contract(&self) -> Option<ContractDescriptor> {
        self.state().contract.clone()
    }

    /// Select the contract to analyze. Clears the displayed analysis result.
    pub fn select_contract(&self, contract: ContractDescriptor) {
        tracing::info!(
            contract = contract.name(),
            language = contract.language(),
            "Contract selected"
        );
        let mut state = self.state();
        state.contract = Some(contract);
        state.analysis = None;
        state.analysis_generation += 1;
    }

    /// Analysis result currently on display, if any.
    pub fn analysis(&self) -> Option<AnalysisResult> {
        self.state().analysis.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming > 0
    }

    pub fn is_analyzing(&self) -> bool {
        self.state().analyzing > 0
    }

    /// Run one chat turn.
    ///
    /// The user message is appended first. On success the full reply is
    /// appended and returned; on failure any partial text is discarded and
    /// [`CHAT_FALLBACK_MESSAGE`] is appended instead.
    pub async fn send_message(&self, content: &str, sink: &dyn ProgressSink) -> ChatResult<String> {
        if content.trim().is_empty() {
            return Err(ChatError::invalid_input("message is empty"));
        }

        let snapshot = {
            let mut state = self.state();
            state.history.push(ChatMessage::user(content));
            state.history.clone()
        };

        let _in_flight = InFlight::start(&self.state, Activity::Streaming);
        let result = async {
            let engine = self.session.ensure_ready().await?;
            self.collector
                .collect(engine.as_ref(), format_for_model(&snapshot), sink)
                .await
        }
        .await;

        match result {
            Ok(response) => {
                if response.text.is_empty() {
                    tracing::warn!("Model returned an empty response");
                }
                self.append([ChatMessage::assistant(response.text.clone())]);
                Ok(response.text)
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), "Error getting response: {}", e);
                self.append([ChatMessage::assistant(CHAT_FALLBACK_MESSAGE)]);
                Err(e)
            }
        }
    }

    /// Analyze the selected contract.
    ///
    /// Starting an analysis clears the displayed result. The new result is
    /// displayed only if it is still the latest request for the current
    /// contract when it completes; it is returned to the caller either way.
    pub async fn analyze_contract(&self) -> ChatResult<AnalysisResult> {
        let (contract, generation) = {
            let mut state = self.state();
            let contract = state
                .contract
                .clone()
                .ok_or_else(|| ChatError::invalid_input("no contract selected"))?;
            state.analysis_generation += 1;
            state.analysis = None;
            state.history.push(ChatMessage::user(analysis_request_message(&contract)));
            state.history.push(ChatMessage::analysis_marker());
            (contract, state.analysis_generation)
        };

        let _in_flight = InFlight::start(&self.state, Activity::Analyzing);
        let result = async {
            let engine = self.session.ensure_ready().await?;
            self.analyzer.analyze(engine.as_ref(), &contract).await
        }
        .await;

        match result {
            Ok(analysis) => {
                let summary = ChatMessage::assistant(analysis_summary(&contract, &analysis));
                let mut state = self.state();
                if state.analysis_generation == generation {
                    state.analysis = Some(analysis.clone());
                    state.history.push(summary);
                    state.history.push(ChatMessage::analysis_marker());
                } else {
                    tracing::warn!(
                        contract = contract.name(),
                        "Analysis superseded while in flight; result not displayed"
                    );
                    state.history.push(summary);
                }
                Ok(analysis)
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), "Error analyzing contract: {}", e);
                self.append([ChatMessage::assistant(ANALYSIS_FALLBACK_MESSAGE)]);
                Err(e)
            }
        }
    }
}
