//! Conversation Service Integration Tests
//!
//! Drives chat turns and contract analyses end to end through a real
//! `ModelSession`, collector, and analysis requester, with a fake engine.

use std::sync::Arc;
use std::time::Duration;

use contract_sentinel::services::conversation::{
    ConversationOptions, ConversationService, ANALYSIS_FALLBACK_MESSAGE, CHAT_FALLBACK_MESSAGE,
};
use sentinel_core::{ChatRole, ContractDescriptor, Severity};
use sentinel_llm::{ChatError, LlmError, MessageRole, ModelSession, ResponseFormat, SessionState};
use tokio::sync::{mpsc, Notify};

use crate::support::{FakeEngine, FakeLoader, VALID_ANALYSIS};

fn service_with(loader: Arc<FakeLoader>) -> ConversationService {
    let session = Arc::new(ModelSession::new(loader, "fake-model"));
    ConversationService::new(session, ConversationOptions::default())
}

fn vault() -> ContractDescriptor {
    ContractDescriptor::new(
        "Vault",
        "contract Vault { function withdraw() public {} }",
        "solidity",
    )
}

fn sink() -> (
    mpsc::UnboundedSender<String>,
    mpsc::UnboundedReceiver<String>,
) {
    mpsc::unbounded_channel()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut snapshots = Vec::new();
    while let Ok(s) = rx.try_recv() {
        snapshots.push(s);
    }
    snapshots
}

// ============================================================================
// Chat turns
// ============================================================================

#[tokio::test]
async fn test_conversation_starts_with_greeting() {
    let engine = Arc::new(FakeEngine::replying(&[]));
    let service = service_with(Arc::new(FakeLoader::new(engine)));

    let history = service.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role(), ChatRole::System);
    assert_eq!(history[1].role(), ChatRole::Assistant);

    let visible = service.visible_messages();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].content().starts_with("Hello"));
    assert_eq!(service.session_state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_chat_turn_appends_reply() {
    let engine = Arc::new(FakeEngine::replying(&["Re", "entrancy ", "is bad"]));
    let service = service_with(Arc::new(FakeLoader::new(engine.clone())));
    let (tx, _rx) = sink();

    let reply = service.send_message("What is reentrancy?", &tx).await.unwrap();
    assert_eq!(reply, "Reentrancy is bad");

    let history = service.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].role(), ChatRole::User);
    assert_eq!(history[2].content(), "What is reentrancy?");
    assert_eq!(history[3].role(), ChatRole::Assistant);
    assert_eq!(history[3].content(), "Reentrancy is bad");

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    let (messages, options) = &requests[0];
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::System, MessageRole::Assistant, MessageRole::User]
    );
    assert!(options.include_usage);
    assert!(!service.is_streaming());
    assert_eq!(service.session_state().await, SessionState::Ready);
}

#[tokio::test]
async fn test_reasoning_is_stripped_from_prior_replies() {
    let engine = Arc::new(FakeEngine::replying(&["<think>hmm</think>\n\n", "Use checks-effects-interactions."]));
    let service = service_with(Arc::new(FakeLoader::new(engine.clone())));
    let (tx, _rx) = sink();

    let first = service.send_message("How do I fix it?", &tx).await.unwrap();
    assert!(first.starts_with("<think>"));
    service.send_message("Thanks", &tx).await.unwrap();

    let requests = engine.requests();
    let (messages, _) = &requests[1];
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[3].role, MessageRole::Assistant);
    assert_eq!(messages[3].content, "Use checks-effects-interactions.");
}

#[tokio::test(start_paused = true)]
async fn test_progress_snapshots_every_interval() {
    let engine = Arc::new(FakeEngine::replying(&["A", "B"]).with_gap(Duration::from_millis(150)));
    let service = service_with(Arc::new(FakeLoader::new(engine)));
    let (tx, mut rx) = sink();

    let reply = service.send_message("hi", &tx).await.unwrap();

    assert_eq!(reply, "AB");
    assert_eq!(drain(&mut rx), vec!["A".to_string(), "AB".to_string()]);
}

#[tokio::test]
async fn test_stream_failure_appends_fallback() {
    let engine = Arc::new(
        FakeEngine::replying(&["partial "]).failing_stream(LlmError::NetworkError {
            message: "connection reset".to_string(),
        }),
    );
    let service = service_with(Arc::new(FakeLoader::new(engine)));
    let (tx, _rx) = sink();

    let err = service.send_message("hello", &tx).await.unwrap_err();
    assert!(matches!(err, ChatError::Stream { .. }));

    let history = service.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].content(), CHAT_FALLBACK_MESSAGE);
    assert!(history.iter().all(|m| m.content() != "partial "));
    assert!(!service.is_streaming());
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let engine = Arc::new(FakeEngine::replying(&["x"]));
    let loader = Arc::new(FakeLoader::new(engine));
    let service = service_with(loader.clone());
    let (tx, _rx) = sink();

    let err = service.send_message("   ", &tx).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput(_)));
    assert_eq!(service.history().len(), 2);
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn test_failed_initialization_is_retried_on_next_request() {
    let engine = Arc::new(FakeEngine::replying(&["ok"]));
    let loader = Arc::new(FakeLoader::failing_first(
        engine,
        LlmError::EngineUnavailable {
            message: "server not running".to_string(),
        },
    ));
    let service = service_with(loader.clone());
    let (tx, _rx) = sink();

    let err = service.send_message("first", &tx).await.unwrap_err();
    assert!(matches!(err, ChatError::Initialization(_)));
    assert_eq!(service.session_state().await, SessionState::Failed);
    assert_eq!(service.history().last().unwrap().content(), CHAT_FALLBACK_MESSAGE);

    let reply = service.send_message("second", &tx).await.unwrap();
    assert_eq!(reply, "ok");
    assert_eq!(loader.load_count(), 2);
    assert_eq!(service.session_state().await, SessionState::Ready);
}

#[tokio::test]
async fn test_warm_up_loads_once() {
    let engine = Arc::new(FakeEngine::replying(&["ok"]));
    let loader = Arc::new(FakeLoader::new(engine));
    let service = service_with(loader.clone());
    let (tx, _rx) = sink();

    service.warm_up().await.unwrap();
    service.send_message("hi", &tx).await.unwrap();
    assert_eq!(loader.load_count(), 1);
}

// ============================================================================
// Contract analysis
// ============================================================================

#[tokio::test]
async fn test_analysis_appends_summary_and_marker() {
    let engine = Arc::new(FakeEngine::replying(&[]).with_completion(VALID_ANALYSIS));
    let service = service_with(Arc::new(FakeLoader::new(engine.clone())));
    service.select_contract(vault());

    let result = service.analyze_contract().await.unwrap();
    assert_eq!(result.vulnerabilities.len(), 1);
    assert_eq!(result.vulnerabilities[0].severity, Severity::High);
    assert_eq!(result.suggestions.len(), 2);
    assert_eq!(service.analysis(), Some(result));

    let history = service.history();
    let tail: Vec<ChatRole> = history[2..].iter().map(|m| m.role()).collect();
    assert_eq!(
        tail,
        vec![
            ChatRole::User,
            ChatRole::Analysis,
            ChatRole::Assistant,
            ChatRole::Analysis
        ]
    );
    assert_eq!(
        history[2].content(),
        "Analyze this solidity contract named \"Vault\""
    );
    assert_eq!(
        history[4].content(),
        "I've analyzed the Vault contract. Here's what I found:\n \nThe withdraw function is vulnerable to reentrancy. I've identified 1 vulnerabilities and 2 suggestions for improvement."
    );

    let visible = service.visible_messages();
    let markers = visible
        .iter()
        .filter(|m| m.role() == ChatRole::Analysis)
        .count();
    assert_eq!(markers, 1);
    assert_eq!(visible.last().unwrap().role(), ChatRole::Analysis);

    let requests = engine.requests();
    let (messages, options) = &requests[0];
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
    assert!(messages[0].content.contains("```solidity\ncontract Vault"));
    assert_eq!(options.temperature, Some(0.2));
    assert_eq!(options.response_format, ResponseFormat::JsonObject);
}

#[tokio::test]
async fn test_analysis_markers_are_not_sent_to_model() {
    let engine = Arc::new(FakeEngine::replying(&["Sure."]).with_completion(VALID_ANALYSIS));
    let service = service_with(Arc::new(FakeLoader::new(engine.clone())));
    let (tx, _rx) = sink();
    service.select_contract(vault());

    service.analyze_contract().await.unwrap();
    service.send_message("Explain the first finding", &tx).await.unwrap();

    let requests = engine.requests();
    let (messages, _) = &requests[1];
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User
        ]
    );
    assert!(messages.iter().all(|m| !m.content.is_empty()));
}

#[tokio::test]
async fn test_analysis_without_contract() {
    let engine = Arc::new(FakeEngine::replying(&[]));
    let loader = Arc::new(FakeLoader::new(engine));
    let service = service_with(loader.clone());

    let err = service.analyze_contract().await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput(_)));
    assert_eq!(service.history().len(), 2);
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn test_malformed_analysis_appends_fallback() {
    let engine = Arc::new(FakeEngine::replying(&[]).with_completion("I think it is fine"));
    let service = service_with(Arc::new(FakeLoader::new(engine)));
    service.select_contract(vault());

    let err = service.analyze_contract().await.unwrap_err();
    assert!(matches!(err, ChatError::AnalysisParse { .. }));
    assert!(service.analysis().is_none());
    assert_eq!(
        service.history().last().unwrap().content(),
        ANALYSIS_FALLBACK_MESSAGE
    );
    assert!(!service.is_analyzing());
}

#[tokio::test]
async fn test_analysis_transport_failure() {
    let engine = Arc::new(FakeEngine::replying(&[]).with_completion_error(
        LlmError::ServerError {
            message: "overloaded".to_string(),
            status: Some(503),
        },
    ));
    let service = service_with(Arc::new(FakeLoader::new(engine)));
    service.select_contract(vault());

    let err = service.analyze_contract().await.unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)));
    assert_eq!(
        service.history().last().unwrap().content(),
        ANALYSIS_FALLBACK_MESSAGE
    );
}

#[tokio::test]
async fn test_selecting_contract_clears_analysis() {
    let engine = Arc::new(FakeEngine::replying(&[]).with_completion(VALID_ANALYSIS));
    let service = service_with(Arc::new(FakeLoader::new(engine)));
    service.select_contract(vault());
    service.analyze_contract().await.unwrap();
    assert!(service.analysis().is_some());

    let edited = vault().with_source("contract Vault { }");
    service.select_contract(edited.clone());
    assert!(service.analysis().is_none());
    assert_eq!(service.contract(), Some(edited));
}

#[tokio::test]
async fn test_superseded_analysis_is_not_displayed() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(
        FakeEngine::replying(&[])
            .with_completion(VALID_ANALYSIS)
            .gated(gate.clone()),
    );
    let service = service_with(Arc::new(FakeLoader::new(engine)));
    service.select_contract(vault());

    let switch = async {
        while !service.is_analyzing() {
            tokio::task::yield_now().await;
        }
        service.select_contract(ContractDescriptor::new(
            "Token",
            "contract Token {}",
            "solidity",
        ));
        gate.notify_one();
    };
    let (result, ()) = tokio::join!(service.analyze_contract(), switch);

    let result = result.unwrap();
    assert_eq!(result.vulnerabilities.len(), 1);
    assert!(service.analysis().is_none());

    let history = service.history();
    assert_eq!(history.last().unwrap().role(), ChatRole::Assistant);
    assert!(history
        .last()
        .unwrap()
        .content()
        .starts_with("I've analyzed the Vault contract."));
}
