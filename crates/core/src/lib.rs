//! Contract Sentinel Core
//!
//! Foundational domain types, error types, and stream events for the Contract
//! Sentinel workspace. This crate has no dependency on inference engines or
//! the application layer.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `chat` - Conversation messages and roles
//! - `contract` - Contract descriptors and structured analysis results
//! - `streaming` - Unified stream event types and adapter trait

pub mod chat;
pub mod contract;
pub mod error;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Conversation ───────────────────────────────────────────────────────
pub use chat::{ChatMessage, ChatRole};

// ── Contracts & Analysis ───────────────────────────────────────────────
pub use contract::{
    language_for_path, AnalysisResult, ContractDescriptor, Finding, Severity, Suggestion,
};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{AdapterError, StreamAdapter, StreamEvent};
