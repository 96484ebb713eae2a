//! Services
//!
//! Business logic services for the application.
//! Services handle the core functionality and are called by commands.

pub mod conversation;

pub use conversation::{
    analysis_request_message, analysis_summary, ConversationOptions, ConversationService,
    ANALYSIS_FALLBACK_MESSAGE, CHAT_FALLBACK_MESSAGE,
};
