//! Engine-Specific Stream Adapters
//!
//! Each adapter converts one wire format into [`StreamEvent`]s.
//! The Ollama engine reads typed chunks from its SDK and needs no adapter.
//!
//! [`StreamEvent`]: sentinel_core::streaming::StreamEvent

pub mod openai_compat;

pub use openai_compat::OpenAiCompatAdapter;
