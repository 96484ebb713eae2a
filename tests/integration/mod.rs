//! Integration Tests Module
//!
//! End-to-end tests for the conversation service, the CLI commands, and
//! config handling, run against a fake inference engine.

// Shared fake engine and loader
mod support;

// Chat turns and contract analysis through the conversation service
mod conversation_test;


// Config file handling and per-run overrides
mod config_test;
