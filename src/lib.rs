//! Contract Sentinel
//!
//! Chat with a locally served language model about smart contracts and run
//! structured vulnerability analyses. It includes:
//! - CLI command handlers (chat loop, one-shot analysis, config)
//! - The conversation service driving chat turns and analyses
//! - Storage for the JSON config file
//! - Data models and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::response::*;
pub use models::settings::{AppConfig, SettingsUpdate};
pub use services::conversation::{ConversationOptions, ConversationService};
pub use state::{AppState, StatusReport};
pub use storage::config::ConfigService;
pub use utils::error::{AppError, AppResult};
