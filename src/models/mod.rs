//! Data Models
//!
//! Contains the application-level data structures.

pub mod response;
pub mod settings;

pub use response::*;
pub use settings::*;
