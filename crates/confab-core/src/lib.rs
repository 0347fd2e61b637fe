//! Core types for the Confab orchestration core: the shared error taxonomy,
//! the conversation model and store, and the startup configuration surface.

pub mod config;
pub mod conversation;
pub mod error;

// Re-export common error type
pub use error::{ConfabError, Result};
