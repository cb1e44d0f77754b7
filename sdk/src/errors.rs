//! Error types and handling
//!
//! This module provides the error types shared by the SMMA engine and its
//! command-line front end. All errors implement the `EngineErrorExt` trait
//! which provides user-friendly hints and indicates whether errors are
//! recoverable.
//!
//! Errors that the model itself can correct (unknown message ids, bad ranges,
//! refused tools) never travel through this type. They are rendered as tool
//! output inside the conversation instead.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including user-friendly hints
/// and recoverability information.
pub trait EngineErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require fixing configuration or the environment.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Tape**: The append-only log could not be created or read
/// - **LLM Provider**: Endpoint failures, authentication errors
/// - **Tool**: Sandbox tool failures
/// - **Task store**: Malformed task records
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, EngineErrorExt};
///
/// let error = EngineError::Config("max_tokens must be positive".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let transient = EngineError::LLMProvider("connection reset".to_string());
/// assert!(transient.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Tape errors
    #[error("Tape error: {0}")]
    Tape(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // Task store errors
    #[error("Invalid task record: {0}")]
    InvalidTask(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Tape(_) => "Check that the logs directory exists and is writable",
            Self::LLMProvider(_) => "LLM endpoint unavailable. Check your API key and network",
            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",
            Self::InvalidTask(_) => "The task record is malformed. Check the task file",
            Self::Serialization(_) => "Data could not be encoded or decoded",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::InvalidTask(_) => false,
            _ => true,
        }
    }
}
