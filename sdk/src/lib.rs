//! SMMA SDK
//!
//! Shared types for the SMMA engine and the tools it drives: the error
//! taxonomy, tool argument parsing, and the task records handed over by the
//! task store.

/// Error types and handling
pub mod errors;

/// Task records consumed from the task store
pub mod task;

/// Tool input types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, EngineErrorExt};
pub use task::{validate_task_id, Task, TaskStatus};
pub use types::{ToolError, ToolInput};
