//! Agent Loop
//!
//! This module implements the loop that drives one task through the model
//! while keeping working memory under budget. The interceptor sits between
//! the model's tool calls and the tools themselves.

pub mod core;
pub mod interceptor;

pub use core::{AgentCore, OutcomeStatus, TaskOutcome};
pub use interceptor::{Gate, ToolInterceptor, DEFAULT_CEILING_PERCENT};
