//! SMMA Engine Library
//!
//! Bounded working memory for tool-calling agents. The model manages its own
//! context through memory tools, under a pressure dashboard and a hard
//! ceiling, while an append-only tape keeps everything recoverable.
//! This library is used by both the `smma` binary and integration tests.

/// Configuration management module
pub mod config;

/// Ledger, tape and pressure policy
pub mod memory;

/// LLM endpoint abstraction layer
pub mod llm;

/// Agent loop and tool-call interceptor
pub mod agent;

/// Tools exposed to the model
pub mod tools;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
