//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Execute a task through the agent loop
//! - tape show: Print every record of a task's tape
//! - tape recall: Print the original content of one message
//! - config show / validate: Inspect the effective configuration

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::agent::{AgentCore, OutcomeStatus, TaskOutcome};
use crate::config::Config;
use crate::llm::OpenAICompatProvider;
use crate::memory::{MemoryLedger, TapeRecord, TapeStore};
use crate::tools::ToolRegistry;
use sdk::task::Task;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Options of `smma run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub id: Option<String>,
    pub criteria: Vec<String>,
    pub system_prompt_file: Option<std::path::PathBuf>,
}

/// Build the task record for a prompt given on the command line.
pub fn build_task(prompt: &str, options: &RunOptions) -> Result<Task> {
    let id = options
        .id
        .clone()
        .unwrap_or_else(|| format!("T-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")));

    let mut task = Task::new(id, prompt);
    task.title = prompt.lines().next().unwrap_or_default().chars().take(80).collect();
    for criterion in &options.criteria {
        task = task.with_criterion(criterion.clone());
    }
    task.validate()?;
    Ok(task)
}

/// Run a task until the model finishes it or the iteration limit is hit.
pub async fn handle_run(
    prompt: String,
    options: RunOptions,
    config: &Config,
    format: OutputFormat,
) -> Result<TaskOutcome> {
    let task = build_task(&prompt, &options)?;

    let provider = OpenAICompatProvider::from_config(&config.llm);
    if std::env::var(config.llm.api_key_env()).is_err() {
        warn!(
            "No API key found in {} for provider '{}'",
            config.llm.api_key_env(),
            config.llm.provider
        );
    }

    let tools = ToolRegistry::from_config(config);
    let system_prompt = match &options.system_prompt_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt {}", path.display()))?,
        None => tools.system_prompt(),
    };

    let tape = TapeStore::initialize(&config.core.logs_dir, &task.id)
        .context("Failed to open tape")?;
    let tape_path = tape.path().to_path_buf();
    let ledger = MemoryLedger::new(tape, &config.memory);
    let mut agent = AgentCore::new(Arc::new(provider), ledger, tools, config);

    if let OutputFormat::Text = format {
        println!("Executing task: {}", task.id);
        println!();
    }

    let outcome = agent.run_task(&system_prompt, &task).await;
    let metrics = agent.ledger().metrics();

    match format {
        OutputFormat::Text => {
            match outcome.status {
                OutcomeStatus::Completed => println!("✓ Task completed"),
                OutcomeStatus::Failed => println!("✗ Task failed"),
            }
            println!("  Summary: {}", outcome.summary);
            println!("  Iterations: {}", outcome.iterations);
            println!(
                "  Memory: {} messages, {:.2}% pressure",
                metrics.message_count, metrics.pressure_percent
            );
            println!("  Tape: {}", tape_path.display());
        }
        OutputFormat::Json => {
            let output = json!({
                "outcome": outcome,
                "metrics": metrics,
                "tape": tape_path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(outcome)
}

/// Print every record on a task's tape.
pub fn handle_tape_show(task_id: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let tape = TapeStore::open_existing(&config.core.logs_dir, task_id)?;
    let records = tape.records()?;

    match format {
        OutputFormat::Text => {
            println!("Tape: {}", tape.path().display());
            println!("Records ({} total):", records.len());
            println!();
            for record in &records {
                println!("{}", describe(record));
            }
        }
        OutputFormat::Json => {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
    }

    Ok(())
}

/// Print the original content of one message.
pub fn handle_tape_recall(
    task_id: &str,
    visible_id: u64,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let tape = TapeStore::open_existing(&config.core.logs_dir, task_id)?;
    let recalled = tape.find_by_visible_id(visible_id)?;

    match format {
        OutputFormat::Text => {
            let role = recalled.message["role"].as_str().unwrap_or("unknown");
            println!("Message {} ({})", recalled.visible_id, role);
            println!("  Internal id: {}", recalled.internal_id);
            println!("  Timestamp: {}", format_timestamp(recalled.timestamp));
            println!();
            match recalled.message.get("content") {
                Some(serde_json::Value::String(text)) => println!("{}", text),
                Some(other) => println!("{}", other),
                None => {}
            }
            if let Some(calls) = recalled.message.get("tool_calls") {
                println!("Tool calls: {}", calls);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&recalled)?);
        }
    }

    Ok(())
}

/// Print the effective configuration.
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("{}", text);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Loading already validated the file; report where it came from.
pub fn handle_config_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("Configuration is valid: {}", config_path.display()),
        OutputFormat::Json => println!(
            "{}",
            json!({"valid": true, "path": config_path})
        ),
    }
    Ok(())
}

fn describe(record: &TapeRecord) -> String {
    match record {
        TapeRecord::Init { timestamp, task_id } => {
            format!("{}  INIT            task {}", format_timestamp(*timestamp), task_id)
        }
        TapeRecord::AddMessage {
            visible_id,
            timestamp,
            message,
            ..
        } => {
            let role = message["role"].as_str().unwrap_or("unknown");
            let content = match &message["content"] {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            let preview: String = content.chars().take(60).collect::<String>().replace('\n', " ");
            format!(
                "{}  ADD_MESSAGE     #{} {}: {}",
                format_timestamp(*timestamp),
                visible_id,
                role,
                preview
            )
        }
        TapeRecord::Prune {
            visible_id,
            timestamp,
            ..
        } => format!("{}  PRUNE           #{}", format_timestamp(*timestamp), visible_id),
        TapeRecord::SummarizedOut {
            visible_id,
            timestamp,
            ..
        } => format!("{}  SUMMARIZED_OUT  #{}", format_timestamp(*timestamp), visible_id),
    }
}

fn format_timestamp(epoch_seconds: f64) -> String {
    let micros = (epoch_seconds * 1_000_000.0) as i64;
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{:.3}", epoch_seconds))
}
