//! CLI interface for SMMA
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SMMA agent runner
///
/// Runs a task against a chat-completion endpoint while keeping the model's
/// working memory under a token budget. Everything that leaves memory stays
/// on the task's tape.
#[derive(Parser, Debug)]
#[command(name = "smma")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a task until the model finishes it
    Run {
        /// What the agent should do
        prompt: String,

        /// Task id; keys the tape file (default: T-<timestamp>)
        #[arg(long)]
        id: Option<String>,

        /// Acceptance criterion (repeatable)
        #[arg(long = "criteria", value_name = "TEXT")]
        criteria: Vec<String>,

        /// File holding a replacement system prompt
        #[arg(long, value_name = "FILE")]
        system: Option<PathBuf>,
    },

    /// Inspect a task's tape
    Tape {
        #[command(subcommand)]
        action: TapeAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Tape inspection actions
#[derive(Subcommand, Debug)]
pub enum TapeAction {
    /// Print every record on the tape
    Show {
        /// Task ID
        task_id: String,
    },
    /// Print the original content of one message
    Recall {
        /// Task ID
        task_id: String,
        /// Visible id of the message
        visible_id: u64,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Validate configuration file
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["smma", "--json", "--log", "debug", "config", "show"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from([
            "smma",
            "run",
            "fix the failing test",
            "--id",
            "T-42",
            "--criteria",
            "tests pass",
            "--criteria",
            "no warnings",
        ]);
        if let Command::Run {
            prompt,
            id,
            criteria,
            system,
        } = cli.command
        {
            assert_eq!(prompt, "fix the failing test");
            assert_eq!(id.as_deref(), Some("T-42"));
            assert_eq!(criteria, vec!["tests pass", "no warnings"]);
            assert!(system.is_none());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_tape_recall() {
        let cli = Cli::parse_from(["smma", "tape", "recall", "T-1", "7"]);
        if let Command::Tape {
            action: TapeAction::Recall {
                task_id,
                visible_id,
            },
        } = cli.command
        {
            assert_eq!(task_id, "T-1");
            assert_eq!(visible_id, 7);
        } else {
            panic!("Expected Tape recall");
        }
    }

    #[test]
    fn test_tape_recall_rejects_negative_id() {
        assert!(Cli::try_parse_from(["smma", "tape", "recall", "T-1", "-3"]).is_err());
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["smma", "--config", "/tmp/smma.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/smma.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
