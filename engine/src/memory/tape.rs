//! The Tape
//!
//! Append-only JSON-lines log of everything that entered or left working
//! memory for one task. Records are never edited or removed; content that
//! was pruned or summarized away stays recoverable through its original
//! `ADD_MESSAGE` record.
//!
//! Appends are best-effort. A failed write is logged and swallowed so the
//! in-memory ledger keeps working when the disk does not.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::MemoryError;
use sdk::errors::EngineError;
use sdk::task::validate_task_id;

/// One immutable line of the tape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TapeRecord {
    /// Written once, when the tape file is created
    Init { timestamp: f64, task_id: String },

    AddMessage {
        internal_id: String,
        visible_id: u64,
        timestamp: f64,
        message: Value,
    },

    Prune {
        internal_id: String,
        visible_id: u64,
        timestamp: f64,
    },

    SummarizedOut {
        internal_id: String,
        visible_id: u64,
        timestamp: f64,
    },
}

impl TapeRecord {
    pub fn action(&self) -> &'static str {
        match self {
            TapeRecord::Init { .. } => "INIT",
            TapeRecord::AddMessage { .. } => "ADD_MESSAGE",
            TapeRecord::Prune { .. } => "PRUNE",
            TapeRecord::SummarizedOut { .. } => "SUMMARIZED_OUT",
        }
    }

    pub fn visible_id(&self) -> Option<u64> {
        match self {
            TapeRecord::Init { .. } => None,
            TapeRecord::AddMessage { visible_id, .. }
            | TapeRecord::Prune { visible_id, .. }
            | TapeRecord::SummarizedOut { visible_id, .. } => Some(*visible_id),
        }
    }
}

/// An original message recovered from the tape
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecalledMessage {
    pub visible_id: u64,
    pub internal_id: String,
    pub timestamp: f64,
    pub message: Value,
}

/// Seconds since the Unix epoch, with microsecond precision
pub fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// File-backed append-only log for one task
#[derive(Debug, Clone)]
pub struct TapeStore {
    task_id: String,
    path: PathBuf,
}

impl TapeStore {
    /// Open the tape for `task_id` under `logs_dir`, creating it if needed.
    ///
    /// An `INIT` record is written only when the file did not exist yet, so
    /// reopening the tape of a task is idempotent.
    pub fn initialize(logs_dir: &Path, task_id: &str) -> Result<Self, EngineError> {
        validate_task_id(task_id)?;
        fs::create_dir_all(logs_dir).map_err(|e| {
            EngineError::Tape(format!("Failed to create logs directory {:?}: {}", logs_dir, e))
        })?;

        let store = Self {
            task_id: task_id.to_string(),
            path: logs_dir.join(format!("tape_{}.jsonl", task_id)),
        };

        if !store.path.exists() {
            let init = TapeRecord::Init {
                timestamp: epoch_seconds(),
                task_id: task_id.to_string(),
            };
            store
                .write_line(&init)
                .map_err(|e| EngineError::Tape(format!("Failed to create tape: {}", e)))?;
            debug!("Created tape {:?}", store.path);
        }

        Ok(store)
    }

    /// Open the tape of a task that already ran, without creating anything.
    pub fn open_existing(logs_dir: &Path, task_id: &str) -> Result<Self, EngineError> {
        validate_task_id(task_id)?;
        let path = logs_dir.join(format!("tape_{}.jsonl", task_id));
        if !path.is_file() {
            return Err(EngineError::Tape(format!(
                "No tape for task '{}' at {}",
                task_id,
                path.display()
            )));
        }
        Ok(Self {
            task_id: task_id.to_string(),
            path,
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Never fails: errors are logged and dropped.
    pub fn append(&self, record: &TapeRecord) {
        if let Err(e) = self.write_line(record) {
            error!(
                "Failed to append {} record to tape {:?}: {}",
                record.action(),
                self.path,
                e
            );
        }
    }

    fn write_line(&self, record: &TapeRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Read every well-formed record in file order.
    ///
    /// Blank and unparseable lines are skipped.
    pub fn records(&self) -> Result<Vec<TapeRecord>, MemoryError> {
        let file = File::open(&self.path).map_err(|e| {
            MemoryError::TapeUnreadable(format!("{}: {}", self.path.display(), e))
        })?;

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| MemoryError::TapeUnreadable(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TapeRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => debug!("Skipping malformed tape line: {}", e),
            }
        }
        Ok(records)
    }

    /// Find the newest `ADD_MESSAGE` record carrying `visible_id`.
    ///
    /// Linear in the size of the tape.
    pub fn find_by_visible_id(&self, visible_id: u64) -> Result<RecalledMessage, MemoryError> {
        self.records()?
            .into_iter()
            .filter_map(|record| match record {
                TapeRecord::AddMessage {
                    internal_id,
                    visible_id: id,
                    timestamp,
                    message,
                } if id == visible_id => Some(RecalledMessage {
                    visible_id,
                    internal_id,
                    timestamp,
                    message,
                }),
                _ => None,
            })
            .last()
            .ok_or(MemoryError::NotFound(visible_id))
    }
}
