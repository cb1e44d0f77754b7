//! Task records consumed from the task store
//!
//! The engine never parses task files itself. A task store hands it these
//! records as plain data and the agent loop turns them into a prompt.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EngineError;

/// Lifecycle status of a task in the store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of work as stored by the task store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Stable task identifier, also used to key the tape file
    pub id: String,

    /// Short human title
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub status: TaskStatus,

    /// Ids of tasks that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Free-text acceptance criteria
    #[serde(default)]
    pub criteria: Vec<String>,

    #[serde(default)]
    pub description: String,
}

impl Task {
    /// Create a pending task with no dependencies or criteria
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            criteria: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an acceptance criterion
    pub fn with_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.criteria.push(criterion.into());
        self
    }

    /// Parse a task record from JSON, rejecting ids that cannot key a tape file.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let task: Task = serde_json::from_str(raw)?;
        task.validate()?;
        Ok(task)
    }

    /// Check that the id is non-empty and safe to use inside a file name
    pub fn validate(&self) -> Result<(), EngineError> {
        validate_task_id(&self.id)
    }

    /// Render the task as the opening user prompt for the agent
    pub fn prompt(&self) -> String {
        let mut parts = Vec::new();
        if self.title.is_empty() {
            parts.push(format!("Task {}", self.id));
        } else {
            parts.push(format!("Task {}: {}", self.id, self.title));
        }
        if !self.description.is_empty() {
            parts.push(String::new());
            parts.push(self.description.clone());
        }
        if !self.criteria.is_empty() {
            parts.push(String::new());
            parts.push("Acceptance criteria:".to_string());
            for criterion in &self.criteria {
                parts.push(format!("- [ ] {}", criterion));
            }
        }
        parts.join("\n")
    }
}

/// Reject task ids that are empty or could escape the directory they key
/// a file in.
pub fn validate_task_id(id: &str) -> Result<(), EngineError> {
    if id.trim().is_empty() {
        return Err(EngineError::InvalidTask("task id is empty".to_string()));
    }
    if id
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
    {
        return Err(EngineError::InvalidTask(format!(
            "task id '{}' contains path characters",
            id
        )));
    }
    Ok(())
}
