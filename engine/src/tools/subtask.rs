//! Subtask Tool
//!
//! Lets the model split off work it cannot finish in the current task. Each
//! subtask is written as a markdown file with YAML front matter into the
//! tasks directory, where the task store picks it up as `pending`.

use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SubtaskTool {
    tasks_dir: PathBuf,
}

impl SubtaskTool {
    pub fn new(tasks_dir: PathBuf) -> Self {
        Self { tasks_dir }
    }

    /// Write `T-AUTO-<epoch>.md` and return its path.
    pub async fn create(&self, title: &str, description: &str) -> Result<PathBuf> {
        if title.trim().is_empty() {
            return Err(anyhow::anyhow!("Subtask title must not be empty"));
        }
        fs::create_dir_all(&self.tasks_dir).await.map_err(|e| {
            anyhow::anyhow!("Failed to create {}: {}", self.tasks_dir.display(), e)
        })?;

        let (task_id, path) = self.free_slot();
        let content = render(&task_id, title, description);
        fs::write(&path, content)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;

        info!("Created subtask {} at {}", task_id, path.display());
        Ok(path)
    }

    /// Two subtasks created in the same second get `-1`, `-2`... suffixes.
    fn free_slot(&self) -> (String, PathBuf) {
        let base = format!("T-AUTO-{}", chrono::Utc::now().timestamp());
        let mut task_id = base.clone();
        let mut n = 0;
        loop {
            let path = self.tasks_dir.join(format!("{}.md", task_id));
            if !path.exists() {
                return (task_id, path);
            }
            n += 1;
            task_id = format!("{}-{}", base, n);
        }
    }
}

fn render(task_id: &str, title: &str, description: &str) -> String {
    format!(
        "---\nid: {}\ntitle: {}\nstatus: pending\npriority: high\ndependencies: []\n---\n\n## Description\n{}\n",
        task_id,
        serde_json::Value::String(title.to_string()),
        description
    )
}
