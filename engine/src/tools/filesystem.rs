//! Filesystem Read/Write Tool
//!
//! Reads and writes files for the model. Relative paths are resolved against
//! the configured workspace; absolute paths are used as given.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct FilesystemTool {
    workspace: PathBuf,
}

impl FilesystemTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Read the whole file as UTF-8 text.
    pub async fn read_file(&self, path: &str) -> Result<String> {
        let path = self.resolve_path(path)?;
        if !path.exists() {
            return Err(anyhow::anyhow!("File not found - {}", path.display()));
        }
        info!("Reading file: {}", path.display());

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

        debug!("Read {} bytes from {}", content.len(), path.display());
        Ok(content)
    }

    /// Create or overwrite a file, creating parent directories as needed.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<String> {
        let target = self.resolve_path(path)?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow::anyhow!("Failed to create directories {}: {}", parent.display(), e)
                })?;
            }
        }

        info!("Writing {} bytes to: {}", content.len(), target.display());

        fs::write(&target, content)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", target.display(), e))?;

        Ok(format!(
            "SUCCESS: Wrote {} bytes to {}",
            content.len(),
            target.display()
        ))
    }

    fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            return Err(anyhow::anyhow!("Missing path"));
        }
        let target = Path::new(path);
        Ok(if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.workspace.join(target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FilesystemTool) {
        let temp = TempDir::new().unwrap();
        let tool = FilesystemTool::new(temp.path().to_path_buf());
        (temp, tool)
    }

    #[tokio::test]
    async fn test_write_and_read_file() {
        let (temp, tool) = setup();
        let file = temp.path().join("hello.txt");

        let reply = tool
            .write_file(file.to_str().unwrap(), "hello world")
            .await
            .unwrap();
        assert!(reply.starts_with("SUCCESS: Wrote 11 bytes"));
        let content = tool.read_file(file.to_str().unwrap()).await.unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn test_relative_paths_use_workspace() {
        let (temp, tool) = setup();
        tool.write_file("a/b/deep.txt", "deep content").await.unwrap();

        assert!(temp.path().join("a/b/deep.txt").exists());
        assert_eq!(tool.read_file("a/b/deep.txt").await.unwrap(), "deep content");
    }

    #[tokio::test]
    async fn test_read_nonexistent_file() {
        let (_temp, tool) = setup();
        let err = tool.read_file("nope.txt").await.unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let (_temp, tool) = setup();
        assert!(tool.read_file("").await.is_err());
        assert!(tool.write_file("  ", "x").await.is_err());
    }
}
