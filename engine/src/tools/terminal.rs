//! Terminal Tool
//!
//! Runs a command line through the platform shell (`sh -c` or `cmd /C`) in
//! the workspace, with a hard timeout. A command that outlives the timeout
//! is killed. The reply always carries the exit code followed by whatever
//! the command printed.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TerminalTool {
    work_dir: PathBuf,
    timeout: Duration,
}

impl TerminalTool {
    pub fn new(work_dir: PathBuf, timeout: Duration) -> Self {
        Self { work_dir, timeout }
    }

    /// Execute `command`, optionally in `cwd` (relative to the workspace).
    pub async fn execute(&self, command: &str, cwd: Option<&str>) -> Result<String> {
        if command.trim().is_empty() {
            return Err(anyhow::anyhow!("Empty command"));
        }
        let dir = match cwd {
            Some(dir) if !dir.trim().is_empty() => {
                let dir = Path::new(dir);
                if dir.is_absolute() {
                    dir.to_path_buf()
                } else {
                    self.work_dir.join(dir)
                }
            }
            _ => self.work_dir.clone(),
        };
        info!("Executing terminal command in {}: {}", dir.display(), command);

        let child = shell_command(command)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!("Failed to start command: {}", e);
                anyhow::anyhow!("Failed to start command: {}", e)
            })?;

        // Dropping the wait future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Failed to collect command output: {}", e);
                return Err(anyhow::anyhow!("Failed to collect command output: {}", e));
            }
            Err(_) => {
                let err_msg = format!("Command timed out after {:?} and was killed", self.timeout);
                warn!("{}", err_msg);
                return Err(anyhow::anyhow!(err_msg));
            }
        };

        let code = output.status.code().unwrap_or(-1);
        debug!("Command exited with {}", code);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(format_output(code, &stdout, &stderr))
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

fn format_output(code: i32, stdout: &str, stderr: &str) -> String {
    let mut out = format!("EXIT CODE: {}\n", code);
    if !stdout.is_empty() {
        out.push_str(&format!("STDOUT:\n{}\n", stdout));
    }
    if !stderr.is_empty() {
        out.push_str(&format!("STDERR:\n{}\n", stderr));
    }
    out.trim().to_string()
}
