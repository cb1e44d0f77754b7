pub mod filesystem;
pub mod memory;
pub mod subtask;
pub mod terminal;

pub use filesystem::FilesystemTool;
pub use subtask::SubtaskTool;
pub use terminal::TerminalTool;

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::memory::MemoryLedger;
use sdk::types::ToolInput;

pub const PRUNE_MESSAGES: &str = "prune_messages";
pub const SUMMARIZE_RANGE: &str = "summarize_range";
pub const RECALL_ORIGINAL: &str = "recall_original";
pub const FINISH_TASK: &str = "finish_task";
pub const EXECUTE_TERMINAL_COMMAND: &str = "execute_terminal_command";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const CREATE_SUBTASK: &str = "create_subtask";

/// Tools that manage memory or end the task. Always available.
pub const MEMORY_TOOLS: [&str; 4] = [PRUNE_MESSAGES, SUMMARIZE_RANGE, RECALL_ORIGINAL, FINISH_TASK];

/// Registry of the tools the model can call.
///
/// Memory tools and `finish_task` are always present. Sandbox tools are
/// optional; only those that are `Some` are advertised and dispatched.
pub struct ToolRegistry {
    pub fs: Option<FilesystemTool>,
    pub terminal: Option<TerminalTool>,
    pub subtasks: Option<SubtaskTool>,
}

impl ToolRegistry {
    /// Create a registry with only the memory tools.
    pub fn empty() -> Self {
        Self {
            fs: None,
            terminal: None,
            subtasks: None,
        }
    }

    /// Enable the sandbox tools switched on in `[tools]`.
    pub fn from_config(config: &Config) -> Self {
        let workspace = config.core.workspace.clone();
        Self {
            fs: config
                .tools
                .filesystem
                .then(|| FilesystemTool::new(workspace.clone())),
            terminal: config.tools.terminal.then(|| {
                TerminalTool::new(
                    workspace.clone(),
                    Duration::from_secs(config.tools.command_timeout_secs),
                )
            }),
            subtasks: config
                .tools
                .subtasks
                .then(|| SubtaskTool::new(config.core.tasks_dir.clone())),
        }
    }

    /// Dispatch a tool call by name.
    ///
    /// Malformed argument JSON is treated as an empty argument set. Every
    /// failure comes back as text so the model sees it and can self-correct.
    pub async fn dispatch(
        &self,
        ledger: &mut MemoryLedger,
        name: &str,
        arguments_json: &str,
    ) -> String {
        debug!("Dispatching tool '{}' with args: {}", name, arguments_json);
        let input = ToolInput::from_arguments(name, arguments_json);

        match name {
            PRUNE_MESSAGES => memory::prune_messages(ledger, &input),
            SUMMARIZE_RANGE => memory::summarize_range(ledger, &input),
            RECALL_ORIGINAL => memory::recall_original(ledger, &input),
            FINISH_TASK => {
                let (status, summary) = finish_arguments(&input);
                format!("TASK_FINISHED_{}: {}", status.to_uppercase(), summary)
            }
            EXECUTE_TERMINAL_COMMAND => {
                let Some(ref terminal) = self.terminal else {
                    return not_enabled(name);
                };
                let command = match input.param_str("command") {
                    Ok(c) => c,
                    Err(e) => return format!("ERROR: {}", e),
                };
                let cwd = input.param_str_opt("cwd");
                match terminal.execute(&command, cwd.as_deref()).await {
                    Ok(output) => output,
                    Err(e) => format!("ERROR: {}", e),
                }
            }
            READ_FILE => {
                let Some(ref fs) = self.fs else {
                    return not_enabled(name);
                };
                let path = input.param_str_opt("path").unwrap_or_default();
                match fs.read_file(&path).await {
                    Ok(content) => content,
                    Err(e) => format!("ERROR: {}", e),
                }
            }
            WRITE_FILE => {
                let Some(ref fs) = self.fs else {
                    return not_enabled(name);
                };
                let path = input.param_str_opt("path").unwrap_or_default();
                let content = input.param_str_opt("content").unwrap_or_default();
                match fs.write_file(&path, &content).await {
                    Ok(msg) => msg,
                    Err(e) => format!("ERROR: {}", e),
                }
            }
            CREATE_SUBTASK => {
                let Some(ref subtasks) = self.subtasks else {
                    return not_enabled(name);
                };
                let title = input.param_str_opt("title").unwrap_or_default();
                let description = input.param_str_opt("description").unwrap_or_default();
                match subtasks.create(&title, &description).await {
                    Ok(path) => format!("SUCCESS: Subtask created {}", path.display()),
                    Err(e) => format!("ERROR: {}", e),
                }
            }
            _ => {
                warn!("Unknown tool requested: {}", name);
                format!(
                    "ERROR: Unknown tool '{}'. Available tools: {}",
                    name,
                    self.available_tool_names().join(", ")
                )
            }
        }
    }

    /// Tool schema in OpenAI function-calling format.
    pub fn schemas(&self) -> Vec<Value> {
        let mut tools = vec![
            function(
                PRUNE_MESSAGES,
                "Remove messages from working memory by id. Use it for output you no longer need. The originals stay on the tape.",
                json!({
                    "message_ids": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": "Visible ids of the messages to remove."
                    }
                }),
                &["message_ids"],
            ),
            function(
                SUMMARIZE_RANGE,
                "Replace a contiguous range of messages with one summary you write. Both ids must be active and start must come before end.",
                json!({
                    "start_id": {"type": "integer", "description": "Id of the first message in the range."},
                    "end_id": {"type": "integer", "description": "Id of the last message in the range."},
                    "summary_text": {"type": "string", "description": "What the range contained that is still worth knowing."}
                }),
                &["start_id", "end_id", "summary_text"],
            ),
            function(
                RECALL_ORIGINAL,
                "Fetch the exact original content of a message, even after it was pruned or summarized.",
                json!({
                    "message_id": {"type": "integer", "description": "Visible id of the message."}
                }),
                &["message_id"],
            ),
        ];

        if self.terminal.is_some() {
            tools.push(function(
                EXECUTE_TERMINAL_COMMAND,
                "Run a shell command and return its exit code, stdout and stderr. Use it to build, test or inspect the project.",
                json!({
                    "command": {"type": "string", "description": "The exact command to run."},
                    "cwd": {"type": "string", "description": "Working directory (optional). Defaults to the workspace root."}
                }),
                &["command"],
            ));
        }

        if self.fs.is_some() {
            tools.push(function(
                READ_FILE,
                "Read the whole content of a local file.",
                json!({
                    "path": {"type": "string", "description": "Relative or absolute path of the file."}
                }),
                &["path"],
            ));
            tools.push(function(
                WRITE_FILE,
                "Write content to a file, creating or overwriting it.",
                json!({
                    "path": {"type": "string", "description": "Path of the file."},
                    "content": {"type": "string", "description": "Full content to write."}
                }),
                &["path", "content"],
            ));
        }

        if self.subtasks.is_some() {
            tools.push(function(
                CREATE_SUBTASK,
                "Create a new pending task as a markdown file. Use it when part of the problem should be handled separately.",
                json!({
                    "title": {"type": "string", "description": "Short title of the new task."},
                    "description": {"type": "string", "description": "Detailed description of the problem or feature."}
                }),
                &["title", "description"],
            ));
        }

        tools.push(function(
            FINISH_TASK,
            "End the task, declaring that the goal is met or that it cannot be met.",
            json!({
                "status": {"type": "string", "enum": ["completed", "failed"], "description": "Final status of the task."},
                "summary": {"type": "string", "description": "Technical summary of what was done, or why it failed."}
            }),
            &["status", "summary"],
        ));

        tools
    }

    /// Default system prompt describing the memory discipline.
    pub fn system_prompt(&self) -> String {
        let parts = [
            "You are an autonomous software agent working on a single task.",
            "",
            "MEMORY RULES:",
            "1. Your context window is limited. Every message carries a visible id shown in the SMMA dashboard.",
            "2. When pressure rises, call summarize_range to fold old messages into a summary, or prune_messages to drop output you no longer need.",
            "3. Nothing is lost: recall_original returns the exact original of any id.",
            "4. When the dashboard says CRITICAL, manage memory before calling any other tool. Other tools are refused until pressure drops.",
            "",
            "When the task is done, or cannot be done, call finish_task with a status and a summary.",
        ];
        let mut prompt = parts.join("\n");
        prompt.push_str("\n\nAvailable tools: ");
        prompt.push_str(&self.available_tool_names().join(", "));
        prompt
    }

    /// Names of every tool that can currently be dispatched.
    pub fn available_tool_names(&self) -> Vec<&'static str> {
        let mut names = vec![PRUNE_MESSAGES, SUMMARIZE_RANGE, RECALL_ORIGINAL];
        if self.terminal.is_some() {
            names.push(EXECUTE_TERMINAL_COMMAND);
        }
        if self.fs.is_some() {
            names.extend_from_slice(&[READ_FILE, WRITE_FILE]);
        }
        if self.subtasks.is_some() {
            names.push(CREATE_SUBTASK);
        }
        names.push(FINISH_TASK);
        names
    }
}

/// Status and summary of a `finish_task` call, with the defaults used when
/// the model leaves them out.
pub fn finish_arguments(input: &ToolInput) -> (String, String) {
    let status = input
        .param_str_opt("status")
        .unwrap_or_else(|| "completed".to_string());
    let summary = input
        .param_str_opt("summary")
        .unwrap_or_else(|| "Done.".to_string());
    (status, summary)
}

fn not_enabled(name: &str) -> String {
    format!("ERROR: {} tool is not enabled", name)
}

fn function(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        }
    })
}
