//! LLM Endpoint Abstraction Layer
//!
//! This module provides the message types exchanged with a chat-completion
//! endpoint and the `LLMProvider` trait the agent loop calls. A provider
//! receives the ordered active messages plus the tool schema and answers
//! with either plain text or a list of requested tool invocations.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub mod openai;

pub use openai::OpenAICompatProvider;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,

    /// Non-string content (e.g. a multi-part array) exactly as received.
    /// `content` then holds its JSON text for previews and token counts.
    #[serde(skip)]
    pub structured_content: Option<serde_json::Value>,

    /// Tool invocations requested by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool name for tool result messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool call ID for tool result messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            structured_content: None,
            tool_calls: None,
            name: None,
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    /// Create an assistant message that requests tool invocations
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    /// Create a new tool result message
    pub fn tool_result(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }

    /// Content as it goes on the wire: the structured value when there is
    /// one, the text otherwise
    pub fn wire_content(&self) -> serde_json::Value {
        self.structured_content
            .clone()
            .unwrap_or_else(|| serde_json::Value::String(self.content.clone()))
    }

    /// True when this message carries at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,

    /// Tool result message
    Tool,
}

impl MessageRole {
    /// Parse a wire role name, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    /// Plain text with no tool invocation
    Text { content: String },

    /// One or more tool invocations, in the order the model listed them
    ToolCalls {
        /// Any text the model sent alongside the calls
        content: String,
        calls: Vec<ToolCall>,
    },
}

/// Tool call request from the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool (JSON string)
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn generated(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(format!("call_{}", uuid::Uuid::new_v4()), name, arguments)
    }
}

/// LLM Provider trait that every chat-completion endpoint implements
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "zen", "openrouter")
    fn name(&self) -> &str;

    /// Generate a response from the model
    ///
    /// # Arguments
    /// * `messages` - Active working memory plus any trailing dashboard message
    /// * `tools` - Tool schema in OpenAI function format
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<LLMResponse>;
}

/// Turn a provider's text reply into tool calls when the model wrote them
/// inline instead of using native tool calling.
///
/// Handles:
/// 1. `[ACTION:name]{...}[/ACTION]` markers (every marker, in order)
/// 2. Raw JSON: `{"function": "...", "arguments": {...}}`
/// 3. Fenced JSON (with or without trailing text)
/// 4. JSON embedded in prose, found by scanning for `{"function":`
pub fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    let trimmed = content.trim();

    let marked = parse_action_markers(trimmed);
    if !marked.is_empty() {
        return marked;
    }

    if let Some(tc) = try_parse_function_json(trimmed) {
        return vec![tc];
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return vec![tc];
        }
    }

    if let Some(pos) = trimmed.find("{\"function\"") {
        if let Some(json_str) = extract_balanced_json(&trimmed[pos..]) {
            if let Some(tc) = try_parse_function_json(json_str) {
                return vec![tc];
            }
        }
    }

    Vec::new()
}

fn action_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\[ACTION:(\w+)\](.*?)\[/ACTION\]").expect("action marker pattern")
    })
}

/// Markers whose body is not valid JSON are skipped.
fn parse_action_markers(content: &str) -> Vec<ToolCall> {
    action_marker_regex()
        .captures_iter(content)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str().trim();
            let args: serde_json::Value = serde_json::from_str(body).ok()?;
            Some(ToolCall::generated(name, args.to_string()))
        })
        .collect()
}

/// Try to parse a string as a `{"function": "...", "arguments": {...}}` tool call.
fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json.get("function")?.as_str()?;
    let arguments = json.get("arguments")?;
    Some(ToolCall::generated(function, arguments.to_string()))
}

/// Extract the body of the first markdown code fence in the text.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");
        assert_eq!(user_msg.tool_call_id, None);

        let system_msg = Message::system("You are a helpful assistant");
        assert_eq!(system_msg.role, MessageRole::System);

        let tool_msg = Message::tool_result("result", "call_123", "read_file");
        assert_eq!(tool_msg.role, MessageRole::Tool);
        assert_eq!(tool_msg.tool_call_id, Some("call_123".to_string()));
        assert_eq!(tool_msg.name, Some("read_file".to_string()));
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&Message::user("test")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"test"}"#);

        let msg = Message::assistant_tool_calls("", vec![ToolCall::new("c1", "finish_task", "{}")]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["tool_calls"][0]["name"], "finish_task");
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(MessageRole::parse("Assistant"), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse(" tool "), Some(MessageRole::Tool));
        assert_eq!(MessageRole::parse("developer"), None);
    }

    #[test]
    fn test_llm_response_serialization() {
        let calls = LLMResponse::ToolCalls {
            content: String::new(),
            calls: vec![ToolCall::new("id", "name", "{}")],
        };
        let json = serde_json::to_string(&calls).unwrap();
        assert!(json.contains(r#""type":"tool_calls"#));

        let text = LLMResponse::Text {
            content: "answer".to_string(),
        };
        let json = serde_json::to_string(&text).unwrap();
        assert!(json.contains(r#""type":"text"#));
    }

    #[test]
    fn test_parse_action_markers() {
        let content = r#"I will free some space.
[ACTION:prune_messages]{"message_ids": [1, 2]}[/ACTION]
[ACTION:recall_original]{"message_id": 0}[/ACTION]"#;
        let calls = parse_tool_calls(content);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "prune_messages");
        let args: serde_json::Value = serde_json::from_str(&calls[0].arguments).unwrap();
        assert_eq!(args["message_ids"], serde_json::json!([1, 2]));
        assert_eq!(calls[1].name, "recall_original");
    }

    #[test]
    fn test_parse_action_marker_with_bad_json_is_ignored() {
        let calls = parse_tool_calls("[ACTION:finish_task]{status: done}[/ACTION]");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_parse_raw_and_fenced_json() {
        let raw = r#"{"function": "read_file", "arguments": {"path": "a.txt"}}"#;
        assert_eq!(parse_tool_calls(raw)[0].name, "read_file");

        let fenced = "```json\n{\"function\": \"write_file\", \"arguments\": {}}\n```\nDone.";
        assert_eq!(parse_tool_calls(fenced)[0].name, "write_file");
    }

    #[test]
    fn test_parse_json_in_prose() {
        let content = r#"Sure, calling it: {"function": "finish_task", "arguments": {"status": "completed", "summary": "x {y}"}} ok"#;
        let calls = parse_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "finish_task");
    }

    #[test]
    fn test_plain_text_has_no_calls() {
        assert!(parse_tool_calls("Fib(10) = 55").is_empty());
    }
}
