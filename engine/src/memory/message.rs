//! Message ingestion
//!
//! The ledger accepts anything that can answer the [`MessageSource`]
//! questions: the engine's own [`Message`] and raw JSON records in the
//! OpenAI chat shape. Every source is normalized to a [`Message`] before
//! tokens are estimated, so the rest of the ledger sees a single type.
//! Structured content survives normalization untouched; only its text
//! rendering is used for estimates and previews.

use serde_json::Value;
use tracing::warn;

use crate::llm::{Message, MessageRole, ToolCall};

/// The minimal capability a message needs to enter working memory
pub trait MessageSource {
    /// Declared role, or `None` when missing or unrecognised
    fn role(&self) -> Option<MessageRole>;

    /// Text content; structured content is rendered as JSON text
    fn content(&self) -> String;

    /// Content that is neither a string nor absent, kept verbatim
    fn structured_content(&self) -> Option<Value> {
        None
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>>;

    fn name(&self) -> Option<String>;

    fn tool_call_id(&self) -> Option<String>;
}

impl MessageSource for Message {
    fn role(&self) -> Option<MessageRole> {
        Some(self.role)
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn structured_content(&self) -> Option<Value> {
        self.structured_content.clone()
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        self.tool_calls.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn tool_call_id(&self) -> Option<String> {
        self.tool_call_id.clone()
    }
}

impl MessageSource for Value {
    fn role(&self) -> Option<MessageRole> {
        self.get("role")
            .and_then(|r| r.as_str())
            .and_then(MessageRole::parse)
    }

    fn content(&self) -> String {
        match self.get("content") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    fn structured_content(&self) -> Option<Value> {
        match self.get("content")? {
            Value::Null | Value::String(_) => None,
            other => Some(other.clone()),
        }
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        let calls: Vec<ToolCall> = self
            .get("tool_calls")?
            .as_array()?
            .iter()
            .filter_map(tool_call_from_value)
            .collect();
        if calls.is_empty() {
            None
        } else {
            Some(calls)
        }
    }

    fn name(&self) -> Option<String> {
        self.get("name").and_then(|v| v.as_str()).map(String::from)
    }

    fn tool_call_id(&self) -> Option<String> {
        self.get("tool_call_id")
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

/// Accepts both `{id, name, arguments}` and the OpenAI
/// `{id, type, function: {name, arguments}}` shape.
fn tool_call_from_value(value: &Value) -> Option<ToolCall> {
    let holder = value.get("function").filter(|f| f.is_object()).unwrap_or(value);
    let name = holder.get("name")?.as_str()?;
    let arguments = match holder.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    };
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Some(ToolCall::new(id, name, arguments))
}

/// Normalize any source into the engine's message type.
///
/// Never fails: a missing or unknown role degrades to `user`.
pub fn normalize<S: MessageSource + ?Sized>(source: &S) -> Message {
    let role = source.role().unwrap_or_else(|| {
        warn!("Message without a recognised role, treating it as user");
        MessageRole::User
    });
    Message {
        role,
        content: source.content(),
        structured_content: source.structured_content(),
        tool_calls: source.tool_calls(),
        name: source.name(),
        tool_call_id: source.tool_call_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_normalizes_to_itself() {
        let original = Message::tool_result("done", "call_9", "write_file");
        assert_eq!(normalize(&original), original);
    }

    #[test]
    fn test_plain_json_record() {
        let raw = json!({"role": "assistant", "content": "Fib(5) = 5"});
        let msg = normalize(&raw);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.content, "Fib(5) = 5");
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_openai_tool_call_record() {
        let raw = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}
            }]
        });
        let msg = normalize(&raw);
        assert_eq!(msg.content, "");
        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments, r#"{"path":"a.txt"}"#);
    }

    #[test]
    fn test_unknown_role_degrades_to_user() {
        let msg = normalize(&json!({"content": "orphan"}));
        assert_eq!(msg.role, MessageRole::User);

        let msg = normalize(&json!({"role": "developer", "content": "x"}));
        assert_eq!(msg.role, MessageRole::User);
    }

    #[test]
    fn test_structured_content_is_kept() {
        let parts = json!([{"type": "text", "text": "hi"}]);
        let msg = normalize(&json!({"role": "user", "content": parts.clone()}));
        assert_eq!(msg.content, r#"[{"text":"hi","type":"text"}]"#);
        assert_eq!(msg.structured_content, Some(parts.clone()));
        assert_eq!(msg.wire_content(), parts);

        let msg = normalize(&json!({"role": "user", "content": "plain"}));
        assert!(msg.structured_content.is_none());
        assert_eq!(msg.wire_content(), json!("plain"));
    }

    #[test]
    fn test_tool_result_fields() {
        let raw = json!({"role": "tool", "tool_call_id": "c1", "name": "finish_task", "content": "ok"});
        let msg = normalize(&raw);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(msg.name.as_deref(), Some("finish_task"));
    }
}
