//! OpenAI-compatible chat-completions provider
//!
//! Speaks the `/chat/completions` dialect shared by OpenAI, OpenRouter and
//! the OpenCode Zen gateway. Native `tool_calls` in the reply are preferred;
//! when a model only answers in text, inline tool calls are recovered with
//! [`super::parse_tool_calls`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{LLMError, LLMProvider, LLMResponse, Message, ToolCall};
use crate::config::LLMConfig;

pub struct OpenAICompatProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAICompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client,
        }
    }

    /// Build a provider from configuration, reading the API key from the
    /// environment variable the provider preset names.
    pub fn from_config(config: &LLMConfig) -> Self {
        let api_key = std::env::var(config.api_key_env()).ok();
        Self::new(
            config.provider.clone(),
            config.base_url(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn convert_message(msg: &Message) -> Value {
        let mut out = json!({
            "role": msg.role.to_string(),
            "content": msg.wire_content(),
        });
        if let Some(calls) = msg.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            out["tool_calls"] = Value::Array(
                calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": { "name": call.name, "arguments": call.arguments },
                        })
                    })
                    .collect(),
            );
        }
        if let Some(id) = &msg.tool_call_id {
            out["tool_call_id"] = json!(id);
        }
        if let Some(name) = &msg.name {
            out["name"] = json!(name);
        }
        out
    }

    fn parse_native_calls(message: &Value) -> Vec<ToolCall> {
        let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) else {
            return Vec::new();
        };
        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?;
                // Some gateways send arguments as an object instead of a string
                let arguments = match function.get("arguments") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => "{}".to_string(),
                    Some(other) => other.to_string(),
                };
                let id = call
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
                Some(ToolCall::new(id, name, arguments))
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: &[Message], tools: &[Value]) -> super::Result<LLMResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let api_messages: Vec<Value> = messages.iter().map(Self::convert_message).collect();

        let mut payload = json!({
            "model": self.model,
            "messages": api_messages,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools.to_vec());
            payload["tool_choice"] = json!("auto");
        }

        debug!(
            "POST {} with {} messages and {} tools",
            url,
            messages.len(),
            tools.len()
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                _ => LLMError::InvalidRequest(format!("{}: {}", status, text)),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let message = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| LLMError::ParseError("No message in response".to_string()))?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let mut calls = Self::parse_native_calls(message);
        if calls.is_empty() {
            calls = super::parse_tool_calls(&content);
        }

        if calls.is_empty() {
            Ok(LLMResponse::Text { content })
        } else {
            Ok(LLMResponse::ToolCalls { content, calls })
        }
    }
}
