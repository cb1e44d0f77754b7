//! Agent Core
//!
//! Drives one task through the model until it calls `finish_task` or runs
//! out of iterations:
//!
//! 1. Send the active messages plus the memory dashboard to the model
//! 2. Plain text reply: store it and nudge the model to act
//! 3. Tool calls: run each in order through the interceptor, storing every
//!    result as a `tool` message
//! 4. `finish_task`: stop with the status the model reported
//!
//! Every failure that happens inside a tool reaches the model as text. The
//! loop itself only ends on `finish_task`, an endpoint error, or the
//! iteration limit, and always returns a [`TaskOutcome`].

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::interceptor::{Gate, ToolInterceptor};
use crate::config::Config;
use crate::llm::{LLMProvider, LLMResponse, Message, ToolCall};
use crate::memory::{MemoryLedger, PressurePolicy};
use crate::tools::{finish_arguments, ToolRegistry, FINISH_TASK};
use sdk::task::Task;
use sdk::types::ToolInput;

/// Sent after a reply that neither calls a tool nor finishes the task
const NUDGE: &str =
    "You did not call finish_task or any other tool. Decide what to do next, or finish the task.";

const ITERATION_LIMIT_SUMMARY: &str = "Iteration limit reached without finish_task.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

impl OutcomeStatus {
    /// Anything other than `completed` counts as a failure.
    pub fn from_reported(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("completed") {
            OutcomeStatus::Completed
        } else {
            OutcomeStatus::Failed
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Completed => write!(f, "completed"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How a task run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub status: OutcomeStatus,
    pub summary: String,
    /// Model calls made
    pub iterations: usize,
}

impl TaskOutcome {
    fn failed(task_id: &str, summary: impl Into<String>, iterations: usize) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: OutcomeStatus::Failed,
            summary: summary.into(),
            iterations,
        }
    }
}

pub struct AgentCore {
    provider: Arc<dyn LLMProvider>,
    ledger: MemoryLedger,
    policy: PressurePolicy,
    interceptor: ToolInterceptor,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl AgentCore {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        ledger: MemoryLedger,
        tools: ToolRegistry,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            ledger,
            policy: PressurePolicy::new(config.memory.dashboard_min_messages),
            interceptor: ToolInterceptor::new(config.memory.hard_ceiling_percent),
            tools,
            max_iterations: config.agent.max_iterations,
        }
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MemoryLedger {
        &mut self.ledger
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// What the model sees: active messages, then the dashboard when shown.
    ///
    /// The dashboard is rebuilt on every call and never stored.
    pub fn model_view(&self) -> Vec<Message> {
        let mut messages = self.ledger.active_payloads();
        if let Some(dashboard) = self
            .policy
            .dashboard(&self.ledger.metrics(), &self.ledger.overview())
        {
            messages.push(Message::system(dashboard));
        }
        messages
    }

    /// Run one tool call through the interceptor.
    ///
    /// A refused call returns the refusal text and has no side effect.
    pub async fn execute_tool(&mut self, name: &str, arguments: &str) -> String {
        let metrics = self.ledger.metrics();
        if let Gate::Refuse(reason) = self.interceptor.check(name, &metrics) {
            warn!(
                "Refused '{}' at {:.1}% memory pressure",
                name, metrics.pressure_percent
            );
            return reason;
        }
        info!("Tool call: {}({})", name, arguments);
        self.tools.dispatch(&mut self.ledger, name, arguments).await
    }

    /// Run `task` to completion.
    pub async fn run_task(&mut self, system_prompt: &str, task: &Task) -> TaskOutcome {
        let span = info_span!("task", task_id = %task.id);
        self.run_loop(system_prompt, task).instrument(span).await
    }

    async fn run_loop(&mut self, system_prompt: &str, task: &Task) -> TaskOutcome {
        info!("Starting task {}: {}", task.id, task.title);

        self.ledger.add(&Message::system(system_prompt));
        self.ledger.add(&Message::user(task.prompt()));
        let schemas = self.tools.schemas();

        for iteration in 1..=self.max_iterations {
            let metrics = self.ledger.metrics();
            info!(
                "Iteration {}/{} (pressure {:.2}%, {} messages)",
                iteration, self.max_iterations, metrics.pressure_percent, metrics.message_count
            );

            let messages = self.model_view();
            let response = match self.provider.generate(&messages, &schemas).await {
                Ok(response) => response,
                Err(e) => {
                    error!("LLM call failed: {}", e);
                    return TaskOutcome::failed(&task.id, format!("LLM error: {}", e), iteration);
                }
            };

            let (content, calls) = match response {
                LLMResponse::Text { content } => (content, Vec::new()),
                LLMResponse::ToolCalls { content, calls } => (content, calls),
            };

            if calls.is_empty() {
                debug!("Model replied without tool calls: {}", content);
                self.ledger.add(&Message::assistant(content));
                self.ledger.add(&Message::user(NUDGE));
                continue;
            }

            self.ledger
                .add(&Message::assistant_tool_calls(content, calls.clone()));

            if let Some(outcome) = self.run_calls(&task.id, &calls, iteration).await {
                info!(
                    "Task {} finished as {} after {} iterations",
                    task.id, outcome.status, iteration
                );
                return outcome;
            }
        }

        error!(
            "Task {} exceeded max iterations ({})",
            task.id, self.max_iterations
        );
        TaskOutcome::failed(&task.id, ITERATION_LIMIT_SUMMARY, self.max_iterations)
    }

    /// Execute calls in order; returns the outcome once `finish_task` runs.
    async fn run_calls(
        &mut self,
        task_id: &str,
        calls: &[ToolCall],
        iteration: usize,
    ) -> Option<TaskOutcome> {
        for call in calls {
            let result = self.execute_tool(&call.name, &call.arguments).await;
            self.ledger
                .add(&Message::tool_result(result, &call.id, &call.name));

            if call.name == FINISH_TASK {
                let (status, summary) =
                    finish_arguments(&ToolInput::from_arguments(&call.name, &call.arguments));
                return Some(TaskOutcome {
                    task_id: task_id.to_string(),
                    status: OutcomeStatus::from_reported(&status),
                    summary,
                    iterations: iteration,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMError, MessageRole};
    use crate::memory::TapeStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses and records what it was sent
    struct ScriptedProvider {
        replies: Mutex<VecDeque<crate::llm::Result<LLMResponse>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<crate::llm::Result<LLMResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            messages: &[Message],
            _tools: &[serde_json::Value],
        ) -> crate::llm::Result<LLMResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LLMResponse::Text { content: "...".into() }))
        }
    }

    fn call(name: &str, args: &str) -> LLMResponse {
        LLMResponse::ToolCalls {
            content: String::new(),
            calls: vec![ToolCall::new(format!("call_{}", name), name, args)],
        }
    }

    fn agent(provider: Arc<ScriptedProvider>, config: &Config) -> (TempDir, AgentCore) {
        let dir = TempDir::new().unwrap();
        let tape = TapeStore::initialize(dir.path(), "T-unit").unwrap();
        let ledger = MemoryLedger::new(tape, &config.memory);
        (dir, AgentCore::new(provider, ledger, ToolRegistry::empty(), config))
    }

    #[test]
    fn test_outcome_status_from_reported() {
        assert_eq!(OutcomeStatus::from_reported("completed"), OutcomeStatus::Completed);
        assert_eq!(OutcomeStatus::from_reported(" Completed "), OutcomeStatus::Completed);
        assert_eq!(OutcomeStatus::from_reported("failed"), OutcomeStatus::Failed);
        assert_eq!(OutcomeStatus::from_reported("done?"), OutcomeStatus::Failed);
    }

    #[tokio::test]
    async fn test_finish_task_terminates() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            FINISH_TASK,
            r#"{"status":"completed","summary":"ok"}"#,
        ))]);
        let config = Config::default_config();
        let (_dir, mut agent) = agent(provider.clone(), &config);

        let outcome = agent.run_task("sys", &Task::new("T-1", "do it")).await;
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.summary, "ok");
        assert_eq!(outcome.iterations, 1);

        // system, user, assistant call, tool result
        let roles: Vec<MessageRole> = agent.ledger().entries().iter().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool
            ]
        );
    }

    #[tokio::test]
    async fn test_text_reply_gets_nudge() {
        let provider = ScriptedProvider::new(vec![
            Ok(LLMResponse::Text { content: "thinking".into() }),
            Ok(call(FINISH_TASK, r#"{"status":"failed","summary":"blocked"}"#)),
        ]);
        let config = Config::default_config();
        let (_dir, mut agent) = agent(provider.clone(), &config);

        let outcome = agent.run_task("sys", &Task::new("T-2", "x")).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.summary, "blocked");
        assert_eq!(outcome.iterations, 2);

        let second_call = &provider.seen.lock().unwrap()[1];
        assert_eq!(second_call[2], Message::assistant("thinking"));
        assert_eq!(second_call[3], Message::user(NUDGE));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let provider = ScriptedProvider::new(vec![]);
        let mut config = Config::default_config();
        config.agent.max_iterations = 3;
        let (_dir, mut agent) = agent(provider.clone(), &config);

        let outcome = agent.run_task("sys", &Task::new("T-3", "x")).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.summary, ITERATION_LIMIT_SUMMARY);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(provider.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_llm_error_fails_task() {
        let provider = ScriptedProvider::new(vec![Err(LLMError::RateLimitExceeded)]);
        let config = Config::default_config();
        let (_dir, mut agent) = agent(provider, &config);

        let outcome = agent.run_task("sys", &Task::new("T-4", "x")).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.summary, "LLM error: Rate limit exceeded");
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn test_dashboard_is_sent_but_not_stored() {
        let provider = ScriptedProvider::new(vec![]);
        let mut config = Config::default_config();
        config.agent.max_iterations = 2;
        config.memory.dashboard_min_messages = 1;
        let (_dir, mut agent) = agent(provider.clone(), &config);

        agent.run_task("sys", &Task::new("T-5", "x")).await;

        let seen = provider.seen.lock().unwrap();
        let last = seen[0].last().unwrap();
        assert_eq!(last.role, MessageRole::System);
        assert!(last.content.starts_with("[SMMA DASHBOARD]"));
        assert!(agent
            .ledger()
            .entries()
            .iter()
            .all(|e| !e.payload.content.starts_with("[SMMA DASHBOARD]")));
    }

    #[tokio::test]
    async fn test_execute_tool_refuses_above_ceiling() {
        let provider = ScriptedProvider::new(vec![]);
        let mut config = Config::default_config();
        config.memory.max_tokens = 10;
        let (_dir, mut agent) = agent(provider, &config);
        agent.ledger_mut().add(&Message::user("x".repeat(200)));

        let reply = agent.execute_tool("read_file", r#"{"path":"a"}"#).await;
        assert!(reply.contains("was NOT executed"));

        let reply = agent.execute_tool("prune_messages", r#"{"message_ids":[0]}"#).await;
        let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply, serde_json::json!({"success": true, "removed_count": 1}));
    }
}
