//! Tool-call interceptor
//!
//! A circuit breaker between the model and the sandbox tools. Above the hard
//! pressure ceiling every tool that does not shrink memory (or end the task)
//! is refused without running, and the model is told to compact first.
//!
//! The check is stateless: nothing counts how many times a call was refused.

use crate::memory::PressureSnapshot;
use crate::tools::MEMORY_TOOLS;

/// Default hard ceiling, as a percent of the token budget
pub const DEFAULT_CEILING_PERCENT: f64 = 85.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Allow,
    /// Refused, with the text to hand back as the tool result
    Refuse(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ToolInterceptor {
    ceiling_percent: f64,
}

impl Default for ToolInterceptor {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING_PERCENT)
    }
}

impl ToolInterceptor {
    pub fn new(ceiling_percent: f64) -> Self {
        Self { ceiling_percent }
    }

    pub fn ceiling_percent(&self) -> f64 {
        self.ceiling_percent
    }

    pub fn is_exempt(tool_name: &str) -> bool {
        MEMORY_TOOLS.contains(&tool_name)
    }

    pub fn check(&self, tool_name: &str, metrics: &PressureSnapshot) -> Gate {
        if Self::is_exempt(tool_name) || metrics.pressure_percent <= self.ceiling_percent {
            return Gate::Allow;
        }
        Gate::Refuse(format!(
            "ERROR: Memory pressure is at {:.1}%, above the {:.0}% limit. '{}' was NOT executed. \
             Call summarize_range or prune_messages to free memory first, then retry.",
            metrics.pressure_percent, self.ceiling_percent, tool_name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(percent: usize) -> PressureSnapshot {
        PressureSnapshot::compute(percent, 100, 0.5, 1)
    }

    #[test]
    fn test_allows_below_ceiling() {
        let gate = ToolInterceptor::default();
        assert_eq!(gate.check("write_file", &at(10)), Gate::Allow);
        assert_eq!(gate.check("write_file", &at(85)), Gate::Allow);
    }

    #[test]
    fn test_refuses_above_ceiling() {
        let gate = ToolInterceptor::default();
        match gate.check("execute_terminal_command", &at(86)) {
            Gate::Refuse(text) => {
                assert!(text.starts_with("ERROR: Memory pressure is at 86.0%"));
                assert!(text.contains("'execute_terminal_command' was NOT executed"));
                assert!(text.contains("summarize_range"));
            }
            Gate::Allow => panic!("expected refusal"),
        }
    }

    #[test]
    fn test_memory_tools_always_allowed() {
        let gate = ToolInterceptor::new(50.0);
        for name in ["prune_messages", "summarize_range", "recall_original", "finish_task"] {
            assert_eq!(gate.check(name, &at(99)), Gate::Allow);
        }
        assert!(!ToolInterceptor::is_exempt("read_file"));
    }
}
