//! Memory pressure
//!
//! Pressure is the share of the token budget the active messages use. The
//! snapshot is derived on demand from the ledger and never cached. The
//! policy turns a snapshot into the dashboard text the model sees before
//! every call.

use serde::Serialize;

/// Critical pressure is this multiple of the target
pub const CRITICAL_FACTOR: f64 = 1.5;

/// Derived view of ledger health
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PressureSnapshot {
    pub total_tokens: usize,
    pub max_tokens: usize,
    pub pressure_percent: f64,
    /// Target as a percent of `max_tokens`
    #[serde(rename = "target_pressure")]
    pub target_pressure_percent: f64,
    pub message_count: usize,
    pub is_critical: bool,
}

impl PressureSnapshot {
    /// `target_fraction` is the configured target as a share of the budget (0.0-1.0].
    pub fn compute(
        total_tokens: usize,
        max_tokens: usize,
        target_fraction: f64,
        message_count: usize,
    ) -> Self {
        let pressure_percent = if max_tokens > 0 {
            total_tokens as f64 / max_tokens as f64 * 100.0
        } else {
            0.0
        };
        let target_pressure_percent = target_fraction * 100.0;
        Self {
            total_tokens,
            max_tokens,
            pressure_percent,
            target_pressure_percent,
            message_count,
            // Strictly greater: sitting exactly on the threshold is not critical
            is_critical: pressure_percent > target_pressure_percent * CRITICAL_FACTOR,
        }
    }

    pub fn critical_threshold_percent(&self) -> f64 {
        self.target_pressure_percent * CRITICAL_FACTOR
    }
}

/// One line of the id index shown to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntryOverview {
    pub id: u64,
    pub role: String,
    pub tokens: usize,
    pub preview: String,
}

/// Decides whether and how to show the memory dashboard
#[derive(Debug, Clone, Copy)]
pub struct PressurePolicy {
    min_messages: usize,
}

impl PressurePolicy {
    pub fn new(min_messages: usize) -> Self {
        Self { min_messages }
    }

    pub fn min_messages(&self) -> usize {
        self.min_messages
    }

    /// Render the dashboard, or `None` for conversations too short to matter.
    pub fn dashboard(&self, metrics: &PressureSnapshot, index: &[EntryOverview]) -> Option<String> {
        if metrics.message_count < self.min_messages {
            return None;
        }

        let mut lines = vec![format!(
            "[SMMA DASHBOARD] Pressure: {:.2}% | Tokens: {}/{} | Target: {:.0}% | Messages: {}",
            metrics.pressure_percent,
            metrics.total_tokens,
            metrics.max_tokens,
            metrics.target_pressure_percent,
            metrics.message_count
        )];

        if !index.is_empty() {
            lines.push("Active messages (id | role | tokens | preview):".to_string());
            for entry in index {
                lines.push(format!(
                    "  {} | {} | {} | {}",
                    entry.id, entry.role, entry.tokens, entry.preview
                ));
            }
        }

        if metrics.is_critical {
            lines.push(format!(
                "CRITICAL: memory pressure is above {:.0}%. Call summarize_range or prune_messages NOW, before any other tool.",
                metrics.critical_threshold_percent()
            ));
        }

        Some(lines.join("\n"))
    }
}
