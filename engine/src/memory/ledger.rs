//! Memory Ledger
//!
//! The working memory of one task: the ordered messages that are actually
//! sent to the model, each tagged with a visible id the model uses to refer
//! to it ("delete message 4"). Visible ids come from a counter that only
//! moves forward, so an id keeps meaning the same message after other
//! messages are pruned or folded into summaries.
//!
//! Every mutation is mirrored to the [`TapeStore`], which keeps the original
//! content recoverable through [`MemoryLedger::recall`].

use std::collections::HashSet;
use tracing::{debug, info};

use super::estimator::{CharRatioEstimator, TokenEstimator};
use super::message::{normalize, MessageSource};
use super::pressure::{EntryOverview, PressureSnapshot};
use super::tape::{epoch_seconds, RecalledMessage, TapeRecord, TapeStore};
use super::MemoryError;
use crate::config::MemoryConfig;
use crate::llm::{Message, MessageRole};

/// Characters kept in an overview preview
const PREVIEW_CHARS: usize = 50;

/// One active message in working memory
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub internal_id: String,
    pub visible_id: u64,
    pub role: MessageRole,
    pub token_estimate: usize,
    pub payload: Message,
}

/// Result of a successful `summarize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub removed_count: usize,
    pub new_summary_id: u64,
}

pub struct MemoryLedger {
    entries: Vec<MessageEntry>,
    next_id: u64,
    max_tokens: usize,
    target_pressure: f64,
    estimator: Box<dyn TokenEstimator>,
    tape: TapeStore,
}

impl MemoryLedger {
    /// Create an empty ledger that records into `tape`
    pub fn new(tape: TapeStore, config: &MemoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            max_tokens: config.max_tokens,
            target_pressure: config.target_pressure,
            estimator: Box::new(CharRatioEstimator::new(config.chars_per_token)),
            tape,
        }
    }

    /// Replace the token estimator
    pub fn with_estimator(mut self, estimator: Box<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn tape(&self) -> &TapeStore {
        &self.tape
    }

    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a message to working memory and to the tape.
    ///
    /// Returns the visible id assigned to it. Never fails.
    pub fn add<S: MessageSource + ?Sized>(&mut self, source: &S) -> u64 {
        let message = normalize(source);
        let entry = self.make_entry(message);
        let visible_id = entry.visible_id;

        debug!(
            "Added message {} ({}, ~{} tokens)",
            visible_id, entry.role, entry.token_estimate
        );
        self.record_add(&entry);
        self.entries.push(entry);

        visible_id
    }

    /// Remove every active entry whose visible id is listed.
    ///
    /// Unknown ids are ignored, so repeating a prune is harmless. Returns
    /// how many entries were removed.
    pub fn prune(&mut self, visible_ids: &[u64]) -> usize {
        let targets: HashSet<u64> = visible_ids.iter().copied().collect();
        if targets.is_empty() {
            return 0;
        }

        let (removed, kept): (Vec<MessageEntry>, Vec<MessageEntry>) =
            std::mem::take(&mut self.entries)
                .into_iter()
                .partition(|entry| targets.contains(&entry.visible_id));
        self.entries = kept;

        for entry in &removed {
            self.tape.append(&TapeRecord::Prune {
                internal_id: entry.internal_id.clone(),
                visible_id: entry.visible_id,
                timestamp: epoch_seconds(),
            });
        }

        if !removed.is_empty() {
            info!("Pruned {} message(s) from working memory", removed.len());
        }
        removed.len()
    }

    /// Fold the contiguous run of entries from `start_id` to `end_id`
    /// (inclusive, by position) into one system summary entry.
    ///
    /// Both ids must be active and `start_id` must not sit after `end_id`.
    /// On error the ledger is left untouched.
    pub fn summarize(
        &mut self,
        start_id: u64,
        end_id: u64,
        summary_text: &str,
    ) -> Result<SummaryOutcome, MemoryError> {
        let start_pos = self.position_of(start_id);
        let end_pos = self.position_of(end_id);

        let (start_pos, end_pos) = match (start_pos, end_pos) {
            (Some(s), Some(e)) if s <= e => (s, e),
            _ => {
                return Err(MemoryError::InvalidRange {
                    start_id,
                    end_id,
                    start_pos,
                    end_pos,
                })
            }
        };

        let summary = Message::system(format!(
            "[SUMMARIZED MEMORY (IDs {}-{})]: {}",
            start_id, end_id, summary_text
        ));
        let entry = self.make_entry(summary);
        let new_summary_id = entry.visible_id;

        let removed: Vec<MessageEntry> = self
            .entries
            .splice(start_pos..=end_pos, std::iter::once(entry.clone()))
            .collect();

        for old in &removed {
            self.tape.append(&TapeRecord::SummarizedOut {
                internal_id: old.internal_id.clone(),
                visible_id: old.visible_id,
                timestamp: epoch_seconds(),
            });
        }
        self.record_add(&entry);

        info!(
            "Summarized {} message(s) (ids {}-{}) into message {}",
            removed.len(),
            start_id,
            end_id,
            new_summary_id
        );

        Ok(SummaryOutcome {
            removed_count: removed.len(),
            new_summary_id,
        })
    }

    /// Recover the original content of a message from the tape, whether it
    /// is still active, pruned, or summarized away.
    pub fn recall(&self, visible_id: u64) -> Result<RecalledMessage, MemoryError> {
        self.tape.find_by_visible_id(visible_id)
    }

    /// Current pressure, computed from the active entries
    pub fn metrics(&self) -> PressureSnapshot {
        let total_tokens = self.entries.iter().map(|e| e.token_estimate).sum();
        PressureSnapshot::compute(
            total_tokens,
            self.max_tokens,
            self.target_pressure,
            self.entries.len(),
        )
    }

    /// Payloads of the active entries in order, ready for the model
    pub fn active_payloads(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.payload.clone()).collect()
    }

    /// Short per-entry index for the dashboard
    pub fn overview(&self) -> Vec<EntryOverview> {
        self.entries
            .iter()
            .map(|e| EntryOverview {
                id: e.visible_id,
                role: e.role.to_string(),
                tokens: e.token_estimate,
                preview: preview(&e.payload),
            })
            .collect()
    }

    fn position_of(&self, visible_id: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.visible_id == visible_id)
    }

    fn make_entry(&mut self, message: Message) -> MessageEntry {
        let visible_id = self.next_id;
        self.next_id += 1;

        MessageEntry {
            internal_id: new_internal_id(),
            visible_id,
            role: message.role,
            token_estimate: self.estimate(&message),
            payload: message,
        }
    }

    /// Content plus any serialized tool calls
    fn estimate(&self, message: &Message) -> usize {
        let mut text = message.content.clone();
        if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            if let Ok(serialized) = serde_json::to_string(calls) {
                text.push_str(&serialized);
            }
        }
        self.estimator.estimate(&text)
    }

    fn record_add(&self, entry: &MessageEntry) {
        let mut message = serde_json::to_value(&entry.payload)
            .unwrap_or_else(|_| serde_json::json!({"role": entry.role.to_string()}));
        message["content"] = entry.payload.wire_content();
        self.tape.append(&TapeRecord::AddMessage {
            internal_id: entry.internal_id.clone(),
            visible_id: entry.visible_id,
            timestamp: epoch_seconds(),
            message,
        });
    }
}

fn new_internal_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn preview(message: &Message) -> String {
    let text = if message.content.is_empty() && message.has_tool_calls() {
        let names: Vec<&str> = message
            .tool_calls
            .iter()
            .flatten()
            .map(|c| c.name.as_str())
            .collect();
        format!("(tool calls: {})", names.join(", "))
    } else {
        message.content.clone()
    };
    let flat: String = text
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("{}...", flat)
}
