//! Memory management tools
//!
//! The model manages its own context through these three tools. Replies are
//! JSON objects with a `success` flag; bad ids and bad ranges come back as
//! `{"success": false, "error": ...}` so the model can correct itself.

use serde_json::{json, Value};
use tracing::debug;

use crate::memory::MemoryLedger;
use sdk::types::ToolInput;

pub fn prune_messages(ledger: &mut MemoryLedger, input: &ToolInput) -> String {
    let ids = match input.param_u64_list("message_ids") {
        Ok(ids) => ids,
        Err(e) => return failure(e),
    };
    let removed_count = ledger.prune(&ids);
    debug!("prune_messages({:?}) removed {}", ids, removed_count);
    reply(json!({"success": true, "removed_count": removed_count}))
}

pub fn summarize_range(ledger: &mut MemoryLedger, input: &ToolInput) -> String {
    let (start_id, end_id, summary_text) = match (
        input.param_u64("start_id"),
        input.param_u64("end_id"),
        input.param_str("summary_text"),
    ) {
        (Ok(start), Ok(end), Ok(text)) => (start, end, text),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return failure(e),
    };

    match ledger.summarize(start_id, end_id, &summary_text) {
        Ok(outcome) => reply(json!({
            "success": true,
            "removed_count": outcome.removed_count,
            "new_summary_id": outcome.new_summary_id,
        })),
        Err(e) => failure(e),
    }
}

pub fn recall_original(ledger: &MemoryLedger, input: &ToolInput) -> String {
    let visible_id = match input.param_u64("message_id") {
        Ok(id) => id,
        Err(e) => return failure(e),
    };

    match ledger.recall(visible_id) {
        Ok(recalled) => {
            let mut body = serde_json::to_value(&recalled).unwrap_or_else(|_| json!({}));
            body["success"] = json!(true);
            reply(body)
        }
        Err(e) => failure(e),
    }
}

fn failure(error: impl std::fmt::Display) -> String {
    reply(json!({"success": false, "error": error.to_string()}))
}

fn reply(body: Value) -> String {
    body.to_string()
}
