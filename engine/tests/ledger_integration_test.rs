//! Integration tests for the Memory Ledger
//!
//! End-to-end scenarios over a real tape file: pressure accounting,
//! pruning, summarizing and recalling what left working memory.

use serde_json::json;
use tempfile::TempDir;

use smma_engine::config::MemoryConfig;
use smma_engine::llm::{Message, ToolCall};
use smma_engine::memory::{MemoryError, MemoryLedger, TapeRecord, TapeStore};

fn open_ledger(dir: &TempDir, task_id: &str, max_tokens: usize, target: f64) -> MemoryLedger {
    let tape = TapeStore::initialize(&dir.path().join("logs"), task_id).unwrap();
    let config = MemoryConfig {
        max_tokens,
        target_pressure: target,
        ..MemoryConfig::default()
    };
    MemoryLedger::new(tape, &config)
}

/// 140 characters, estimated at 40 tokens
fn forty_tokens(tag: char) -> String {
    tag.to_string().repeat(140)
}

#[test]
fn test_pressure_prune_and_recall_scenario() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_ledger(&dir, "scenario-1", 1000, 0.5);

    let ids: Vec<u64> = ['a', 'b', 'c']
        .iter()
        .map(|&c| ledger.add(&Message::user(forty_tokens(c))))
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    let metrics = ledger.metrics();
    assert_eq!(metrics.message_count, 3);
    assert_eq!(metrics.total_tokens, 120);
    assert!((metrics.pressure_percent - 12.0).abs() < 1e-9);
    assert!(!metrics.is_critical);

    assert_eq!(ledger.prune(&ids), 3);
    let metrics = ledger.metrics();
    assert_eq!(metrics.message_count, 0);
    assert_eq!(metrics.pressure_percent, 0.0);

    for (id, tag) in ids.iter().zip(['a', 'b', 'c']) {
        let recalled = ledger.recall(*id).unwrap();
        assert_eq!(recalled.message["content"], forty_tokens(tag));
        assert_eq!(recalled.message["role"], "user");
    }
    assert!(matches!(ledger.recall(99), Err(MemoryError::NotFound(99))));
}

#[test]
fn test_summarize_scenario() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_ledger(&dir, "scenario-2", 100_000, 0.5);

    for i in 0..8 {
        assert_eq!(ledger.add(&Message::user(format!("original {}", i))), i);
    }

    let outcome = ledger.summarize(0, 3, "s").unwrap();
    assert_eq!(outcome.removed_count, 4);
    assert_eq!(outcome.new_summary_id, 8);
    assert_eq!(ledger.len(), 5);

    let order: Vec<u64> = ledger.entries().iter().map(|e| e.visible_id).collect();
    assert_eq!(order, vec![8, 4, 5, 6, 7]);

    let recalled = ledger.recall(2).unwrap();
    assert_eq!(recalled.message["content"], "original 2");

    let summary = ledger.recall(8).unwrap();
    assert_eq!(summary.message["role"], "system");
    assert_eq!(summary.message["content"], "[SUMMARIZED MEMORY (IDs 0-3)]: s");
}

#[test]
fn test_summary_tokens_come_from_summary_text() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_ledger(&dir, "scenario-3", 100_000, 0.5);
    for _ in 0..4 {
        ledger.add(&Message::user("x".repeat(3500)));
    }
    let before = ledger.metrics().total_tokens;
    assert_eq!(before, 4000);

    ledger.summarize(0, 3, "short").unwrap();
    let after = ledger.metrics().total_tokens;
    let wrapped = "[SUMMARIZED MEMORY (IDs 0-3)]: short".chars().count();
    assert_eq!(after, (wrapped as f64 / 3.5).floor() as usize);
}

#[test]
fn test_failed_summarize_writes_nothing_to_tape() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_ledger(&dir, "scenario-4", 1000, 0.5);
    ledger.add(&Message::user("a"));
    ledger.add(&Message::user("b"));
    ledger.prune(&[0]);
    let before = ledger.tape().records().unwrap().len();

    assert!(matches!(
        ledger.summarize(0, 1, "s"),
        Err(MemoryError::InvalidRange { start_id: 0, end_id: 1, .. })
    ));
    assert_eq!(ledger.tape().records().unwrap().len(), before);
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_raw_json_and_tool_call_messages() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_ledger(&dir, "scenario-5", 1000, 0.5);

    ledger.add(&json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "read_file", "arguments": "{\"path\":\"Cargo.toml\"}"}
        }]
    }));
    ledger.add(&Message::tool_result("[package]", "call_1", "read_file"));
    ledger.add(&Message::assistant_tool_calls(
        "",
        vec![ToolCall::new("call_2", "finish_task", "{}")],
    ));

    let payloads = ledger.active_payloads();
    assert_eq!(payloads[0].tool_calls.as_ref().unwrap()[0].name, "read_file");
    assert_eq!(payloads[1].tool_call_id.as_deref(), Some("call_1"));
    assert!(ledger.entries()[0].token_estimate > 0);

    // The tape stores the normalized message
    let recalled = ledger.recall(0).unwrap();
    assert_eq!(recalled.message["tool_calls"][0]["name"], "read_file");
}

#[test]
fn test_tape_survives_a_second_ledger() {
    let dir = TempDir::new().unwrap();
    {
        let mut ledger = open_ledger(&dir, "rerun", 1000, 0.5);
        ledger.add(&Message::user("first run"));
    }
    let mut ledger = open_ledger(&dir, "rerun", 1000, 0.5);
    assert_eq!(ledger.add(&Message::user("second run")), 0);

    let records = ledger.tape().records().unwrap();
    let inits = records
        .iter()
        .filter(|r| matches!(r, TapeRecord::Init { .. }))
        .count();
    assert_eq!(inits, 1);
    assert_eq!(ledger.recall(0).unwrap().message["content"], "second run");
}

#[test]
fn test_structured_content_survives_recall_and_payloads() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_ledger(&dir, "scenario-6", 1000, 0.5);
    let parts = json!([{"type": "text", "text": "hi"}]);

    let id = ledger.add(&json!({"role": "user", "content": parts.clone()}));

    let recalled = ledger.recall(id).unwrap();
    assert_eq!(recalled.message["content"], parts);

    let payload = &ledger.active_payloads()[0];
    assert_eq!(payload.wire_content(), parts);

    // Estimated from the serialized form
    let text = parts.to_string();
    let expected = (text.chars().count() as f64 / 3.5).floor() as usize;
    assert_eq!(ledger.entries()[0].token_estimate, expected.max(1));

    // Survives being summarized away
    ledger.add(&Message::user("next"));
    ledger.summarize(0, 1, "greeting").unwrap();
    assert_eq!(ledger.recall(id).unwrap().message["content"], parts);
}
