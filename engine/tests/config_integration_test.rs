//! Integration tests for configuration management
//!
//! These tests verify that the Config struct can be loaded from a file,
//! validated, and processed with path anchoring and canonicalization.

use std::fs;
use tempfile::TempDir;

use sdk::errors::EngineError;
use smma_engine::config::Config;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("project");
    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
workspace = '{}'
log_level = "debug"
logs_dir = "run-logs"

[llm]
provider = "openrouter"
model = "some/model"
timeout_secs = 30

[memory]
max_tokens = 8000
target_pressure = 0.25
hard_ceiling_percent = 90.0

[agent]
max_iterations = 5

[tools]
terminal = false
"#,
            workspace.display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();

    // Workspace is created and canonicalized, relative dirs anchored to it
    assert!(workspace.is_dir());
    assert_eq!(config.core.workspace, workspace.canonicalize().unwrap());
    assert_eq!(config.core.logs_dir, config.core.workspace.join("run-logs"));
    assert_eq!(config.core.tasks_dir, config.core.workspace.join("tasks"));

    assert_eq!(config.llm.base_url(), "https://openrouter.ai/api/v1");
    assert_eq!(config.llm.api_key_env(), "OPENROUTER_API_KEY");
    assert_eq!(config.memory.max_tokens, 8000);
    assert_eq!(config.memory.dashboard_min_messages, 4);
    assert_eq!(config.agent.max_iterations, 5);
    assert!(!config.tools.terminal);
    assert!(config.tools.filesystem);
}

#[test]
fn test_invalid_values_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let cases = [
        "[memory]\ntarget_pressure = 0.0\n",
        "[memory]\ntarget_pressure = 1.5\n",
        "[memory]\nmax_tokens = 0\n",
        "[agent]\nmax_iterations = 0\n",
        "[llm]\nprovider = \"carrier-pigeon\"\n",
        "[core]\nlog_level = \"loud\"\n",
    ];

    for body in cases {
        let body = format!(
            "[core]\nworkspace = '{}'\n{}",
            dir.path().display(),
            body.replace("[core]\n", "")
        );
        let path = write_config(&dir, &body);
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(
            matches!(err, EngineError::Config(_)),
            "expected config error for {:?}, got {:?}",
            body,
            err
        );
    }
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn test_effective_config_renders_as_toml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!("[core]\nworkspace = '{}'\n", dir.path().display()),
    );
    let config = Config::load_from_path(&path).unwrap();

    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("[memory]"));
    assert!(text.contains("max_tokens = 100000"));
    assert!(text.contains("provider = \"zen\""));
}
