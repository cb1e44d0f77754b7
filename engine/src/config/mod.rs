//! Configuration management
//!
//! This module handles loading, validation, and management of the SMMA
//! configuration. Configuration is stored in TOML format at
//! ~/.smma/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Workspace path, log level, tape and subtask directories
//! - **llm**: Chat-completion endpoint preset, model and timeout
//! - **memory**: Token budget, target pressure and the hard ceiling
//! - **agent**: Iteration budget for the agent loop
//! - **tools**: Sandbox tool enablement flags
//!
//! # Path Expansion
//!
//! The configuration system automatically:
//! - Expands ~ to the user's home directory
//! - Canonicalizes the workspace, creating it if needed
//! - Resolves relative `logs_dir` and `tasks_dir` against the workspace
//!
//! # Examples
//!
//! ```no_run
//! use smma_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Workspace: {:?}", config.core.workspace);
//! println!("Max tokens: {}", config.memory.max_tokens);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Chat-completion endpoint configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Working memory budget
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Sandbox tool enablement
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory the sandbox tools operate in (supports ~ expansion)
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding `tape_<task_id>.jsonl` files
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Directory `create_subtask` writes new task files into
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: PathBuf,
}

/// Chat-completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Endpoint preset (zen, openrouter, openai)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override; the preset URL is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key; the preset name is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Network timeout for one completion request, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Working memory configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Token budget pressure is measured against
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Desired steady-state share of `max_tokens` (0.0-1.0]
    #[serde(default = "default_target_pressure")]
    pub target_pressure: f64,

    /// Pressure percent above which non-memory tools are refused
    #[serde(default = "default_hard_ceiling_percent")]
    pub hard_ceiling_percent: f64,

    /// Dashboard is omitted while fewer messages than this are active
    #[serde(default = "default_dashboard_min_messages")]
    pub dashboard_min_messages: usize,

    /// Characters per estimated token
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model calls allowed before the task fails
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

/// Sandbox tool enablement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Enable execute_terminal_command
    #[serde(default = "default_true")]
    pub terminal: bool,

    /// Enable read_file and write_file
    #[serde(default = "default_true")]
    pub filesystem: bool,

    /// Enable create_subtask
    #[serde(default = "default_true")]
    pub subtasks: bool,

    /// Timeout for one terminal command, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

// Default value functions
fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from(".ai-tasks/logs")
}

fn default_tasks_dir() -> PathBuf {
    PathBuf::from("tasks")
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "zen".to_string()
}

fn default_model() -> String {
    "kimi-k2.5-free".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_tokens() -> usize {
    100_000
}

fn default_target_pressure() -> f64 {
    0.5
}

fn default_hard_ceiling_percent() -> f64 {
    85.0
}

fn default_dashboard_min_messages() -> usize {
    4
}

fn default_chars_per_token() -> f64 {
    3.5
}

fn default_max_iterations() -> usize {
    15
}

fn default_command_timeout() -> u64 {
    120
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            log_level: default_log_level(),
            logs_dir: default_logs_dir(),
            tasks_dir: default_tasks_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            api_key_env: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LLMConfig {
    /// Base URL for the configured preset, unless overridden
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.clone();
        }
        match self.provider.as_str() {
            "openrouter" => "https://openrouter.ai/api/v1".to_string(),
            "openai" => "https://api.openai.com/v1".to_string(),
            _ => "https://opencode.ai/zen/v1".to_string(),
        }
    }

    /// Environment variable the API key is read from
    pub fn api_key_env(&self) -> String {
        if let Some(var) = &self.api_key_env {
            return var.clone();
        }
        match self.provider.as_str() {
            "openrouter" => "OPENROUTER_API_KEY".to_string(),
            "openai" => "OPENAI_API_KEY".to_string(),
            _ => "ZEN_API_KEY".to_string(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            target_pressure: default_target_pressure(),
            hard_ceiling_percent: default_hard_ceiling_percent(),
            dashboard_min_messages: default_dashboard_min_messages(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

impl MemoryConfig {
    /// Check numeric ranges
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_tokens == 0 {
            return Err(EngineError::Config(
                "memory.max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(self.target_pressure > 0.0 && self.target_pressure <= 1.0) {
            return Err(EngineError::Config(
                "memory.target_pressure must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.hard_ceiling_percent > 0.0 && self.hard_ceiling_percent.is_finite()) {
            return Err(EngineError::Config(
                "memory.hard_ceiling_percent must be a positive number".to_string(),
            ));
        }
        if !(self.chars_per_token > 0.0 && self.chars_per_token.is_finite()) {
            return Err(EngineError::Config(
                "memory.chars_per_token must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            terminal: true,
            filesystem: true,
            subtasks: true,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.smma/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails (invalid paths, out-of-range values)
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // The file keeps the unexpanded defaults so it stays portable
        let template = Self::default_config();
        let toml_string = toml::to_string_pretty(&template)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = template;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.smma/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".smma").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            memory: MemoryConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates log level, provider preset and numeric ranges
    /// - Expands ~ in paths
    /// - Canonicalizes the workspace, creating it if it doesn't exist
    /// - Anchors relative tape and task directories to the workspace
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["zen", "openrouter", "openai"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid provider '{}'. Must be one of: {}",
                self.llm.provider,
                valid_providers.join(", ")
            )));
        }

        if self.llm.model.trim().is_empty() {
            return Err(EngineError::Config("llm.model must not be empty".to_string()));
        }

        self.memory.validate()?;

        if self.agent.max_iterations == 0 {
            return Err(EngineError::Config(
                "agent.max_iterations must be greater than 0".to_string(),
            ));
        }

        self.core.workspace = expand_path(&self.core.workspace)?;
        self.core.workspace = canonicalize_or_create(&self.core.workspace)?;

        if !self.core.workspace.is_dir() {
            return Err(EngineError::Config(format!(
                "Workspace path is not a directory: {:?}",
                self.core.workspace
            )));
        }

        self.core.logs_dir = anchor(&self.core.workspace, &expand_path(&self.core.logs_dir)?);
        self.core.tasks_dir = anchor(&self.core.workspace, &expand_path(&self.core.tasks_dir)?);

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Canonicalize path, creating it if it doesn't exist
fn canonicalize_or_create(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            EngineError::Config(format!("Failed to create directory {:?}: {}", path, e))
        })?;
    }
    path.canonicalize()
        .map_err(|e| EngineError::Config(format!("Failed to resolve {:?}: {}", path, e)))
}
