//! Configuration loading and validation.
//!
//! Both binaries read YAML files. `${VAR}` and `${VAR:-default}` references
//! are resolved from the environment before parsing, and a leading `~` in
//! path values is expanded to the home directory.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::mcp_client::types::ServerConfig;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The file is not valid YAML for the expected shape.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// The values parsed but are not usable.
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Agent Config ────────────────────────────────────────────────────────────

/// Top-level config for `collections-agent`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// How to launch the tool provider.
    pub provider: ServerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: LoopConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The chat model endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible base URL, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    pub model_name: String,
    /// Name of the environment variable holding a bearer token, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Bounds and knobs for the agent loop.
#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    /// Maximum model calls per user turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Conversation retention limit (messages, including the system prompt).
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
    /// Tool results longer than this are truncated before reaching the model.
    #[serde(default = "default_max_tool_result_chars")]
    pub max_tool_result_chars: usize,
    /// Per-request timeout for provider calls.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_history_messages: default_max_history_messages(),
            max_tool_result_chars: default_max_tool_result_chars(),
            call_timeout_ms: default_call_timeout_ms(),
            system_prompt: None,
        }
    }
}

/// Where the agent binary writes its logs.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log to stderr instead of a file.
    #[serde(default)]
    pub stderr: bool,
    /// Log directory. Defaults to the platform data dir.
    #[serde(default)]
    pub dir: Option<String>,
    /// Rotated log files to keep.
    #[serde(default = "default_keep_log_files")]
    pub keep_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stderr: false,
            dir: None,
            keep_files: default_keep_log_files(),
        }
    }
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_iterations() -> usize {
    15
}

fn default_max_history_messages() -> usize {
    200
}

fn default_max_tool_result_chars() -> usize {
    6000
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_keep_log_files() -> u32 {
    5
}

impl AgentConfig {
    /// Load and validate an agent config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: AgentConfig = load_yaml(path)?;
        config.provider.command = expand_tilde(&config.provider.command);
        config.provider.cwd = config.provider.cwd.as_deref().map(expand_tilde);
        config.validate()?;
        Ok(config)
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                reason: reason.to_string(),
            })
        };

        if self.provider.command.trim().is_empty() {
            return invalid("provider.command must not be empty");
        }
        if self.model.base_url.trim().is_empty() {
            return invalid("model.base_url must not be empty");
        }
        if self.agent.max_iterations == 0 {
            return invalid("agent.max_iterations must be at least 1");
        }
        if self.agent.max_history_messages < 2 {
            return invalid("agent.max_history_messages must be at least 2");
        }
        if self.agent.max_tool_result_chars == 0 {
            return invalid("agent.max_tool_result_chars must be positive");
        }
        if self.agent.call_timeout_ms == 0 {
            return invalid("agent.call_timeout_ms must be positive");
        }
        Ok(())
    }
}

// ─── Provider Config ─────────────────────────────────────────────────────────

/// Config for `collections-tools`.
///
/// Relative paths are resolved against the directory of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub ledger_path: PathBuf,
    pub outbox_path: PathBuf,
    pub notes_path: PathBuf,
}

impl ProviderConfig {
    /// Load a provider config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: ProviderConfig = load_yaml(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self {
            ledger_path: resolve_path(base, &config.ledger_path),
            outbox_path: resolve_path(base, &config.outbox_path),
            notes_path: resolve_path(base, &config.notes_path),
        })
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_tilde(&path.to_string_lossy()));
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Read a YAML file, interpolate environment variables, and deserialize.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Replace `${VAR}` and `${VAR:-default}` with environment values.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT_YAML: &str = r#"
provider:
  command: /usr/local/bin/collections-tools
  args: ["--config", "provider.yaml"]
model:
  base_url: ${__COLLECTIONS_TEST_BASE_URL__:-http://localhost:11434/v1}
  model_name: qwen2.5:7b
agent:
  max_iterations: 8
"#;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__COLLECTIONS_TEST_UNSET__");
        let result = interpolate_env_vars("${__COLLECTIONS_TEST_UNSET__:-/fallback/path}");
        assert_eq!(result, "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__COLLECTIONS_TEST_SET__", "/custom/path");
        let result = interpolate_env_vars("dir: ${__COLLECTIONS_TEST_SET__:-/fallback}");
        assert_eq!(result, "dir: /custom/path");
        std::env::remove_var("__COLLECTIONS_TEST_SET__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with $ but no braces";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/ledger.yaml");
        assert!(!expanded.starts_with('~') || dirs::home_dir().is_none());
        assert_eq!(expand_tilde("/abs/path"), "/abs/path");
    }

    #[test]
    fn test_agent_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, AGENT_YAML).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.provider.args, vec!["--config", "provider.yaml"]);
        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model.max_tokens, 1024);
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.agent.max_tool_result_chars, 6000);
        assert_eq!(config.agent.call_timeout_ms, 30_000);
        assert!(!config.logging.stderr);
        assert_eq!(config.logging.keep_files, 5);
    }

    #[test]
    fn test_negative_keep_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, format!("{AGENT_YAML}logging:\n  keep_files: -1\n")).unwrap();

        let err = AgentConfig::load(&path).err().unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_keep_files_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, format!("{AGENT_YAML}logging:\n  keep_files: 12\n")).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.logging.keep_files, 12u32);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, AGENT_YAML.replace("max_iterations: 8", "max_iterations: 0")).unwrap();

        let err = AgentConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = AgentConfig::load(Path::new("/nonexistent/agent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_provider_config_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.yaml");
        std::fs::write(
            &path,
            "ledger_path: ledger.yaml\noutbox_path: out/outbox.jsonl\nnotes_path: /var/tmp/notes.jsonl\n",
        )
        .unwrap();

        let config = ProviderConfig::load(&path).unwrap();
        assert_eq!(config.ledger_path, dir.path().join("ledger.yaml"));
        assert_eq!(config.outbox_path, dir.path().join("out/outbox.jsonl"));
        assert_eq!(config.notes_path, PathBuf::from("/var/tmp/notes.jsonl"));
    }

    #[test]
    fn test_provider_config_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.yaml");
        std::fs::write(&path, "ledger_path: [unclosed").unwrap();
        assert!(matches!(
            ProviderConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }
}
