use crate::error::{Result, ShellAgentError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub interactive: InteractiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Root for per-model marker directories. Defaults to the data dir.
    pub model_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct OllamaConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub require_confirm: bool,
    #[serde(default = "default_dangerous_commands")]
    pub dangerous_commands: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct InteractiveConfig {
    #[serde(default = "default_true")]
    pub confirm_commands: bool,
    #[serde(default = "default_true")]
    pub show_explanation: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.1
}
fn default_system_prompt() -> String {
    r#"You are a shell command expert. Convert the user's request into a single shell command.
Respond ONLY with a JSON object of this shape:
{"command": "<shell command>", "explanation": "<what it does>", "warning": "<risks, or empty>", "confidence": <0.0-1.0>, "alternatives": ["<other command>"]}
If the request cannot be expressed as a shell command, return an empty command and explain why in the warning."#
        .to_string()
}
fn default_host() -> String {
    "localhost".to_string()
}
const fn default_port() -> u16 {
    11434
}
const fn default_true() -> bool {
    true
}
fn default_dangerous_commands() -> Vec<String> {
    [
        "rm -rf",
        "dd if=",
        "mkfs",
        "format",
        "fdisk",
        ":(){ :|:& };:",
        "chmod -R 777",
        "> /dev/sd",
        "shutdown",
        "reboot",
        "halt",
        "init 0",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            default_model: default_model(),
            model_path: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            require_confirm: default_true(),
            dangerous_commands: default_dangerous_commands(),
        }
    }
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            confirm_commands: default_true(),
            show_explanation: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            ShellAgentError::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;

        if config.ai.provider != "ollama" {
            return Err(ShellAgentError::Config(format!(
                "Unknown provider: {}. Only 'ollama' is supported",
                config.ai.provider
            )));
        }

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

impl AiConfig {
    /// Base URL of the Ollama HTTP API
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Resolve the marker root, expanding a leading `~`
    pub fn model_root(&self) -> Result<PathBuf> {
        match &self.model_path {
            Some(path) => expand_tilde(path),
            None => Ok(data_dir()?.join("models")),
        }
    }
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config)
    } else {
        home_dir()?.join(".config")
    };

    Ok(config_dir.join("shell-agent").join("config.toml"))
}

/// Get the shell-agent data directory
pub fn data_dir() -> Result<PathBuf> {
    let data_dir = if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data)
    } else {
        home_dir()?.join(".local/share")
    };

    Ok(data_dir.join("shell-agent"))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| ShellAgentError::Config("HOME directory not found".to_string()))
}

fn expand_tilde(path: &str) -> Result<PathBuf> {
    match path.strip_prefix('~') {
        Some(rest) => Ok(home_dir()?.join(rest.trim_start_matches('/'))),
        None => Ok(PathBuf::from(path)),
    }
}
