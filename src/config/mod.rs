//! Configuration module for shell-agent
//!
//! Loads config from `$XDG_CONFIG_HOME/shell-agent/config.toml` or `~/.config/shell-agent/config.toml`.
//! Falls back to embedded defaults if file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use shell_agent::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Default model: {}", config.ai.default_model);
//! println!("Ollama: {}", config.ai.base_url());
//! ```

pub mod schema;

pub use schema::{config_path, data_dir, Config};
