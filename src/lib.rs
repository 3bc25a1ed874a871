#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod error;
pub mod feedback;
pub mod generation;
pub mod models;
pub mod ollama;

pub use error::{Result, ShellAgentError};
pub use generation::{CommandGenerator, CommandResponse};
