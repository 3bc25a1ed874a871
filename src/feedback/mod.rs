//! Local log of user feedback on generated commands
//!
//! Stored as a pretty-printed JSON array at
//! `$XDG_DATA_HOME/shell-agent/feedback.json`. Reads and appends go through a
//! single mutex so a concurrent `save` can never interleave with a `load`.

use crate::config::data_dir;
use crate::error::{Result, ShellAgentError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

/// How a generated command turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Worked,
    Failed,
    Incorrect,
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Worked => "worked",
            Self::Failed => "failed",
            Self::Incorrect => "incorrect",
        };
        f.write_str(s)
    }
}

impl FromStr for FeedbackStatus {
    type Err = ShellAgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "worked" | "w" => Ok(Self::Worked),
            "failed" | "f" => Ok(Self::Failed),
            "incorrect" | "i" => Ok(Self::Incorrect),
            other => Err(ShellAgentError::Other(format!(
                "Invalid feedback status '{other}'. Use 'worked', 'failed' or 'incorrect'"
            ))),
        }
    }
}

/// A single feedback entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_prompt: String,
    pub generated_command: String,
    pub status: FeedbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FeedbackEntry {
    #[must_use]
    pub fn new(
        user_prompt: impl Into<String>,
        generated_command: impl Into<String>,
        status: FeedbackStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_prompt: user_prompt.into(),
            generated_command: generated_command.into(),
            status,
            correct_command: None,
            reason: None,
        }
    }

    #[must_use]
    pub fn with_correct_command(mut self, command: Option<String>) -> Self {
        self.correct_command = command.filter(|c| !c.is_empty());
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|r| !r.is_empty());
        self
    }
}

/// Append-only feedback file guarded by a mutex
#[derive(Debug)]
pub struct FeedbackLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Feedback log in the shell-agent data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(data_dir()?.join("feedback.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry, rewriting the file atomically (tmp + rename)
    pub fn save(&self, entry: FeedbackEntry) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ShellAgentError::Other("Feedback log lock poisoned".to_string()))?;

        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Starting a new feedback log: {e}");
                Vec::new()
            }
        };
        entries.push(entry);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&entries)
            .map_err(|e| ShellAgentError::Other(format!("Failed to serialize feedback: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!("Saved feedback ({} entries)", entries.len());
        Ok(())
    }

    /// Load all entries. A missing file is an empty log.
    pub fn load(&self) -> Result<Vec<FeedbackEntry>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ShellAgentError::Other("Feedback log lock poisoned".to_string()))?;

        self.read_entries()
    }

    // caller holds the lock
    fn read_entries(&self) -> Result<Vec<FeedbackEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| ShellAgentError::Other(format!("Failed to parse feedback log: {e}")))
    }
}
