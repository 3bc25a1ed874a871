use crate::config::schema::AiConfig;
use crate::error::{Result, ShellAgentError};
use crate::models::registry::CatalogEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const MARKER_FILE: &str = "metadata.json";

/// Body of a local download marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelMetadata {
    pub name: String,
    pub ollama_name: String,
    pub description: String,
    pub size: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub recommended: bool,
    pub downloaded_at: String,
    pub source: String,
}

impl ModelMetadata {
    #[must_use]
    pub fn for_entry(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.to_string(),
            ollama_name: entry.ollama_name.to_string(),
            description: entry.description.to_string(),
            size: entry.size.to_string(),
            model_type: entry.model_type.to_string(),
            recommended: entry.recommended,
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            source: "ollama".to_string(),
        }
    }
}

/// Per-model marker files under `<root>/<model>/metadata.json`
///
/// A marker only says "we pulled this once"; it is never enough on its own to
/// call a model downloaded.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    root: PathBuf,
}

impl MarkerStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Marker store rooted at the configured model path
    pub fn from_config(ai: &AiConfig) -> Result<Self> {
        Ok(Self::new(ai.model_root()?))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn marker_path(&self, model_name: &str) -> PathBuf {
        self.root.join(model_name).join(MARKER_FILE)
    }

    /// Whether a marker exists. Any I/O fault counts as "no marker".
    #[must_use]
    pub fn has_marker(&self, model_name: &str) -> bool {
        match fs::metadata(self.marker_path(model_name)) {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("Cannot stat marker for {model_name}: {e}");
                }
                false
            }
        }
    }

    /// Read a marker back
    pub fn read(&self, model_name: &str) -> Result<ModelMetadata> {
        let content = fs::read_to_string(self.marker_path(model_name))?;

        serde_json::from_str(&content).map_err(|e| {
            ShellAgentError::Config(format!("Failed to parse marker for {model_name}: {e}"))
        })
    }

    /// Write marker atomically (tmp + rename)
    pub fn write(&self, metadata: &ModelMetadata) -> Result<PathBuf> {
        let path = self.marker_path(&metadata.name);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| ShellAgentError::Other(format!("Failed to serialize marker: {e}")))?;

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &path)?;

        tracing::debug!("Wrote marker {}", path.display());
        Ok(path)
    }

    /// Remove a model's marker directory
    pub fn remove(&self, model_name: &str) -> Result<()> {
        let dir = self.root.join(model_name);
        if !dir.exists() {
            return Err(ShellAgentError::NotFound(format!(
                "Model '{model_name}' is not tracked locally"
            )));
        }

        fs::remove_dir_all(dir)?;
        Ok(())
    }

    /// All readable markers under the root, sorted by name
    #[must_use]
    pub fn tracked(&self) -> Vec<ModelMetadata> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut tracked: Vec<ModelMetadata> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                self.read(&name)
                    .map_err(|e| tracing::debug!("Skipping marker dir {name}: {e}"))
                    .ok()
            })
            .collect();

        tracked.sort_by(|a, b| a.name.cmp(&b.name));
        tracked
    }
}
