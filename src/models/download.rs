use crate::error::{Result, ShellAgentError};
use crate::models::inventory::InventoryReconciler;
use crate::models::marker::{MarkerStore, ModelMetadata};
use crate::models::registry::CatalogEntry;
use crate::ollama::{OllamaClient, PullProgress, RemoteInventory};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Probe deadline before starting a download
const DOWNLOAD_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Model pulls are large; give them far longer than generation
pub const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Pulls catalog models through Ollama and records local markers
pub struct ModelDownloader<'a> {
    client: &'a OllamaClient,
    markers: &'a MarkerStore,
    pull_timeout: Duration,
}

impl<'a> ModelDownloader<'a> {
    #[must_use]
    pub const fn new(client: &'a OllamaClient, markers: &'a MarkerStore) -> Self {
        Self {
            client,
            markers,
            pull_timeout: PULL_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_pull_timeout(mut self, pull_timeout: Duration) -> Self {
        self.pull_timeout = pull_timeout;
        self
    }

    /// Download a model with a terminal progress bar
    pub async fn download(&self, model_name: &str) -> Result<PathBuf> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:50}] {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));

        let result = self
            .download_with_progress(model_name, |progress| {
                if progress.total > 0 {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let percent = (progress.fraction() * 100.0) as u64;
                    bar.set_position(percent);
                    bar.set_message(format!(
                        "{model_name}: {} ({} / {})",
                        progress.status,
                        format_bytes(progress.completed),
                        format_bytes(progress.total)
                    ));
                } else {
                    bar.set_message(format!("{model_name}: {}", progress.status));
                }
            })
            .await;

        match &result {
            Ok(_) => bar.finish_with_message(format!("✓ Downloaded {model_name}")),
            Err(_) => bar.abandon_with_message(format!("✗ Download of {model_name} failed")),
        }

        result
    }

    /// Download a model, reporting progress through a callback
    ///
    /// The marker is written only after the pull stream ends cleanly, so an
    /// aborted or failed pull never leaves the model looking downloaded.
    pub async fn download_with_progress<F>(&self, model_name: &str, on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(&PullProgress) + Send,
    {
        let entry = CatalogEntry::find(model_name).ok_or_else(|| {
            let hint = CatalogEntry::suggest(model_name)
                .map(|s| format!(" Did you mean '{s}'?"))
                .unwrap_or_default();
            ShellAgentError::NotFound(format!(
                "Unknown model: {model_name}.{hint} Run 'shell-agent download --list' to see available models"
            ))
        })?;

        self.client.check_available(DOWNLOAD_PROBE_TIMEOUT).await?;

        let reconciler = InventoryReconciler::new(self.client, self.markers)
            .with_probe_timeout(DOWNLOAD_PROBE_TIMEOUT);
        if reconciler.is_available_remotely(entry.ollama_name).await {
            if self.markers.has_marker(entry.name) {
                return Err(ShellAgentError::Config(format!(
                    "Model {} is already downloaded in Ollama",
                    entry.name
                )));
            }

            // pulled outside shell-agent; only the marker is missing
            tracing::info!("{} already present in Ollama, recording marker", entry.name);
            return self.markers.write(&ModelMetadata::for_entry(entry));
        }

        tracing::info!("Downloading {} ({}) via Ollama", entry.name, entry.size);

        self.client
            .pull(entry.ollama_name, self.pull_timeout, on_progress)
            .await?;

        let path = self.markers.write(&ModelMetadata::for_entry(entry))?;

        tracing::info!(
            model = entry.name,
            ollama_name = entry.ollama_name,
            size = entry.size,
            "Model download completed successfully"
        );

        Ok(path)
    }
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::GenerationSettings;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1_572_864), "1.50 MB");
        assert_eq!(format_bytes(2_147_483_648), "2.00 GB");
    }

    #[tokio::test]
    async fn test_unknown_model_suggests_name() {
        let temp_dir = TempDir::new().unwrap();
        let markers = MarkerStore::new(temp_dir.path());
        let client = OllamaClient::new("http://127.0.0.1:1", GenerationSettings::default());

        let err = ModelDownloader::new(&client, &markers)
            .download_with_progress("phi3:mni", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ShellAgentError::NotFound(_)));
        assert!(err.to_string().contains("Did you mean 'phi3:mini'?"));
    }

    #[tokio::test]
    async fn test_unreachable_service_writes_no_marker() {
        let temp_dir = TempDir::new().unwrap();
        let markers = MarkerStore::new(temp_dir.path());
        let client = OllamaClient::new("http://127.0.0.1:1", GenerationSettings::default());

        let result = ModelDownloader::new(&client, &markers)
            .download_with_progress("phi3:mini", |_| {})
            .await;

        assert!(matches!(
            result,
            Err(ShellAgentError::Service(
                crate::error::ServiceError::Unavailable(_)
            ))
        ));
        assert!(!markers.has_marker("phi3:mini"));
    }
}
