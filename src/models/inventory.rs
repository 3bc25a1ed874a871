use crate::models::marker::MarkerStore;
use crate::models::registry::{
    select_current, select_recommended, CatalogEntry, ModelDescriptor, CATALOG,
};
use crate::ollama::{RemoteInventory, ServiceResult};
use std::time::Duration;

/// Deadline for the probe and listing used in readiness checks
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides which catalog models are ready to use
///
/// Nothing is cached: every call re-reads the markers and re-queries the
/// remote inventory (or works from a snapshot the caller just fetched), so a model deleted out-of-band through `ollama rm` stops
/// being reported as downloaded on the next call.
pub struct InventoryReconciler<'a, R: RemoteInventory + ?Sized> {
    remote: &'a R,
    markers: &'a MarkerStore,
    catalog: &'a [CatalogEntry],
    probe_timeout: Duration,
}

impl<'a, R: RemoteInventory + ?Sized> InventoryReconciler<'a, R> {
    #[must_use]
    pub fn new(remote: &'a R, markers: &'a MarkerStore) -> Self {
        Self {
            remote,
            markers,
            catalog: CATALOG,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Reconcile against a different catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: &'a [CatalogEntry]) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Probe the remote, then list the names it reports
    pub async fn fetch_remote(&self) -> ServiceResult<Vec<String>> {
        self.remote.check_available(self.probe_timeout).await?;

        let models = self.remote.list_models(self.probe_timeout).await?;
        Ok(models.into_iter().map(|m| m.name).collect())
    }

    /// Names the remote currently reports, or `None` when it can't be reached
    async fn remote_names(&self) -> Option<Vec<String>> {
        match self.fetch_remote().await {
            Ok(names) => Some(names),
            Err(e) => {
                tracing::debug!("Ollama inventory unavailable during reconciliation: {e}");
                None
            }
        }
    }

    /// Whether the remote holds a model matching `name`. Unreachable means no.
    pub async fn is_available_remotely(&self, name: &str) -> bool {
        self.remote_names()
            .await
            .is_some_and(|remote| matches_remote(name, &remote))
    }

    /// Downloaded means a local marker AND a matching remote model
    pub async fn is_downloaded(&self, name: &str) -> bool {
        let entry = self
            .catalog
            .iter()
            .find(|e| e.name == name || e.ollama_name == name);
        let (marker_name, ollama_name) = entry.map_or((name, name), |e| (e.name, e.ollama_name));

        if !self.markers.has_marker(marker_name) {
            return false;
        }

        self.is_available_remotely(ollama_name).await
    }

    /// Catalog descriptors with freshly reconciled `downloaded` flags
    pub async fn list(&self) -> Vec<ModelDescriptor> {
        let remote = self.remote_names().await.unwrap_or_default();
        self.describe(&remote)
    }

    /// Descriptors reconciled against an already fetched remote snapshot
    #[must_use]
    pub fn describe(&self, remote_names: &[String]) -> Vec<ModelDescriptor> {
        self.catalog
            .iter()
            .map(|entry| {
                let downloaded = self.markers.has_marker(entry.name)
                    && matches_remote(entry.ollama_name, remote_names);
                ModelDescriptor::new(entry, downloaded)
            })
            .collect()
    }

    /// Model to use for generation given the configured default
    pub async fn current(&self, default_model: &str) -> Option<ModelDescriptor> {
        select_current(&self.list().await, default_model)
    }

    /// Best recommended model, preferring one that is already downloaded
    pub async fn recommended(&self) -> Option<ModelDescriptor> {
        select_recommended(&self.list().await)
    }
}

/// Exact match, or the untagged base name appears in a remote name
/// (`llama3.2` matches `llama3.2:3b`).
#[must_use]
pub fn matches_remote(name: &str, remote_names: &[String]) -> bool {
    let base = name.split(':').next().unwrap_or(name);

    remote_names
        .iter()
        .any(|remote| remote == name || remote.contains(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::marker::ModelMetadata;
    use crate::ollama::RemoteModel;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// In-memory remote; `None` simulates an unreachable service
    struct FakeRemote {
        models: Option<Vec<&'static str>>,
    }

    #[async_trait]
    impl RemoteInventory for FakeRemote {
        async fn check_available(&self, _deadline: Duration) -> ServiceResult<()> {
            match self.models {
                Some(_) => Ok(()),
                None => Err(ServiceError::Unavailable("connection refused".to_string())),
            }
        }

        async fn list_models(&self, _deadline: Duration) -> ServiceResult<Vec<RemoteModel>> {
            let models = self
                .models
                .as_ref()
                .ok_or_else(|| ServiceError::Unavailable("connection refused".to_string()))?;

            Ok(models
                .iter()
                .map(|name| RemoteModel {
                    name: (*name).to_string(),
                    modified_at: String::new(),
                    size: 0,
                    digest: String::new(),
                    details: Default::default(),
                })
                .collect())
        }
    }

    fn store_with(names: &[&str]) -> (TempDir, MarkerStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = MarkerStore::new(temp_dir.path());
        for name in names {
            store
                .write(&ModelMetadata::for_entry(CatalogEntry::find(name).unwrap()))
                .unwrap();
        }
        (temp_dir, store)
    }

    #[test]
    fn test_matches_remote() {
        let remote = vec!["llama3.2:3b".to_string(), "mistral:latest".to_string()];
        assert!(matches_remote("llama3.2:3b", &remote));
        assert!(matches_remote("llama3.2", &remote));
        assert!(matches_remote("mistral:7b", &remote));
        assert!(!matches_remote("phi3:mini", &remote));
        assert!(!matches_remote("phi3:mini", &[]));
    }

    #[tokio::test]
    async fn test_downloaded_requires_marker_and_remote() {
        let (_dir, store) = store_with(&["phi3:mini", "mistral:7b"]);
        let remote = FakeRemote {
            models: Some(vec!["phi3:mini", "llama3.2:1b"]),
        };
        let reconciler = InventoryReconciler::new(&remote, &store);

        // both sides
        assert!(reconciler.is_downloaded("phi3:mini").await);
        // marker only
        assert!(!reconciler.is_downloaded("mistral:7b").await);
        // remote only
        assert!(!reconciler.is_downloaded("llama3.2:1b").await);
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_never_downloaded() {
        let names: Vec<&str> = CatalogEntry::all_names();
        let (_dir, store) = store_with(&names);
        let remote = FakeRemote { models: None };
        let reconciler = InventoryReconciler::new(&remote, &store);

        for name in names {
            assert!(!reconciler.is_downloaded(name).await, "{name}");
        }
        assert!(reconciler.list().await.iter().all(|m| !m.downloaded));
    }

    #[tokio::test]
    async fn test_list_keeps_catalog_order() {
        let (_dir, store) = store_with(&["mistral:7b"]);
        let remote = FakeRemote {
            models: Some(vec!["mistral:7b"]),
        };
        let reconciler = InventoryReconciler::new(&remote, &store);

        let listed = reconciler.list().await;
        let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, CatalogEntry::all_names());
        assert_eq!(
            listed
                .iter()
                .filter(|m| m.downloaded)
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>(),
            vec!["mistral:7b"]
        );
    }

    #[tokio::test]
    async fn test_current_is_stable_with_one_downloaded() {
        let (_dir, store) = store_with(&["llama3.1:8b"]);
        let remote = FakeRemote {
            models: Some(vec!["llama3.1:8b"]),
        };
        let reconciler = InventoryReconciler::new(&remote, &store);

        for _ in 0..3 {
            let current = reconciler.current("gpt-4").await.unwrap();
            assert_eq!(current.name, "llama3.1:8b");
            assert!(current.downloaded);
        }
    }

    #[tokio::test]
    async fn test_recommended_without_downloads() {
        let (_dir, store) = store_with(&[]);
        let remote = FakeRemote { models: Some(vec![]) };
        let reconciler = InventoryReconciler::new(&remote, &store);

        let recommended = reconciler.recommended().await.unwrap();
        assert_eq!(recommended.name, "llama3.2:3b");
        assert!(!recommended.downloaded);
    }

    static CUSTOM_CATALOG: &[CatalogEntry] = &[CatalogEntry {
        name: "shell-helper",
        ollama_name: "qwen2.5-coder:1.5b",
        description: "Small coding model",
        size: "1.0GB",
        model_type: "code",
        recommended: true,
    }];

    #[tokio::test]
    async fn test_downloaded_resolves_against_own_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let store = MarkerStore::new(temp_dir.path());
        store
            .write(&ModelMetadata::for_entry(&CUSTOM_CATALOG[0]))
            .unwrap();
        let remote = FakeRemote {
            models: Some(vec!["qwen2.5-coder:1.5b"]),
        };
        let reconciler = InventoryReconciler::new(&remote, &store).with_catalog(CUSTOM_CATALOG);

        assert!(reconciler.is_downloaded("shell-helper").await);
        assert!(reconciler.is_downloaded("qwen2.5-coder:1.5b").await);

        let listed = reconciler.list().await;
        assert_eq!(listed.len(), 1);
        assert!(listed[0].downloaded);
    }

    #[tokio::test]
    async fn test_fetch_remote_reports_unreachable() {
        let (_dir, store) = store_with(&[]);
        let remote = FakeRemote { models: None };
        let reconciler = InventoryReconciler::new(&remote, &store);

        assert!(matches!(
            reconciler.fetch_remote().await,
            Err(ServiceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_describe_uses_snapshot() {
        let (_dir, store) = store_with(&["phi3:mini"]);
        let remote = FakeRemote { models: None };
        let reconciler = InventoryReconciler::new(&remote, &store);

        let described = reconciler.describe(&["phi3:mini".to_string()]);
        let ready: Vec<&str> = described
            .iter()
            .filter(|m| m.downloaded)
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(ready, vec!["phi3:mini"]);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let (_dir, store) = store_with(&[]);
        let remote = FakeRemote {
            models: Some(vec!["llama3.2:3b"]),
        };
        let reconciler = InventoryReconciler::new(&remote, &store).with_catalog(&[]);

        assert!(reconciler.list().await.is_empty());
        assert!(reconciler.current("llama3.2:3b").await.is_none());
        assert!(reconciler.recommended().await.is_none());
    }
}
