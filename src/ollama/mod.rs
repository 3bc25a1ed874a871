pub mod client;

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use client::{GenerationSettings, OllamaClient, PullStreamDecoder};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Read-only view of the models the Ollama service currently holds
///
/// Implemented by [`OllamaClient`]; the inventory reconciler only depends on
/// this trait so it can be driven by an in-memory inventory in tests.
#[async_trait]
pub trait RemoteInventory: Send + Sync {
    /// Lightweight reachability probe
    async fn check_available(&self, deadline: Duration) -> ServiceResult<()>;

    /// List the models the service reports as installed
    async fn list_models(&self, deadline: Duration) -> ServiceResult<Vec<RemoteModel>>;
}

/// A model as reported by `GET /api/tags`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteModel {
    pub name: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDetails {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub families: Option<Vec<String>>,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<RemoteModel>,
}

/// Progress of a model pull, one per streamed record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullProgress {
    pub status: String,
    pub digest: Option<String>,
    pub total: u64,
    pub completed: u64,
}

impl PullProgress {
    /// Completed fraction of the current layer, 0.0 when the total is unknown
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64).min(1.0)
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PullRequest<'a> {
    pub name: &'a str,
    pub stream: bool,
}

/// One newline-delimited record of the `/api/pull` stream
#[derive(Debug, Deserialize)]
pub(crate) struct PullRecord {
    #[serde(default)]
    pub status: String,
    pub digest: Option<String>,
    pub total: Option<u64>,
    pub completed: Option<u64>,
    pub error: Option<String>,
}

impl From<PullRecord> for PullProgress {
    fn from(record: PullRecord) -> Self {
        Self {
            status: record.status,
            digest: record.digest,
            total: record.total.unwrap_or(0),
            completed: record.completed.unwrap_or(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub stream: bool,
    pub format: &'static str,
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<String>,
    pub total_duration: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_guards_zero_total() {
        let progress = PullProgress {
            status: "pulling manifest".to_string(),
            ..PullProgress::default()
        };
        assert!(progress.fraction().abs() < f64::EPSILON);
    }

    #[test]
    fn test_fraction() {
        let progress = PullProgress {
            status: "downloading".to_string(),
            digest: Some("sha256:abc".to_string()),
            total: 200,
            completed: 50,
        };
        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tags_response_tolerates_missing_details() {
        let body = r#"{"models":[{"name":"llama3.2:3b","size":2019393189}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].name, "llama3.2:3b");
        assert!(tags.models[0].details.family.is_empty());
    }

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "list files",
            system: None,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: 0.1,
                num_predict: 2048,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["format"], "json");
        assert_eq!(value["options"]["num_predict"], 2048);
        assert!(value.get("system").is_none());
    }
}
