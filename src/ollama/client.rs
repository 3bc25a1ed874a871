use crate::config::schema::AiConfig;
use crate::error::ServiceError;
use crate::ollama::{
    GenerateOptions, GenerateRequest, GenerateResponse, PullProgress, PullRecord, PullRequest,
    RemoteInventory, RemoteModel, ServiceResult, TagsResponse,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::future::Future;
use std::time::Duration;

/// Sampling parameters and system instructions sent with every generation
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&AiConfig> for GenerationSettings {
    fn from(ai: &AiConfig) -> Self {
        let system_prompt = Some(ai.system_prompt.clone()).filter(|s| !s.trim().is_empty());
        Self {
            system_prompt,
            temperature: ai.temperature,
            max_tokens: ai.max_tokens,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&AiConfig::default())
    }
}

/// HTTP client for the Ollama API
///
/// Holds no long-lived connection state beyond reqwest's pool; every operation
/// takes its own deadline and runs inside its own timeout scope, so a slow pull
/// never eats into the budget of a generation call.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    settings: GenerationSettings,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("client", &"Client { ... }")
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .finish()
    }
}

impl OllamaClient {
    /// Create a client for the given base URL (e.g. `http://localhost:11434`)
    #[must_use]
    pub fn new(base_url: impl Into<String>, settings: GenerationSettings) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            settings,
        }
    }

    /// Create client from the `[ai]` config section
    #[must_use]
    pub fn from_config(ai: &AiConfig) -> Self {
        Self::new(ai.base_url(), GenerationSettings::from(ai))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Pull a model, forwarding every progress record to `on_progress`
    ///
    /// Returns once the stream ends cleanly. A record carrying an `error`
    /// field aborts the pull immediately. Dropping the returned future (or
    /// hitting the deadline) closes the connection.
    pub async fn pull<F>(
        &self,
        model_name: &str,
        deadline: Duration,
        mut on_progress: F,
    ) -> ServiceResult<()>
    where
        F: FnMut(&PullProgress) + Send,
    {
        tracing::info!("Pulling model {model_name} from {}", self.base_url);

        let pull = async {
            let response = self
                .client
                .post(self.url("/api/pull"))
                .json(&PullRequest {
                    name: model_name,
                    stream: true,
                })
                .send()
                .await
                .map_err(|e| self.unreachable(&e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::PullFailed(format!(
                    "HTTP {status}: {}",
                    body.trim()
                )));
            }

            let mut decoder = PullStreamDecoder::default();
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| {
                    ServiceError::PullFailed(format!("stream interrupted: {e}"))
                })?;

                decoder.push(&chunk);
                while let Some(progress) = decoder.next_record()? {
                    report_progress(model_name, &progress);
                    on_progress(&progress);
                }
            }

            if let Some(progress) = decoder.finish()? {
                report_progress(model_name, &progress);
                on_progress(&progress);
            }

            Ok(())
        };

        with_deadline(deadline, pull, |elapsed| {
            ServiceError::PullFailed(format!("pull timed out after {elapsed}"))
        })
        .await?;

        tracing::info!("Pulled model {model_name}");
        Ok(())
    }

    /// Single-shot, non-streaming generation. Returns the raw `response` text.
    pub async fn generate(
        &self,
        model_name: &str,
        prompt: &str,
        deadline: Duration,
    ) -> ServiceResult<String> {
        let request = GenerateRequest {
            model: model_name,
            prompt,
            system: self.settings.system_prompt.as_deref(),
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        };

        tracing::info!(
            model = model_name,
            prompt = %truncate(prompt, 100),
            "Sending request to Ollama"
        );

        let generate = async {
            let response = self
                .client
                .post(self.url("/api/generate"))
                .json(&request)
                .send()
                .await
                .map_err(|e| self.unreachable(&e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::GenerationFailed(format!(
                    "HTTP {status}: {}",
                    body.trim()
                )));
            }

            response.json::<GenerateResponse>().await.map_err(|e| {
                ServiceError::GenerationFailed(format!("failed to decode reply: {e}"))
            })
        };

        let reply = with_deadline(deadline, generate, |elapsed| {
            ServiceError::GenerationFailed(format!("no reply after {elapsed}"))
        })
        .await?;

        if let Some(error) = reply.error.filter(|e| !e.is_empty()) {
            return Err(ServiceError::GenerationFailed(error));
        }

        tracing::info!(
            model = %reply.model,
            done = reply.done,
            response_length = reply.response.len(),
            total_duration = reply.total_duration.unwrap_or_default(),
            prompt_eval_count = reply.prompt_eval_count.unwrap_or_default(),
            eval_count = reply.eval_count.unwrap_or_default(),
            "Received response from Ollama"
        );

        Ok(reply.response)
    }

    fn unreachable(&self, e: &reqwest::Error) -> ServiceError {
        ServiceError::Unavailable(format!("cannot reach {}: {e}", self.base_url))
    }
}

#[async_trait]
impl RemoteInventory for OllamaClient {
    async fn check_available(&self, deadline: Duration) -> ServiceResult<()> {
        let probe = async {
            let response = self
                .client
                .get(self.url("/api/tags"))
                .send()
                .await
                .map_err(|e| self.unreachable(&e))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(ServiceError::Unavailable(format!(
                    "service at {} returned status {status}",
                    self.base_url
                )))
            }
        };

        with_deadline(deadline, probe, |elapsed| {
            ServiceError::Unavailable(format!("{} did not answer within {elapsed}", self.base_url))
        })
        .await
    }

    async fn list_models(&self, deadline: Duration) -> ServiceResult<Vec<RemoteModel>> {
        let list = async {
            let response = self
                .client
                .get(self.url("/api/tags"))
                .send()
                .await
                .map_err(|e| self.unreachable(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ServiceError::Protocol(format!(
                    "model list returned status {status}"
                )));
            }

            let tags = response.json::<TagsResponse>().await.map_err(|e| {
                ServiceError::Protocol(format!("failed to decode model list: {e}"))
            })?;

            Ok(tags.models)
        };

        with_deadline(deadline, list, |elapsed| {
            ServiceError::Unavailable(format!("{} did not answer within {elapsed}", self.base_url))
        })
        .await
    }
}

/// Incremental decoder for the newline-delimited JSON pull stream
///
/// Chunks may split records at arbitrary byte boundaries; complete lines are
/// decoded as they arrive and any trailing partial line is kept for the next
/// chunk. Records are handed out one at a time so everything before an
/// error record still reaches the caller.
#[derive(Debug, Default)]
pub struct PullStreamDecoder {
    buffer: Vec<u8>,
}

impl PullStreamDecoder {
    /// Buffer a chunk of the response body
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next complete record, `None` until another newline arrives
    pub fn next_record(&mut self) -> ServiceResult<Option<PullProgress>> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(progress) = decode_pull_line(&line)? {
                return Ok(Some(progress));
            }
        }

        Ok(None)
    }

    /// Flush a final record that was not newline-terminated
    pub fn finish(&mut self) -> ServiceResult<Option<PullProgress>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_pull_line(&rest)
    }
}

fn decode_pull_line(line: &[u8]) -> ServiceResult<Option<PullProgress>> {
    let line = std::str::from_utf8(line)
        .map_err(|e| ServiceError::PullFailed(format!("progress record is not UTF-8: {e}")))?
        .trim();
    if line.is_empty() {
        return Ok(None);
    }

    let record: PullRecord = serde_json::from_str(line)
        .map_err(|e| ServiceError::PullFailed(format!("malformed progress record: {e}")))?;

    if let Some(error) = record.error.as_deref().filter(|e| !e.is_empty()) {
        return Err(ServiceError::PullFailed(error.to_string()));
    }

    Ok(Some(record.into()))
}

fn report_progress(model_name: &str, progress: &PullProgress) {
    tracing::debug!(
        model = model_name,
        status = %progress.status,
        progress = progress.fraction(),
        completed = progress.completed,
        total = progress.total,
        "Model download progress"
    );
}

async fn with_deadline<T, F>(
    deadline: Duration,
    operation: F,
    on_timeout: impl FnOnce(String) -> ServiceError,
) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("{}s", deadline.as_secs_f32()))),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
