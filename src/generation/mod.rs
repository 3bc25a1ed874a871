pub mod response;
pub mod safety;

use crate::config::Config;
use crate::error::{Result, ShellAgentError};
use crate::models::inventory::{matches_remote, InventoryReconciler};
use crate::models::marker::MarkerStore;
use crate::models::registry::select_current;
use crate::ollama::OllamaClient;
use std::time::Duration;

pub use response::{interpret, parse, CommandResponse, ParseOutcome};
pub use safety::SafetyChecker;

/// Turns a natural-language request into a classified `CommandResponse`
///
/// Pipeline: probe Ollama, pick the current model, confirm Ollama has it,
/// generate, interpret the reply, then run the safety pass.
#[derive(Debug)]
pub struct CommandGenerator {
    client: OllamaClient,
    markers: MarkerStore,
    safety: SafetyChecker,
    default_model: String,
    timeout: Duration,
}

impl CommandGenerator {
    #[must_use]
    pub fn new(
        client: OllamaClient,
        markers: MarkerStore,
        safety: SafetyChecker,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            markers,
            safety,
            default_model: default_model.into(),
            timeout,
        }
    }

    /// Create generator from config
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            OllamaClient::from_config(&config.ai),
            MarkerStore::from_config(&config.ai)?,
            SafetyChecker::from_config(&config.safety),
            config.ai.default_model.clone(),
            Duration::from_secs(config.ai.timeout_secs),
        ))
    }

    #[must_use]
    pub const fn client(&self) -> &OllamaClient {
        &self.client
    }

    #[must_use]
    pub const fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    #[must_use]
    pub fn reconciler(&self) -> InventoryReconciler<'_, OllamaClient> {
        InventoryReconciler::new(&self.client, &self.markers)
    }

    /// Generate a shell command for `input`
    pub async fn generate_command(&self, input: &str) -> Result<CommandResponse> {
        tracing::info!(input, "Generating command");

        // single snapshot for selection and the installed check
        let reconciler = self.reconciler();
        let remote = reconciler.fetch_remote().await?;

        let model = select_current(&reconciler.describe(&remote), &self.default_model)
            .ok_or(ShellAgentError::NoModel)?;

        if !matches_remote(&model.ollama_name, &remote) {
            return Err(ShellAgentError::ModelNotInstalled(model.name));
        }

        let prompt = enhance_prompt(std::env::consts::OS, input);
        let raw = self
            .client
            .generate(&model.ollama_name, &prompt, self.timeout)
            .await?;

        let outcome = parse(&raw);
        if outcome.is_fallback() {
            tracing::warn!(raw = %raw, "Model reply was not valid JSON, using fallback parse");
        }

        let mut response = outcome.into_response();
        self.safety.check(&mut response);

        tracing::info!(
            command = %response.command,
            confidence = response.confidence,
            model = %model.name,
            "Generated command successfully"
        );

        Ok(response)
    }
}

/// Wrap the user's request with OS context and answer guidance
#[must_use]
pub fn enhance_prompt(os: &str, input: &str) -> String {
    format!(
        "Operating System: {os}

User Request: {input}

Please provide a shell command that accomplishes this request. Consider:
1. The operating system is {os}
2. Use safe, commonly available commands
3. Provide clear explanations
4. Warn about any potential risks
5. Suggest alternatives if helpful

Respond in JSON format as specified in the system prompt."
    )
}
