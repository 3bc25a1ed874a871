use thiserror::Error;

/// Main error type for shell-agent
#[derive(Error, Debug)]
pub enum ShellAgentError {
    #[error("Ollama error: {0}")]
    Service(#[from] ServiceError),

    #[error("No AI model configured\n\nTroubleshooting:\n- Download a model first: shell-agent download\n- List known models: shell-agent models")]
    NoModel,

    #[error("Model '{0}' is not available in Ollama\n\nTroubleshooting:\n- Install it with: shell-agent download --model {0}\n- Check installed models: ollama list")]
    ModelNotInstalled(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/shell-agent/config.toml\n- Remove the file to fall back to defaults\n- Run with --debug for more details")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while talking to the Ollama service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service is not available: {0}\n\nPlease ensure Ollama is installed and running:\n- Install: https://ollama.ai/download\n- Start: 'ollama serve'\n- Check [ai.ollama] host/port in config")]
    Unavailable(String),

    #[error("unexpected reply from Ollama: {0}")]
    Protocol(String),

    #[error("model pull failed: {0}\n\nTroubleshooting:\n- Check internet connection\n- Verify the model name exists in the Ollama library\n- Ensure sufficient disk space for the model")]
    PullFailed(String),

    #[error("generation failed: {0}\n\nTroubleshooting:\n- Try rephrasing the request\n- Increase timeout_secs in config for slow machines\n- Check 'ollama ps' for a stuck model")]
    GenerationFailed(String),
}

pub type Result<T> = std::result::Result<T, ShellAgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_converts() {
        let err: ShellAgentError = ServiceError::PullFailed("boom".to_string()).into();
        assert!(matches!(
            err,
            ShellAgentError::Service(ServiceError::PullFailed(_))
        ));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_unavailable_carries_guidance() {
        let err = ServiceError::Unavailable("connection refused".to_string());
        let msg = err.to_string();
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("ollama serve"));
    }

    #[test]
    fn test_model_not_installed_names_model() {
        let err = ShellAgentError::ModelNotInstalled("phi3:mini".to_string());
        assert!(err.to_string().contains("--model phi3:mini"));
    }
}
