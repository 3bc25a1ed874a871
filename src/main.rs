#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use shell_agent::config::{config_path, Config};
use shell_agent::error::{Result, ShellAgentError};
use shell_agent::feedback::{FeedbackEntry, FeedbackLog, FeedbackStatus};
use shell_agent::generation::{CommandGenerator, CommandResponse};
use shell_agent::models::download::format_bytes;
use shell_agent::models::inventory::PROBE_TIMEOUT;
use shell_agent::models::ModelDownloader;
use shell_agent::ollama::{RemoteInventory, RemoteModel, ServiceResult};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shell-agent")]
#[command(about = "AI-powered shell command generator", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// What you want to do, in plain words. Starts interactive mode when omitted.
    request: Vec<String>,

    /// Config file (default is ~/.config/shell-agent/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the response as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download an AI model through Ollama
    Download {
        /// Specific model to download (defaults to the recommended one)
        #[arg(short, long)]
        model: Option<String>,
        /// List available models
        #[arg(short, long)]
        list: bool,
    },
    /// List known models and whether they are ready
    Models,
    /// Show configuration, service and model status
    Status {
        /// Show only model status
        #[arg(long)]
        model: bool,
    },
    /// Record feedback on a generated command
    Feedback {
        /// worked, failed or incorrect
        #[arg(short, long)]
        status: FeedbackStatus,
        /// The original request
        #[arg(short, long, default_value = "")]
        prompt: String,
        /// The generated command
        #[arg(short, long, default_value = "")]
        command: String,
        /// The correct command, if the generated one was wrong
        #[arg(short = 'r', long)]
        correct_command: Option<String>,
        /// Why it did not work
        #[arg(short = 'e', long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_logging(&cli, &config);

    match cli.command {
        Some(Commands::Download { model, list }) => run_download(&config, model, list).await,
        Some(Commands::Models) => run_models(&config).await,
        Some(Commands::Status { model }) => run_status(&config, model).await,
        Some(Commands::Feedback {
            status,
            prompt,
            command,
            correct_command,
            reason,
        }) => run_feedback(status, prompt, command, correct_command, reason),
        None if cli.request.is_empty() => run_interactive(&config).await,
        None => run_single(&config, &cli.request.join(" "), cli.json).await,
    }
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        config.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shell_agent={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_single(config: &Config, input: &str, json: bool) -> Result<()> {
    tracing::info!(input, "Processing single command");

    let generator = CommandGenerator::from_config(config)?;
    let response = generator.generate_command(input).await?;

    if json {
        let out = serde_json::to_string_pretty(&response)
            .map_err(|e| ShellAgentError::Other(format!("Failed to serialize response: {e}")))?;
        println!("{out}");
    } else {
        print_response(&response, config.interactive.show_explanation);
    }

    Ok(())
}

async fn run_interactive(config: &Config) -> Result<()> {
    tracing::info!("Starting interactive mode");

    let generator = CommandGenerator::from_config(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Shell Agent - describe what you want to do, 'help' for commands, 'exit' to quit");

    loop {
        prompt("\n> ")?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nReceived interrupt signal");
                break;
            }
        };

        let Some(line) = line else { break };
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" | "q" => break,
            "help" | "h" => {
                print_help();
                continue;
            }
            "clear" | "cls" => {
                print!("\x1B[2J\x1B[1;1H");
                continue;
            }
            "status" => {
                print_current_model(&generator, &config.ai.default_model).await;
                continue;
            }
            _ => {}
        }

        println!("Thinking...");

        let result = tokio::select! {
            result = generator.generate_command(input) => result,
            _ = tokio::signal::ctrl_c() => {
                println!("\nReceived interrupt signal");
                break;
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                eprintln!("Error generating command: {e}");
                continue;
            }
        };

        print_response(&response, config.interactive.show_explanation);

        if response.is_declined() || !config.interactive.confirm_commands {
            continue;
        }

        if confirm(&mut lines, "Execute this command? [y/N] ").await? {
            execute(&response.command).await;
            ask_feedback(&mut lines, input, &response.command).await?;
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn run_download(config: &Config, model: Option<String>, list: bool) -> Result<()> {
    if list {
        return run_models(config).await;
    }

    let generator = CommandGenerator::from_config(config)?;

    let model_name = match model {
        Some(name) => name,
        None => {
            let recommended = generator
                .reconciler()
                .recommended()
                .await
                .ok_or(ShellAgentError::NoModel)?;
            println!("No model given, using recommended model {}", recommended.name);
            recommended.name
        }
    };

    println!("Downloading {model_name}");
    println!("Markers: {}", generator.markers().root().display());

    ModelDownloader::new(generator.client(), generator.markers())
        .download(&model_name)
        .await?;

    println!("✓ Successfully downloaded model: {model_name}");
    Ok(())
}

async fn run_models(config: &Config) -> Result<()> {
    let generator = CommandGenerator::from_config(config)?;
    let models = generator.reconciler().list().await;

    println!("Available models:");
    for model in models {
        let state = if model.downloaded { "ready" } else { "not downloaded" };
        let star = if model.recommended { "*" } else { " " };
        println!(
            "{star} {:<14} {:>6}  {:<15} [{state}]\n    {}",
            model.name, model.size, model.model_type, model.description
        );
    }
    println!("\n* recommended for shell commands");

    Ok(())
}

async fn run_status(config: &Config, model_only: bool) -> Result<()> {
    let generator = CommandGenerator::from_config(config)?;

    print_current_model(&generator, &config.ai.default_model).await;
    if model_only {
        return Ok(());
    }

    println!("\nSystem:");
    println!("  OS/arch:      {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    println!("  Config file:  {}", config_path()?.display());
    println!("  Model root:   {}", generator.markers().root().display());

    println!("\nOllama:");
    println!("  Endpoint:     {}", generator.client().base_url());
    let installed = which::which("ollama").map_or_else(
        |_| "not found in PATH".to_string(),
        |p| p.display().to_string(),
    );
    println!("  Binary:       {installed}");

    match generator.client().check_available(PROBE_TIMEOUT).await {
        Ok(()) => {
            println!("  Service:      running");
            let listing = generator.client().list_models(PROBE_TIMEOUT).await;
            for line in remote_model_lines(listing) {
                println!("{line}");
            }
        }
        Err(e) => println!("  Service:      unavailable ({e})"),
    }

    let tracked = generator.markers().tracked();
    println!("\nTracked locally: {}", tracked.len());
    for marker in tracked {
        println!("  - {} (since {})", marker.name, marker.downloaded_at);
    }

    Ok(())
}

/// Status lines for the models Ollama reports. A listing failure is reported
/// inline so the rest of the status report still prints.
fn remote_model_lines(listing: ServiceResult<Vec<RemoteModel>>) -> Vec<String> {
    match listing {
        Ok(remote) => remote
            .iter()
            .map(|model| {
                format!(
                    "    - {:<24} {:>10}  {}",
                    model.name,
                    format_bytes(model.size),
                    model.details.parameter_size
                )
            })
            .collect(),
        Err(e) => vec![format!("  Models:       unavailable ({e})")],
    }
}

fn run_feedback(
    status: FeedbackStatus,
    prompt: String,
    command: String,
    correct_command: Option<String>,
    reason: Option<String>,
) -> Result<()> {
    let entry = FeedbackEntry::new(prompt, command, status)
        .with_correct_command(correct_command)
        .with_reason(reason);

    let log = FeedbackLog::open_default()?;
    log.save(entry)?;

    println!("✓ Feedback saved to {}", log.path().display());
    Ok(())
}

async fn print_current_model(generator: &CommandGenerator, default_model: &str) {
    match generator.reconciler().current(default_model).await {
        Some(model) if model.downloaded => println!("Model: {} (Ready)", model.name),
        Some(model) => println!("Model: {} (Not Downloaded)", model.name),
        None => println!("No model configured"),
    }
}

fn print_response(response: &CommandResponse, show_explanation: bool) {
    if response.is_declined() {
        println!("No command generated.");
    } else {
        println!("\nCommand: {}", response.command);
    }

    if show_explanation && !response.explanation.is_empty() {
        println!("Explanation: {}", response.explanation);
    }

    for warning in response.warning.lines() {
        println!("Warning: {warning}");
    }

    if !response.is_declined() {
        println!("Confidence: {:.0}%", response.confidence * 100.0);
    }

    if !response.alternatives.is_empty() {
        println!("Alternatives:");
        for alternative in &response.alternatives {
            println!("  - {alternative}");
        }
    }
}

fn print_help() {
    println!(
        "Describe a task in plain words and get a shell command back.

Commands:
  help, h      Show this help
  status       Show the current model
  clear, cls   Clear the screen
  exit, q      Quit"
    );
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}

async fn confirm(lines: &mut Lines<BufReader<Stdin>>, question: &str) -> Result<bool> {
    prompt(question)?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn execute(command: &str) {
    println!("Executing command...");

    match tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
    {
        Ok(status) if status.success() => {}
        Ok(status) => eprintln!("Command exited with {status}"),
        Err(e) => eprintln!("Command execution failed: {e}"),
    }
}

async fn ask_feedback(
    lines: &mut Lines<BufReader<Stdin>>,
    user_prompt: &str,
    command: &str,
) -> Result<()> {
    prompt("Did this command work? [w]orked / [f]ailed / [i]ncorrect / Enter to skip: ")?;

    let answer = lines.next_line().await?.unwrap_or_default();
    if answer.trim().is_empty() {
        return Ok(());
    }

    let status = match answer.parse::<FeedbackStatus>() {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!("Failed to get user feedback: {e}");
            return Ok(());
        }
    };

    match FeedbackLog::open_default().and_then(|log| {
        log.save(FeedbackEntry::new(user_prompt, command, status))
    }) {
        Ok(()) => println!("✓ Feedback submitted. Thank you!"),
        Err(e) => eprintln!("Failed to save feedback: {e}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_agent::error::ServiceError;
    use shell_agent::ollama::ModelDetails;

    #[test]
    fn test_remote_model_lines() {
        let model = RemoteModel {
            name: "llama3.2:3b".to_string(),
            modified_at: String::new(),
            size: 2_147_483_648,
            digest: String::new(),
            details: ModelDetails {
                parameter_size: "3.2B".to_string(),
                ..ModelDetails::default()
            },
        };

        let lines = remote_model_lines(Ok(vec![model]));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("llama3.2:3b"));
        assert!(lines[0].contains("2.00 GB"));
        assert!(lines[0].contains("3.2B"));
    }

    #[test]
    fn test_listing_failure_is_reported_inline() {
        let lines = remote_model_lines(Err(ServiceError::Protocol(
            "model list returned status 500".to_string(),
        )));

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("unavailable"));
        assert!(lines[0].contains("status 500"));
    }
}
