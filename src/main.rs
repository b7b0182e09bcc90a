//! uxagent CLI entry point

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use uxagent::agent::{AgentLoop, LlmClient, ProviderRegistry, DEFAULT_TASK};
use uxagent::config::{Config, ProviderKind};
use uxagent::tools::ToolRunner;
use uxagent::ui;

#[derive(Parser)]
#[command(name = "uxagent")]
#[command(about = "UI/UX Research Agent - Get fresh design ideas and solutions")]
#[command(version)]
struct Cli {
    /// The task or question for the agent
    task: Option<String>,

    /// Path to the project directory
    #[arg(short, long, default_value = ".")]
    project: String,

    /// Suppress verbose output
    #[arg(short, long)]
    quiet: bool,

    /// LLM provider to use (anthropic, openai, gemini)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model name override (default: provider's default model)
    #[arg(long)]
    model: Option<String>,

    /// Iteration ceiling for a run
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Run in interactive mode
    #[arg(long)]
    interactive: bool,
}

impl Cli {
    /// Flags take precedence over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            if provider != config.provider {
                config.model = None;
            }
            config.provider = provider;
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(max) = self.max_iterations {
            config.max_iterations = max;
        }
        if self.quiet {
            config.verbose = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = uxagent::config::load()?;
    cli.apply(&mut config);

    // First Ctrl+C stops the current run at the next step, a second one exits
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            println!("\nExiting...");
            std::process::exit(130);
        }
        println!();
        ui::print_warning("Stopping after the current step (Ctrl+C again to exit)");
    })
    .ok();

    let client = match config.provider_config().and_then(ProviderRegistry::create) {
        Ok(client) => client,
        Err(e) => {
            ui::print_error(&e.to_string());
            std::process::exit(1);
        }
    };

    let tools = ToolRunner::with_defaults().with_timeout(config.tool_timeout());
    let agent = AgentLoop::new(client, tools)
        .with_max_iterations(config.max_iterations)
        .with_verbose(config.verbose)
        .with_cancel_flag(cancel.clone());

    if cli.interactive {
        run_interactive(&agent, &cli.project, config.verbose, &cancel).await
    } else {
        let task = cli.task.as_deref().unwrap_or(DEFAULT_TASK);
        let output = run_once(&agent, task, &cli.project, config.verbose).await?;
        println!("{}", output);
        Ok(())
    }
}

async fn run_once<C: LlmClient>(
    agent: &AgentLoop<C>,
    task: &str,
    project: &str,
    verbose: bool,
) -> Result<String> {
    if verbose {
        ui::print_header(&agent.client().model_name(), task, project);
    }

    let report = agent.run(task, project).await?;
    tracing::debug!("Run finished after {} iterations", report.iterations);
    Ok(report.into_output())
}

async fn run_interactive<C: LlmClient>(
    agent: &AgentLoop<C>,
    project: &str,
    verbose: bool,
    cancel: &AtomicBool,
) -> Result<()> {
    use inquire::{InquireError, Text};

    println!("UI/UX Research Agent - Interactive Mode ({})", agent.client().model_name());
    println!("Type 'quit' to exit\n");

    loop {
        let input = match Text::new("You:").prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
                println!("Exiting...");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let task = input.trim();
        if matches!(task.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        if task.is_empty() {
            continue;
        }

        // Each task is an independent run
        cancel.store(false, Ordering::SeqCst);
        match run_once(agent, task, project, verbose).await {
            Ok(output) => println!("\n{}\n", output),
            Err(e) => ui::print_error(&e.to_string()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "uxagent",
            "modernize the navbar",
            "-p",
            "./web",
            "--provider",
            "gemini",
            "--max-iterations",
            "5",
            "-q",
        ]);
        assert_eq!(cli.task.as_deref(), Some("modernize the navbar"));
        assert_eq!(cli.project, "./web");
        assert_eq!(cli.provider, Some(ProviderKind::Gemini));
        assert!(cli.quiet);
        assert!(!cli.interactive);

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.max_iterations, 5);
        assert!(!config.verbose);
    }

    #[test]
    fn test_cli_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["uxagent", "--provider", "mistral"]).is_err());
    }

    #[test]
    fn test_switching_provider_drops_configured_model() {
        let cli = Cli::parse_from(["uxagent", "--provider", "openai"]);
        let mut config = Config {
            model: Some("claude-opus".to_string()),
            ..Config::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert!(config.model.is_none());
    }
}
