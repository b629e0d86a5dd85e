use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use autoforge::config::{Config, Overrides};
use autoforge::events::AutomationEvent;
use autoforge::idea::IdeaInput;
use autoforge::orchestrator::Orchestrator;
use autoforge::service::{self, AppContext};
use autoforge::status::AutomationStatus;

#[derive(Parser)]
#[command(
    name = "autoforge",
    version,
    about = "Idea-to-deployment automation for the Cursor editor"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one idea through the full automation pipeline
    Process {
        /// Path to the idea JSON file
        #[arg(long)]
        idea: PathBuf,
        /// Output directory for generated projects
        #[arg(long)]
        output: Option<PathBuf>,
        /// Comma-separated deployment targets, overriding the idea's own list
        #[arg(long, value_delimiter = ',')]
        targets: Option<Vec<String>>,
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Log level filter, e.g. "debug" or "info,autoforge=trace"
        #[arg(long)]
        log: Option<String>,
    },
    /// Start the HTTP automation service
    Serve {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port to listen on
        #[arg(long, env = "AUTOFORGE_PORT")]
        port: Option<u16>,
        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Process {
            idea,
            output,
            targets,
            config,
            log,
        } => {
            let config = Config::load(
                config.as_deref(),
                Overrides {
                    working_dir: output,
                    targets: targets.clone(),
                    log,
                    ..Default::default()
                },
            )?;
            init_tracing(&config);
            process(Arc::new(config), &idea, targets).await
        }
        Command::Serve {
            config,
            port,
            verbose,
        } => {
            let config = Config::load(
                config.as_deref(),
                Overrides {
                    port,
                    log: verbose.then(|| "debug".to_string()),
                    service_mode: true,
                    ..Default::default()
                },
            )?;
            init_tracing(&config);
            serve(Arc::new(config)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// One-shot pipeline: read the idea file, run it, print the result as JSON.
/// Exits non-zero when the run ends FAILED.
async fn process(
    config: Arc<Config>,
    idea_path: &std::path::Path,
    targets: Option<Vec<String>>,
) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(idea_path)
        .with_context(|| format!("failed to read idea file {}", idea_path.display()))?;
    let mut input: IdeaInput = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse idea file {}", idea_path.display()))?;
    if let Some(targets) = targets {
        input.deployment_target = targets;
    } else if input.deployment_target.is_empty() {
        input.deployment_target = config.deployment.targets.clone();
    }

    let orchestrator = Orchestrator::new(config);
    let mut rx = orchestrator.events().subscribe();
    let printer = tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match rx.recv().await {
                Ok(AutomationEvent::Progress(p)) => {
                    eprintln!("[{:>3}%] {}: {}", p.percentage, p.status, p.message);
                }
                Ok(AutomationEvent::Error { message }) => {
                    eprintln!("error: {message}");
                }
                Ok(AutomationEvent::StatusChanged { .. }) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = orchestrator.run(input).await;
    drop(orchestrator);
    let _ = printer.await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.status == AutomationStatus::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Service mode: pre-launch Cursor through a supervisor orchestrator, serve
/// the job API until shutdown, then close Cursor again. A failed pre-launch
/// is not fatal since each job launches on demand.
async fn serve(config: Arc<Config>) -> Result<()> {
    let supervisor = Orchestrator::new(Arc::clone(&config));
    if let Err(e) = supervisor.start_service().await {
        warn!(err = %e, "could not pre-launch cursor; jobs will launch it on demand");
    }

    let ctx = Arc::new(AppContext::new(config));
    service::serve(ctx).await?;

    if let Err(e) = supervisor.stop_service().await {
        warn!(err = %e, "failed to stop cursor during shutdown");
    }
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
