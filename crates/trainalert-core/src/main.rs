//! TrainAlert CLI
//!
//! Drives a [`TrainingNotifier`] from JSON-line reports so that any training
//! process, whatever its language, can pipe its metrics in.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use trainalert::models::{Message, MetricValues, SessionStatus, TrainingConfig, TrainingFailure};
use trainalert::{Config, TrainingNotifier};

/// TrainAlert - notifications for ML training runs
#[derive(Parser)]
#[command(name = "trainalert")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TRAINALERT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON-line training reports and send notifications
    Watch {
        /// Report file (stdin if not specified)
        file: Option<PathBuf>,

        /// Training name, overriding the configuration
        #[arg(long)]
        name: Option<String>,
    },

    /// Send a test message to every enabled channel
    Test {
        /// Message text
        #[arg(long, default_value = "TrainAlert is configured correctly.")]
        message: String,
    },

    /// List enabled channels
    Channels,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// One line of the `watch` input
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Report {
    Start {
        #[serde(default)]
        config: TrainingConfig,
    },
    Metric {
        name: String,
        value: f64,
        epoch: u64,
    },
    Metrics {
        metrics: serde_json::Map<String, serde_json::Value>,
        epoch: u64,
    },
    Checkpoint {
        message: String,
        #[serde(default)]
        metrics: Option<MetricValues>,
    },
    Complete {
        #[serde(default)]
        final_metrics: Option<MetricValues>,
    },
    Error {
        message: String,
        #[serde(default)]
        trace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Watch { file, name } => run_watch(config, file, name).await,
        Commands::Test { message } => run_test(config, &message, cli.format).await,
        Commands::Channels => run_channels(&config, cli.format),
        Commands::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_watch(
    mut config: Config,
    file: Option<PathBuf>,
    name: Option<String>,
) -> anyhow::Result<()> {
    if let Some(name) = name {
        config.notifier.training_name = name;
    }
    let notifier = TrainingNotifier::from_config(&config)?;

    match file {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            watch(&notifier, BufReader::new(file)).await?;
        }
        None => watch(&notifier, BufReader::new(tokio::io::stdin())).await?,
    }

    if notifier.status() == SessionStatus::Running {
        warn!("Report stream ended while training was running");
        notifier
            .on_error("report stream ended before training completed")
            .await;
    }

    Ok(())
}

async fn watch<R>(notifier: &TrainingNotifier, reader: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let report: Report = match serde_json::from_str(line) {
            Ok(report) => report,
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping malformed report");
                continue;
            }
        };

        // Validation errors are reported and the stream continues
        if let Err(e) = apply(notifier, report).await {
            warn!(line = line_number, error = %e, "Report rejected");
        }
    }

    Ok(())
}

async fn apply(notifier: &TrainingNotifier, report: Report) -> anyhow::Result<()> {
    let outcome = match report {
        Report::Start { config } => notifier.start_training(config).await?,
        Report::Metric { name, value, epoch } => notifier.log_metric(&name, value, epoch).await?,
        Report::Metrics { metrics, epoch } => {
            let values = metrics
                .into_iter()
                .map(|(name, value)| match value.as_f64() {
                    Some(v) => Ok((name, v)),
                    None => Err(anyhow::anyhow!("metric '{name}' is not a number: {value}")),
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            notifier.log_metrics(values, epoch).await?
        }
        Report::Checkpoint { message, metrics } => notifier.checkpoint(message, metrics).await?,
        Report::Complete { final_metrics } => notifier.training_complete(final_metrics).await?,
        Report::Error { message, trace } => {
            let failure = match trace {
                Some(trace) => TrainingFailure::new(message).with_trace(trace),
                None => TrainingFailure::new(message),
            };
            notifier.on_error(failure).await
        }
    };

    for event in &outcome.events {
        info!(event = event.kind(), "Notification event");
    }
    Ok(())
}

async fn run_test(config: Config, text: &str, format: OutputFormat) -> anyhow::Result<()> {
    let notifier = TrainingNotifier::from_config(&config)?;
    if notifier.channel_names().is_empty() {
        anyhow::bail!("no notification channels are configured");
    }

    let message = Message::new(
        format!("🔔 {} - Test", config.notifier.training_name),
        text,
    );
    let report = notifier.send(&message).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for (channel, result) in &report.results {
                match result {
                    trainalert::channels::DeliveryResult::Ok => println!("{channel:<8} ✅ sent"),
                    trainalert::channels::DeliveryResult::Failed(e) => {
                        println!("{channel:<8} ❌ {e}");
                    }
                }
            }
        }
    }

    if report.all_ok() {
        Ok(())
    } else {
        anyhow::bail!("{} channel(s) failed", report.failures().count())
    }
}

fn run_channels(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let notifier = TrainingNotifier::from_config(config)?;
    let names = notifier.channel_names();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&names)?),
        OutputFormat::Text if names.is_empty() => println!("No channels enabled"),
        OutputFormat::Text => {
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "trainalert", &mut io::stdout());
}
