//! Inference worker node.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ bootstrap ──▶ Orchestrator
//!                                     │
//!              ┌──────────────────────┼──────────────────────┐
//!              ▼                      ▼                      ▼
//!        TopicWorker 1          TopicWorker 2          TopicWorker N
//!              │                      │                      │
//!              │   inference GET      │                      │
//!              └──────────────┬───────┴──────────────────────┘
//!                             ▼
//!                  Identity (one lock, one sequence)
//!                             │
//!                             ▼
//!          simulate → fee → sign → broadcast → confirm   ──▶  LCD API
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use inference_worker::blockchain::KeyPair;
use inference_worker::config::{load_config, ObservabilityConfig};
use inference_worker::lifecycle::{bootstrap, signals, Shutdown};
use inference_worker::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "inference-worker")]
#[command(about = "Serves inference topics for a single wallet", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Force debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all configured topic workers (default)
    Run,
    /// Print the wallet address derived from the seed phrase
    Address,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loaded = match load_config(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default(), cli.debug);
            tracing::error!(config = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    let config = loaded.config;

    if let Some(Commands::Address) = cli.command {
        let keys = KeyPair::from_mnemonic(&config.seed_phrase, &config.chain.address_prefix)?;
        println!("{}", keys.address());
        return Ok(());
    }

    logging::init_logging(&config.observability, cli.debug || config.debug);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        topics = config.topics.len(),
        "inference-worker starting"
    );
    for setting in &loaded.defaulted {
        tracing::warn!(
            topic_id = setting.topic_id,
            default = setting.value,
            "{} is 0, using default",
            setting.field
        );
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = match bootstrap(&config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let run = orchestrator.run(&shutdown);
    tokio::pin!(run);

    let report = tokio::select! {
        report = &mut run => report,
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            run.await
        }
    };

    for (topic_id, reason) in &report.stops {
        tracing::info!(topic_id = topic_id, reason = %reason, "Topic summary");
    }
    let failed = report.failures().count();
    if failed > 0 {
        tracing::warn!(failed = failed, topics = report.stops.len(), "Some topics stopped on a failure");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
