//! Salecast - revenue and order-volume forecasting service
//!
//! Headless CLI shell around the forecast orchestrator. History is read from
//! a CSV export (`date,revenue,orders`), model artifacts persist under the
//! configured model directory, and results are printed as JSON.
//!
//! # Usage
//! ```sh
//! salecast --history data/history.csv predict --days 7 --backend ensemble
//! salecast --history data/history.csv retrain --force
//! salecast status
//! ```
//!
//! # Environment Variables
//! - `MODEL_DIR` - Directory for persisted model artifacts (default: storage/models)
//! - `HISTORY_DAYS` - Training history depth in days (default: 365)
//! - `TRAIN_TIMEOUT_SECS` - Bound on on-demand training (default: 120)

use anyhow::Result;
use clap::{Parser, Subcommand};
use salecast::application::orchestrator::ForecastOrchestrator;
use salecast::config::ForecastConfig;
use salecast::domain::types::BackendKind;
use salecast::infrastructure::{CsvHistoryProvider, FileArtifactStore};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "salecast", version, about = "Daily revenue and order forecasting")]
struct Cli {
    /// CSV file with historical `date,revenue,orders` rows
    #[arg(long, default_value = "data/history.csv")]
    history: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a forecast
    Predict {
        /// Number of days to forecast
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=365))]
        days: u32,

        /// Backend: statistical, sequence, or ensemble
        #[arg(long, default_value = "ensemble")]
        backend: BackendKind,

        /// Also print an insight summary
        #[arg(long)]
        insights: bool,
    },

    /// Retrain backends from history
    Retrain {
        /// Backends to retrain; defaults to the two trainable models
        #[arg(long, value_delimiter = ',')]
        backends: Vec<BackendKind>,

        /// Retrain even if already trained
        #[arg(long)]
        force: bool,
    },

    /// Report backend readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Salecast {} starting...", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = ForecastConfig::from_env();
    info!(
        model_dir = %config.model_dir.display(),
        history_days = config.history_days,
        "configuration loaded"
    );

    let history = Arc::new(CsvHistoryProvider::new(cli.history));
    let store = Arc::new(FileArtifactStore::new(config.model_dir.clone()));
    let orchestrator = ForecastOrchestrator::new(config, history, store);

    match cli.command {
        Command::Predict {
            days,
            backend,
            insights,
        } => {
            let forecast = orchestrator.predict(days, backend).await;
            let mut output = json!({
                "model": backend,
                "days_ahead": days,
                "generated_at": chrono::Utc::now(),
                "predictions": forecast,
            });
            if insights {
                output["insights"] = serde_json::to_value(orchestrator.get_insights(&forecast))?;
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Retrain { backends, force } => {
            let kinds = if backends.is_empty() {
                vec![BackendKind::Statistical, BackendKind::Sequence]
            } else {
                backends
            };
            let outcomes = orchestrator.retrain(&kinds, force).await;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }

        Command::Status => {
            let mut statuses = Vec::new();
            for kind in BackendKind::ALL {
                statuses.push(json!({
                    "backend": kind,
                    "ready": orchestrator.is_backend_ready(kind).await,
                    "last_trained": orchestrator.last_trained(kind).await,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
    }

    Ok(())
}
