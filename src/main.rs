use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hvac_optimizer::{config, repo, service, telemetry, training};
use config::Config;
use hvac_optimizer::domain::Location;
use repo::Repositories;
use service::{HvacOptimizerService, ModelService, PredictionRequest, TrainingRequest};
use serde::Serialize;
use std::path::PathBuf;
use telemetry::init_tracing;
use tracing::info;
use training::{CsvSampleSource, SampleQuery, SampleSource};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "hvac-optimizer",
    version,
    about = "Train site models and optimize HVAC schedules"
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct SiteArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a model for a site from a CSV sample export
    Train {
        #[command(flatten)]
        site: SiteArgs,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        sensor_id: Option<i64>,
        #[arg(long)]
        knowledge_id: Option<i64>,
        /// Only use the last N days of samples
        #[arg(long)]
        days_back: Option<u32>,
    },
    /// Answer a JSON prediction request
    Predict {
        /// Request file
        #[arg(long)]
        request: PathBuf,
    },
    /// One-step accuracy of the current site model on a CSV sample export
    Validate {
        #[command(flatten)]
        site: SiteArgs,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Training runs at a site, newest first
    History {
        #[command(flatten)]
        site: SiteArgs,
    },
    /// Stored models, newest first
    Models,
    /// Make a stored model the current one for its site
    Promote { model_id: Uuid },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    let repositories = Repositories::new(&cfg).await?;
    let service = HvacOptimizerService::new(repositories, cfg);

    match cli.command {
        Command::Train {
            site,
            csv,
            sensor_id,
            knowledge_id,
            days_back,
        } => {
            let request = TrainingRequest {
                latitude: site.lat,
                longitude: site.lon,
                sensor_id,
                knowledge_id,
                days_back,
            };
            info!(csv = %csv.display(), "training from CSV");
            let report = service.train(&request, &CsvSampleSource::new(csv)).await?;
            print_json(&report)?;
        }
        Command::Predict { request } => {
            let body = tokio::fs::read(&request)
                .await
                .with_context(|| format!("failed to read {}", request.display()))?;
            let request: PredictionRequest =
                serde_json::from_slice(&body).context("invalid prediction request")?;
            print_json(&service.predict(&request).await?)?;
        }
        Command::Validate { site, csv } => {
            let location = Location::new(site.lat, site.lon);
            let query = SampleQuery::new(location, None, None);
            let samples = CsvSampleSource::new(csv).fetch_training_samples(&query).await?;
            print_json(&service.validate(&location, &samples).await?)?;
        }
        Command::History { site } => {
            let location = Location::new(site.lat, site.lon);
            print_json(&service.history(&location).await?)?;
        }
        Command::Models => print_json(&service.list_models().await?)?,
        Command::Promote { model_id } => print_json(&service.promote(model_id).await?)?,
    }

    Ok(())
}
