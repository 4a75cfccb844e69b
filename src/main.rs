// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use prognosis_lib::cache::ResultCache;
use prognosis_lib::models::{PredictionResponse, PredictionType};
use prognosis_lib::orchestrator::{
    MemoryObservationSource, ObservationSource, PgObservationSource, PredictionOrchestrator,
};
use prognosis_lib::registry::ModelRegistry;
use prognosis_lib::utils::db_connect::connect;
use prognosis_lib::utils::env::load_env;
use prognosis_lib::utils::serving_config::ServingConfig;

#[derive(Parser)]
#[command(author, version, about = "Risk prediction serving", long_about = None)]
struct Cli {
    /// Read observations from a JSON file (`{subject: [records, most recent first]}`)
    /// instead of Postgres
    #[arg(long, global = true)]
    observations: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict for one subject and print the response as JSON
    Predict {
        subject: String,

        /// Forward horizon in days
        #[arg(long, default_value_t = 7)]
        window: u32,

        /// Comma-separated prediction types (default: all)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
    },
    /// Predict for many subjects concurrently
    Batch {
        /// Comma-separated subjects (default: every subject in the observations file)
        #[arg(long, value_delimiter = ',')]
        subjects: Vec<String>,

        #[arg(long, default_value_t = 7)]
        window: u32,

        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,

        /// Maximum subjects in flight
        #[arg(long, default_value_t = 8)]
        concurrency: usize,

        /// Write all responses to this file as a JSON array instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show which prediction types have a model artifact available
    Models,
    /// Drop cached predictions for a subject
    Invalidate {
        subject: String,

        /// Also delete the subject's stored observations
        #[arg(long)]
        erase: bool,
    },
}

enum Observations {
    File(MemoryObservationSource),
    Postgres(PgObservationSource),
}

impl Observations {
    async fn open(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Ok(Observations::File(MemoryObservationSource::from_file(path)?)),
            None => {
                let pool = connect().await.context("Failed to connect to observation database")?;
                Ok(Observations::Postgres(PgObservationSource::new(pool)))
            }
        }
    }

    fn source(&self) -> &dyn ObservationSource {
        match self {
            Observations::File(source) => source,
            Observations::Postgres(source) => source,
        }
    }

    async fn erase(&self, subject: &str) -> Result<u64> {
        match self {
            Observations::File(source) => Ok(source.erase(subject) as u64),
            Observations::Postgres(source) => source.erase(subject).await,
        }
    }
}

fn requested_types(types: Vec<String>) -> Vec<String> {
    if types.is_empty() {
        PredictionType::ALL.iter().map(|t| t.as_str().to_string()).collect()
    } else {
        types
    }
}

async fn build_orchestrator(config: &ServingConfig) -> PredictionOrchestrator {
    let registry = Arc::new(ModelRegistry::from_dir(config.model_dir.clone()));
    registry.initialize();
    let cache = Arc::new(ResultCache::from_config(config).await);
    PredictionOrchestrator::new(registry, cache, config.clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let cli = Cli::parse();
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let config = ServingConfig::from_env();
    config.validate().context("Invalid serving configuration")?;
    config.log_config();

    match cli.command {
        Command::Predict {
            subject,
            window,
            types,
        } => {
            let observations = Observations::open(cli.observations.as_ref()).await?;
            let orchestrator = build_orchestrator(&config).await;
            let response = orchestrator
                .predict(&subject, window, &requested_types(types), observations.source())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Batch {
            subjects,
            window,
            types,
            concurrency,
            output,
        } => {
            let observations = Observations::open(cli.observations.as_ref()).await?;
            let subjects = match (&observations, subjects.is_empty()) {
                (Observations::File(source), true) => source.subjects(),
                (Observations::Postgres(_), true) => bail!("--subjects is required when reading from Postgres"),
                (_, false) => subjects,
            };
            let orchestrator = build_orchestrator(&config).await;
            run_batch(
                &orchestrator,
                observations.source(),
                subjects,
                window,
                &requested_types(types),
                concurrency,
                output,
            )
            .await?;
        }
        Command::Models => {
            let registry = ModelRegistry::from_dir(config.model_dir.clone());
            registry.initialize();
            let available = registry.available();
            for t in PredictionType::ALL {
                let methodology = if available.iter().any(|n| n == t.model_name()) {
                    "model"
                } else {
                    "heuristic"
                };
                println!("{:<28} {}", t.as_str(), methodology);
            }
        }
        Command::Invalidate { subject, erase } => {
            if erase {
                let observations = Observations::open(cli.observations.as_ref()).await?;
                let removed = observations.erase(&subject).await?;
                info!("Erased {} observations for {}", removed, subject);
            }
            if !config.cache_backend.is_shared() {
                warn!(
                    "CACHE_BACKEND={} is not shared between processes; only the postgres cache can be invalidated from the CLI",
                    config.cache_backend.as_str()
                );
                return Ok(());
            }
            let cache = ResultCache::from_config(&config).await;
            if !cache.is_enabled() {
                warn!("Result cache is not available; nothing to invalidate");
            }
            let removed = cache.invalidate(&subject).await;
            println!("Invalidated {} cached prediction bundle(s) for {}", removed, subject);
        }
    }
    Ok(())
}

async fn run_batch(
    orchestrator: &PredictionOrchestrator,
    source: &dyn ObservationSource,
    subjects: Vec<String>,
    window: u32,
    types: &[String],
    concurrency: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();
    let pb = ProgressBar::new(subjects.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=> "),
    );
    pb.set_message("Predicting...");

    let results: Vec<(String, Result<PredictionResponse, _>)> = stream::iter(subjects)
        .map(|subject| {
            let pb = &pb;
            async move {
                let result = orchestrator.predict(&subject, window, types, source).await;
                pb.inc(1);
                (subject, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    pb.finish_with_message("Done");

    let mut responses = Vec::with_capacity(results.len());
    let mut failed = 0usize;
    for (subject, result) in results {
        match result {
            Ok(response) => responses.push(response),
            Err(e) => {
                failed += 1;
                error!("Prediction for subject {} failed: {}", subject, e);
            }
        }
    }

    let cached = responses.iter().filter(|r| r.cached).count();
    let alerts = responses
        .iter()
        .flat_map(|r| &r.predictions)
        .filter(|p| p.alert)
        .count();
    let insufficient = responses
        .iter()
        .flat_map(|r| &r.predictions)
        .filter(|p| p.is_insufficient_data())
        .count();

    match output {
        Some(path) => {
            let raw = serde_json::to_string_pretty(&responses)?;
            std::fs::write(&path, raw).context(format!("Failed to write {}", path.display()))?;
            info!("Wrote {} responses to {}", responses.len(), path.display());
        }
        None => {
            for response in &responses {
                println!("{}", serde_json::to_string(response)?);
            }
        }
    }

    let (hits, misses) = orchestrator.cache().stats();
    info!(
        "Batch complete in {:.2?}: {} succeeded ({} from cache), {} failed, {} alerts, {} insufficient-data results. Cache hits/misses: {}/{}",
        start.elapsed(),
        responses.len(),
        cached,
        failed,
        alerts,
        insufficient,
        hits,
        misses
    );
    Ok(())
}
