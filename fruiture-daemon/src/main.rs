//! Fruiture collector daemon
//!
//! ```text
//! fruiture run --config fruiture.yaml        collect, summarize, predict, alert
//! fruiture estimate banana.jpg --annotated out.png
//! fruiture predict --summary data/ml_input.json
//! ```
//!
//! Logging goes through `env_logger`; `RUST_LOG` overrides the default
//! `info` level.

#![deny(unsafe_code)]

mod config;
mod runtime;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use fruiture_connectors::mqtt::publish_once;
use fruiture_core::ripeness::decode_frame;
use fruiture_core::storage::read_json;
use fruiture_core::{EstimatorStrategy, SummaryRecord};
use fruiture_ml::{status_message, ActuationCommand, Alert, FeatureVector, ModelState};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "fruiture", version, about = "Banana ripeness telemetry collector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect telemetry until interrupted
    Run {
        /// YAML configuration; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Estimate ripeness of one image file
    Estimate {
        image: PathBuf,
        #[arg(long, value_enum, default_value_t = Strategy::Segmentation)]
        strategy: Strategy,
        /// Write the annotated frame here (segmentation only)
        #[arg(long)]
        annotated: Option<PathBuf>,
    },
    /// Predict the ripening day from a summary snapshot and publish it
    Predict {
        #[arg(long, default_value = "data/ml_input.json")]
        summary: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Strategy {
    Segmentation,
    Hue,
}

impl From<Strategy> for EstimatorStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Segmentation => EstimatorStrategy::Segmentation,
            Strategy::Hue => EstimatorStrategy::Hue,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match Cli::parse().command {
        Command::Run { config } => runtime::run(load_config(config.as_deref())?).await,
        Command::Estimate {
            image,
            strategy,
            annotated,
        } => estimate(&image, strategy.into(), annotated.as_deref()),
        Command::Predict { summary, config } => predict(&load_config(config.as_deref())?, &summary).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn estimate(image: &Path, strategy: EstimatorStrategy, annotated: Option<&Path>) -> Result<()> {
    let bytes = fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    let frame = decode_frame(&bytes)?;
    let estimator = strategy.build(annotated.is_some());
    let estimate = estimator.estimate(&frame)?;

    println!("Strategy    : {}", estimator.name());
    println!("Mean colour : {}", estimate.mean_color);
    match estimate.ripeness {
        Some(ripeness) => println!("Ripeness    : {ripeness}%"),
        None => println!("Ripeness    : not measured"),
    }
    if let Some(proportions) = &estimate.proportions {
        for (class, share) in proportions.iter() {
            println!("{:<12}: {share:.1}%", class.label());
        }
    }

    match (annotated, &estimate.annotated) {
        (Some(path), Some(frame)) => {
            frame
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Annotated   : {}", path.display());
        }
        (Some(_), None) => warn!("The {} strategy produces no annotated frame", estimator.name()),
        _ => {}
    }
    Ok(())
}

/// One-shot prediction: print, publish the command and notify every chat
async fn predict(config: &Config, summary_path: &Path) -> Result<()> {
    let summary: SummaryRecord = read_json(summary_path)
        .with_context(|| format!("Failed to read {}; run the collector first", summary_path.display()))?;
    let model = ModelState::try_load(&config.summary.model_path, &config.summary.scaler_path)
        .context("Model artifacts are required for prediction")?;

    let features = FeatureVector::from_summary(&summary)?;
    let prediction = model.predict(&features)?;
    let status = status_message(prediction.day);

    println!("Predicted day : {}", prediction.day);
    println!("Status        : {status}");
    if let Some(confidence) = prediction.confidence {
        println!("Confidence    : {confidence:.3}");
    }

    match prediction.check_confidence(config.summary.min_confidence) {
        Ok(()) => {
            let command = ActuationCommand::new(&prediction, summary.timestamp);
            let payload = serde_json::to_vec(&command)?;
            match publish_once(&config.mqtt.broker, &config.mqtt.actuation_topic, payload).await {
                Ok(()) => info!("Published to {}", config.mqtt.actuation_topic),
                Err(e) => warn!("Publish to {} failed: {e}", config.mqtt.actuation_topic),
            }
        }
        Err(e) => info!("Actuation skipped: {e}"),
    }

    if let Some(notifier) = runtime::load_notifier(&config.alert.credentials) {
        let alert = Alert {
            day: prediction.day,
            status,
            timestamp: summary.timestamp,
        };
        let text = alert.markdown();
        let delivered = tokio::task::spawn_blocking(move || notifier.notify(&text)).await?;
        info!("Alert sent to {delivered} chat(s)");
    }
    Ok(())
}
