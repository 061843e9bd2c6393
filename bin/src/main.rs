//! bourse CLI binary.
//!
//! Loads a price file, prints and persists the aggregate views, then fits,
//! evaluates and persists the direction classifier and the close regressor.
//! Log output is filtered by `RUST_LOG`.

#![forbid(unsafe_code)]

mod report;
mod timer;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use bourse::{
    AggregateReport, CloseRegressor, DirectionClassifier, Loader, RunConfig, ViewWriter,
    classifier, derive_returns, regressor,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::timer::Timer;

#[derive(Parser)]
#[command(name = "bourse")]
#[command(about = "Stock-price statistics, direction classifier and close regressor", long_about = None)]
#[command(version)]
struct Cli {
    /// Delimited price file with a header row
    #[arg(default_value = "src/resources/stock_prices_.csv")]
    input: PathBuf,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bourse=info,warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(filter)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = RunConfig::load().context("failed to load configuration")?;

    let table = {
        let _t = Timer::start("load");
        let prices = Loader::new(config.date_policy)
            .load(&cli.input)
            .with_context(|| format!("failed to load {}", cli.input.display()))?;
        derive_returns(&prices)?
    };

    let aggregates = {
        let _t = Timer::start("aggregate views");
        AggregateReport::compute(&table)?
    };
    report::aggregates(&aggregates, config.show_rows);

    let writer = ViewWriter::from_flags(&config.output_root, config.write_parquet, config.write_csv);
    writer
        .persist("averages", &aggregates.date_returns)
        .context("failed to persist average returns")?;
    writer
        .persist("volatility", &aggregates.volatility)
        .context("failed to persist volatility")?;

    if table.is_empty() {
        warn!("No price records in {}; skipping both models", cli.input.display());
        return Ok(());
    }

    {
        let _t = Timer::start("direction classifier");
        let (model, outcome) = DirectionClassifier::new(config.classifier.clone()).run(&table)?;
        let dir = config.classifier_model_dir();
        model
            .save(&dir, classifier::MODEL_KIND)
            .with_context(|| format!("failed to save classifier to {}", dir.display()))?;
        report::classifier(&outcome, config.show_rows);
    }

    {
        let _t = Timer::start("close regressor");
        let (model, outcome) = CloseRegressor::new(config.regressor.clone()).run(&table)?;
        let dir = config.regressor_model_dir();
        model
            .save(&dir, regressor::MODEL_KIND)
            .with_context(|| format!("failed to save regressor to {}", dir.display()))?;
        report::regressor(&outcome, config.show_rows);
    }

    info!("Run complete");
    Ok(())
}
