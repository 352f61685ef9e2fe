//! `stream-normalize`: normalize monthly exchange stream dumps into Parquet tables.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stream_core::{Config, MissingMarketIdPolicy};
use stream_pipeline::{MonthOutcome, MonthProcessor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stream-normalize", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root of the `{year}/{month}/{day}/` input tree.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Root of the `{year}_{month}/` output tree.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Year to process; repeatable. Defaults to the configured years.
    #[arg(short, long = "year")]
    years: Vec<i32>,

    /// Month directory name (e.g. `Dec`); repeatable. Defaults to all months.
    #[arg(short, long = "month")]
    months: Vec<String>,

    /// Files folded per chunk within a day.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Ignore market-change blocks that carry no market id.
    #[arg(long)]
    drop_missing_market_id: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(input) = self.input {
            config.paths.raw_data_dir = input;
        }
        if let Some(output) = self.output {
            config.paths.processed_data_dir = output;
        }
        if !self.years.is_empty() {
            config.processing.years = self.years;
        }
        if !self.months.is_empty() {
            config.processing.months = self.months;
        }
        if let Some(batch_size) = self.batch_size {
            config.processing.batch_size = batch_size;
        }
        if self.drop_missing_market_id {
            config.normalize.missing_market_id = MissingMarketIdPolicy::Drop;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    let mut processor = MonthProcessor::from_config(&config)?;

    info!(
        input = %config.paths.raw_data_dir.display(),
        output = %config.paths.processed_data_dir.display(),
        "starting"
    );

    for &year in &config.processing.years {
        for month in &config.processing.months {
            match processor
                .process_month(year, month)
                .with_context(|| format!("processing {year}/{month}"))?
            {
                MonthOutcome::Completed(summary) => {
                    println!("{}", serde_json::to_string(&summary)?);
                }
                MonthOutcome::Skipped => {}
            }
        }
    }

    Ok(())
}
