//! Month processing.
//!
//! Drives one processing unit from raw files to written tables:
//!
//! ```text
//! Empty -> Accumulating -> DayFlushed (per day) -> Deduplicated -> Written -> Reported
//!   \-> Skipped (month directory absent)
//! ```
//!
//! Files are folded one at a time: each file's records feed the reference
//! builder and normalizer, then are dropped. Price changes are buffered for
//! the current day only; definition streams and references for the month.

use crate::layout::{DayDir, InputLayout, MonthUnit};
use crate::writer::{MonthOutput, ParquetTableWriter, TableWriter};
use serde::{Deserialize, Serialize};
use stream_aggregate::{DayAggregator, MonthAggregator};
use stream_core::{Config, MissingMarketIdPolicy, Result};
use stream_ingestion::{Decoder, JsonLinesDecoder, NormalizedRows, ReferenceBuilder, StreamNormalizer};
use tracing::{debug, info, warn};

/// Lifecycle of a processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Empty,
    Accumulating,
    DayFlushed,
    Deduplicated,
    Written,
    Reported,
    Skipped,
}

/// Summary of a completed month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub year: i32,
    pub month: String,
    /// Rows in the market reference table.
    pub num_markets: usize,
    /// Rows in the runner reference table.
    pub num_runners: usize,
    /// Daily price partitions written.
    pub num_daily_files: usize,
    /// Total size of the month's output directory.
    pub output_bytes: u64,
}

/// Result of processing one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthOutcome {
    /// The month's input directory does not exist.
    Skipped,
    Completed(MonthSummary),
}

impl MonthOutcome {
    pub fn summary(&self) -> Option<&MonthSummary> {
        match self {
            MonthOutcome::Completed(summary) => Some(summary),
            MonthOutcome::Skipped => None,
        }
    }
}

/// Running state for a month being accumulated.
struct MonthState {
    references: ReferenceBuilder,
    definitions: MonthAggregator,
    daily_files: usize,
    empty_sources: usize,
}

/// Processes months of raw stream files into output tables.
pub struct MonthProcessor<D, W> {
    input: InputLayout,
    batch_size: usize,
    policy: MissingMarketIdPolicy,
    normalizer: StreamNormalizer,
    decoder: D,
    writer: W,
    state: UnitState,
}

impl MonthProcessor<JsonLinesDecoder, ParquetTableWriter> {
    /// Processor reading JSON-line sources and writing Parquet, per `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config,
            JsonLinesDecoder::new(),
            ParquetTableWriter::new(&config.paths.processed_data_dir),
        )
    }
}

impl<D: Decoder, W: TableWriter> MonthProcessor<D, W> {
    /// Create a processor with explicit decoder and writer.
    pub fn new(config: &Config, decoder: D, writer: W) -> Result<Self> {
        config.validate()?;
        let policy = config.normalize.missing_market_id;

        Ok(Self {
            input: InputLayout::new(
                &config.paths.raw_data_dir,
                config.processing.file_extension.as_str(),
            ),
            batch_size: config.processing.batch_size,
            policy,
            normalizer: StreamNormalizer::new(policy),
            decoder,
            writer,
            state: UnitState::Empty,
        })
    }

    /// State of the most recent processing unit.
    pub fn state(&self) -> UnitState {
        self.state
    }

    fn transition(&mut self, next: UnitState) {
        debug!(from = ?self.state, to = ?next, "unit state");
        self.state = next;
    }

    /// Process one month. A missing month directory is not an error.
    pub fn process_month(&mut self, year: i32, month: &str) -> Result<MonthOutcome> {
        let unit = MonthUnit::new(year, month);
        self.state = UnitState::Empty;

        let month_dir = self.input.month_dir(&unit);
        if !month_dir.is_dir() {
            info!(unit = %unit, dir = %month_dir.display(), "no input for month, skipping");
            self.transition(UnitState::Skipped);
            return Ok(MonthOutcome::Skipped);
        }

        self.writer.begin_month(&unit)?;
        let days = self.input.days(&month_dir)?;
        info!(unit = %unit, days = days.len(), "processing month");

        let mut state = MonthState {
            references: ReferenceBuilder::new(self.policy),
            definitions: MonthAggregator::new(),
            daily_files: 0,
            empty_sources: 0,
        };

        for day in &days {
            self.process_day(&unit, day, &mut state)?;
        }

        let stats = state.definitions.stats();
        let output = MonthOutput {
            references: state.references.finish(),
            definitions: state.definitions.finish(),
        };
        debug!(
            market_rows_seen = stats.market_rows_seen,
            market_rows_kept = stats.market_rows_kept,
            runner_rows_seen = stats.runner_rows_seen,
            runner_rows_kept = stats.runner_rows_kept,
            "deduplicated definition streams"
        );
        self.transition(UnitState::Deduplicated);

        self.writer.write_month_tables(&unit, &output)?;
        self.transition(UnitState::Written);

        let summary = MonthSummary {
            year,
            month: month.to_string(),
            num_markets: output.references.markets.len(),
            num_runners: output.references.runners.len(),
            num_daily_files: state.daily_files,
            output_bytes: self.writer.output_bytes(&unit),
        };
        let size_mb = summary.output_bytes as f64 / (1024.0 * 1024.0);
        info!(
            unit = %unit,
            markets = summary.num_markets,
            runners = summary.num_runners,
            daily_files = summary.num_daily_files,
            empty_sources = state.empty_sources,
            size_mb,
            "month complete"
        );
        self.transition(UnitState::Reported);

        Ok(MonthOutcome::Completed(summary))
    }

    fn process_day(&mut self, unit: &MonthUnit, day: &DayDir, state: &mut MonthState) -> Result<()> {
        self.transition(UnitState::Accumulating);

        let files = match self.input.source_files(&day.path) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %day.path.display(), error = %e, "cannot list day directory, skipping");
                return Ok(());
            }
        };

        let mut prices = DayAggregator::new();
        for (batch_no, batch) in files.chunks(self.batch_size).enumerate() {
            debug!(day = %day.name, batch = batch_no, files = batch.len(), "processing batch");

            for file in batch {
                let records = self.decoder.decode(file);
                if records.is_empty() {
                    state.empty_sources += 1;
                    continue;
                }

                let mut rows = NormalizedRows::default();
                for record in &records {
                    state.references.observe(record);
                    self.normalizer.normalize_into(record, &mut rows);
                }

                state.definitions.add_market_definitions(rows.market_definitions);
                state.definitions.add_runner_definitions(rows.runner_definitions);
                prices.add_file_rows(rows.price_changes);
            }
        }

        let contributing = prices.file_count();
        let rows = prices.flush();
        if self.writer.write_daily_prices(unit, &day.name, &rows)? {
            state.daily_files += 1;
        }
        info!(
            unit = %unit,
            day = %day.name,
            files = files.len(),
            contributing,
            price_rows = rows.len(),
            markets_seen = state.references.market_count(),
            runners_seen = state.references.runner_count(),
            "day flushed"
        );
        self.transition(UnitState::DayFlushed);
        Ok(())
    }
}

/// Process one month with the default decoder and Parquet writer.
pub fn process_month(config: &Config, year: i32, month: &str) -> Result<MonthOutcome> {
    MonthProcessor::from_config(config)?.process_month(year, month)
}
