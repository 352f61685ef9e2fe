//! Table persistence.
//!
//! [`TableWriter`] is the seam between aggregation and storage.
//! [`ParquetTableWriter`] writes the partitioned Parquet layout; empty tables
//! are never written.

use crate::layout::{
    dir_size, MonthUnit, OutputLayout, MARKET_REFERENCE_FILE, MARKET_TIMELINE_FILE,
    RUNNER_REFERENCE_FILE, RUNNER_STATUS_FILE,
};
use crate::tables::ArrowTable;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use stream_aggregate::MonthTables;
use stream_core::{Error, Result, RunnerPriceChange};
use stream_ingestion::ReferenceTables;
use tracing::debug;

/// Month-level tables flushed once per processing unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthOutput {
    pub references: ReferenceTables,
    pub definitions: MonthTables,
}

/// Destination for aggregated tables.
pub trait TableWriter {
    /// Prepare storage for a month. Called before any other write for the unit.
    fn begin_month(&mut self, unit: &MonthUnit) -> Result<()>;

    /// Persist one day's sorted price changes. Returns `false` when nothing was written.
    fn write_daily_prices(
        &mut self,
        unit: &MonthUnit,
        day: &str,
        rows: &[RunnerPriceChange],
    ) -> Result<bool>;

    /// Persist the four month-level tables, skipping empty ones.
    fn write_month_tables(&mut self, unit: &MonthUnit, output: &MonthOutput) -> Result<()>;

    /// Bytes currently stored for the month.
    fn output_bytes(&self, _unit: &MonthUnit) -> u64 {
        0
    }
}

/// Writes tables as Snappy-compressed Parquet files.
#[derive(Debug, Clone)]
pub struct ParquetTableWriter {
    layout: OutputLayout,
}

impl ParquetTableWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: OutputLayout::new(output_dir),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    fn write_table<T: ArrowTable>(&self, path: &Path, rows: &[T]) -> Result<bool> {
        if rows.is_empty() {
            return Ok(false);
        }
        write_parquet(path, rows, Compression::SNAPPY)?;
        debug!(file = %path.display(), rows = rows.len(), "wrote table");
        Ok(true)
    }
}

impl TableWriter for ParquetTableWriter {
    fn begin_month(&mut self, unit: &MonthUnit) -> Result<()> {
        fs::create_dir_all(self.layout.month_dir(unit))?;
        Ok(())
    }

    fn write_daily_prices(
        &mut self,
        unit: &MonthUnit,
        day: &str,
        rows: &[RunnerPriceChange],
    ) -> Result<bool> {
        self.write_table(&self.layout.daily_prices_file(unit, day), rows)
    }

    fn write_month_tables(&mut self, unit: &MonthUnit, output: &MonthOutput) -> Result<()> {
        let dir = self.layout.month_dir(unit);
        self.write_table(&dir.join(MARKET_REFERENCE_FILE), &output.references.markets)?;
        self.write_table(&dir.join(RUNNER_REFERENCE_FILE), &output.references.runners)?;
        self.write_table(&dir.join(MARKET_TIMELINE_FILE), &output.definitions.market_timeline)?;
        self.write_table(&dir.join(RUNNER_STATUS_FILE), &output.definitions.runner_status)?;
        Ok(())
    }

    fn output_bytes(&self, unit: &MonthUnit) -> u64 {
        dir_size(&self.layout.month_dir(unit))
    }
}

/// Write rows to a single Parquet file, creating parent directories.
pub fn write_parquet<T: ArrowTable>(path: &Path, rows: &[T], compression: Compression) -> Result<()> {
    let batch = T::to_record_batch(rows)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let props = WriterProperties::builder()
        .set_compression(compression)
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| Error::storage(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| Error::storage(e.to_string()))?;
    writer.close().map_err(|e| Error::storage(e.to_string()))?;
    Ok(())
}

/// Read every row of a Parquet file written by [`write_parquet`].
pub fn read_parquet<T: ArrowTable>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::storage(e.to_string()))?
        .build()
        .map_err(|e| Error::storage(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::storage(e.to_string()))?;
        rows.extend(T::from_record_batch(&batch)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::DateTime;
    use stream_core::{
        MarketDefinitionSnapshot, MarketReference, RunnerDefinitionSnapshot, RunnerReference,
    };

    fn ts(ms: i64) -> Option<DateTime<chrono::Utc>> {
        DateTime::from_timestamp_millis(ms)
    }

    fn month_output() -> MonthOutput {
        MonthOutput {
            references: ReferenceTables {
                markets: vec![MarketReference {
                    market_id: Some("1.23".to_string()),
                    event_id: Some("100".to_string()),
                    event_name: Some("Ascot".to_string()),
                    event_type_id: Some("7".to_string()),
                    market_name: Some("R1".to_string()),
                    market_type: Some("WIN".to_string()),
                    market_time: ts(1_733_058_000_000),
                    venue: Some("Ascot".to_string()),
                    country_code: Some("GB".to_string()),
                    number_of_winners: Some(1),
                }],
                runners: vec![RunnerReference {
                    market_id: Some("1.23".to_string()),
                    runner_id: Some("10".to_string()),
                    runner_name: Some("A".to_string()),
                }],
            },
            definitions: MonthTables {
                market_timeline: vec![MarketDefinitionSnapshot {
                    market_id: Some("1.23".to_string()),
                    publish_time: ts(1_700_000_000_000),
                    status: Some("OPEN".to_string()),
                    in_play: Some(false),
                    number_of_active_runners: Some(2),
                    total_matched: Some(100.5),
                    version: Some(1),
                }],
                runner_status: Vec::new(),
            },
        }
    }

    #[test]
    fn test_month_tables_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let unit = MonthUnit::new(2024, "Dec");
        let mut writer = ParquetTableWriter::new(dir.path());
        let output = month_output();

        writer.begin_month(&unit).unwrap();
        writer.write_month_tables(&unit, &output).unwrap();

        let month_dir = writer.layout().month_dir(&unit);
        let markets: Vec<MarketReference> =
            read_parquet(&month_dir.join(MARKET_REFERENCE_FILE)).unwrap();
        let runners: Vec<RunnerReference> =
            read_parquet(&month_dir.join(RUNNER_REFERENCE_FILE)).unwrap();
        let timeline: Vec<MarketDefinitionSnapshot> =
            read_parquet(&month_dir.join(MARKET_TIMELINE_FILE)).unwrap();

        assert_eq!(markets, output.references.markets);
        assert_eq!(runners, output.references.runners);
        assert_eq!(timeline, output.definitions.market_timeline);

        // Empty runner_status is not written.
        assert!(!month_dir.join(RUNNER_STATUS_FILE).exists());
        assert!(writer.output_bytes(&unit) > 0);
    }

    #[test]
    fn test_daily_prices_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let unit = MonthUnit::new(2024, "Dec");
        let mut writer = ParquetTableWriter::new(dir.path());
        let rows = vec![
            RunnerPriceChange {
                market_id: Some("1.23".to_string()),
                publish_time: ts(1_700_000_001_000),
                runner_id: Some("10".to_string()),
                ltp: Some(2.5),
                tv: Some(50.0),
                batb: Some(vec![vec![0.0, 2.5, 10.0]]),
                batl: Some(vec![vec![0.0, 2.6, 4.0], vec![1.0, 2.7, 8.5]]),
                spn: None,
                spf: None,
            },
            RunnerPriceChange {
                market_id: None,
                publish_time: None,
                runner_id: Some("11".to_string()),
                ltp: None,
                tv: None,
                batb: None,
                batl: None,
                spn: Some(4.2),
                spf: Some(4.0),
            },
        ];

        writer.begin_month(&unit).unwrap();
        assert!(writer.write_daily_prices(&unit, "1", &rows).unwrap());

        let path = writer.layout().daily_prices_file(&unit, "1");
        assert!(path.ends_with("2024_Dec/daily_prices/runner_prices_2024_Dec_1.parquet"));
        let back: Vec<RunnerPriceChange> = read_parquet(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_non_finite_starting_prices_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.parquet");
        let rows = vec![RunnerPriceChange {
            market_id: Some("1.23".to_string()),
            publish_time: ts(1_700_000_001_000),
            runner_id: Some("10".to_string()),
            ltp: Some(2.52),
            tv: Some(1234.75),
            batb: None,
            batl: None,
            spn: Some(f64::NAN),
            spf: Some(f64::INFINITY),
        }];

        write_parquet(&path, &rows, Compression::SNAPPY).unwrap();
        let back: Vec<RunnerPriceChange> = read_parquet(&path).unwrap();

        assert_eq!(back.len(), 1);
        assert!(back[0].spn.unwrap().is_nan());
        assert!(back[0].spf.unwrap().is_infinite());
        assert_relative_eq!(back[0].ltp.unwrap(), 2.52);
        assert_relative_eq!(back[0].tv.unwrap(), 1234.75);
        assert_eq!(back[0].runner_id, rows[0].runner_id);
    }

    #[test]
    fn test_empty_daily_prices_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let unit = MonthUnit::new(2024, "Dec");
        let mut writer = ParquetTableWriter::new(dir.path());

        writer.begin_month(&unit).unwrap();
        assert!(!writer.write_daily_prices(&unit, "2", &[]).unwrap());
        assert!(!writer.layout().daily_prices_dir(&unit).exists());
    }

    #[test]
    fn test_uncompressed_runner_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner_status.parquet");
        let rows = vec![RunnerDefinitionSnapshot {
            market_id: Some("1.23".to_string()),
            publish_time: ts(5),
            runner_id: Some("10".to_string()),
            runner_name: Some("A".to_string()),
            status: Some("REMOVED".to_string()),
            removal_date: ts(1_733_058_227_000),
        }];

        write_parquet(&path, &rows, Compression::UNCOMPRESSED).unwrap();
        let back: Vec<RunnerDefinitionSnapshot> = read_parquet(&path).unwrap();
        assert_eq!(back, rows);
    }
}
