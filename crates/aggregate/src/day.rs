//! Per-day price-change aggregation.
//!
//! Collects price-change rows across every file of one day and hands them
//! back sorted by (market id, publish time). The buffer is consumed on
//! flush, so a day's rows never outlive the day.

use stream_core::{cmp_timeline, RunnerPriceChange};

/// Buffer of price-change rows for a single day.
#[derive(Debug, Default)]
pub struct DayAggregator {
    rows: Vec<RunnerPriceChange>,
    files: usize,
}

impl DayAggregator {
    /// Create an empty day buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows from one source file.
    pub fn add_file_rows(&mut self, rows: Vec<RunnerPriceChange>) {
        self.files += 1;
        self.rows.extend(rows);
    }

    /// Whether the day has produced no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of files that contributed rows.
    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Consume the buffer, returning rows sorted by (market id, publish time).
    ///
    /// The sort is stable: rows sharing a key keep their arrival order.
    pub fn flush(self) -> Vec<RunnerPriceChange> {
        let mut rows = self.rows;
        rows.sort_by(cmp_timeline);
        rows
    }
}
