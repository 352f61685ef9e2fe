//! Aggregation of normalized rows across files, days and a month.
//!
//! This crate handles:
//! - Per-day price-change buffering and (market id, publish time) ordering
//! - Per-month keep-first dedup of market and runner definition snapshots

pub mod day;
pub mod month;

pub use day::DayAggregator;
pub use month::{DedupStats, MonthAggregator, MonthTables};
