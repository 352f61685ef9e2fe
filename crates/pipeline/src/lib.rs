//! Month-level processing pipeline for the stream normalizer.
//!
//! This crate provides:
//! - Input tree discovery (`{year}/{month}/{day}/` source files)
//! - Arrow conversion of every output table
//! - Partitioned Parquet writing
//! - The month processor and its summary

pub mod layout;
pub mod processor;
pub mod tables;
pub mod writer;

pub use layout::{InputLayout, MonthUnit, OutputLayout};
pub use processor::{process_month, MonthOutcome, MonthProcessor, MonthSummary, UnitState};
pub use tables::ArrowTable;
pub use writer::{read_parquet, write_parquet, MonthOutput, ParquetTableWriter, TableWriter};
