//! Core types and configuration for the stream normalizer.
//!
//! This crate provides shared types used across all other crates:
//! - Raw stream-update wire types (records, market-change blocks)
//! - Normalized row types for the event and reference tables
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;
pub mod wire;

pub use config::{Config, MissingMarketIdPolicy};
pub use error::{Error, Result};
pub use types::*;
pub use wire::{
    Ladder, MarketChangeBlock, MarketDefinition, RawUpdateRecord, RunnerChange, RunnerDefinition,
};
