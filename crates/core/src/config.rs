//! Configuration structures for the stream normalizer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Month directory names, in calendar order.
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Main configuration for a normalization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations.
    pub paths: PathsConfig,
    /// File discovery and batching.
    pub processing: ProcessingConfig,
    /// Normalization policy.
    pub normalize: NormalizeConfig,
}

impl Config {
    /// Parse a configuration from TOML text. Missing sections fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.processing.batch_size == 0 {
            return Err(Error::config("processing.batch_size must be greater than zero"));
        }
        if self.processing.file_extension.trim().is_empty() {
            return Err(Error::config("processing.file_extension must not be empty"));
        }
        if let Some(month) = self
            .processing
            .months
            .iter()
            .find(|m| m.is_empty() || m.contains(['/', '\\']))
        {
            return Err(Error::config(format!("invalid month directory name: {month:?}")));
        }
        Ok(())
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the `{year}/{month}/{day}/` input tree.
    pub raw_data_dir: PathBuf,
    /// Root under which `{year}_{month}/` output folders are created.
    pub processed_data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data_dir: PathBuf::from("data/raw_data"),
            processed_data_dir: PathBuf::from("data/proc_data"),
        }
    }
}

/// File discovery and batching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Files folded per chunk within a day. Bounds memory; never changes output.
    pub batch_size: usize,
    /// Extension (without dot) of source files searched under each day directory.
    pub file_extension: String,
    /// Years the driver iterates over.
    pub years: Vec<i32>,
    /// Month directory names the driver iterates over.
    pub months: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            file_extension: "bz2".to_string(),
            years: vec![2024, 2025],
            months: MONTHS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Normalization policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// What to do with market-change blocks that carry no market id.
    pub missing_market_id: MissingMarketIdPolicy,
}

/// Handling of market-change blocks without a market id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMarketIdPolicy {
    /// Emit rows with a null market id so malformed upstream data stays visible.
    #[default]
    Keep,
    /// Ignore the block entirely, in every table.
    Drop,
}

impl MissingMarketIdPolicy {
    /// Whether a block with the given market id takes part in processing.
    #[inline]
    pub fn admits(self, market_id: Option<&str>) -> bool {
        market_id.is_some() || self == MissingMarketIdPolicy::Keep
    }
}
