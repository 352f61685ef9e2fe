//! Data ingestion and normalization for the stream normalizer.
//!
//! This crate handles:
//! - Decoding compressed JSON-line sources into raw update records
//! - Splitting records into market, runner and price-change rows
//! - Folding first-value-wins market and runner reference tables

pub mod decoder;
pub mod normalizer;
pub mod reference;

pub use decoder::{Decoder, JsonLinesDecoder};
pub use normalizer::{NormalizedRows, StreamNormalizer};
pub use reference::{ReferenceBuilder, ReferenceTables};
