//! Raw stream-update records as decoded from one JSON line.
//!
//! Upstream fields are loosely typed: the market-change list may be absent,
//! null, a single object or an array, ids arrive as strings or integers, and
//! starting-price projections may be numeric strings such as `"NaN"`. All of
//! that is resolved here, once, at deserialization time, so downstream code
//! only ever sees `Vec`s and `Option`s. A field of an unexpected type is read
//! as missing; it never costs the rest of the line.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Order-book ladder as received: a list of numeric levels, e.g. `[price, size]`.
pub type Ladder = Vec<Vec<f64>>;

/// One decoded line of a stream dump.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawUpdateRecord {
    /// Publish time in epoch milliseconds.
    #[serde(default, rename = "pt", deserialize_with = "lenient_i64")]
    pub publish_time_ms: Option<i64>,
    /// Market-change blocks; absent and null both become empty.
    #[serde(default, rename = "mc", deserialize_with = "one_or_many")]
    pub blocks: Vec<MarketChangeBlock>,
}

impl RawUpdateRecord {
    /// Publish time shared by every row derived from this record.
    pub fn publish_time(&self) -> Option<DateTime<Utc>> {
        self.publish_time_ms.and_then(DateTime::from_timestamp_millis)
    }
}

/// Changes for a single market within a record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketChangeBlock {
    /// Market id.
    #[serde(default, rename = "id", deserialize_with = "lenient_id")]
    pub market_id: Option<String>,
    /// Full market definition, when the update carries one.
    #[serde(default, rename = "marketDefinition", deserialize_with = "lenient")]
    pub definition: Option<MarketDefinition>,
    /// Runner price changes.
    #[serde(default, rename = "rc", deserialize_with = "lenient_list")]
    pub changes: Option<Vec<RunnerChange>>,
}

impl MarketChangeBlock {
    /// Market id as a borrowed string.
    #[inline]
    pub fn market_id(&self) -> Option<&str> {
        self.market_id.as_deref()
    }
}

/// Market-level definition snapshot with nested runner definitions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDefinition {
    #[serde(default, deserialize_with = "lenient_str")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub in_play: Option<bool>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub number_of_active_runners: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_matched: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub version: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub event_type_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub market_type: Option<String>,
    /// ISO-8601 scheduled start.
    #[serde(default, deserialize_with = "lenient_str")]
    pub market_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub number_of_winners: Option<i64>,
    /// Runner definitions; absent and null both become empty.
    #[serde(default, deserialize_with = "one_or_many")]
    pub runners: Vec<RunnerDefinition>,
}

/// Runner entry nested in a market definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerDefinition {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_str")]
    pub status: Option<String>,
    /// ISO-8601 removal time for withdrawn runners.
    #[serde(default, deserialize_with = "lenient_str")]
    pub removal_date: Option<String>,
}

/// One runner price-change entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunnerChange {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// Last traded price.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ltp: Option<f64>,
    /// Traded volume.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tv: Option<f64>,
    /// Best available to back.
    #[serde(default, deserialize_with = "lenient")]
    pub batb: Option<Ladder>,
    /// Best available to lay.
    #[serde(default, deserialize_with = "lenient")]
    pub batl: Option<Ladder>,
    /// Starting price, near projection.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spn: Option<f64>,
    /// Starting price, far projection.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spf: Option<f64>,
}

/// Parse an upstream ISO-8601 timestamp. Empty or unparseable input yields `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Offset-less timestamps are UTC upstream.
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// Every field helper below reads a `Value` first, so a value of the wrong
// type becomes `None` (or is left out of a list) instead of failing the line.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| T::deserialize(v).ok()))
}

fn collect_items<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| T::deserialize(item).ok())
        .collect()
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => collect_items(items),
        Some(item) => T::deserialize(item).ok().into_iter().collect(),
    })
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(collect_items(items)),
        _ => None,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(n)) => Some(match n.as_f64() {
            Some(v) if n.is_f64() && v.is_finite() && v.fract() == 0.0 => (v as i64).to_string(),
            _ => n.to_string(),
        }),
        _ => None,
    })
}

fn lenient_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let integral = |v: f64| (v.is_finite() && v.fract() == 0.0).then_some(v as i64);
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse().ok().and_then(integral))
        }
        _ => None,
    })
}
