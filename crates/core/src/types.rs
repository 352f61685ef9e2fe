//! Normalized row types for the output tables.

use crate::wire::Ladder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Publish timestamp (UTC). `None` when the source record carried no `pt`.
pub type PublishTime = Option<DateTime<Utc>>;

/// Market-level definition snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDefinitionSnapshot {
    pub market_id: Option<String>,
    pub publish_time: PublishTime,
    pub status: Option<String>,
    pub in_play: Option<bool>,
    pub number_of_active_runners: Option<i64>,
    pub total_matched: Option<f64>,
    /// Definition version. Used as a dedup key, not assumed to increase.
    pub version: Option<i64>,
}

/// Dedup key for market definition snapshots: one row per distinct state.
pub type MarketStateKey = (Option<String>, Option<String>, Option<bool>, Option<i64>);

impl MarketDefinitionSnapshot {
    /// Key identifying a meaningfully distinct market state.
    pub fn state_key(&self) -> MarketStateKey {
        (
            self.market_id.clone(),
            self.status.clone(),
            self.in_play,
            self.version,
        )
    }
}

/// Runner status snapshot taken from a market definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerDefinitionSnapshot {
    pub market_id: Option<String>,
    pub publish_time: PublishTime,
    pub runner_id: Option<String>,
    pub runner_name: Option<String>,
    pub status: Option<String>,
    pub removal_date: Option<DateTime<Utc>>,
}

/// Dedup key for runner snapshots.
pub type RunnerStateKey = (Option<String>, Option<String>, Option<String>);

impl RunnerDefinitionSnapshot {
    /// Key identifying a meaningfully distinct runner state.
    pub fn state_key(&self) -> RunnerStateKey {
        (
            self.market_id.clone(),
            self.runner_id.clone(),
            self.status.clone(),
        )
    }
}

/// Runner price-change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerPriceChange {
    pub market_id: Option<String>,
    pub publish_time: PublishTime,
    pub runner_id: Option<String>,
    /// Last traded price.
    pub ltp: Option<f64>,
    /// Traded volume.
    pub tv: Option<f64>,
    /// Best available to back.
    pub batb: Option<Ladder>,
    /// Best available to lay.
    pub batl: Option<Ladder>,
    /// Starting price near projection.
    pub spn: Option<f64>,
    /// Starting price far projection.
    pub spf: Option<f64>,
}

/// First-seen market metadata, one row per market id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReference {
    pub market_id: Option<String>,
    pub event_id: Option<String>,
    pub event_name: Option<String>,
    pub event_type_id: Option<String>,
    pub market_name: Option<String>,
    pub market_type: Option<String>,
    pub market_time: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub country_code: Option<String>,
    pub number_of_winners: Option<i64>,
}

/// First-seen runner metadata, one row per (market id, runner id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerReference {
    pub market_id: Option<String>,
    pub runner_id: Option<String>,
    pub runner_name: Option<String>,
}

/// Rows that carry the (market id, publish time) ordering key.
pub trait Timeline {
    fn market_id(&self) -> Option<&str>;
    fn publish_time(&self) -> PublishTime;
}

macro_rules! impl_timeline {
    ($($ty:ty),*) => {
        $(impl Timeline for $ty {
            #[inline]
            fn market_id(&self) -> Option<&str> {
                self.market_id.as_deref()
            }

            #[inline]
            fn publish_time(&self) -> PublishTime {
                self.publish_time
            }
        })*
    };
}

impl_timeline!(MarketDefinitionSnapshot, RunnerDefinitionSnapshot, RunnerPriceChange);

/// Compare two optional values with `None` ordered after every `Some`.
#[inline]
pub fn cmp_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order by (market id, publish time), nulls last in each component.
pub fn cmp_timeline<T: Timeline>(a: &T, b: &T) -> Ordering {
    cmp_nulls_last(&a.market_id(), &b.market_id())
        .then_with(|| cmp_nulls_last(&a.publish_time(), &b.publish_time()))
}
