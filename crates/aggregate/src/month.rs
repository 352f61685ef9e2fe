//! Per-month definition and status aggregation.
//!
//! Successive raw updates frequently re-emit an unchanged definition. Only
//! the first row of each distinct state key is kept:
//! - market snapshots are unique by (market id, status, in play, version)
//! - runner snapshots are unique by (market id, runner id, status)
//!
//! Dedup happens on insertion, which is equivalent to keep-first dedup over
//! the concatenated month and keeps memory proportional to distinct states.

use std::collections::HashSet;
use stream_core::{
    cmp_timeline, MarketDefinitionSnapshot, MarketStateKey, RunnerDefinitionSnapshot,
    RunnerStateKey,
};

/// Deduplicated and ordered definition tables for one month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthTables {
    /// Market state transitions, sorted by (market id, publish time).
    pub market_timeline: Vec<MarketDefinitionSnapshot>,
    /// Runner state transitions, sorted by (market id, publish time).
    pub runner_status: Vec<RunnerDefinitionSnapshot>,
}

/// Counters for rows seen versus rows retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub market_rows_seen: u64,
    pub market_rows_kept: u64,
    pub runner_rows_seen: u64,
    pub runner_rows_kept: u64,
}

/// Month-long accumulator for definition streams.
#[derive(Debug, Default)]
pub struct MonthAggregator {
    markets: Vec<MarketDefinitionSnapshot>,
    runners: Vec<RunnerDefinitionSnapshot>,
    market_keys: HashSet<MarketStateKey>,
    runner_keys: HashSet<RunnerStateKey>,
    stats: DedupStats,
}

impl MonthAggregator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add market snapshots in traversal order.
    pub fn add_market_definitions(
        &mut self,
        rows: impl IntoIterator<Item = MarketDefinitionSnapshot>,
    ) {
        for row in rows {
            self.stats.market_rows_seen += 1;
            if self.market_keys.insert(row.state_key()) {
                self.stats.market_rows_kept += 1;
                self.markets.push(row);
            }
        }
    }

    /// Add runner snapshots in traversal order.
    pub fn add_runner_definitions(
        &mut self,
        rows: impl IntoIterator<Item = RunnerDefinitionSnapshot>,
    ) {
        for row in rows {
            self.stats.runner_rows_seen += 1;
            if self.runner_keys.insert(row.state_key()) {
                self.stats.runner_rows_kept += 1;
                self.runners.push(row);
            }
        }
    }

    /// Seen/kept counters so far.
    pub fn stats(&self) -> DedupStats {
        self.stats
    }

    /// Consume the accumulator, returning sorted tables.
    pub fn finish(self) -> MonthTables {
        let mut market_timeline = self.markets;
        let mut runner_status = self.runners;
        market_timeline.sort_by(cmp_timeline);
        runner_status.sort_by(cmp_timeline);

        MonthTables {
            market_timeline,
            runner_status,
        }
    }
}
