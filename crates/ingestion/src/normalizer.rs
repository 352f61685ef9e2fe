//! Stream normalization.
//!
//! Splits each raw update record into typed rows across the three event
//! streams. Every row inherits `market_id` from its enclosing block and
//! `publish_time` from its enclosing record; neither is re-derived per row.

use stream_core::wire::parse_timestamp;
use stream_core::{
    MarketChangeBlock, MarketDefinition, MarketDefinitionSnapshot, MissingMarketIdPolicy,
    PublishTime, RawUpdateRecord, RunnerChange, RunnerDefinition, RunnerDefinitionSnapshot,
    RunnerPriceChange,
};

/// Rows produced from one or more raw records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRows {
    pub market_definitions: Vec<MarketDefinitionSnapshot>,
    pub runner_definitions: Vec<RunnerDefinitionSnapshot>,
    pub price_changes: Vec<RunnerPriceChange>,
}

impl NormalizedRows {
    /// Total number of rows across all three streams.
    pub fn len(&self) -> usize {
        self.market_definitions.len() + self.runner_definitions.len() + self.price_changes.len()
    }

    /// Whether no stream received a row.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stateless normalizer from raw records to event-stream rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamNormalizer {
    policy: MissingMarketIdPolicy,
}

impl StreamNormalizer {
    /// Create a normalizer with the given missing-market-id policy.
    pub fn new(policy: MissingMarketIdPolicy) -> Self {
        Self { policy }
    }

    /// Normalize a single record.
    pub fn normalize(&self, record: &RawUpdateRecord) -> NormalizedRows {
        let mut rows = NormalizedRows::default();
        self.normalize_into(record, &mut rows);
        rows
    }

    /// Normalize a sequence of records in order.
    pub fn normalize_all<'a, I>(&self, records: I) -> NormalizedRows
    where
        I: IntoIterator<Item = &'a RawUpdateRecord>,
    {
        let mut rows = NormalizedRows::default();
        for record in records {
            self.normalize_into(record, &mut rows);
        }
        rows
    }

    /// Normalize a record, appending to existing buffers.
    pub fn normalize_into(&self, record: &RawUpdateRecord, rows: &mut NormalizedRows) {
        let publish_time = record.publish_time();

        for block in &record.blocks {
            if !self.policy.admits(block.market_id()) {
                continue;
            }
            self.normalize_block(block, publish_time, rows);
        }
    }

    fn normalize_block(
        &self,
        block: &MarketChangeBlock,
        publish_time: PublishTime,
        rows: &mut NormalizedRows,
    ) {
        // Definition and change list are independent; both may fire.
        if let Some(definition) = &block.definition {
            rows.market_definitions
                .push(market_snapshot(&block.market_id, publish_time, definition));
            rows.runner_definitions.extend(
                definition
                    .runners
                    .iter()
                    .map(|runner| runner_snapshot(&block.market_id, publish_time, runner)),
            );
        }

        if let Some(changes) = &block.changes {
            rows.price_changes.extend(
                changes
                    .iter()
                    .map(|change| price_change(&block.market_id, publish_time, change)),
            );
        }
    }
}

fn market_snapshot(
    market_id: &Option<String>,
    publish_time: PublishTime,
    definition: &MarketDefinition,
) -> MarketDefinitionSnapshot {
    MarketDefinitionSnapshot {
        market_id: market_id.clone(),
        publish_time,
        status: definition.status.clone(),
        in_play: definition.in_play,
        number_of_active_runners: definition.number_of_active_runners,
        total_matched: definition.total_matched,
        version: definition.version,
    }
}

fn runner_snapshot(
    market_id: &Option<String>,
    publish_time: PublishTime,
    runner: &RunnerDefinition,
) -> RunnerDefinitionSnapshot {
    RunnerDefinitionSnapshot {
        market_id: market_id.clone(),
        publish_time,
        runner_id: runner.id.clone(),
        runner_name: runner.name.clone(),
        status: runner.status.clone(),
        removal_date: parse_timestamp(runner.removal_date.as_deref()),
    }
}

fn price_change(
    market_id: &Option<String>,
    publish_time: PublishTime,
    change: &RunnerChange,
) -> RunnerPriceChange {
    RunnerPriceChange {
        market_id: market_id.clone(),
        publish_time,
        runner_id: change.id.clone(),
        ltp: change.ltp,
        tv: change.tv,
        batb: change.batb.clone(),
        batl: change.batl.clone(),
        spn: change.spn,
        spf: change.spf,
    }
}
