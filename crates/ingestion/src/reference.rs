//! First-value-wins reference tables.
//!
//! Reference state is folded incrementally as records stream past, so the
//! raw records never need to be retained for the whole processing unit.
//! The first block that carries a definition for a key fixes that key's row;
//! later definitions are discarded outright, never merged into it.

use std::collections::HashSet;
use stream_core::wire::parse_timestamp;
use stream_core::{
    MarketChangeBlock, MarketReference, MissingMarketIdPolicy, RawUpdateRecord, RunnerReference,
};

/// Deduplicated reference tables for one processing unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTables {
    /// One row per market id, in first-seen order.
    pub markets: Vec<MarketReference>,
    /// One row per (market id, runner id), in first-seen order.
    pub runners: Vec<RunnerReference>,
}

/// Incremental builder for [`ReferenceTables`].
#[derive(Debug, Default)]
pub struct ReferenceBuilder {
    policy: MissingMarketIdPolicy,
    seen_markets: HashSet<Option<String>>,
    seen_runners: HashSet<(Option<String>, Option<String>)>,
    tables: ReferenceTables,
}

impl ReferenceBuilder {
    /// Create an empty builder.
    pub fn new(policy: MissingMarketIdPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Build reference tables from a complete record sequence in one call.
    pub fn build<'a, I>(policy: MissingMarketIdPolicy, records: I) -> ReferenceTables
    where
        I: IntoIterator<Item = &'a RawUpdateRecord>,
    {
        let mut builder = Self::new(policy);
        for record in records {
            builder.observe(record);
        }
        builder.finish()
    }

    /// Fold one record into the reference state.
    pub fn observe(&mut self, record: &RawUpdateRecord) {
        for block in &record.blocks {
            if self.policy.admits(block.market_id()) {
                self.observe_block(block);
            }
        }
    }

    fn observe_block(&mut self, block: &MarketChangeBlock) {
        let Some(definition) = &block.definition else {
            return;
        };

        if self.seen_markets.insert(block.market_id.clone()) {
            self.tables.markets.push(MarketReference {
                market_id: block.market_id.clone(),
                event_id: definition.event_id.clone(),
                event_name: definition.event_name.clone(),
                event_type_id: definition.event_type_id.clone(),
                market_name: definition.name.clone(),
                market_type: definition.market_type.clone(),
                market_time: parse_timestamp(definition.market_time.as_deref()),
                venue: definition.venue.clone(),
                country_code: definition.country_code.clone(),
                number_of_winners: definition.number_of_winners,
            });
        }

        for runner in &definition.runners {
            let key = (block.market_id.clone(), runner.id.clone());
            if self.seen_runners.insert(key) {
                self.tables.runners.push(RunnerReference {
                    market_id: block.market_id.clone(),
                    runner_id: runner.id.clone(),
                    runner_name: runner.name.clone(),
                });
            }
        }
    }

    /// Number of distinct markets observed so far.
    pub fn market_count(&self) -> usize {
        self.tables.markets.len()
    }

    /// Number of distinct runners observed so far.
    pub fn runner_count(&self) -> usize {
        self.tables.runners.len()
    }

    /// Consume the builder, returning the tables.
    pub fn finish(self) -> ReferenceTables {
        self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> RawUpdateRecord {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_first_value_wins() {
        let records = [
            record(
                r#"{"pt": 1, "mc": [{"id": "1.23", "marketDefinition": {
                    "eventId": "100", "eventName": "Ascot 1st Dec", "name": "R1",
                    "marketType": "WIN", "venue": "Ascot", "countryCode": "GB",
                    "marketTime": "2024-12-01T13:00:00.000Z", "numberOfWinners": 1,
                    "runners": [{"id": 10, "name": "A"}]}}]}"#,
            ),
            record(
                r#"{"pt": 2, "mc": [{"id": "1.23", "marketDefinition": {
                    "eventId": "999", "eventName": "Renamed", "name": "R1 Renamed",
                    "marketType": "PLACE", "venue": "Elsewhere", "countryCode": "IE",
                    "eventTypeId": "7", "numberOfWinners": 3,
                    "runners": [{"id": 10, "name": "A renamed"}, {"id": 11, "name": "B"}]}}]}"#,
            ),
        ];

        let tables = ReferenceBuilder::build(MissingMarketIdPolicy::Keep, &records);

        assert_eq!(tables.markets.len(), 1);
        let market = &tables.markets[0];
        assert_eq!(market.event_id.as_deref(), Some("100"));
        assert_eq!(market.event_name.as_deref(), Some("Ascot 1st Dec"));
        assert_eq!(market.market_name.as_deref(), Some("R1"));
        assert_eq!(market.market_type.as_deref(), Some("WIN"));
        assert_eq!(market.country_code.as_deref(), Some("GB"));
        assert_eq!(market.number_of_winners, Some(1));
        assert!(market.market_time.is_some());
        // Missing on first occurrence stays missing.
        assert!(market.event_type_id.is_none());

        assert_eq!(tables.runners.len(), 2);
        assert_eq!(tables.runners[0].runner_id.as_deref(), Some("10"));
        assert_eq!(tables.runners[0].runner_name.as_deref(), Some("A"));
        assert_eq!(tables.runners[1].runner_id.as_deref(), Some("11"));
        assert_eq!(tables.runners[1].runner_name.as_deref(), Some("B"));
    }

    #[test]
    fn test_runner_keys_scoped_to_market() {
        let records = [record(
            r#"{"pt": 1, "mc": [
                {"id": "1.1", "marketDefinition": {"runners": [{"id": 10, "name": "A"}]}},
                {"id": "1.2", "marketDefinition": {"runners": [{"id": 10, "name": "A2"}]}}]}"#,
        )];

        let tables = ReferenceBuilder::build(MissingMarketIdPolicy::Keep, &records);
        assert_eq!(tables.markets.len(), 2);
        assert_eq!(tables.runners.len(), 2);
        assert_eq!(tables.runners[1].market_id.as_deref(), Some("1.2"));
        assert_eq!(tables.runners[1].runner_name.as_deref(), Some("A2"));
    }

    #[test]
    fn test_change_only_blocks_ignored() {
        let records = [record(r#"{"pt": 1, "mc": [{"id": "1.1", "rc": [{"id": 1, "ltp": 2.0}]}]}"#)];
        let tables = ReferenceBuilder::build(MissingMarketIdPolicy::Keep, &records);
        assert!(tables.markets.is_empty());
        assert!(tables.runners.is_empty());
    }

    #[test]
    fn test_incremental_matches_batch() {
        let records = [
            record(r#"{"pt": 1, "mc": [{"id": "1.1", "marketDefinition": {"venue": "X", "runners": [{"id": 1}]}}]}"#),
            record(r#"{"pt": 2, "mc": [{"id": "1.2", "marketDefinition": {"venue": "Y"}}]}"#),
            record(r#"{"pt": 3, "mc": [{"id": "1.1", "marketDefinition": {"venue": "Z"}}]}"#),
        ];

        let mut builder = ReferenceBuilder::new(MissingMarketIdPolicy::Keep);
        for r in &records {
            builder.observe(r);
        }
        assert_eq!(builder.market_count(), 2);
        assert_eq!(builder.runner_count(), 1);
        assert_eq!(
            builder.finish(),
            ReferenceBuilder::build(MissingMarketIdPolicy::Keep, &records)
        );
    }

    #[test]
    fn test_missing_market_id_policy() {
        let records = [
            record(r#"{"pt": 1, "mc": [{"marketDefinition": {"venue": "first", "runners": [{"id": 1}]}}]}"#),
            record(r#"{"pt": 2, "mc": [{"marketDefinition": {"venue": "second"}}]}"#),
        ];

        let kept = ReferenceBuilder::build(MissingMarketIdPolicy::Keep, &records);
        assert_eq!(kept.markets.len(), 1);
        assert!(kept.markets[0].market_id.is_none());
        assert_eq!(kept.markets[0].venue.as_deref(), Some("first"));
        assert_eq!(kept.runners.len(), 1);

        let dropped = ReferenceBuilder::build(MissingMarketIdPolicy::Drop, &records);
        assert!(dropped.markets.is_empty());
        assert!(dropped.runners.is_empty());
    }
}
