//! Arrow conversion for the output tables.
//!
//! Each row type maps to one flat Arrow schema. All columns are nullable,
//! timestamps are millisecond precision in UTC, and order-book ladders are
//! `List<List<Float64>>`.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Float64Builder, Int64Array, ListArray,
    ListBuilder, StringArray, TimestampMillisecondArray,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use stream_core::{
    Error, Ladder, MarketDefinitionSnapshot, MarketReference, Result, RunnerDefinitionSnapshot,
    RunnerPriceChange, RunnerReference,
};

/// A row type that can be written to and read from an Arrow record batch.
pub trait ArrowTable: Sized {
    /// Column names in schema order.
    const COLUMNS: &'static [&'static str];

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch>;

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

// Column builders

fn utf8<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn float64(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(values.collect::<Float64Array>())
}

fn int64(values: impl Iterator<Item = Option<i64>>) -> ArrayRef {
    Arc::new(values.collect::<Int64Array>())
}

fn boolean(values: impl Iterator<Item = Option<bool>>) -> ArrayRef {
    Arc::new(values.collect::<BooleanArray>())
}

fn timestamp(values: impl Iterator<Item = Option<DateTime<Utc>>>) -> ArrayRef {
    let array: TimestampMillisecondArray = values.map(|ts| ts.map(|t| t.timestamp_millis())).collect();
    Arc::new(array.with_timezone("UTC"))
}

fn ladder<'a>(values: impl Iterator<Item = Option<&'a Ladder>>) -> ArrayRef {
    let mut builder = ListBuilder::new(ListBuilder::new(Float64Builder::new()));
    for value in values {
        match value {
            Some(levels) => {
                for level in levels {
                    builder.values().values().append_slice(level);
                    builder.values().append(true);
                }
                builder.append(true);
            }
            None => builder.append(false),
        }
    }
    Arc::new(builder.finish())
}

fn batch(columns: Vec<(&str, ArrayRef)>) -> Result<RecordBatch> {
    RecordBatch::try_from_iter_with_nullable(
        columns.into_iter().map(|(name, array)| (name, array, true)),
    )
    .map_err(|e| Error::storage(e.to_string()))
}

// Column readers

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::storage(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| Error::storage(format!("unexpected type for column {name}")))
}

fn get_str(array: &StringArray, i: usize) -> Option<String> {
    array.is_valid(i).then(|| array.value(i).to_string())
}

fn get_f64(array: &Float64Array, i: usize) -> Option<f64> {
    array.is_valid(i).then(|| array.value(i))
}

fn get_i64(array: &Int64Array, i: usize) -> Option<i64> {
    array.is_valid(i).then(|| array.value(i))
}

fn get_bool(array: &BooleanArray, i: usize) -> Option<bool> {
    array.is_valid(i).then(|| array.value(i))
}

fn get_ts(array: &TimestampMillisecondArray, i: usize) -> Option<DateTime<Utc>> {
    if array.is_valid(i) {
        DateTime::from_timestamp_millis(array.value(i))
    } else {
        None
    }
}

fn get_ladder(array: &ListArray, i: usize) -> Result<Option<Ladder>> {
    if array.is_null(i) {
        return Ok(None);
    }
    let levels = array.value(i);
    let levels = levels
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| Error::storage("ladder levels are not lists"))?;

    let mut ladder = Vec::with_capacity(levels.len());
    for j in 0..levels.len() {
        let level = levels.value(j);
        let level = level
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| Error::storage("ladder level values are not float64"))?;
        ladder.push(level.values().to_vec());
    }
    Ok(Some(ladder))
}

// Tables

impl ArrowTable for MarketDefinitionSnapshot {
    const COLUMNS: &'static [&'static str] = &[
        "market_id",
        "publish_time",
        "status",
        "in_play",
        "number_of_active_runners",
        "total_matched",
        "version",
    ];

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        batch(vec![
            ("market_id", utf8(rows.iter().map(|r| r.market_id.as_deref()))),
            ("publish_time", timestamp(rows.iter().map(|r| r.publish_time))),
            ("status", utf8(rows.iter().map(|r| r.status.as_deref()))),
            ("in_play", boolean(rows.iter().map(|r| r.in_play))),
            (
                "number_of_active_runners",
                int64(rows.iter().map(|r| r.number_of_active_runners)),
            ),
            ("total_matched", float64(rows.iter().map(|r| r.total_matched))),
            ("version", int64(rows.iter().map(|r| r.version))),
        ])
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let market_id = column::<StringArray>(batch, "market_id")?;
        let publish_time = column::<TimestampMillisecondArray>(batch, "publish_time")?;
        let status = column::<StringArray>(batch, "status")?;
        let in_play = column::<BooleanArray>(batch, "in_play")?;
        let active = column::<Int64Array>(batch, "number_of_active_runners")?;
        let total_matched = column::<Float64Array>(batch, "total_matched")?;
        let version = column::<Int64Array>(batch, "version")?;

        Ok((0..batch.num_rows())
            .map(|i| MarketDefinitionSnapshot {
                market_id: get_str(market_id, i),
                publish_time: get_ts(publish_time, i),
                status: get_str(status, i),
                in_play: get_bool(in_play, i),
                number_of_active_runners: get_i64(active, i),
                total_matched: get_f64(total_matched, i),
                version: get_i64(version, i),
            })
            .collect())
    }
}

impl ArrowTable for RunnerDefinitionSnapshot {
    const COLUMNS: &'static [&'static str] = &[
        "market_id",
        "publish_time",
        "runner_id",
        "runner_name",
        "status",
        "removal_date",
    ];

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        batch(vec![
            ("market_id", utf8(rows.iter().map(|r| r.market_id.as_deref()))),
            ("publish_time", timestamp(rows.iter().map(|r| r.publish_time))),
            ("runner_id", utf8(rows.iter().map(|r| r.runner_id.as_deref()))),
            ("runner_name", utf8(rows.iter().map(|r| r.runner_name.as_deref()))),
            ("status", utf8(rows.iter().map(|r| r.status.as_deref()))),
            ("removal_date", timestamp(rows.iter().map(|r| r.removal_date))),
        ])
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let market_id = column::<StringArray>(batch, "market_id")?;
        let publish_time = column::<TimestampMillisecondArray>(batch, "publish_time")?;
        let runner_id = column::<StringArray>(batch, "runner_id")?;
        let runner_name = column::<StringArray>(batch, "runner_name")?;
        let status = column::<StringArray>(batch, "status")?;
        let removal_date = column::<TimestampMillisecondArray>(batch, "removal_date")?;

        Ok((0..batch.num_rows())
            .map(|i| RunnerDefinitionSnapshot {
                market_id: get_str(market_id, i),
                publish_time: get_ts(publish_time, i),
                runner_id: get_str(runner_id, i),
                runner_name: get_str(runner_name, i),
                status: get_str(status, i),
                removal_date: get_ts(removal_date, i),
            })
            .collect())
    }
}

impl ArrowTable for RunnerPriceChange {
    const COLUMNS: &'static [&'static str] = &[
        "market_id",
        "publish_time",
        "runner_id",
        "ltp",
        "tv",
        "batb",
        "batl",
        "spn",
        "spf",
    ];

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        batch(vec![
            ("market_id", utf8(rows.iter().map(|r| r.market_id.as_deref()))),
            ("publish_time", timestamp(rows.iter().map(|r| r.publish_time))),
            ("runner_id", utf8(rows.iter().map(|r| r.runner_id.as_deref()))),
            ("ltp", float64(rows.iter().map(|r| r.ltp))),
            ("tv", float64(rows.iter().map(|r| r.tv))),
            ("batb", ladder(rows.iter().map(|r| r.batb.as_ref()))),
            ("batl", ladder(rows.iter().map(|r| r.batl.as_ref()))),
            ("spn", float64(rows.iter().map(|r| r.spn))),
            ("spf", float64(rows.iter().map(|r| r.spf))),
        ])
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let market_id = column::<StringArray>(batch, "market_id")?;
        let publish_time = column::<TimestampMillisecondArray>(batch, "publish_time")?;
        let runner_id = column::<StringArray>(batch, "runner_id")?;
        let ltp = column::<Float64Array>(batch, "ltp")?;
        let tv = column::<Float64Array>(batch, "tv")?;
        let batb = column::<ListArray>(batch, "batb")?;
        let batl = column::<ListArray>(batch, "batl")?;
        let spn = column::<Float64Array>(batch, "spn")?;
        let spf = column::<Float64Array>(batch, "spf")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(RunnerPriceChange {
                    market_id: get_str(market_id, i),
                    publish_time: get_ts(publish_time, i),
                    runner_id: get_str(runner_id, i),
                    ltp: get_f64(ltp, i),
                    tv: get_f64(tv, i),
                    batb: get_ladder(batb, i)?,
                    batl: get_ladder(batl, i)?,
                    spn: get_f64(spn, i),
                    spf: get_f64(spf, i),
                })
            })
            .collect()
    }
}

impl ArrowTable for MarketReference {
    const COLUMNS: &'static [&'static str] = &[
        "market_id",
        "event_id",
        "event_name",
        "event_type_id",
        "market_name",
        "market_type",
        "market_time",
        "venue",
        "country_code",
        "number_of_winners",
    ];

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        batch(vec![
            ("market_id", utf8(rows.iter().map(|r| r.market_id.as_deref()))),
            ("event_id", utf8(rows.iter().map(|r| r.event_id.as_deref()))),
            ("event_name", utf8(rows.iter().map(|r| r.event_name.as_deref()))),
            ("event_type_id", utf8(rows.iter().map(|r| r.event_type_id.as_deref()))),
            ("market_name", utf8(rows.iter().map(|r| r.market_name.as_deref()))),
            ("market_type", utf8(rows.iter().map(|r| r.market_type.as_deref()))),
            ("market_time", timestamp(rows.iter().map(|r| r.market_time))),
            ("venue", utf8(rows.iter().map(|r| r.venue.as_deref()))),
            ("country_code", utf8(rows.iter().map(|r| r.country_code.as_deref()))),
            ("number_of_winners", int64(rows.iter().map(|r| r.number_of_winners))),
        ])
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let market_id = column::<StringArray>(batch, "market_id")?;
        let event_id = column::<StringArray>(batch, "event_id")?;
        let event_name = column::<StringArray>(batch, "event_name")?;
        let event_type_id = column::<StringArray>(batch, "event_type_id")?;
        let market_name = column::<StringArray>(batch, "market_name")?;
        let market_type = column::<StringArray>(batch, "market_type")?;
        let market_time = column::<TimestampMillisecondArray>(batch, "market_time")?;
        let venue = column::<StringArray>(batch, "venue")?;
        let country_code = column::<StringArray>(batch, "country_code")?;
        let winners = column::<Int64Array>(batch, "number_of_winners")?;

        Ok((0..batch.num_rows())
            .map(|i| MarketReference {
                market_id: get_str(market_id, i),
                event_id: get_str(event_id, i),
                event_name: get_str(event_name, i),
                event_type_id: get_str(event_type_id, i),
                market_name: get_str(market_name, i),
                market_type: get_str(market_type, i),
                market_time: get_ts(market_time, i),
                venue: get_str(venue, i),
                country_code: get_str(country_code, i),
                number_of_winners: get_i64(winners, i),
            })
            .collect())
    }
}

impl ArrowTable for RunnerReference {
    const COLUMNS: &'static [&'static str] = &["market_id", "runner_id", "runner_name"];

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        batch(vec![
            ("market_id", utf8(rows.iter().map(|r| r.market_id.as_deref()))),
            ("runner_id", utf8(rows.iter().map(|r| r.runner_id.as_deref()))),
            ("runner_name", utf8(rows.iter().map(|r| r.runner_name.as_deref()))),
        ])
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let market_id = column::<StringArray>(batch, "market_id")?;
        let runner_id = column::<StringArray>(batch, "runner_id")?;
        let runner_name = column::<StringArray>(batch, "runner_name")?;

        Ok((0..batch.num_rows())
            .map(|i| RunnerReference {
                market_id: get_str(market_id, i),
                runner_id: get_str(runner_id, i),
                runner_name: get_str(runner_name, i),
            })
            .collect())
    }
}
