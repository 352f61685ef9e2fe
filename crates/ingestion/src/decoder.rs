//! Source decoding: compressed line-delimited JSON into raw update records.

use bzip2::read::MultiBzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use stream_core::{Error, RawUpdateRecord, Result};
use tracing::{debug, warn};

/// Turns one source into raw update records.
///
/// Implementations never fail outward: an unreadable or malformed source
/// yields no records and a diagnostic.
pub trait Decoder {
    fn decode(&self, source: &Path) -> Vec<RawUpdateRecord>;
}

/// Decoder for line-delimited JSON, bzip2-compressed when the file ends in `.bz2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesDecoder;

impl JsonLinesDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decode a file, surfacing the first failure.
    pub fn try_decode(&self, source: &Path) -> Result<Vec<RawUpdateRecord>> {
        let file = File::open(source)?;
        let compressed = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));

        let reader: Box<dyn Read> = if compressed {
            Box::new(MultiBzDecoder::new(file))
        } else {
            Box::new(file)
        };

        self.decode_reader(BufReader::new(reader))
    }

    /// Decode JSON lines from any buffered reader. Blank lines are skipped.
    pub fn decode_reader<R: BufRead>(&self, reader: R) -> Result<Vec<RawUpdateRecord>> {
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .map_err(|e| Error::decode(format!("line {}: {e}", line_no + 1)))?;
            records.push(record);
        }

        Ok(records)
    }
}

impl Decoder for JsonLinesDecoder {
    fn decode(&self, source: &Path) -> Vec<RawUpdateRecord> {
        match self.try_decode(source) {
            Ok(records) => {
                debug!(file = %source.display(), records = records.len(), "decoded source");
                records
            }
            Err(e) => {
                warn!(file = %source.display(), error = %e, "skipping unreadable source");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    const LINES: &str = concat!(
        r#"{"op":"mcm","pt":1700000000000,"mc":[{"id":"1.23","marketDefinition":{"status":"OPEN","version":1}}]}"#,
        "\n",
        "\n",
        r#"{"op":"mcm","pt":1700000001000,"mc":[{"id":"1.23","rc":[{"id":10,"ltp":2.5,"tv":50}]}]}"#,
        "\n",
    );

    #[test]
    fn test_decode_reader() {
        let records = JsonLinesDecoder::new()
            .decode_reader(LINES.as_bytes())
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].publish_time_ms, Some(1_700_000_000_000));
        assert_eq!(records[1].blocks[0].market_id(), Some("1.23"));
    }

    #[test]
    fn test_decode_bz2_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.23.bz2");
        let mut encoder = BzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(LINES.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let records = JsonLinesDecoder::new().decode(&path);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_decode_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.23.jsonl");
        std::fs::write(&path, LINES).unwrap();

        let records = JsonLinesDecoder::new().decode(&path);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_mistyped_field_keeps_file() {
        let lines = concat!(
            r#"{"pt":1700000000000,"mc":[{"id":"1.23","marketDefinition":{"status":"OPEN","inPlay":false}}]}"#,
            "\n",
            r#"{"pt":1700000001000,"mc":[{"id":"1.23","rc":[{"id":10,"ltp":2.5}]}]}"#,
            "\n",
            r#"{"pt":"1700000002000","mc":[{"id":"1.23","marketDefinition":{"status":"OPEN","inPlay":"true","runners":[{"id":10,"name":7}]}}]}"#,
            "\n",
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.23.jsonl");
        std::fs::write(&path, lines).unwrap();

        let records = JsonLinesDecoder::new().decode(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].publish_time_ms, Some(1_700_000_002_000));
        let def = records[2].blocks[0].definition.as_ref().unwrap();
        assert_eq!(def.in_play, Some(true));
        assert_eq!(def.runners[0].name.as_deref(), Some("7"));
    }

    #[test]
    fn test_malformed_source_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"pt\": 1}\n{not json\n").unwrap();

        let decoder = JsonLinesDecoder::new();
        assert!(decoder.decode(&path).is_empty());
        assert!(matches!(decoder.try_decode(&path), Err(Error::Decode(_))));
    }

    #[test]
    fn test_corrupt_bz2_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.bz2");
        std::fs::write(&path, b"definitely not bzip2").unwrap();

        assert!(JsonLinesDecoder::new().decode(&path).is_empty());
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonLinesDecoder::new().decode(&dir.path().join("absent.bz2"));
        assert!(records.is_empty());
    }
}
