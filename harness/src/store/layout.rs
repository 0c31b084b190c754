//! Checkpoint object layout
//!
//! Key naming and index schema for the worker's persisted checkpoint
//! protocol. Each committed chunk is one gzip payload object plus one
//! entry in an index file; a per-partition pointer object names the newest
//! index file so a restarted worker can resume.
//!
//! Key shapes:
//!   `<namespace>/<date>/<topic>-<ppppp>-<oooooooooooo>.gz`
//!   `<namespace>/<date>/<topic>-<ppppp>-<oooooooooooo>.index.json`
//!   `<namespace>/last_chunk_index.<topic>-<ppppp>.txt`
//! with 5-digit zero-padded partitions and 12-digit zero-padded offsets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;

/// Key construction for one topic under one namespace prefix.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    pub namespace: String,
    pub topic: String,
}

impl KeyLayout {
    pub fn new(namespace: impl Into<String>, topic: impl Into<String>) -> Self {
        KeyLayout {
            namespace: namespace.into(),
            topic: topic.into(),
        }
    }

    pub fn chunk_key(&self, date: NaiveDate, partition: u32, first_offset: u64) -> String {
        format!("{}.gz", self.object_stem(date, partition, first_offset))
    }

    pub fn index_key(&self, date: NaiveDate, partition: u32, first_offset: u64) -> String {
        format!("{}.index.json", self.object_stem(date, partition, first_offset))
    }

    /// Pointer content is exactly the key of the newest index file.
    pub fn pointer_key(&self, partition: u32) -> String {
        format!(
            "{}/last_chunk_index.{}-{:05}.txt",
            self.namespace, self.topic, partition
        )
    }

    fn object_stem(&self, date: NaiveDate, partition: u32, first_offset: u64) -> String {
        format!(
            "{}/{}/{}-{:05}-{:012}",
            self.namespace,
            date.format("%Y-%m-%d"),
            self.topic,
            partition,
            first_offset
        )
    }
}

/// One committed chunk of consecutive records for one partition.
///
/// Field order is part of the wire format; strict parsing rejects any
/// unknown field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkIndexEntry {
    pub byte_length_uncompressed: u64,
    pub num_records: u64,
    pub byte_length: u64,
    pub byte_offset: u64,
    pub first_record_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkIndex {
    pub chunks: Vec<ChunkIndexEntry>,
}

impl ChunkIndex {
    /// Parse with the fixed schema; unknown fields are a protocol error.
    pub fn parse_strict(bytes: &[u8]) -> HarnessResult<ChunkIndex> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Intra-file invariants: entries ordered by strictly increasing
    /// `byte_offset`, record offsets chained contiguously.
    pub fn validate(&self) -> Result<(), String> {
        for window in self.chunks.windows(2) {
            let (prev, next) = (&window[0], &window[1]);
            if next.byte_offset <= prev.byte_offset {
                return Err(format!(
                    "byte_offset not strictly increasing: {} then {}",
                    prev.byte_offset, next.byte_offset
                ));
            }
            let expected = prev.first_record_offset + prev.num_records;
            if next.first_record_offset != expected {
                return Err(format!(
                    "record offset chain broken: expected {} but entry starts at {}",
                    expected, next.first_record_offset
                ));
            }
        }
        Ok(())
    }

    pub fn total_records(&self) -> u64 {
        self.chunks.iter().map(|c| c.num_records).sum()
    }

    pub fn total_uncompressed(&self) -> u64 {
        self.chunks.iter().map(|c| c.byte_length_uncompressed).sum()
    }

    pub fn first_record_offset(&self) -> Option<u64> {
        self.chunks.first().map(|c| c.first_record_offset)
    }

    /// The partition's next-expected offset after this file commits.
    pub fn next_record_offset(&self) -> Option<u64> {
        self.chunks.last().map(|c| c.first_record_offset + c.num_records)
    }
}

/// Cross-file invariant: a successor index file must continue exactly
/// where its predecessor left off.
pub fn chain_continues(prev: &ChunkIndex, next: &ChunkIndex) -> bool {
    match (prev.next_record_offset(), next.first_record_offset()) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 2, 29).unwrap()
    }

    fn layout() -> KeyLayout {
        KeyLayout::new("systest", "system-test")
    }

    fn entry(first: u64, num: u64, byte_offset: u64) -> ChunkIndexEntry {
        ChunkIndexEntry {
            byte_length_uncompressed: num * 29,
            num_records: num,
            byte_length: 137,
            byte_offset,
            first_record_offset: first,
        }
    }

    #[test]
    fn keys_are_zero_padded() {
        let layout = layout();
        assert_eq!(
            layout.chunk_key(date(), 0, 0),
            "systest/2016-02-29/system-test-00000-000000000000.gz"
        );
        assert_eq!(
            layout.index_key(date(), 2, 100),
            "systest/2016-02-29/system-test-00002-000000000100.index.json"
        );
        assert_eq!(
            layout.pointer_key(1),
            "systest/last_chunk_index.system-test-00001.txt"
        );
    }

    #[test]
    fn parses_the_fixed_schema() {
        let raw = br#"{"chunks":[{"byte_length_uncompressed":2890,"num_records":100,"byte_length":275,"byte_offset":0,"first_record_offset":0}]}"#;
        let index = ChunkIndex::parse_strict(raw).unwrap();
        assert_eq!(index.chunks.len(), 1);
        assert_eq!(index.total_records(), 100);
        assert_eq!(index.total_uncompressed(), 2890);
        assert_eq!(index.first_record_offset(), Some(0));
        assert_eq!(index.next_record_offset(), Some(100));
        index.validate().unwrap();
    }

    #[test]
    fn strict_parse_rejects_unknown_fields() {
        let raw = br#"{"chunks":[{"byte_length_uncompressed":1,"num_records":1,"byte_length":1,"byte_offset":0,"first_record_offset":0,"extra":true}]}"#;
        assert!(ChunkIndex::parse_strict(raw).is_err());
    }

    #[test]
    fn strict_parse_rejects_missing_fields() {
        let raw = br#"{"chunks":[{"num_records":1}]}"#;
        assert!(ChunkIndex::parse_strict(raw).is_err());
    }

    #[test]
    fn serialization_preserves_field_order() {
        let index = ChunkIndex {
            chunks: vec![entry(0, 100, 0)],
        };
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(
            json,
            r#"{"chunks":[{"byte_length_uncompressed":2900,"num_records":100,"byte_length":137,"byte_offset":0,"first_record_offset":0}]}"#
        );
    }

    #[test]
    fn validate_rejects_non_monotonic_byte_offsets() {
        let index = ChunkIndex {
            chunks: vec![entry(0, 10, 100), entry(10, 10, 100)],
        };
        assert!(index.validate().is_err());
    }

    #[test]
    fn validate_rejects_broken_offset_chains() {
        let index = ChunkIndex {
            chunks: vec![entry(0, 10, 0), entry(11, 10, 500)],
        };
        assert!(index.validate().is_err());
    }

    #[test]
    fn validate_accepts_contiguous_entries() {
        let index = ChunkIndex {
            chunks: vec![entry(0, 10, 0), entry(10, 5, 300), entry(15, 5, 450)],
        };
        index.validate().unwrap();
        assert_eq!(index.total_records(), 20);
    }

    #[test]
    fn successive_files_must_chain() {
        let first = ChunkIndex {
            chunks: vec![entry(0, 100, 0)],
        };
        let second = ChunkIndex {
            chunks: vec![entry(100, 100, 0)],
        };
        let skipped = ChunkIndex {
            chunks: vec![entry(150, 100, 0)],
        };
        assert!(chain_continues(&first, &second));
        assert!(!chain_continues(&first, &skipped));
        assert!(!chain_continues(&first, &ChunkIndex { chunks: vec![] }));
    }
}
