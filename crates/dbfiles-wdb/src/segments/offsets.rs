//! Offset map, index table, copy table and relationship map.
//!
//! These segments locate records that are not laid out at a uniform stride,
//! or carry record keys and foreign keys outside the record bytes.

use dbfiles_common::BinaryReader;
use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Number of whole `stride`-byte entries in `bytes`; a partial entry is an integrity error.
fn entry_count(segment: &'static str, bytes: &[u8], stride: usize) -> Result<usize> {
    if bytes.len() % stride != 0 {
        return Err(Error::SegmentIntegrity {
            segment,
            expected: bytes.len() / stride * stride,
            actual: bytes.len(),
        });
    }
    Ok(bytes.len() / stride)
}

/// Location of one sparse record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OffsetEntry {
    /// Record key.
    pub key: u32,
    /// Absolute file offset of the record.
    pub offset: usize,
    /// Record length in bytes.
    pub size: usize,
}

/// Per-key `(offset, size)` lookup for sparse record storage.
///
/// Slot `n` of the map belongs to key `min_id + n`; zeroed slots mark keys
/// with no record and are dropped.
#[derive(Debug, Clone, Default)]
pub struct OffsetMap {
    entries: Vec<OffsetEntry>,
    by_key: FxHashMap<u32, usize>,
}

impl OffsetMap {
    /// Size of one on-disk slot: `u32 offset, u16 size`.
    pub const ENTRY_SIZE: usize = 6;

    pub fn parse(segment: &[u8], min_id: u32) -> Result<Self> {
        let slots = entry_count("offset map", segment, Self::ENTRY_SIZE)?;
        let mut reader = BinaryReader::new(segment);

        let mut entries = Vec::with_capacity(slots);
        let mut by_key = FxHashMap::default();
        for slot in 0..slots {
            let offset = reader.read_u32()? as usize;
            let size = reader.read_u16()? as usize;
            if offset == 0 || size == 0 {
                continue;
            }
            let key = min_id.wrapping_add(slot as u32);
            by_key.insert(key, entries.len());
            entries.push(OffsetEntry { key, offset, size });
        }

        tracing::debug!(slots, records = entries.len(), "offset map loaded");
        Ok(Self { entries, by_key })
    }

    /// Build from entries already resolved by an external header reader.
    pub fn from_entries(entries: Vec<OffsetEntry>) -> Self {
        let by_key = entries.iter().enumerate().map(|(i, e)| (e.key, i)).collect();
        Self { entries, by_key }
    }

    /// Location of the record with this key.
    #[inline]
    pub fn get(&self, key: u32) -> Option<&OffsetEntry> {
        self.by_key.get(&key).map(|&i| &self.entries[i])
    }

    /// Location of the `index`-th present record, in map order.
    #[inline]
    pub fn entry(&self, index: usize) -> Option<&OffsetEntry> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }
}

/// Record keys stored outside the record bytes, one per record.
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    keys: Vec<u32>,
}

impl IndexTable {
    /// Parse `record_count` keys, each `key_size` bytes wide.
    pub fn parse(segment: &[u8], record_count: usize, key_size: usize) -> Result<Self> {
        let expected = record_count.saturating_mul(key_size);
        if segment.len() != expected {
            return Err(Error::SegmentIntegrity {
                segment: "index table",
                expected,
                actual: segment.len(),
            });
        }
        let mut reader = BinaryReader::new(segment);
        let keys = (0..record_count)
            .map(|_| reader.read_uint(key_size).map(|key| key as u32))
            .collect::<dbfiles_common::Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    #[inline]
    pub fn key(&self, index: usize) -> Option<u32> {
        self.keys.get(index).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[u32] {
        &self.keys
    }
}

/// Rows that duplicate an earlier record under a new key.
#[derive(Debug, Clone, Default)]
pub struct CopyTable {
    entries: Vec<(u32, u32)>,
    by_source: FxHashMap<u32, Vec<u32>>,
}

impl CopyTable {
    pub fn parse(segment: &[u8]) -> Result<Self> {
        let count = entry_count("copy table", segment, 8)?;
        let mut reader = BinaryReader::new(segment);

        let mut entries = Vec::with_capacity(count);
        let mut by_source: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        for _ in 0..count {
            let new_key = reader.read_u32()?;
            let source_key = reader.read_u32()?;
            entries.push((new_key, source_key));
            by_source.entry(source_key).or_default().push(new_key);
        }

        tracing::debug!(copies = count, "copy table loaded");
        Ok(Self { entries, by_source })
    }

    /// Keys of every copy made from `source_key`, in table order.
    pub fn copies_of(&self, source_key: u32) -> &[u32] {
        self.by_source.get(&source_key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(new_key, source_key)` pairs in table order.
    pub fn entries(&self) -> &[(u32, u32)] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Foreign keys attached to records by record index.
#[derive(Debug, Clone, Default)]
pub struct RelationshipMap {
    min_id: u32,
    max_id: u32,
    by_record: FxHashMap<u32, u32>,
}

impl RelationshipMap {
    const HEADER_SIZE: usize = 12;

    pub fn parse(segment: &[u8]) -> Result<Self> {
        if segment.is_empty() {
            return Ok(Self::default());
        }
        let mut reader = BinaryReader::new(segment);
        let count = reader.read_u32()? as usize;
        let min_id = reader.read_u32()?;
        let max_id = reader.read_u32()?;

        let expected = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(Self::HEADER_SIZE))
            .unwrap_or(usize::MAX);
        if expected != segment.len() {
            return Err(Error::SegmentIntegrity {
                segment: "relationship map",
                expected,
                actual: segment.len(),
            });
        }

        let mut by_record = FxHashMap::default();
        by_record.reserve(count);
        for _ in 0..count {
            let foreign_key = reader.read_u32()?;
            let record_index = reader.read_u32()?;
            by_record.insert(record_index, foreign_key);
        }

        Ok(Self {
            min_id,
            max_id,
            by_record,
        })
    }

    /// Foreign key attached to the record at `record_index`.
    #[inline]
    pub fn foreign_key(&self, record_index: u32) -> Option<u32> {
        self.by_record.get(&record_index).copied()
    }

    /// Declared `(min, max)` foreign key range.
    pub fn id_range(&self) -> (u32, u32) {
        (self.min_id, self.max_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_record.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_record.is_empty()
    }
}

/// Segments that locate records and their keys outside the fixed stride.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndexSegments {
    pub offset_map: Option<OffsetMap>,
    pub index_table: Option<IndexTable>,
    pub copy_table: Option<CopyTable>,
    pub relationships: Option<RelationshipMap>,
}

impl OffsetIndexSegments {
    /// Whether records are located through the offset map.
    #[inline]
    pub fn is_sparse(&self) -> bool {
        self.offset_map.is_some()
    }

    /// Whether record keys are stored outside the record bytes.
    #[inline]
    pub fn key_out_of_line(&self) -> bool {
        self.index_table.is_some()
    }

    /// Best known key for the `index`-th record without reading its bytes.
    pub fn record_key(&self, index: usize) -> Option<u32> {
        if let Some(table) = &self.index_table {
            return table.key(index);
        }
        self.offset_map
            .as_ref()
            .and_then(|map| map.entry(index))
            .map(|e| e.key)
    }

    /// Copy keys for a source key; empty without a copy table.
    pub fn copies_of(&self, source_key: u32) -> &[u32] {
        self.copy_table
            .as_ref()
            .map(|t| t.copies_of(source_key))
            .unwrap_or(&[])
    }

    /// Foreign key for the record at `record_index`, if a relationship map exists.
    pub fn foreign_key(&self, record_index: u32) -> Option<u32> {
        self.relationships
            .as_ref()
            .and_then(|r| r.foreign_key(record_index))
    }
}
