//! String block reader.
//!
//! The string block is a run of null-terminated UTF-8 strings. Records refer
//! to strings by their byte offset inside the block.

use std::borrow::Cow;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Offset-keyed table of the strings in a file's string block.
///
/// Empty runs (a lone null byte) are not recorded, so offset 0 conventionally
/// resolves to the empty string.
#[derive(Debug, Default)]
pub struct StringTable {
    data: Box<[u8]>,
    entries: FxHashMap<u32, Box<str>>,
}

impl StringTable {
    /// Build the table from the raw string block.
    ///
    /// Blocks of two bytes or fewer carry no strings and produce an empty table.
    pub fn parse(block: &[u8]) -> Result<Self> {
        if block.len() <= 2 {
            return Ok(Self::default());
        }

        let mut entries = FxHashMap::default();
        entries.reserve(block.len() / 16);

        let mut offset = 0;
        while offset < block.len() {
            let start = offset;
            let null_pos = memchr::memchr(0, &block[offset..])
                .map(|p| offset + p)
                .ok_or(Error::Bounds {
                    offset: start,
                    needed: block.len() - start + 1,
                    available: block.len() - start,
                })?;

            if null_pos > start {
                let bytes = &block[start..null_pos];
                let value = match std::str::from_utf8(bytes) {
                    Ok(s) => Box::from(s),
                    Err(_) => {
                        tracing::warn!(offset = start, "string block entry is not valid UTF-8");
                        String::from_utf8_lossy(bytes).into_owned().into_boxed_str()
                    }
                };
                entries.insert(start as u32, value);
            }

            offset = null_pos + 1;
        }

        tracing::debug!(bytes = block.len(), strings = entries.len(), "string block loaded");

        Ok(Self {
            data: Box::from(block),
            entries,
        })
    }

    /// Get the string that starts exactly at `offset`.
    #[inline]
    pub fn get(&self, offset: u32) -> Option<&str> {
        self.entries.get(&offset).map(|s| &**s)
    }

    /// Resolve an offset to text, returning the empty string when nothing is there.
    ///
    /// Offsets that land inside a recorded string resolve to its suffix, which
    /// some tables use to share storage between strings.
    pub fn resolve(&self, offset: u32) -> Cow<'_, str> {
        if let Some(s) = self.get(offset) {
            return Cow::Borrowed(s);
        }

        let start = offset as usize;
        if start >= self.data.len() {
            return Cow::Borrowed("");
        }
        let tail = &self.data[start..];
        let end = memchr::memchr(0, tail).unwrap_or(tail.len());
        String::from_utf8_lossy(&tail[..end])
    }

    /// Number of recorded strings.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no strings were recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the raw block in bytes.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.data.len()
    }

    /// All entries ordered by offset.
    pub fn entries(&self) -> Vec<(u32, &str)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(&k, v)| (k, &**v)).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lone_null_is_skipped() {
        let table = StringTable::parse(b"AB\0\0C\0").unwrap();

        assert_eq!(table.entries(), vec![(0, "AB"), (3, "C")]);
        assert_eq!(table.get(2), None);
        assert_eq!(table.resolve(2), "");
    }

    #[test]
    fn test_conventional_leading_null() {
        let table = StringTable::parse(b"\0Hello\0World\0").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve(0), "");
        assert_eq!(table.resolve(1), "Hello");
        assert_eq!(table.resolve(7), "World");
    }

    #[test]
    fn test_suffix_offset_resolves() {
        let table = StringTable::parse(b"\0Sword\0").unwrap();
        assert_eq!(table.resolve(2), "word");
        assert_eq!(table.resolve(100), "");
    }

    #[test]
    fn test_tiny_block_is_empty() {
        assert!(StringTable::parse(b"").unwrap().is_empty());
        assert!(StringTable::parse(b"\0\0").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_block_fails() {
        assert!(StringTable::parse(b"\0abc").is_err());
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let table = StringTable::parse(b"\0a\xFFb\0").unwrap();
        assert_eq!(table.get(1), Some("a\u{FFFD}b"));
    }
}
