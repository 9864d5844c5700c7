//! Auxiliary segment readers.
//!
//! Every segment is constructed once when a file is opened and is read-only
//! afterwards, so decoded records can share them across threads.

mod common;
mod offsets;
mod strings;

pub use common::{CommonColumn, CommonEncoding, CommonTable, CommonValueType};
pub use offsets::{CopyTable, IndexTable, OffsetEntry, OffsetIndexSegments, OffsetMap, RelationshipMap};
pub use strings::StringTable;

use crate::{Error, Result};

/// A named byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Segment {
    /// Absolute offset of the first byte.
    pub start: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Segment {
    /// An absent segment.
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    #[inline]
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// Absolute offset one past the last byte.
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    /// Whether the file declares this segment at all.
    #[inline]
    pub const fn exists(&self) -> bool {
        self.len != 0
    }

    /// Borrow this segment's bytes out of the whole file.
    pub fn slice<'a>(&self, file: &'a [u8]) -> Result<&'a [u8]> {
        file.get(self.start..self.end()).ok_or(Error::Bounds {
            offset: self.start,
            needed: self.len,
            available: file.len().saturating_sub(self.start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_slice() {
        let file = [1u8, 2, 3, 4, 5];
        assert_eq!(Segment::new(1, 3).slice(&file).unwrap(), &[2, 3, 4]);
        assert!(Segment::new(3, 3).slice(&file).is_err());
        assert!(!Segment::EMPTY.exists());
        assert_eq!(Segment::new(2, 2).end(), 4);
    }
}
