//! Common table reader.
//!
//! The common table stores sparse columns after the fixed-stride record block.
//! Layout: `u32 column_count`, then per column
//! `[u32 entry_count][u8 type_tag][entry_count × (key, value)]`, where keys
//! have the record key's width.
//!
//! Two encodings exist and nothing in the file says which one is used:
//!
//! - **Unpacked**: values use their type's natural width (1, 2 or 4 bytes).
//! - **Packed**: every value occupies a 4-byte slot.
//!
//! The reader first walks the columns assuming the natural widths without
//! decoding anything. If that walk lands exactly on the end of the segment the
//! table is unpacked; otherwise it is packed. The whole table then commits to
//! that one encoding.

use dbfiles_common::BinaryReader;
use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use crate::schema::Scalar;
use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Value type declared by a common table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CommonValueType {
    /// String block offset.
    String = 0,
    /// 16-bit integer.
    Int16 = 1,
    /// 8-bit integer.
    Byte = 2,
    /// 32-bit float.
    Float = 3,
    /// 32-bit integer.
    Int32 = 4,
}

impl CommonValueType {
    /// Parse from the on-disk tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::String),
            1 => Some(Self::Int16),
            2 => Some(Self::Byte),
            3 => Some(Self::Float),
            4 => Some(Self::Int32),
            _ => None,
        }
    }

    /// Width of a value in the unpacked encoding.
    pub const fn natural_size(&self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Int16 => 2,
            Self::String | Self::Float | Self::Int32 => 4,
        }
    }
}

/// Physical encoding the table committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CommonEncoding {
    /// Every value in a 4-byte slot.
    Packed,
    /// Every value at its natural width.
    Unpacked,
}

impl CommonEncoding {
    fn value_size(&self, value_type: CommonValueType) -> usize {
        match self {
            Self::Packed => 4,
            Self::Unpacked => value_type.natural_size(),
        }
    }
}

/// One sparse column: record key to raw value bits.
#[derive(Debug, Clone)]
pub struct CommonColumn {
    value_type: CommonValueType,
    values: FxHashMap<u32, u32>,
}

impl CommonColumn {
    /// Declared value type.
    #[inline]
    pub fn value_type(&self) -> CommonValueType {
        self.value_type
    }

    /// Number of keys present in this column.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value bits for a key, zero-extended to 32 bits.
    #[inline]
    pub fn get(&self, key: u32) -> Option<u32> {
        self.values.get(&key).copied()
    }
}

/// Per-column sparse key/value maps that extend records by key.
#[derive(Debug, Clone)]
pub struct CommonTable {
    encoding: CommonEncoding,
    columns: Vec<CommonColumn>,
}

impl Default for CommonTable {
    fn default() -> Self {
        Self {
            encoding: CommonEncoding::Unpacked,
            columns: Vec::new(),
        }
    }
}

impl CommonTable {
    /// Parse the common table from its segment bytes; keys are `key_size`
    /// bytes wide.
    ///
    /// Fails with a segment integrity error when decoding does not consume the
    /// segment exactly.
    pub fn parse(segment: &[u8], key_size: usize) -> Result<Self> {
        if segment.is_empty() {
            return Ok(Self::default());
        }

        let mut reader = BinaryReader::new(segment);
        let column_count = reader.read_u32()? as usize;
        let body = reader.position();

        let encoding = if Self::fits_unpacked(reader.clone(), column_count, key_size) {
            CommonEncoding::Unpacked
        } else {
            CommonEncoding::Packed
        };

        reader.seek(body)?;
        let mut columns = Vec::with_capacity(column_count.min(segment.len() / 5));
        for index in 0..column_count {
            columns.push(Self::read_column(&mut reader, index, key_size, encoding)?);
        }

        if reader.position() != segment.len() {
            return Err(Error::SegmentIntegrity {
                segment: "common table",
                expected: segment.len(),
                actual: reader.position(),
            });
        }

        tracing::debug!(
            columns = columns.len(),
            encoding = ?encoding,
            bytes = segment.len(),
            "common table loaded"
        );

        Ok(Self { encoding, columns })
    }

    /// Walk every column assuming natural value widths, without decoding.
    ///
    /// Succeeds only if no column overruns the segment and the walk ends
    /// exactly on the segment's last byte.
    fn fits_unpacked(mut reader: BinaryReader<'_>, column_count: usize, key_size: usize) -> bool {
        for _ in 0..column_count {
            let (Ok(entry_count), Ok(tag)) = (reader.read_u32(), reader.read_u8()) else {
                return false;
            };
            let Some(value_type) = CommonValueType::from_tag(tag) else {
                return false;
            };
            let Some(span) = (entry_count as usize).checked_mul(key_size + value_type.natural_size()) else {
                return false;
            };
            if reader.skip(span).is_err() {
                return false;
            }
        }
        reader.is_empty()
    }

    fn read_column(
        reader: &mut BinaryReader<'_>,
        index: usize,
        key_size: usize,
        encoding: CommonEncoding,
    ) -> Result<CommonColumn> {
        let entry_count = reader.read_u32()? as usize;
        let tag = reader.read_u8()?;
        let value_type = CommonValueType::from_tag(tag).ok_or_else(|| {
            Error::structural(format!("common table column {index} has unknown type tag {tag}"))
        })?;
        let value_size = encoding.value_size(value_type);

        let mut values = FxHashMap::default();
        values.reserve(entry_count.min(reader.remaining() / (key_size + value_size)));
        for _ in 0..entry_count {
            let key = reader.read_uint(key_size)? as u32;
            let value = reader.read_uint(value_size)? as u32;
            values.insert(key, value);
        }

        Ok(CommonColumn { value_type, values })
    }

    /// Encoding the table committed to.
    #[inline]
    pub fn encoding(&self) -> CommonEncoding {
        self.encoding
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&CommonColumn> {
        self.columns.get(index)
    }

    #[inline]
    pub fn columns(&self) -> &[CommonColumn] {
        &self.columns
    }

    /// Raw value bits stored for `key` in `column`, if any.
    #[inline]
    pub fn raw_value(&self, column: usize, key: u32) -> Option<u32> {
        self.columns.get(column).and_then(|c| c.get(key))
    }

    /// Value stored for `key` in `column`, reinterpreted as `T`.
    ///
    /// A key missing from the column is not an error: the column is sparse and
    /// the result is `T::default()`.
    pub fn extract_value<T: Scalar>(&self, column: usize, key: u32) -> T {
        self.raw_value(column, key)
            .map(|raw| T::from_raw(u64::from(raw)))
            .unwrap_or_default()
    }
}
