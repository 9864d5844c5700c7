//! Header readers.
//!
//! Every format's header is reduced to a [`FileLayout`]: the segment byte
//! ranges, field descriptors and record geometry the decoder needs. Callers
//! with their own header parser can build a `FileLayout` directly.

mod wdb2;
mod wdb5;
mod wdbc;

pub use wdb2::Wdb2Header;
pub use wdb5::{Wdb5Header, Wdb5FieldEntry, Wdb6Extension};
pub use wdbc::WdbcHeader;

use crate::mapping::FieldDescriptor;
use crate::plan::PlanStyle;
use crate::segments::Segment;
use crate::types::{CompressionKind, FormatVersion};
use crate::{Error, Result};

/// WDB5 flag: records are stored sparsely and located through an offset map.
pub const FLAG_SPARSE: u16 = 0x01;
/// WDB5 flag: record keys are stored in a separate index table.
pub const FLAG_INDEX_TABLE: u16 = 0x04;

/// Everything the decoder needs to know about a file's structure.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileLayout {
    pub version: FormatVersion,
    pub record_count: usize,
    pub field_count: usize,
    /// Fixed record stride; the largest record size for sparse files.
    pub record_size: usize,
    pub records: Segment,
    pub string_block: Segment,
    pub offset_map: Segment,
    pub index_table: Segment,
    pub copy_table: Segment,
    pub common_table: Segment,
    pub relationship_map: Segment,
    /// Physical columns; empty when the format declares none.
    pub descriptors: Vec<FieldDescriptor>,
    /// Width of the record key in bytes.
    pub key_size: usize,
    pub min_id: u32,
    pub max_id: u32,
    pub table_hash: u32,
    pub layout_hash: u32,
    pub locale: u32,
    pub flags: u16,
    /// Field holding the key when it is stored inline.
    pub id_index: Option<usize>,
}

impl FileLayout {
    /// A layout with no segments or descriptors.
    pub fn new(version: FormatVersion, record_count: usize, record_size: usize) -> Self {
        Self {
            version,
            record_count,
            field_count: 0,
            record_size,
            records: Segment::EMPTY,
            string_block: Segment::EMPTY,
            offset_map: Segment::EMPTY,
            index_table: Segment::EMPTY,
            copy_table: Segment::EMPTY,
            common_table: Segment::EMPTY,
            relationship_map: Segment::EMPTY,
            descriptors: Vec::new(),
            key_size: 4,
            min_id: 0,
            max_id: 0,
            table_hash: 0,
            layout_hash: 0,
            locale: 0,
            flags: 0,
            id_index: None,
        }
    }

    /// Whether records are located through the offset map.
    #[inline]
    pub fn is_sparse(&self) -> bool {
        self.offset_map.exists()
    }

    /// Whether record keys are stored outside the record bytes.
    #[inline]
    pub fn key_out_of_line(&self) -> bool {
        self.index_table.exists()
    }

    /// Whether string fields are offsets into a string block.
    #[inline]
    pub fn has_string_block(&self) -> bool {
        !self.is_sparse()
    }

    /// Read style for this format family.
    pub fn plan_style(&self) -> PlanStyle {
        if self.version.is_legacy() {
            PlanStyle::Natural
        } else if self.is_sparse() {
            PlanStyle::Streamed
        } else {
            PlanStyle::Packed
        }
    }

    /// Number of descriptors stored in the common table.
    pub fn common_descriptor_count(&self) -> usize {
        self.descriptors
            .iter()
            .filter(|d| d.compression == CompressionKind::CommonTableSparse)
            .count()
    }

    /// Every declared segment with its name, in file order.
    pub fn segments(&self) -> Vec<(&'static str, Segment)> {
        let mut segments: Vec<_> = [
            ("records", self.records),
            ("string block", self.string_block),
            ("offset map", self.offset_map),
            ("index table", self.index_table),
            ("copy table", self.copy_table),
            ("common table", self.common_table),
            ("relationship map", self.relationship_map),
        ]
        .into_iter()
        .filter(|(_, s)| s.exists())
        .collect();
        segments.sort_by_key(|(_, s)| s.start);
        segments
    }

    /// Check the key width is readable and every declared segment lies
    /// inside a file of `len` bytes.
    pub fn validate(&self, len: usize) -> Result<()> {
        if !(1..=4).contains(&self.key_size) {
            return Err(Error::unsupported(format!(
                "record keys must be 1 to 4 bytes wide, layout declares {}",
                self.key_size
            )));
        }
        for (name, segment) in self.segments() {
            if segment.end() > len {
                tracing::debug!(segment = name, start = segment.start, len = segment.len, "segment out of range");
                return Err(Error::Bounds {
                    offset: segment.start,
                    needed: segment.len,
                    available: len.saturating_sub(segment.start),
                });
            }
        }
        Ok(())
    }
}

/// Identify a file by its signature.
pub fn detect_version(data: &[u8]) -> Result<FormatVersion> {
    let magic: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::Bounds {
            offset: 0,
            needed: 4,
            available: data.len(),
        })?;
    FormatVersion::from_magic(magic).ok_or(Error::UnknownSignature(magic))
}

/// Read the header of a whole file and compute its layout.
pub fn read_layout(data: &[u8]) -> Result<FileLayout> {
    let version = detect_version(data)?;
    let layout = match version {
        FormatVersion::Wdbc => wdbc::read_layout(data)?,
        FormatVersion::Wdb2 => wdb2::read_layout(data)?,
        FormatVersion::Wdb5 | FormatVersion::Wdb6 => wdb5::read_layout(data, version)?,
        FormatVersion::Wdc1 | FormatVersion::Wdc2 => {
            return Err(Error::unsupported(format!(
                "{version} headers are not parsed; supply a FileLayout"
            )));
        }
    };
    layout.validate(data.len())?;

    tracing::debug!(
        version = %layout.version,
        records = layout.record_count,
        fields = layout.field_count,
        record_size = layout.record_size,
        sparse = layout.is_sparse(),
        "header read"
    );
    Ok(layout)
}
