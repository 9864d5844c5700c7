//! WDB2 header.

use dbfiles_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::FileLayout;
use crate::segments::Segment;
use crate::types::FormatVersion;
use crate::Result;

/// WDB2 file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Wdb2Header {
    pub magic: [u8; 4],
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
    pub table_hash: u32,
    pub build: u32,
    pub timestamp: u32,
    pub min_id: u32,
    pub max_id: u32,
    pub locale: u32,
    pub copy_table_size: u32,
}

impl Wdb2Header {
    pub const SIZE: usize = 48;

    /// Bytes of the id lookup and string length arrays that precede the records.
    pub fn lookup_size(&self) -> usize {
        if self.max_id == 0 {
            return 0;
        }
        let span = self.max_id.saturating_sub(self.min_id) as usize + 1;
        span * (4 + 2)
    }
}

pub(super) fn read_layout(data: &[u8]) -> Result<FileLayout> {
    let mut reader = BinaryReader::new(data);
    let header: Wdb2Header = reader.read_struct()?;

    let record_count = header.record_count as usize;
    let record_size = header.record_size as usize;
    let records_start = Wdb2Header::SIZE + header.lookup_size();

    let mut layout = FileLayout::new(FormatVersion::Wdb2, record_count, record_size);
    layout.field_count = header.field_count as usize;
    layout.records = Segment::new(records_start, record_count * record_size);
    layout.string_block = Segment::new(layout.records.end(), header.string_block_size as usize);
    layout.copy_table = Segment::new(layout.string_block.end(), header.copy_table_size as usize);
    layout.table_hash = header.table_hash;
    layout.min_id = header.min_id;
    layout.max_id = header.max_id;
    layout.locale = header.locale;
    Ok(layout)
}
