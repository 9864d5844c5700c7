//! WDBC header.

use dbfiles_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::FileLayout;
use crate::segments::Segment;
use crate::types::FormatVersion;
use crate::Result;

/// WDBC file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct WdbcHeader {
    pub magic: [u8; 4],
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
}

impl WdbcHeader {
    pub const SIZE: usize = 20;
}

pub(super) fn read_layout(data: &[u8]) -> Result<FileLayout> {
    let mut reader = BinaryReader::new(data);
    let header: WdbcHeader = reader.read_struct()?;

    let record_count = header.record_count as usize;
    let record_size = header.record_size as usize;

    let mut layout = FileLayout::new(FormatVersion::Wdbc, record_count, record_size);
    layout.field_count = header.field_count as usize;
    layout.records = Segment::new(WdbcHeader::SIZE, record_count * record_size);
    layout.string_block = Segment::new(layout.records.end(), header.string_block_size as usize);
    Ok(layout)
}
