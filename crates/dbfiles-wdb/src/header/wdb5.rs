//! WDB5 and WDB6 headers.
//!
//! Both carry a per-field `{size, offset}` table after the header. WDB6 adds
//! a common table whose columns extend the declared fields.

use dbfiles_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{FileLayout, FLAG_INDEX_TABLE, FLAG_SPARSE};
use crate::mapping::FieldDescriptor;
use crate::segments::{OffsetMap, Segment};
use crate::types::FormatVersion;
use crate::{Error, Result};

/// WDB5 file header; also the first 48 bytes of a WDB6 header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Wdb5Header {
    pub magic: [u8; 4],
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    /// String block size, or the offset map's absolute offset for sparse files.
    pub string_table_size: u32,
    pub table_hash: u32,
    pub layout_hash: u32,
    pub min_id: u32,
    pub max_id: u32,
    pub locale: u32,
    pub copy_table_size: u32,
    pub flags: u16,
    pub id_index: u16,
}

impl Wdb5Header {
    pub const SIZE: usize = 48;
}

/// Trailing WDB6 header fields.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Wdb6Extension {
    pub total_field_count: u32,
    pub common_data_table_size: u32,
}

/// One entry of the field table.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Wdb5FieldEntry {
    /// `32 - size` is the element width in bits.
    pub size: i16,
    /// Byte offset within the record.
    pub offset: u16,
}

impl Wdb5FieldEntry {
    /// Element width in bytes.
    pub fn element_bytes(&self) -> Result<usize> {
        let bits = 32 - i32::from(self.size);
        if bits <= 0 || bits > 64 || bits % 8 != 0 {
            let size = self.size;
            return Err(Error::structural(format!("field table declares size {size}")));
        }
        Ok(bits as usize / 8)
    }
}

/// Turn the field table into descriptors.
///
/// A field spans up to the next field's offset. The last field spans to the
/// end of the record when its elements are 4 bytes wide and is a single
/// element otherwise.
fn descriptors(entries: &[Wdb5FieldEntry], record_size: usize) -> Result<Vec<FieldDescriptor>> {
    let mut descriptors = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let element = entry.element_bytes()?;
        let offset = entry.offset as usize;
        let end = match entries.get(i + 1) {
            Some(next) => next.offset as usize,
            None if element == 4 => record_size.max(offset + element),
            None => offset + element,
        };
        if end <= offset {
            return Err(Error::structural(format!(
                "field {i} at byte {offset} does not precede the next field at byte {end}"
            )));
        }
        let span = end - offset;
        descriptors.push(FieldDescriptor {
            bit_width: (span * 8) as u32,
            ..FieldDescriptor::inline(offset * 8, element, (span / element).max(1))
        });
    }
    Ok(descriptors)
}

pub(super) fn read_layout(data: &[u8], version: FormatVersion) -> Result<FileLayout> {
    let mut reader = BinaryReader::new(data);
    let header: Wdb5Header = reader.read_struct()?;
    let extension = match version {
        FormatVersion::Wdb6 => Some(reader.read_struct::<Wdb6Extension>()?),
        _ => None,
    };

    let field_count = header.field_count as usize;
    let entries = (0..field_count)
        .map(|_| reader.read_struct::<Wdb5FieldEntry>())
        .collect::<dbfiles_common::Result<Vec<_>>>()?;

    let record_count = header.record_count as usize;
    let record_size = header.record_size as usize;
    let flags = header.flags;
    let data_start = reader.position();

    let mut layout = FileLayout::new(version, record_count, record_size);
    layout.field_count = field_count;
    layout.descriptors = descriptors(&entries, record_size)?;
    layout.table_hash = header.table_hash;
    layout.layout_hash = header.layout_hash;
    layout.min_id = header.min_id;
    layout.max_id = header.max_id;
    layout.locale = header.locale;
    layout.flags = flags;

    let mut cursor = if flags & FLAG_SPARSE != 0 {
        let map_start = header.string_table_size as usize;
        let slots = if header.max_id == 0 {
            0
        } else {
            header.max_id.saturating_sub(header.min_id) as usize + 1
        };
        if map_start < data_start {
            return Err(Error::structural(format!(
                "offset map at byte {map_start} overlaps the header ending at {data_start}"
            )));
        }
        layout.records = Segment::new(data_start, map_start - data_start);
        layout.offset_map = Segment::new(map_start, slots * OffsetMap::ENTRY_SIZE);
        layout.offset_map.end()
    } else {
        layout.records = Segment::new(data_start, record_count * record_size);
        layout.string_block = Segment::new(layout.records.end(), header.string_table_size as usize);
        layout.string_block.end()
    };

    if flags & FLAG_INDEX_TABLE != 0 {
        layout.index_table = Segment::new(cursor, record_count * 4);
        cursor = layout.index_table.end();
    } else {
        layout.id_index = Some(header.id_index as usize);
    }

    layout.copy_table = Segment::new(cursor, header.copy_table_size as usize);
    cursor = layout.copy_table.end();

    if let Some(extension) = extension {
        layout.common_table = Segment::new(cursor, extension.common_data_table_size as usize);
        let total = extension.total_field_count as usize;
        layout
            .descriptors
            .extend((field_count..total).map(|_| FieldDescriptor::common()));
    }

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompressionKind;

    fn entry(bits: i16, offset: u16) -> Wdb5FieldEntry {
        Wdb5FieldEntry {
            size: 32 - bits,
            offset,
        }
    }

    #[test]
    fn test_field_spans() {
        // u32, u8 x3, u16, then a trailing u32 array running to the record end.
        let entries = [entry(32, 0), entry(8, 4), entry(16, 7), entry(32, 9)];
        let descriptors = descriptors(&entries, 17).unwrap();

        let shape: Vec<_> = descriptors
            .iter()
            .map(|d| (d.bit_offset, d.bit_width, d.byte_size, d.cardinality))
            .collect();
        assert_eq!(
            shape,
            [(0, 32, 4, 1), (32, 24, 1, 3), (56, 16, 2, 1), (72, 64, 4, 2)]
        );
    }

    #[test]
    fn test_last_narrow_field_is_single() {
        let entries = [entry(32, 0), entry(16, 4)];
        let descriptors = descriptors(&entries, 8).unwrap();
        assert_eq!(descriptors[1].bit_width, 16);
        assert_eq!(descriptors[1].cardinality, 1);
    }

    #[test]
    fn test_invalid_field_size() {
        assert!(entry(12, 0).element_bytes().is_err());
        assert!(descriptors(&[entry(32, 4), entry(32, 4)], 8).is_err());
    }

    #[test]
    fn test_wdb6_common_descriptors() {
        let mut data = Vec::new();
        data.extend_from_slice(b"WDB6");
        for value in [1u32, 1, 4, 0, 0, 0, 1, 1, 0, 0] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let layout = read_layout(&data, FormatVersion::Wdb6).unwrap();
        assert_eq!(layout.records, Segment::new(60, 4));
        assert_eq!(layout.common_table, Segment::new(64, 4));
        assert_eq!(layout.descriptors.len(), 3);
        assert_eq!(layout.common_descriptor_count(), 2);
        assert_eq!(layout.descriptors[2].compression, CompressionKind::CommonTableSparse);
        assert_eq!(layout.id_index, Some(0));
    }
}
