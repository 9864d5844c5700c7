//! End-to-end decoding of synthetic WDBC/WDB2/WDB5/WDB6 files.

use dbfiles_wdb::segments::CommonEncoding;
use dbfiles_wdb::{
    table_record, ClientFile, ErrorKind, FieldDescriptor, FileLayout, FormatVersion, LoadOptions, PlanStyle, Segment,
};

fn put_u32(out: &mut Vec<u8>, values: &[u32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn put_u16(out: &mut Vec<u8>, values: &[u16]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// `(bits, byte offset)` per field, as stored in the WDB5 field table.
fn put_fields(out: &mut Vec<u8>, fields: &[(i16, u16)]) {
    for &(bits, offset) in fields {
        out.extend_from_slice(&(32 - bits).to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
    }
}

// ---------------------------------------------------------------
// WDBC / WDB2
// ---------------------------------------------------------------

table_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Achievement {
        #[key]
        id: u32,
        faction: i32,
        title: String,
        points: [u32; 2],
    }
}

fn wdbc_achievements() -> Vec<u8> {
    let strings = b"\0First Blood\0Explorer\0";
    let mut data = Vec::new();
    data.extend_from_slice(b"WDBC");
    put_u32(&mut data, &[2, 5, 20, strings.len() as u32]);
    put_u32(&mut data, &[6, u32::MAX, 1, 10, 0]);
    put_u32(&mut data, &[7, 1, 13, 25, 5]);
    data.extend_from_slice(strings);
    data
}

#[test]
fn wdbc_records_in_file_order() {
    let file = ClientFile::parse(wdbc_achievements()).unwrap();
    assert_eq!(file.version(), FormatVersion::Wdbc);
    assert_eq!(file.layout().plan_style(), PlanStyle::Natural);

    let rows: Vec<Achievement> = file.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        rows,
        [
            Achievement {
                id: 6,
                faction: -1,
                title: "First Blood".into(),
                points: [10, 0],
            },
            Achievement {
                id: 7,
                faction: 1,
                title: "Explorer".into(),
                points: [25, 5],
            },
        ]
    );
}

#[test]
fn wdbc_truncated_file_is_bounds_error() {
    let mut data = wdbc_achievements();
    data.truncate(30);
    let err = ClientFile::parse(data).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Bounds);
}

#[test]
fn wdbc_memory_mapped_matches_owned() {
    let path = std::env::temp_dir().join(format!("dbfiles-wdbc-{}.dbc", std::process::id()));
    std::fs::write(&path, wdbc_achievements()).unwrap();

    let mapped = ClientFile::open(&path).unwrap();
    let owned = ClientFile::open_with(
        &path,
        LoadOptions {
            memory_map: false,
            ..Default::default()
        },
    )
    .unwrap();

    let a: Achievement = mapped.decode(1).unwrap();
    let b: Achievement = owned.decode(1).unwrap();
    assert_eq!(a, b);

    drop(mapped);
    std::fs::remove_file(&path).unwrap();
}

table_record! {
    #[derive(Debug, Default, PartialEq)]
    struct Item {
        #[key]
        id: u32,
        class: u32,
        name: String,
    }
}

#[test]
fn wdb2_skips_id_lookup_arrays() {
    let strings = b"\0Sword\0";
    let mut data = Vec::new();
    data.extend_from_slice(b"WDB2");
    put_u32(&mut data, &[1, 3, 12, strings.len() as u32, 0x1234, 15595, 0, 40, 41, 0, 0]);
    put_u32(&mut data, &[0, 0]);
    put_u16(&mut data, &[0, 0]);
    put_u32(&mut data, &[40, 2, 1]);
    data.extend_from_slice(strings);

    let file = ClientFile::parse(data).unwrap();
    assert_eq!(file.layout().records.start, 60);

    let item: Item = file.decode(0).unwrap();
    assert_eq!(
        item,
        Item {
            id: 40,
            class: 2,
            name: "Sword".into(),
        }
    );
}

#[test]
fn wdb2_copy_table_duplicates_rows() {
    let strings = b"\0Sword\0";
    let mut data = Vec::new();
    data.extend_from_slice(b"WDB2");
    put_u32(&mut data, &[1, 3, 12, strings.len() as u32, 0x1234, 15595, 0, 0, 0, 0, 8]);
    put_u32(&mut data, &[40, 2, 1]);
    data.extend_from_slice(strings);
    put_u32(&mut data, &[45, 40]);

    let file = ClientFile::parse_with(
        data,
        LoadOptions {
            include_copies: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(file.segments().copies_of(40), &[45]);

    let items: Vec<Item> = file.records().collect::<Result<_, _>>().unwrap();
    let keys: Vec<_> = items.iter().map(|i| i.id).collect();
    assert_eq!(keys, [40, 45]);
    assert_eq!(items[1].name, "Sword");
}

// ---------------------------------------------------------------
// WDB5: packed columns, index table, copy table
// ---------------------------------------------------------------

table_record! {
    #[derive(Debug, Default, PartialEq)]
    struct Spell {
        #[key]
        id: u32,
        name: String,
        ranks: [u16; 2],
        level: u8,
    }
}

fn wdb5_spells() -> Vec<u8> {
    let strings = b"\0Fire\0Frost\0";
    let mut data = Vec::new();
    data.extend_from_slice(b"WDB5");
    put_u32(&mut data, &[2, 3, 9, strings.len() as u32, 0, 0, 100, 300, 0, 8]);
    put_u16(&mut data, &[0x04, 0]);
    put_fields(&mut data, &[(32, 0), (16, 4), (8, 8)]);

    for (name, ranks, level) in [(1u32, [10u16, 20], 3u8), (6, [30, 40], 7)] {
        put_u32(&mut data, &[name]);
        put_u16(&mut data, &ranks);
        data.push(level);
    }
    data.extend_from_slice(strings);
    put_u32(&mut data, &[100, 200]);
    put_u32(&mut data, &[300, 100]);
    data
}

#[test]
fn wdb5_index_table_supplies_keys() {
    let file = ClientFile::parse(wdb5_spells()).unwrap();
    assert!(file.layout().key_out_of_line());
    assert_eq!(file.layout().plan_style(), PlanStyle::Packed);

    let second: Spell = file.decode(1).unwrap();
    assert_eq!(
        second,
        Spell {
            id: 200,
            name: "Frost".into(),
            ranks: [30, 40],
            level: 7,
        }
    );
}

#[test]
fn wdb5_copies_follow_their_source() {
    let file = ClientFile::parse_with(
        wdb5_spells(),
        LoadOptions {
            include_copies: true,
            ..Default::default()
        },
    )
    .unwrap();

    let rows: Vec<Spell> = file.records().collect::<Result<_, _>>().unwrap();
    let keys: Vec<_> = rows.iter().map(|s| s.id).collect();
    assert_eq!(keys, [100, 300, 200]);
    assert_eq!(rows[1].name, "Fire");
    assert_eq!(rows[1].ranks, rows[0].ranks);

    let without_copies = ClientFile::parse(wdb5_spells()).unwrap();
    assert_eq!(without_copies.records::<Spell>().count(), 2);
}

#[test]
fn wdb5_raw_row_reads_each_column() {
    let file = ClientFile::parse(wdb5_spells()).unwrap();
    assert_eq!(file.raw_row(0).unwrap(), vec![vec![1], vec![10, 20], vec![3]]);
}

table_record! {
    #[derive(Debug, Default)]
    struct SpellWithoutArray {
        #[key]
        id: u32,
        name: String,
        ranks: u16,
        level: u8,
    }
}

#[test]
fn wdb5_array_mismatch_names_member() {
    let file = ClientFile::parse(wdb5_spells()).unwrap();
    let err = file.decode::<SpellWithoutArray>(0).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    assert!(err.to_string().contains("ranks"));
}

// ---------------------------------------------------------------
// WDB5: sparse storage with inline strings
// ---------------------------------------------------------------

table_record! {
    #[derive(Debug, Default, PartialEq)]
    struct Quest {
        #[key]
        id: u32,
        title: String,
        level: u8,
    }
}

#[test]
fn wdb5_sparse_records_stream_inline_strings() {
    let mut records = Vec::new();
    put_u32(&mut records, &[5]);
    records.extend_from_slice(b"Go\0");
    records.push(10);
    let second = records.len();
    put_u32(&mut records, &[7]);
    records.extend_from_slice(b"Kill\0");
    records.push(20);

    let data_start = 48 + 3 * 4;
    let map_start = data_start + records.len();

    let mut data = Vec::new();
    data.extend_from_slice(b"WDB5");
    put_u32(&mut data, &[2, 3, 10, map_start as u32, 0, 0, 5, 7, 0, 0]);
    put_u16(&mut data, &[0x01, 0]);
    put_fields(&mut data, &[(32, 0), (32, 4), (8, 8)]);
    data.extend_from_slice(&records);
    for (offset, size) in [(data_start, second), (0, 0), (data_start + second, records.len() - second)] {
        put_u32(&mut data, &[offset as u32]);
        put_u16(&mut data, &[size as u16]);
    }

    let file = ClientFile::parse(data).unwrap();
    assert_eq!(file.layout().plan_style(), PlanStyle::Streamed);
    assert_eq!(file.record_count(), 2);
    assert_eq!(file.record_key(1).unwrap(), Some(7));

    let quests: Vec<Quest> = file.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        quests,
        [
            Quest {
                id: 5,
                title: "Go".into(),
                level: 10,
            },
            Quest {
                id: 7,
                title: "Kill".into(),
                level: 20,
            },
        ]
    );
    assert_eq!(file.raw_row(0).unwrap_err().kind(), ErrorKind::UnsupportedLayout);
}

// ---------------------------------------------------------------
// WDB6: common table columns
// ---------------------------------------------------------------

table_record! {
    #[derive(Debug, Default, PartialEq)]
    struct Gear {
        #[key]
        id: u32,
        quality: u8,
        sell_price: u32,
        flavor: i16,
    }
}

fn common_segment(slot: Option<usize>) -> Vec<u8> {
    let columns: [(u8, &[(u32, u32)]); 4] = [
        (4, &[]),
        (2, &[]),
        (4, &[(1, 500)]),
        (1, &[(2, (-7i32) as u32)]),
    ];
    let mut out = Vec::new();
    put_u32(&mut out, &[columns.len() as u32]);
    for (tag, entries) in columns {
        put_u32(&mut out, &[entries.len() as u32]);
        out.push(tag);
        let natural = match tag {
            1 => 2,
            2 => 1,
            _ => 4,
        };
        for &(key, value) in entries {
            put_u32(&mut out, &[key]);
            out.extend_from_slice(&value.to_le_bytes()[..slot.unwrap_or(natural)]);
        }
    }
    out
}

fn wdb6_gear(common: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"WDB6");
    put_u32(&mut data, &[2, 2, 5, 2, 0, 0, 1, 2, 0, 0]);
    put_u16(&mut data, &[0, 0]);
    put_u32(&mut data, &[4, common.len() as u32]);
    put_fields(&mut data, &[(32, 0), (8, 4)]);
    for (id, quality) in [(1u32, 4u8), (2, 5)] {
        put_u32(&mut data, &[id]);
        data.push(quality);
    }
    data.extend_from_slice(b"\0\0");
    data.extend_from_slice(common);
    data
}

#[test]
fn wdb6_common_columns_by_key() {
    let expected = [
        Gear {
            id: 1,
            quality: 4,
            sell_price: 500,
            flavor: 0,
        },
        Gear {
            id: 2,
            quality: 5,
            sell_price: 0,
            flavor: -7,
        },
    ];

    for (slot, encoding) in [(None, CommonEncoding::Unpacked), (Some(4), CommonEncoding::Packed)] {
        let file = ClientFile::parse(wdb6_gear(&common_segment(slot))).unwrap();
        assert_eq!(file.common().map(|c| c.encoding()), Some(encoding));

        let gear: Vec<Gear> = file.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(gear, expected);
    }
}

#[test]
fn wdb6_raw_row_includes_common_values() {
    let file = ClientFile::parse(wdb6_gear(&common_segment(None))).unwrap();
    assert_eq!(file.raw_row(0).unwrap(), vec![vec![1], vec![4], vec![500], vec![]]);
}

#[test]
fn wdb6_corrupt_common_table_fails_open() {
    let mut common = common_segment(None);
    common.push(0);
    let err = ClientFile::parse(wdb6_gear(&common)).err().unwrap();
    assert!(matches!(err.kind(), ErrorKind::SegmentIntegrity | ErrorKind::Bounds));
}

#[test]
fn wdb6_common_table_short_of_declared_columns() {
    let mut common = Vec::new();
    put_u32(&mut common, &[1, 0]);
    common.push(4);

    let err = ClientFile::parse(wdb6_gear(&common)).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    assert!(err.to_string().contains("2 common columns"));
}

// ---------------------------------------------------------------
// Caller-supplied layouts
// ---------------------------------------------------------------

table_record! {
    #[derive(Debug, Default, PartialEq)]
    struct Charm {
        #[key]
        id: u32,
        quality: u8,
        bonus: i32,
    }
}

#[test]
fn supplied_layout_with_two_byte_keys() {
    let mut data = vec![4u8, 5];
    put_u16(&mut data, &[1, 2]);
    let common_start = data.len();
    put_u32(&mut data, &[1, 1]);
    data.push(4);
    put_u16(&mut data, &[2]);
    put_u32(&mut data, &[(-9i32) as u32]);

    let mut layout = FileLayout::new(FormatVersion::Wdb6, 2, 1);
    layout.field_count = 1;
    layout.records = Segment::new(0, 2);
    layout.index_table = Segment::new(2, 4);
    layout.common_table = Segment::new(common_start, data.len() - common_start);
    layout.descriptors = vec![FieldDescriptor::inline(0, 1, 1), FieldDescriptor::common()];
    layout.key_size = 2;

    let file = ClientFile::with_layout(data, layout, LoadOptions::default()).unwrap();
    let charms: Vec<Charm> = file.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        charms,
        [
            Charm {
                id: 1,
                quality: 4,
                bonus: 0,
            },
            Charm {
                id: 2,
                quality: 5,
                bonus: -9,
            },
        ]
    );
}

table_record! {
    #[derive(Debug, Default, PartialEq)]
    struct Criteria {
        #[key]
        id: u32,
        parent: u32,
    }
}

#[test]
fn supplied_layout_reads_relationship_keys() {
    let mut data = Vec::new();
    put_u32(&mut data, &[1, 2]);
    put_u32(&mut data, &[1, 550, 550, 550, 1]);

    let mut layout = FileLayout::new(FormatVersion::Wdc1, 2, 4);
    layout.field_count = 1;
    layout.records = Segment::new(0, 8);
    layout.relationship_map = Segment::new(8, 20);
    layout.descriptors = vec![FieldDescriptor::inline(0, 4, 1)];
    layout.id_index = Some(0);

    let file = ClientFile::with_layout(data, layout, LoadOptions::default()).unwrap();
    let rows: Vec<Criteria> = file.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows, [Criteria { id: 1, parent: 0 }, Criteria { id: 2, parent: 550 }]);
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_decode_preserves_order() {
    let file = ClientFile::parse(wdbc_achievements()).unwrap();
    let parallel: Vec<Achievement> = file.par_decode().unwrap();
    let sequential: Vec<Achievement> = file.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(parallel, sequential);
}
