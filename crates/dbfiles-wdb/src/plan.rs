//! Decoding plans.
//!
//! A [`DecodingPlan`] is compiled once per target type and file layout from a
//! [`FieldMapping`]. It is a tree of typed read operations bound to member
//! ordinals; executing it against one record's [`RecordReader`] fills one
//! target instance through its [`FieldSlot`]s.

use std::borrow::Cow;

use crate::mapping::{Binding, FieldDescriptor, FieldMapping, MappedMember};
use crate::record_reader::{sign_extend, RecordReader};
use crate::schema::{ElementType, FieldSlot, TableRecord};
use crate::segments::{CommonTable, RelationshipMap, StringTable};
use crate::types::{CompressionKind, Primitive};
use crate::{Error, Result};

/// How a format family assigns descriptors to reads. Chosen once per plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PlanStyle {
    /// Every field is read sequentially at its natural width (WDBC, WDB2).
    Natural,
    /// Fields are read at their descriptor's bit offset and width.
    Packed,
    /// Fields are read back to back at their descriptor's width; used when
    /// inline strings make later offsets record dependent.
    Streamed,
}

/// Per-plan compile settings.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub style: PlanStyle,
    /// Common table column of the first `CommonTableSparse` descriptor.
    pub common_column_base: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            style: PlanStyle::Packed,
            common_column_base: 0,
        }
    }
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// At the cursor, natural width.
    Sequential,
    /// At an absolute bit offset.
    Packed { bit_offset: usize, bit_width: u32 },
    /// At the cursor, explicit width.
    Cursor { bit_width: u32 },
    /// Common table column, by record key.
    Common { column: usize },
    /// Relationship map, by record index.
    Relationship,
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Scalar {
        ordinal: usize,
        primitive: Primitive,
        source: Source,
        /// Sign-extend from this many bits.
        sign_bits: Option<u32>,
        signed: bool,
        is_key: bool,
    },
    String {
        ordinal: usize,
        source: Source,
    },
    Array {
        ordinal: usize,
        primitive: Primitive,
        source: Source,
        count: usize,
        sign_bits: Option<u32>,
    },
    Strings {
        ordinal: usize,
        source: Source,
        count: usize,
    },
    Decode {
        ordinal: usize,
        seek: Option<usize>,
    },
    DecodeArray {
        ordinal: usize,
        seek: Option<usize>,
        count: usize,
    },
    Composite {
        ordinal: usize,
        ops: Vec<Op>,
    },
    Key {
        ordinal: usize,
    },
}

impl Op {
    fn ordinal(&self) -> usize {
        match self {
            Self::Scalar { ordinal, .. }
            | Self::String { ordinal, .. }
            | Self::Array { ordinal, .. }
            | Self::Strings { ordinal, .. }
            | Self::Decode { ordinal, .. }
            | Self::DecodeArray { ordinal, .. }
            | Self::Composite { ordinal, .. }
            | Self::Key { ordinal } => *ordinal,
        }
    }

    fn expects(&self) -> &'static str {
        match self {
            Self::Scalar { .. } | Self::Key { .. } => "scalar",
            Self::String { .. } => "string",
            Self::Array { .. } => "array",
            Self::Strings { .. } => "string array",
            Self::Decode { .. } => "self-decoding value",
            Self::DecodeArray { .. } => "self-decoding array",
            Self::Composite { .. } => "composite",
        }
    }
}

/// Read-only inputs shared by every record of a file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeContext<'a> {
    pub strings: Option<&'a StringTable>,
    pub common: Option<&'a CommonTable>,
    pub relationships: Option<&'a RelationshipMap>,
    /// Key known without reading the record (index table or offset map).
    pub key: Option<u32>,
    pub record_index: u32,
}

/// Compiled, reusable read procedure for one target type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingPlan {
    ops: Vec<Op>,
    style: PlanStyle,
    key_ordinal: Option<usize>,
}

impl DecodingPlan {
    pub fn compile(mapping: &FieldMapping, options: CompileOptions) -> Result<Self> {
        let compiler = Compiler { options };
        let ops = compiler.compile_list(&mapping.members, true)?;
        let key_ordinal = mapping
            .members
            .iter()
            .find(|m| m.member.is_key() && m.member.children().is_none())
            .map(|m| m.ordinal);

        tracing::debug!(ops = ops.len(), style = ?options.style, "decoding plan compiled");

        Ok(Self {
            ops,
            style: options.style,
            key_ordinal,
        })
    }

    #[inline]
    pub fn style(&self) -> PlanStyle {
        self.style
    }

    /// Number of top-level operations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Ordinal of the top-level key member, if the type declares one.
    #[inline]
    pub fn key_ordinal(&self) -> Option<usize> {
        self.key_ordinal
    }

    /// Decode one record into a fresh `T`.
    pub fn execute<T: TableRecord + Default>(&self, reader: &mut RecordReader<'_>, ctx: &DecodeContext<'_>) -> Result<T> {
        let mut target = T::default();
        self.execute_into(reader, ctx, &mut target)?;
        Ok(target)
    }

    /// Decode one record into an existing target.
    pub fn execute_into(
        &self,
        reader: &mut RecordReader<'_>,
        ctx: &DecodeContext<'_>,
        target: &mut dyn TableRecord,
    ) -> Result<()> {
        let mut run = Run {
            reader,
            ctx,
            key: ctx.key,
        };
        run.ops(&self.ops, target)
    }

    /// Overwrite the key member, as done for copy rows.
    pub fn set_key(&self, target: &mut dyn TableRecord, key: u32) -> Result<()> {
        let Some(ordinal) = self.key_ordinal else {
            return Ok(());
        };
        match target.slot(ordinal) {
            Some(FieldSlot::Scalar(slot)) => {
                slot.set_raw(u64::from(key));
                Ok(())
            }
            Some(other) => Err(Error::structural(format!(
                "key member {ordinal} is a {}, expected a scalar",
                other.describe()
            ))),
            None => Err(Error::structural(format!("key member {ordinal} has no slot"))),
        }
    }
}

struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    fn compile_list(&self, members: &[MappedMember], top_level: bool) -> Result<Vec<Op>> {
        members.iter().map(|m| self.compile_member(m, top_level)).collect()
    }

    fn compile_member(&self, mapped: &MappedMember, top_level: bool) -> Result<Op> {
        let member = &mapped.member;
        let ordinal = mapped.ordinal;

        let descriptor = match &mapped.binding {
            Binding::OutOfLineKey => return Ok(Op::Key { ordinal }),
            Binding::Composite(children) => {
                if member.is_array {
                    return Err(Error::unsupported(format!(
                        "member `{}` is an array of composites; implement DecodesFromReader for its element",
                        member.name
                    )));
                }
                return Ok(Op::Composite {
                    ordinal,
                    ops: self.compile_list(children, false)?,
                });
            }
            Binding::Field(descriptor) => descriptor,
        };

        if descriptor.compression == CompressionKind::PalletArray {
            return Err(Error::unsupported(format!(
                "member `{}` is stored as a pallet array",
                member.name
            )));
        }

        let source = self.source(descriptor);
        let element_bits = descriptor.element_bits();
        let count = descriptor.cardinality;

        match &member.element {
            ElementType::Primitive(primitive) => {
                let primitive = *primitive;
                if let Source::Packed { bit_width, .. } | Source::Cursor { bit_width } = source {
                    if primitive != Primitive::F32 && bit_width > primitive.bits() {
                        return Err(Error::structural(format!(
                            "member `{}` is {} but its column is {} bits wide",
                            member.name, primitive, bit_width
                        )));
                    }
                }
                let sign_bits = (member.is_signed()
                    && descriptor.compression == CompressionKind::Bitpacked
                    && element_bits < primitive.bits())
                .then_some(element_bits);

                if member.is_array {
                    self.check_inline(member.name, source)?;
                    Ok(Op::Array {
                        ordinal,
                        primitive,
                        source,
                        count,
                        sign_bits,
                    })
                } else {
                    Ok(Op::Scalar {
                        ordinal,
                        primitive,
                        source,
                        sign_bits,
                        signed: member.is_signed(),
                        is_key: top_level && member.is_key(),
                    })
                }
            }
            ElementType::String => {
                if source == Source::Relationship {
                    return Err(Error::unsupported(format!(
                        "string member `{}` cannot come from the relationship map",
                        member.name
                    )));
                }
                if member.is_array {
                    self.check_inline(member.name, source)?;
                    Ok(Op::Strings { ordinal, source, count })
                } else {
                    Ok(Op::String { ordinal, source })
                }
            }
            ElementType::SelfDecoding { .. } => {
                self.check_inline(member.name, source)?;
                let seek = match source {
                    Source::Packed { bit_offset, .. } => Some(bit_offset),
                    _ => None,
                };
                if member.is_array {
                    Ok(Op::DecodeArray { ordinal, seek, count })
                } else {
                    Ok(Op::Decode { ordinal, seek })
                }
            }
            ElementType::Composite(_) => Err(Error::structural(format!(
                "composite member `{}` is bound to a single column",
                member.name
            ))),
        }
    }

    fn source(&self, descriptor: &FieldDescriptor) -> Source {
        match descriptor.compression {
            CompressionKind::CommonTableSparse => Source::Common {
                column: self.options.common_column_base + descriptor.category_index,
            },
            CompressionKind::RelationshipData => Source::Relationship,
            _ => match self.options.style {
                PlanStyle::Natural => Source::Sequential,
                PlanStyle::Packed => Source::Packed {
                    bit_offset: descriptor.bit_offset,
                    bit_width: descriptor.element_bits(),
                },
                PlanStyle::Streamed => Source::Cursor {
                    bit_width: descriptor.element_bits(),
                },
            },
        }
    }

    fn check_inline(&self, name: &str, source: Source) -> Result<()> {
        match source {
            Source::Common { .. } | Source::Relationship => Err(Error::unsupported(format!(
                "member `{name}` needs record bytes but its column is stored out of line"
            ))),
            _ => Ok(()),
        }
    }
}

struct Run<'r, 'a, 'c> {
    reader: &'r mut RecordReader<'a>,
    ctx: &'c DecodeContext<'c>,
    key: Option<u32>,
}

impl Run<'_, '_, '_> {
    fn ops(&mut self, ops: &[Op], target: &mut dyn TableRecord) -> Result<()> {
        for op in ops {
            let slot = target
                .slot(op.ordinal())
                .ok_or_else(|| Error::structural(format!("target has no member at ordinal {}", op.ordinal())))?;

            match (op, slot) {
                (
                    Op::Scalar {
                        primitive,
                        source,
                        sign_bits,
                        signed,
                        is_key,
                        ..
                    },
                    FieldSlot::Scalar(slot),
                ) if slot.primitive() == *primitive => {
                    let mut raw = self.scalar(*primitive, *source, *signed)?;
                    if let Some(bits) = sign_bits {
                        raw = sign_extend(raw, *bits);
                    }
                    if *is_key {
                        self.key = Some(raw as u32);
                    }
                    slot.set_raw(raw);
                }
                (Op::Key { .. }, FieldSlot::Scalar(slot)) => {
                    slot.set_raw(u64::from(self.key.unwrap_or_default()));
                }
                (Op::String { source, .. }, FieldSlot::String(slot)) => {
                    *slot = self.string(*source)?.into_owned();
                }
                (
                    Op::Array {
                        primitive,
                        source,
                        count,
                        sign_bits,
                        ..
                    },
                    FieldSlot::Array(slot),
                ) if slot.primitive() == *primitive => {
                    let mut values = match *source {
                        Source::Packed { bit_offset, bit_width } => self
                            .reader
                            .read_primitive_array_packed(*primitive, bit_offset, bit_width, *count)?,
                        Source::Cursor { bit_width } => {
                            let start = self.reader.position_bits();
                            self.reader
                                .read_primitive_array_packed(*primitive, start, bit_width, *count)?
                        }
                        _ => self.reader.read_primitive_array(*primitive, *count)?,
                    };
                    if let Some(bits) = sign_bits {
                        values.iter_mut().for_each(|v| *v = sign_extend(*v, *bits));
                    }
                    slot.set_raw(&values);
                }
                (Op::Strings { source, count, .. }, FieldSlot::Strings(slot)) => {
                    let values = match *source {
                        Source::Packed { bit_offset, bit_width } => {
                            self.reader.read_string_array_packed(bit_offset, bit_width, *count)?
                        }
                        Source::Cursor { bit_width } => {
                            let start = self.reader.position_bits();
                            self.reader.read_string_array_packed(start, bit_width, *count)?
                        }
                        _ => self.reader.read_string_array(*count)?,
                    };
                    slot.set(values);
                }
                (Op::Decode { seek, .. }, FieldSlot::Decoded(slot)) => {
                    if let Some(bit_offset) = seek {
                        self.reader.seek_bits(*bit_offset);
                    }
                    slot.decode_into(self.reader)?;
                }
                (Op::DecodeArray { seek, count, .. }, FieldSlot::DecodedArray(slot)) => {
                    if let Some(bit_offset) = seek {
                        self.reader.seek_bits(*bit_offset);
                    }
                    slot.decode_into(self.reader, *count)?;
                }
                (Op::Composite { ops, .. }, FieldSlot::Composite(child)) => {
                    self.ops(ops, child)?;
                }
                (op, slot) => {
                    return Err(Error::structural(format!(
                        "member {} expects a {} slot but the target exposes a {}",
                        op.ordinal(),
                        op.expects(),
                        slot.describe()
                    )));
                }
            }
        }
        Ok(())
    }

    fn scalar(&mut self, primitive: Primitive, source: Source, signed: bool) -> Result<u64> {
        match source {
            Source::Sequential => self.reader.read_primitive(primitive),
            Source::Packed { bit_offset, bit_width } => {
                self.reader.read_primitive_packed(primitive, bit_offset, bit_width)
            }
            Source::Cursor { bit_width } => {
                let start = self.reader.position_bits();
                self.reader.read_primitive_packed(primitive, start, bit_width)
            }
            Source::Common { column } => self.common(column, signed),
            Source::Relationship => Ok(self
                .ctx
                .relationships
                .and_then(|r| r.foreign_key(self.ctx.record_index))
                .map(u64::from)
                .unwrap_or_default()),
        }
    }

    /// Common table value for the current record; absent keys read as zero.
    fn common(&self, column: usize, signed: bool) -> Result<u64> {
        let table = self
            .ctx
            .common
            .ok_or_else(|| Error::unsupported(format!("common column {column} read without a common table")))?;
        let key = self.key.ok_or_else(|| {
            Error::unsupported(format!("common column {column} needs the record key, which was not decoded"))
        })?;
        let column = table.column(column).ok_or_else(|| {
            Error::structural(format!(
                "common column {column} is outside a {}-column common table",
                table.column_count()
            ))
        })?;
        let Some(raw) = column.get(key) else {
            return Ok(0);
        };
        let bits = (column.value_type().natural_size() * 8) as u32;
        Ok(if signed {
            sign_extend(u64::from(raw), bits)
        } else {
            u64::from(raw)
        })
    }

    fn string(&mut self, source: Source) -> Result<Cow<'_, str>> {
        match source {
            Source::Sequential => self.reader.read_string(),
            Source::Packed { bit_offset, bit_width } => self.reader.read_string_packed(bit_offset, bit_width),
            Source::Cursor { bit_width } => {
                let start = self.reader.position_bits();
                self.reader.read_string_packed(start, bit_width)
            }
            Source::Common { column } => {
                let offset = self.common(column, false)? as u32;
                Ok(self
                    .ctx
                    .strings
                    .map(|t| Cow::Owned(t.resolve(offset).into_owned()))
                    .unwrap_or_default())
            }
            Source::Relationship => Ok(Cow::Borrowed("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldMapping, MappingOptions};
    use crate::schema::{DecodesFromReader, Member};
    use crate::table_record;
    use crate::ErrorKind;

    table_record! {
        #[derive(Debug, Default, PartialEq)]
        struct Row {
            id: u32,
            delta: i16,
        }
    }

    fn plan_for<T: TableRecord>(descriptors: &[FieldDescriptor], options: CompileOptions) -> DecodingPlan {
        let mapping = FieldMapping::build(&T::members(), descriptors, MappingOptions::default()).unwrap();
        DecodingPlan::compile(&mapping, options).unwrap()
    }

    fn rows(block: &[u8], stride: usize, plan: &DecodingPlan) -> Vec<Row> {
        block
            .chunks_exact(stride)
            .map(|record| {
                let mut reader = RecordReader::new(record, None);
                plan.execute(&mut reader, &DecodeContext::default()).unwrap()
            })
            .collect()
    }

    fn block() -> Vec<u8> {
        let mut bytes = Vec::new();
        for (id, delta) in [(1u32, -5i16), (0x0102_0304, 300), (u32::MAX, i16::MIN)] {
            bytes.extend_from_slice(&id.to_le_bytes());
            bytes.extend_from_slice(&delta.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_fixed_stride_rows() {
        let descriptors = [FieldDescriptor::inline(0, 4, 1), FieldDescriptor::inline(32, 2, 1)];
        let plan = plan_for::<Row>(&descriptors, CompileOptions::default());
        let decoded = rows(&block(), 6, &plan);

        assert_eq!(
            decoded,
            [
                Row { id: 1, delta: -5 },
                Row { id: 0x0102_0304, delta: 300 },
                Row { id: u32::MAX, delta: i16::MIN },
            ]
        );
    }

    #[test]
    fn test_natural_style_matches_packed() {
        let natural = plan_for::<Row>(
            &[],
            CompileOptions {
                style: PlanStyle::Natural,
                ..Default::default()
            },
        );
        let packed = plan_for::<Row>(
            &[FieldDescriptor::inline(0, 4, 1), FieldDescriptor::inline(32, 2, 1)],
            CompileOptions::default(),
        );
        assert_eq!(rows(&block(), 6, &natural), rows(&block(), 6, &packed));
    }

    #[test]
    fn test_bitpacked_signed_member_is_sign_extended() {
        // id: 20 bits, delta: 4 bits holding 0b1110.
        let record = [0x05u8, 0x00, 0xE0];
        let descriptors = [FieldDescriptor::bitpacked(0, 20), FieldDescriptor::bitpacked(20, 4)];
        let plan = plan_for::<Row>(&descriptors, CompileOptions::default());

        let mut reader = RecordReader::new(&record, None);
        let row: Row = plan.execute(&mut reader, &DecodeContext::default()).unwrap();
        assert_eq!(row, Row { id: 5, delta: -2 });
    }

    #[test]
    fn test_common_column_uses_record_key() {
        table_record! {
            #[derive(Debug, Default)]
            struct Sparse {
                #[key]
                id: u32,
                bonus: i16,
            }
        }

        let mut segment = Vec::new();
        segment.extend_from_slice(&2u32.to_le_bytes());
        segment.extend_from_slice(&0u32.to_le_bytes());
        segment.push(4);
        segment.extend_from_slice(&1u32.to_le_bytes());
        segment.push(1);
        segment.extend_from_slice(&7u32.to_le_bytes());
        segment.extend_from_slice(&(-3i16).to_le_bytes());
        let common = CommonTable::parse(&segment, 4).unwrap();

        let descriptors = [FieldDescriptor::inline(0, 4, 1), FieldDescriptor::common()];
        let plan = plan_for::<Sparse>(
            &descriptors,
            CompileOptions {
                common_column_base: 1,
                ..Default::default()
            },
        );
        let ctx = DecodeContext {
            common: Some(&common),
            ..Default::default()
        };

        let hit: Sparse = plan.execute(&mut RecordReader::new(&7u32.to_le_bytes(), None), &ctx).unwrap();
        assert_eq!((hit.id, hit.bonus), (7, -3));

        let miss: Sparse = plan.execute(&mut RecordReader::new(&8u32.to_le_bytes(), None), &ctx).unwrap();
        assert_eq!((miss.id, miss.bonus), (8, 0));
    }

    #[test]
    fn test_common_column_without_table_or_key_fails() {
        table_record! {
            #[derive(Debug, Default)]
            struct Sparse {
                #[key]
                id: u32,
                bonus: i16,
            }
        }
        table_record! {
            #[derive(Debug, Default)]
            struct Unkeyed {
                id: u32,
                bonus: i16,
            }
        }

        let descriptors = [FieldDescriptor::inline(0, 4, 1), FieldDescriptor::common()];
        let record = 7u32.to_le_bytes();

        let plan = plan_for::<Sparse>(&descriptors, CompileOptions::default());
        let err = plan
            .execute::<Sparse>(&mut RecordReader::new(&record, None), &DecodeContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLayout);

        let common = CommonTable::parse(&[], 4).unwrap();
        let ctx = DecodeContext {
            common: Some(&common),
            ..Default::default()
        };
        let plan = plan_for::<Unkeyed>(&descriptors, CompileOptions::default());
        let err = plan
            .execute::<Unkeyed>(&mut RecordReader::new(&record, None), &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLayout);
        assert!(err.to_string().contains("record key"));
    }

    #[test]
    fn test_out_of_line_key_and_copy_key() {
        table_record! {
            #[derive(Debug, Default)]
            struct Keyed {
                #[key]
                id: u32,
                value: u8,
            }
        }

        let mapping = FieldMapping::build(
            &Keyed::members(),
            &[FieldDescriptor::inline(0, 1, 1)],
            MappingOptions { key_out_of_line: true },
        )
        .unwrap();
        let plan = DecodingPlan::compile(&mapping, CompileOptions::default()).unwrap();
        let ctx = DecodeContext {
            key: Some(40),
            ..Default::default()
        };

        let mut row: Keyed = plan.execute(&mut RecordReader::new(&[9], None), &ctx).unwrap();
        assert_eq!((row.id, row.value), (40, 9));

        plan.set_key(&mut row, 41).unwrap();
        assert_eq!(row.id, 41);
    }

    #[test]
    fn test_self_decoding_member_seeks_to_column() {
        #[derive(Debug, Default, PartialEq)]
        struct Pair(u16, u16);

        impl DecodesFromReader for Pair {
            const SIZE: usize = 4;

            fn decode(reader: &mut RecordReader<'_>) -> Result<Self> {
                Ok(Self(reader.read_u16()?, reader.read_u16()?))
            }
        }

        table_record! {
            #[derive(Debug, Default)]
            struct WithPair {
                tag: u8,
                #[decoded]
                pair: Pair,
            }
        }

        let descriptors = [FieldDescriptor::inline(0, 1, 1), FieldDescriptor::inline(16, 4, 1)];
        let plan = plan_for::<WithPair>(&descriptors, CompileOptions::default());
        let record = [1u8, 0xAA, 2, 0, 3, 0];

        let row: WithPair = plan
            .execute(&mut RecordReader::new(&record, None), &DecodeContext::default())
            .unwrap();
        assert_eq!((row.tag, row.pair), (1, Pair(2, 3)));
    }

    #[test]
    fn test_streamed_inline_strings() {
        table_record! {
            #[derive(Debug, Default)]
            struct Named {
                id: u32,
                name: String,
                rank: u8,
            }
        }

        let descriptors = [
            FieldDescriptor::inline(0, 4, 1),
            FieldDescriptor::inline(32, 4, 1),
            FieldDescriptor::inline(64, 1, 1),
        ];
        let plan = plan_for::<Named>(
            &descriptors,
            CompileOptions {
                style: PlanStyle::Streamed,
                ..Default::default()
            },
        );
        let record = b"\x03\0\0\0Thunderfury\0\x05";

        let row: Named = plan
            .execute(&mut RecordReader::new(record, None), &DecodeContext::default())
            .unwrap();
        assert_eq!((row.id, row.name.as_str(), row.rank), (3, "Thunderfury", 5));
    }

    #[test]
    fn test_pallet_array_is_unsupported() {
        let descriptor = FieldDescriptor {
            compression: CompressionKind::PalletArray,
            ..FieldDescriptor::bitpacked(0, 8)
        };
        let members = [Member::scalar::<u32>("id")];
        let mapping = FieldMapping::build(&members, &[descriptor], MappingOptions::default()).unwrap();

        let err = DecodingPlan::compile(&mapping, CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLayout(_)));
    }

    #[test]
    fn test_column_wider_than_member_is_structural() {
        let members = [Member::scalar::<u8>("small")];
        let mapping =
            FieldMapping::build(&members, &[FieldDescriptor::inline(0, 4, 1)], MappingOptions::default()).unwrap();

        let err = DecodingPlan::compile(&mapping, CompileOptions::default()).unwrap_err();
        assert!(matches!(&err, Error::StructuralMismatch(m) if m.contains("small")));
    }
}
