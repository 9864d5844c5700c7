//! Logical member to physical column mapping.
//!
//! Members are walked in declaration order and bound to the file's field
//! descriptors in order. Composite members bind their children in place, so a
//! nested type consumes as many descriptors as it has leaf members.

use crate::schema::Member;
use crate::types::CompressionKind;
use crate::{Error, Result};

/// One column as declared by the file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDescriptor {
    /// Absolute bit offset within the record.
    pub bit_offset: usize,
    /// Bits occupied by the whole field, every element included.
    pub bit_width: u32,
    /// Element count.
    pub cardinality: usize,
    pub compression: CompressionKind,
    /// Ordinal among bound descriptors sharing this compression kind.
    pub category_index: usize,
    /// Element size in bytes when stored uncompressed; 0 when unknown.
    pub byte_size: usize,
}

impl FieldDescriptor {
    /// Inline field stored at its natural width.
    pub fn inline(bit_offset: usize, byte_size: usize, cardinality: usize) -> Self {
        Self {
            bit_offset,
            bit_width: (byte_size * 8 * cardinality) as u32,
            cardinality,
            compression: CompressionKind::None,
            category_index: 0,
            byte_size,
        }
    }

    /// Inline field with an explicit bit width and no byte size.
    pub fn bitpacked(bit_offset: usize, bit_width: u32) -> Self {
        Self {
            bit_offset,
            bit_width,
            cardinality: 1,
            compression: CompressionKind::Bitpacked,
            category_index: 0,
            byte_size: 0,
        }
    }

    /// Column stored in the common table.
    pub fn common() -> Self {
        Self {
            bit_offset: 0,
            bit_width: 0,
            cardinality: 1,
            compression: CompressionKind::CommonTableSparse,
            category_index: 0,
            byte_size: 0,
        }
    }

    fn relationship(bit_offset: usize) -> Self {
        Self {
            bit_offset,
            bit_width: 0,
            cardinality: 1,
            compression: CompressionKind::RelationshipData,
            category_index: 0,
            byte_size: 4,
        }
    }

    /// Bits occupied by one element.
    pub fn element_bits(&self) -> u32 {
        if self.byte_size > 0 {
            (self.byte_size * 8) as u32
        } else {
            self.bit_width / self.cardinality.max(1) as u32
        }
    }

    /// Bits the running offset advances past this field.
    fn extent(&self) -> usize {
        (self.bit_width as usize).max(self.byte_size * 8)
    }
}

/// Options that vary per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingOptions {
    /// The key is stored outside the record bytes (index table).
    pub key_out_of_line: bool,
}

/// How one member is bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Field(FieldDescriptor),
    /// Key member whose value comes from the index table.
    OutOfLineKey,
    Composite(Vec<MappedMember>),
}

/// A member together with its binding.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedMember {
    pub ordinal: usize,
    pub member: Member,
    pub binding: Binding,
}

/// Per-member bindings for one target type against one file layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub members: Vec<MappedMember>,
    /// Descriptors were synthesized from the members.
    pub synthesized: bool,
}

impl FieldMapping {
    /// Map `members` onto `descriptors`.
    ///
    /// An empty descriptor list means the format declares none, and
    /// descriptors are synthesized from member sizes instead.
    pub fn build(members: &[Member], descriptors: &[FieldDescriptor], options: MappingOptions) -> Result<Self> {
        let mut mapper = Mapper {
            descriptors,
            next: 0,
            bit_offset: 0,
            synthesize: descriptors.is_empty(),
            options,
        };
        let mut mapped = mapper.map_list(members)?;

        let mut counters = [0usize; 5];
        finish(&mut mapped, &mut counters)?;

        tracing::debug!(
            members = members.len(),
            descriptors = descriptors.len(),
            bound = mapper.next,
            synthesized = mapper.synthesize,
            "field mapping built"
        );

        Ok(Self {
            members: mapped,
            synthesized: mapper.synthesize,
        })
    }

    /// Every bound descriptor in binding order.
    pub fn descriptors(&self) -> Vec<&FieldDescriptor> {
        fn collect<'a>(members: &'a [MappedMember], out: &mut Vec<&'a FieldDescriptor>) {
            for m in members {
                match &m.binding {
                    Binding::Field(d) => out.push(d),
                    Binding::Composite(children) => collect(children, out),
                    Binding::OutOfLineKey => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.members, &mut out);
        out
    }
}

struct Mapper<'d> {
    descriptors: &'d [FieldDescriptor],
    next: usize,
    bit_offset: usize,
    synthesize: bool,
    options: MappingOptions,
}

impl Mapper<'_> {
    fn map_list(&mut self, members: &[Member]) -> Result<Vec<MappedMember>> {
        members
            .iter()
            .enumerate()
            .map(|(ordinal, member)| self.map_member(ordinal, member))
            .collect()
    }

    fn map_member(&mut self, ordinal: usize, member: &Member) -> Result<MappedMember> {
        let binding = if let Some(children) = member.children() {
            Binding::Composite(self.map_list(children)?)
        } else if member.is_key() && self.options.key_out_of_line {
            Binding::OutOfLineKey
        } else if self.synthesize {
            if member.is_array && member.cardinality == 0 {
                return Err(Error::structural(format!(
                    "array member `{}` needs a fixed length when the file declares no fields",
                    member.name
                )));
            }
            let descriptor = FieldDescriptor::inline(self.bit_offset, member.element_size(), member.cardinality);
            self.bit_offset += descriptor.extent();
            Binding::Field(descriptor)
        } else if let Some(descriptor) = self.descriptors.get(self.next) {
            self.next += 1;
            self.bit_offset += descriptor.extent();
            Binding::Field(descriptor.clone())
        } else {
            Binding::Field(FieldDescriptor::relationship(self.bit_offset))
        };

        Ok(MappedMember {
            ordinal,
            member: member.clone(),
            binding,
        })
    }
}

fn category_slot(kind: CompressionKind) -> usize {
    match kind {
        CompressionKind::None => 0,
        CompressionKind::Bitpacked => 1,
        CompressionKind::CommonTableSparse => 2,
        CompressionKind::PalletArray => 3,
        CompressionKind::RelationshipData => 4,
    }
}

/// Derive cardinalities, check array agreement, and assign category indices.
fn finish(members: &mut [MappedMember], counters: &mut [usize; 5]) -> Result<()> {
    for mapped in members {
        let descriptor = match &mut mapped.binding {
            Binding::Field(d) => d,
            Binding::Composite(children) => {
                finish(children, counters)?;
                continue;
            }
            Binding::OutOfLineKey => continue,
        };
        let member = &mapped.member;

        if descriptor.byte_size > 0 && descriptor.compression.is_inline() {
            descriptor.cardinality = (descriptor.bit_width as usize / (8 * descriptor.byte_size)).max(1);
        }

        let physical_array = descriptor.cardinality > 1;
        if member.is_array != physical_array {
            return Err(Error::structural(format!(
                "member `{}` is {} but its column holds {} element(s)",
                member.name,
                if member.is_array { "an array" } else { "a scalar" },
                descriptor.cardinality
            )));
        }
        if member.is_array && member.cardinality != 0 && member.cardinality != descriptor.cardinality {
            return Err(Error::structural(format!(
                "member `{}` declares {} elements but its column holds {}",
                member.name, member.cardinality, descriptor.cardinality
            )));
        }

        let counter = &mut counters[category_slot(descriptor.compression)];
        descriptor.category_index = *counter;
        *counter += 1;
    }
    Ok(())
}
