//! Target type description.
//!
//! A type decoded from a table implements [`TableRecord`]: it lists its
//! logical members in declaration order and hands out a typed [`FieldSlot`]
//! for each member ordinal. The decoding plan writes through those slots, so
//! no reflection is involved at decode time.
//!
//! Most types are declared with [`table_record!`](crate::table_record):
//!
//! ```
//! use dbfiles_wdb::table_record;
//!
//! table_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Spell {
//!         #[key]
//!         pub id: u32,
//!         pub name: String,
//!         pub school: i16,
//!         pub effects: [u32; 3],
//!     }
//! }
//! ```

use crate::record_reader::RecordReader;
use crate::types::Primitive;
use crate::Result;

/// Role flags on a logical member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberFlags(u8);

impl MemberFlags {
    pub const NONE: Self = Self(0);
    /// The member holds the record's primary key.
    pub const KEY: Self = Self(1 << 0);
    /// Narrow bit-packed values are sign-extended.
    pub const SIGNED: Self = Self(1 << 1);

    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// What one element of a member decodes into.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    Primitive(Primitive),
    String,
    /// Nested type decoded member by member.
    Composite(Vec<Member>),
    /// Type that decodes itself from the reader; `size` is its stored byte size.
    SelfDecoding { size: usize },
}

/// One logical field of a target type.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: &'static str,
    pub element: ElementType,
    /// Declared element count; 0 for arrays whose length comes from the file.
    pub cardinality: usize,
    pub is_array: bool,
    pub flags: MemberFlags,
}

impl Member {
    fn new(name: &'static str, element: ElementType, cardinality: usize, is_array: bool) -> Self {
        Self {
            name,
            element,
            cardinality,
            is_array,
            flags: MemberFlags::NONE,
        }
    }

    pub fn scalar<T: Scalar>(name: &'static str) -> Self {
        let mut member = Self::new(name, ElementType::Primitive(T::PRIMITIVE), 1, false);
        if T::PRIMITIVE.is_signed() {
            member.flags = MemberFlags::SIGNED;
        }
        member
    }

    /// Array of primitives; `len` of 0 takes the length from the file.
    pub fn array<T: Scalar>(name: &'static str, len: usize) -> Self {
        let mut member = Self::scalar::<T>(name);
        member.cardinality = len;
        member.is_array = true;
        member
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, ElementType::String, 1, false)
    }

    pub fn strings(name: &'static str, len: usize) -> Self {
        Self::new(name, ElementType::String, len, true)
    }

    pub fn composite<T: TableRecord>(name: &'static str) -> Self {
        Self::new(name, ElementType::Composite(T::members()), 1, false)
    }

    pub fn decoded<T: DecodesFromReader>(name: &'static str) -> Self {
        Self::new(name, ElementType::SelfDecoding { size: T::SIZE }, 1, false)
    }

    pub fn decoded_array<T: DecodesFromReader>(name: &'static str, len: usize) -> Self {
        Self::new(name, ElementType::SelfDecoding { size: T::SIZE }, len, true)
    }

    /// Mark this member as the primary key.
    pub fn key(mut self) -> Self {
        self.flags = self.flags.union(MemberFlags::KEY);
        self
    }

    /// Force sign extension of narrow bit-packed values.
    pub fn signed(mut self) -> Self {
        self.flags = self.flags.union(MemberFlags::SIGNED);
        self
    }

    #[inline]
    pub fn is_key(&self) -> bool {
        self.flags.contains(MemberFlags::KEY)
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.flags.contains(MemberFlags::SIGNED)
    }

    /// Stored size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match &self.element {
            ElementType::Primitive(p) => p.size(),
            ElementType::String => 4,
            ElementType::Composite(children) => children
                .iter()
                .map(|c| c.element_size() * c.cardinality.max(1))
                .sum(),
            ElementType::SelfDecoding { size } => *size,
        }
    }

    /// Children of a composite member.
    pub fn children(&self) -> Option<&[Member]> {
        match &self.element {
            ElementType::Composite(children) => Some(children),
            _ => None,
        }
    }
}

/// A primitive value a field can decode into.
pub trait Scalar: Copy + Default + 'static {
    const PRIMITIVE: Primitive;

    /// Reinterpret the low bits of `raw` as this type.
    fn from_raw(raw: u64) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty => $primitive:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const PRIMITIVE: Primitive = Primitive::$primitive;

                #[inline]
                fn from_raw(raw: u64) -> Self {
                    raw as $ty
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
}

impl Scalar for f32 {
    const PRIMITIVE: Primitive = Primitive::F32;

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }
}

/// Capability of element types that construct themselves from a reader.
///
/// The reader is positioned at the element's first bit; sequential reads
/// advance through it.
pub trait DecodesFromReader: Sized + Default + 'static {
    /// Stored size in bytes.
    const SIZE: usize;

    fn decode(reader: &mut RecordReader<'_>) -> Result<Self>;
}

/// Type-erased write target for one scalar.
pub trait ScalarSlot {
    fn primitive(&self) -> Primitive;
    fn set_raw(&mut self, raw: u64);
}

impl<T: Scalar> ScalarSlot for T {
    #[inline]
    fn primitive(&self) -> Primitive {
        T::PRIMITIVE
    }

    #[inline]
    fn set_raw(&mut self, raw: u64) {
        *self = T::from_raw(raw);
    }
}

/// Type-erased write target for an array of scalars.
pub trait ArraySlot {
    fn primitive(&self) -> Primitive;
    fn set_raw(&mut self, values: &[u64]);
}

impl<T: Scalar> ArraySlot for Vec<T> {
    fn primitive(&self) -> Primitive {
        T::PRIMITIVE
    }

    fn set_raw(&mut self, values: &[u64]) {
        self.clear();
        self.extend(values.iter().map(|&v| T::from_raw(v)));
    }
}

impl<T: Scalar, const N: usize> ArraySlot for [T; N] {
    fn primitive(&self) -> Primitive {
        T::PRIMITIVE
    }

    fn set_raw(&mut self, values: &[u64]) {
        for (slot, &value) in self.iter_mut().zip(values) {
            *slot = T::from_raw(value);
        }
    }
}

/// Write target for an array of strings.
pub trait StringArraySlot {
    fn set(&mut self, values: Vec<String>);
}

impl StringArraySlot for Vec<String> {
    fn set(&mut self, values: Vec<String>) {
        *self = values;
    }
}

impl<const N: usize> StringArraySlot for [String; N] {
    fn set(&mut self, values: Vec<String>) {
        for (slot, value) in self.iter_mut().zip(values) {
            *slot = value;
        }
    }
}

/// Write target for one self-decoding element.
pub trait DecodeSlot {
    fn decode_into(&mut self, reader: &mut RecordReader<'_>) -> Result<()>;
}

impl<T: DecodesFromReader> DecodeSlot for T {
    fn decode_into(&mut self, reader: &mut RecordReader<'_>) -> Result<()> {
        *self = T::decode(reader)?;
        Ok(())
    }
}

/// Write target for an array of self-decoding elements.
pub trait DecodeArraySlot {
    fn decode_into(&mut self, reader: &mut RecordReader<'_>, count: usize) -> Result<()>;
}

impl<T: DecodesFromReader> DecodeArraySlot for Vec<T> {
    fn decode_into(&mut self, reader: &mut RecordReader<'_>, count: usize) -> Result<()> {
        self.clear();
        self.reserve(count);
        for _ in 0..count {
            self.push(T::decode(reader)?);
        }
        Ok(())
    }
}

impl<T: DecodesFromReader, const N: usize> DecodeArraySlot for [T; N] {
    fn decode_into(&mut self, reader: &mut RecordReader<'_>, count: usize) -> Result<()> {
        for slot in self.iter_mut().take(count) {
            *slot = T::decode(reader)?;
        }
        Ok(())
    }
}

/// Mutable access to one member of a target instance.
pub enum FieldSlot<'a> {
    Scalar(&'a mut dyn ScalarSlot),
    String(&'a mut String),
    Array(&'a mut dyn ArraySlot),
    Strings(&'a mut dyn StringArraySlot),
    Composite(&'a mut dyn TableRecord),
    Decoded(&'a mut dyn DecodeSlot),
    DecodedArray(&'a mut dyn DecodeArraySlot),
}

impl<'a> FieldSlot<'a> {
    pub fn scalar<T: Scalar>(value: &'a mut T) -> Self {
        Self::Scalar(value)
    }

    pub fn string(value: &'a mut String) -> Self {
        Self::String(value)
    }

    pub fn array<A: ArraySlot>(value: &'a mut A) -> Self {
        Self::Array(value)
    }

    pub fn strings<A: StringArraySlot>(value: &'a mut A) -> Self {
        Self::Strings(value)
    }

    pub fn composite<T: TableRecord>(value: &'a mut T) -> Self {
        Self::Composite(value)
    }

    pub fn decoded<T: DecodesFromReader>(value: &'a mut T) -> Self {
        Self::Decoded(value)
    }

    pub fn decoded_array<A: DecodeArraySlot>(value: &'a mut A) -> Self {
        Self::DecodedArray(value)
    }

    /// Short description used in mismatch errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Strings(_) => "string array",
            Self::Composite(_) => "composite",
            Self::Decoded(_) => "self-decoding value",
            Self::DecodedArray(_) => "self-decoding array",
        }
    }
}

/// A type that records decode into.
pub trait TableRecord: 'static {
    /// Logical members in declaration order.
    fn members() -> Vec<Member>
    where
        Self: Sized;

    /// Write target for the member at `ordinal`.
    fn slot(&mut self, ordinal: usize) -> Option<FieldSlot<'_>>;
}

/// Field types [`table_record!`](crate::table_record) can declare without a marker.
pub trait Field {
    fn member(name: &'static str) -> Member;
    fn slot(&mut self) -> FieldSlot<'_>;
}

macro_rules! impl_scalar_field {
    ($($ty:ty),*) => {
        $(
            impl Field for $ty {
                fn member(name: &'static str) -> Member {
                    Member::scalar::<$ty>(name)
                }

                fn slot(&mut self) -> FieldSlot<'_> {
                    FieldSlot::Scalar(self)
                }
            }
        )*
    };
}

impl_scalar_field!(u8, i8, u16, i16, u32, i32, u64, i64, f32);

impl Field for String {
    fn member(name: &'static str) -> Member {
        Member::string(name)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::String(self)
    }
}

impl<T: Scalar> Field for Vec<T> {
    fn member(name: &'static str) -> Member {
        Member::array::<T>(name, 0)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::Array(self)
    }
}

impl<T: Scalar, const N: usize> Field for [T; N] {
    fn member(name: &'static str) -> Member {
        Member::array::<T>(name, N)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::Array(self)
    }
}

impl Field for Vec<String> {
    fn member(name: &'static str) -> Member {
        Member::strings(name, 0)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::Strings(self)
    }
}

impl<const N: usize> Field for [String; N] {
    fn member(name: &'static str) -> Member {
        Member::strings(name, N)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::Strings(self)
    }
}

/// Field types declared with the `#[decoded_array]` marker.
pub trait DecodedArrayField {
    fn member(name: &'static str) -> Member;
    fn slot(&mut self) -> FieldSlot<'_>;
}

impl<T: DecodesFromReader> DecodedArrayField for Vec<T> {
    fn member(name: &'static str) -> Member {
        Member::decoded_array::<T>(name, 0)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::DecodedArray(self)
    }
}

impl<T: DecodesFromReader, const N: usize> DecodedArrayField for [T; N] {
    fn member(name: &'static str) -> Member {
        Member::decoded_array::<T>(name, N)
    }

    fn slot(&mut self) -> FieldSlot<'_> {
        FieldSlot::DecodedArray(self)
    }
}

/// Declare a struct and implement [`TableRecord`] for it.
///
/// Fields may carry one marker attribute:
///
/// - `#[key]`: the primary key member.
/// - `#[signed]`: sign-extend narrow bit-packed values.
/// - `#[composite]`: a nested [`TableRecord`] decoded member by member.
/// - `#[decoded]`: a [`DecodesFromReader`] value.
/// - `#[decoded_array]`: an array of [`DecodesFromReader`] values.
///
/// Other fields must implement [`Field`].
#[macro_export]
macro_rules! table_record {
    (@member key $name:expr, $ty:ty) => {
        <$ty as $crate::schema::Field>::member($name).key()
    };
    (@member signed $name:expr, $ty:ty) => {
        <$ty as $crate::schema::Field>::member($name).signed()
    };
    (@member composite $name:expr, $ty:ty) => {
        $crate::schema::Member::composite::<$ty>($name)
    };
    (@member decoded $name:expr, $ty:ty) => {
        $crate::schema::Member::decoded::<$ty>($name)
    };
    (@member decoded_array $name:expr, $ty:ty) => {
        <$ty as $crate::schema::DecodedArrayField>::member($name)
    };
    (@member $name:expr, $ty:ty) => {
        <$ty as $crate::schema::Field>::member($name)
    };

    (@slot [composite] $place:expr) => {
        $crate::schema::FieldSlot::Composite(&mut $place)
    };
    (@slot [decoded] $place:expr) => {
        $crate::schema::FieldSlot::Decoded(&mut $place)
    };
    (@slot [decoded_array] $place:expr) => {
        $crate::schema::DecodedArrayField::slot(&mut $place)
    };
    (@slot [$($marker:ident)?] $place:expr) => {
        $crate::schema::Field::slot(&mut $place)
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$marker:ident])?
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $field_vis $field : $ty, )*
        }

        impl $crate::schema::TableRecord for $name {
            fn members() -> ::std::vec::Vec<$crate::schema::Member> {
                ::std::vec![
                    $( $crate::table_record!(@member $($marker)? stringify!($field), $ty), )*
                ]
            }

            #[allow(unused_assignments)]
            fn slot(&mut self, ordinal: usize) -> ::std::option::Option<$crate::schema::FieldSlot<'_>> {
                let mut index = 0usize;
                $(
                    if ordinal == index {
                        return ::std::option::Option::Some(
                            $crate::table_record!(@slot [$($marker)?] self.$field)
                        );
                    }
                    index += 1;
                )*
                ::std::option::Option::None
            }
        }
    };
}
