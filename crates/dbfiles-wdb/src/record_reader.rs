//! Bit-precise reader over one record's bytes.
//!
//! Reads come in two forms:
//!
//! - **Sequential** reads start at the internal bit cursor and advance it by
//!   the width read.
//! - **Packed** reads take an absolute bit offset and bit width. They do not
//!   depend on the cursor, but they do move it: after a packed read the cursor
//!   sits at `bit_offset + bit_width`, so a following sequential read picks up
//!   right after the packed field.
//!
//! Extraction reads the little-endian bytes covering the field, shifts right
//! by `bit_offset % 8`, then masks to the field width. Only the bytes that
//! contain the field are touched, so a narrow field at the end of a record
//! never reads past the buffer.

use std::borrow::Cow;

use byteorder::{ByteOrder, LittleEndian};

use crate::segments::StringTable;
use crate::types::Primitive;
use crate::{Error, Result};

/// Cursor over one record's raw bytes.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    cursor: usize,
    strings: Option<&'a StringTable>,
}

macro_rules! packed_unsigned {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $bits:expr) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, bit_offset: usize, bit_width: u32) -> Result<$ty> {
            self.read_packed_raw(bit_offset, bit_width, $bits).map(|v| v as $ty)
        }
    };
}

macro_rules! sequential {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $bits:expr) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            self.read_sequential_raw($bits).map(|v| v as $ty)
        }
    };
}

impl<'a> RecordReader<'a> {
    /// Wrap one record's bytes.
    ///
    /// With a string table, string fields are 32-bit offsets into it;
    /// without one, they are stored inline and null-terminated.
    #[inline]
    pub fn new(data: &'a [u8], strings: Option<&'a StringTable>) -> Self {
        Self {
            data,
            cursor: 0,
            strings,
        }
    }

    /// Record bytes.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Record length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position in bits.
    #[inline]
    pub fn position_bits(&self) -> usize {
        self.cursor
    }

    /// Move the cursor to an absolute bit position.
    #[inline]
    pub fn seek_bits(&mut self, bit_offset: usize) {
        self.cursor = bit_offset;
    }

    /// Whether strings resolve through a string table.
    #[inline]
    pub fn has_string_table(&self) -> bool {
        self.strings.is_some()
    }

    /// Extract `bit_count` bits starting at `bit_offset` without touching the cursor.
    ///
    /// The result is shifted down by `bit_offset % 8` and masked to
    /// `bit_count` bits. A zero-width read yields zero.
    pub fn read_bits(&self, bit_offset: usize, bit_count: u32) -> Result<u64> {
        if bit_count == 0 {
            return Ok(0);
        }
        if bit_count > 64 {
            return Err(Error::unsupported(format!(
                "{bit_count}-bit field at bit {bit_offset} is wider than 64 bits"
            )));
        }

        let shift = bit_offset & 7;
        let start = bit_offset >> 3;
        let needed = (bit_count as usize + shift).div_ceil(8);
        let bytes = start
            .checked_add(needed)
            .and_then(|end| self.data.get(start..end))
            .ok_or(Error::Bounds {
                offset: start,
                needed,
                available: self.data.len().saturating_sub(start),
            })?;

        let value = (LittleEndian::read_uint128(bytes, needed) >> shift) as u64;
        if bit_count < 64 {
            Ok(value & ((1u64 << bit_count) - 1))
        } else {
            Ok(value)
        }
    }

    fn read_packed_raw(&mut self, bit_offset: usize, bit_width: u32, max_bits: u32) -> Result<u64> {
        if bit_width > max_bits {
            return Err(Error::structural(format!(
                "{bit_width}-bit field at bit {bit_offset} does not fit a {max_bits}-bit value"
            )));
        }
        let value = self.read_bits(bit_offset, bit_width)?;
        self.cursor = advance(bit_offset, bit_width as usize)?;
        Ok(value)
    }

    fn read_sequential_raw(&mut self, bits: u32) -> Result<u64> {
        let value = self.read_bits(self.cursor, bits)?;
        self.cursor = advance(self.cursor, bits as usize)?;
        Ok(value)
    }

    packed_unsigned!(
        /// Packed unsigned read of up to 8 bits.
        read_u8_packed, u8, 8
    );
    packed_unsigned!(
        /// Packed unsigned read of up to 16 bits.
        read_u16_packed, u16, 16
    );
    packed_unsigned!(
        /// Packed unsigned read of up to 32 bits.
        read_u32_packed, u32, 32
    );
    packed_unsigned!(
        /// Packed unsigned read of up to 64 bits.
        read_u64_packed, u64, 64
    );

    // Signed packed reads share the unsigned extraction; a field narrower
    // than its storage type is zero-extended.
    packed_unsigned!(read_i8_packed, i8, 8);
    packed_unsigned!(read_i16_packed, i16, 16);
    packed_unsigned!(read_i32_packed, i32, 32);
    packed_unsigned!(read_i64_packed, i64, 64);

    /// Packed float read. Floats are never narrowed; the cursor moves to
    /// `bit_offset + 32`.
    #[inline]
    pub fn read_f32_packed(&mut self, bit_offset: usize) -> Result<f32> {
        self.read_packed_raw(bit_offset, 32, 32)
            .map(|v| f32::from_bits(v as u32))
    }

    sequential!(read_u8, u8, 8);
    sequential!(read_i8, i8, 8);
    sequential!(read_u16, u16, 16);
    sequential!(read_i16, i16, 16);
    sequential!(read_u32, u32, 32);
    sequential!(read_i32, i32, 32);
    sequential!(read_u64, u64, 64);
    sequential!(read_i64, i64, 64);

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_sequential_raw(32).map(|v| f32::from_bits(v as u32))
    }

    /// Packed read of a primitive's raw bits.
    ///
    /// Floats ignore `bit_width` and always read 32 bits.
    pub fn read_primitive_packed(
        &mut self,
        primitive: Primitive,
        bit_offset: usize,
        bit_width: u32,
    ) -> Result<u64> {
        match primitive {
            Primitive::F32 => self.read_packed_raw(bit_offset, 32, 32),
            _ => self.read_packed_raw(bit_offset, bit_width, primitive.bits()),
        }
    }

    /// Sequential read of a primitive's raw bits at its natural width.
    #[inline]
    pub fn read_primitive(&mut self, primitive: Primitive) -> Result<u64> {
        self.read_sequential_raw(primitive.bits())
    }

    /// Sequential string read.
    pub fn read_string(&mut self) -> Result<Cow<'a, str>> {
        match self.strings {
            Some(table) => {
                let offset = self.read_u32()?;
                Ok(table.resolve(offset))
            }
            None => self.read_inline_string(self.cursor),
        }
    }

    /// Packed string read.
    ///
    /// With a string table the field holds a `bit_width`-bit offset. Inline
    /// strings must start on a byte boundary.
    pub fn read_string_packed(&mut self, bit_offset: usize, bit_width: u32) -> Result<Cow<'a, str>> {
        match self.strings {
            Some(table) => {
                let offset = self.read_u32_packed(bit_offset, bit_width)?;
                Ok(table.resolve(offset))
            }
            None => self.read_inline_string(bit_offset),
        }
    }

    fn read_inline_string(&mut self, bit_offset: usize) -> Result<Cow<'a, str>> {
        if bit_offset % 8 != 0 {
            return Err(Error::unsupported(format!(
                "inline string at bit {bit_offset} is not byte aligned"
            )));
        }
        let start = bit_offset / 8;
        let tail = self.data.get(start..).ok_or(Error::Bounds {
            offset: start,
            needed: 1,
            available: 0,
        })?;
        let len = memchr::memchr(0, tail).ok_or(Error::Bounds {
            offset: start,
            needed: tail.len() + 1,
            available: tail.len(),
        })?;
        self.cursor = (start + len + 1) * 8;
        Ok(String::from_utf8_lossy(&tail[..len]))
    }

    /// Sequential array read of `count` primitives.
    pub fn read_primitive_array(&mut self, primitive: Primitive, count: usize) -> Result<Vec<u64>> {
        (0..count).map(|_| self.read_primitive(primitive)).collect()
    }

    /// Packed array read: element `i` starts at `bit_offset + i * element_bits`.
    pub fn read_primitive_array_packed(
        &mut self,
        primitive: Primitive,
        bit_offset: usize,
        element_bits: u32,
        count: usize,
    ) -> Result<Vec<u64>> {
        (0..count)
            .map(|i| {
                let start = element_offset(bit_offset, i, element_bits)?;
                self.read_primitive_packed(primitive, start, element_bits)
            })
            .collect()
    }

    /// Sequential array read of `count` strings.
    pub fn read_string_array(&mut self, count: usize) -> Result<Vec<String>> {
        (0..count)
            .map(|_| self.read_string().map(Cow::into_owned))
            .collect()
    }

    /// Packed array read of `count` strings stepping by `element_bits`.
    pub fn read_string_array_packed(
        &mut self,
        bit_offset: usize,
        element_bits: u32,
        count: usize,
    ) -> Result<Vec<String>> {
        if self.strings.is_none() {
            // Inline strings have no fixed stride; read them back to back.
            self.cursor = bit_offset;
            return self.read_string_array(count);
        }
        (0..count)
            .map(|i| {
                let start = element_offset(bit_offset, i, element_bits)?;
                self.read_string_packed(start, element_bits).map(Cow::into_owned)
            })
            .collect()
    }
}

/// Bit position `bits` past `position`.
fn advance(position: usize, bits: usize) -> Result<usize> {
    position.checked_add(bits).ok_or(Error::Bounds {
        offset: position / 8,
        needed: bits.div_ceil(8),
        available: 0,
    })
}

/// Start of element `index` in a packed array.
fn element_offset(bit_offset: usize, index: usize, element_bits: u32) -> Result<usize> {
    index
        .checked_mul(element_bits as usize)
        .and_then(|step| bit_offset.checked_add(step))
        .ok_or(Error::Bounds {
            offset: bit_offset / 8,
            needed: (element_bits as usize).div_ceil(8),
            available: 0,
        })
}

/// Sign-extend the low `bits` bits of `value`.
#[inline]
pub fn sign_extend(value: u64, bits: u32) -> u64 {
    if bits == 0 || bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    (((value << shift) as i64) >> shift) as u64
}
