//! Format-level enumerations.

/// Table format family, identified by the file's four-byte signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FormatVersion {
    /// `WDBC`: fixed-stride records, every field four bytes wide.
    Wdbc,
    /// `WDB2`: WDBC plus table hash, build and id range.
    Wdb2,
    /// `WDB5`: per-field byte widths, optional sparse storage.
    Wdb5,
    /// `WDB6`: WDB5 plus a common (sparse column) table.
    Wdb6,
    /// `WDC1`: bit-packed field storage.
    Wdc1,
    /// `WDC2`: WDC1 with per-section storage.
    Wdc2,
}

impl FormatVersion {
    /// Parse from the four signature bytes.
    pub fn from_magic(magic: [u8; 4]) -> Option<Self> {
        match &magic {
            b"WDBC" => Some(Self::Wdbc),
            b"WDB2" => Some(Self::Wdb2),
            b"WDB5" => Some(Self::Wdb5),
            b"WDB6" => Some(Self::Wdb6),
            b"WDC1" => Some(Self::Wdc1),
            b"WDC2" => Some(Self::Wdc2),
            _ => None,
        }
    }

    /// The four signature bytes.
    pub fn magic(&self) -> &'static [u8; 4] {
        match self {
            Self::Wdbc => b"WDBC",
            Self::Wdb2 => b"WDB2",
            Self::Wdb5 => b"WDB5",
            Self::Wdb6 => b"WDB6",
            Self::Wdc1 => b"WDC1",
            Self::Wdc2 => b"WDC2",
        }
    }

    /// Whether fields are naturally aligned four-byte columns with no bit packing.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Wdbc | Self::Wdb2)
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(self.magic()).unwrap_or("????"))
    }
}

/// How a physical column stores its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompressionKind {
    /// Stored inline at its natural width.
    #[default]
    None,
    /// Stored inline with an explicit bit width.
    Bitpacked,
    /// Stored in the common table, keyed by record key.
    CommonTableSparse,
    /// Stored as an index into a pallet of arrays.
    PalletArray,
    /// Stored in the relationship map, keyed by record index.
    RelationshipData,
}

impl CompressionKind {
    /// Get the string name for this compression kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bitpacked => "Bitpacked",
            Self::CommonTableSparse => "CommonTableSparse",
            Self::PalletArray => "PalletArray",
            Self::RelationshipData => "RelationshipData",
        }
    }

    /// Whether values live inside the record bytes.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::None | Self::Bitpacked)
    }
}

impl std::fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive element types a record field can decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Primitive {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
}

impl Primitive {
    /// Storage width in bits.
    pub const fn bits(&self) -> u32 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 => 16,
            Self::U32 | Self::I32 | Self::F32 => 32,
            Self::U64 | Self::I64 => 64,
        }
    }

    /// Storage width in bytes.
    pub const fn size(&self) -> usize {
        self.bits() as usize / 8
    }

    /// Whether the integer interpretation is signed.
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Get the string name for this primitive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
        }
    }
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
