//! The tag space used by the codec (C1).
//!
//! Several copies of the originating source disagreed on the numeric value
//! of each tag. This crate freezes one table — the "groups of 32" layout —
//! so that adding a new kind inside a group never renumbers an existing one.

/// One byte selecting how a value is encoded on the wire.
///
/// Grouped in blocks of 32 so each family has headroom to grow without
/// shifting neighboring tags:
/// - `0..32`   tree-node tags (frame markers inside an error payload)
/// - `32..64`  scalar tags
/// - `64..96`  variable-length tags
/// - `96..128` structured tags
/// - `128..160` slice tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum ValueKind {
    // -- tree-node tags --
    NewNode = 0,
    WrapNode = 1,
    WrapInheritedNode = 2,
    JustContextNode = 3,
    JustContextInheritedNode = 4,
    LocationNode = 5,
    ForeignErrorText = 6,
    /// Reserved: defined by the grammar, never emitted by this implementation.
    PhantomContextNode = 7,

    // -- scalar tags --
    Bool = 32,
    Time = 33,
    Duration = 34,
    Int = 35,
    Int8 = 36,
    Int16 = 37,
    Int32 = 38,
    Int64 = 39,
    Uint = 40,
    Uint8 = 41,
    Uint16 = 42,
    Uint32 = 43,
    Uint64 = 44,
    Float32 = 45,
    Float64 = 46,

    // -- variable-length tags --
    String = 64,
    Bytes = 65,
    ErrorRaw = 66,

    // -- structured tags --
    Error = 96,
    ErrorEmbed = 97,
    Group = 98,
    Serializer = 99,

    // -- slice tags --
    SliceBool = 128,
    SliceInt = 129,
    SliceInt8 = 130,
    SliceInt16 = 131,
    SliceInt32 = 132,
    SliceInt64 = 133,
    SliceUint = 134,
    SliceUint8 = 135,
    SliceUint16 = 136,
    SliceUint32 = 137,
    SliceUint64 = 138,
    SliceFloat32 = 139,
    SliceFloat64 = 140,
    SliceString = 141,
}

impl ValueKind {
    /// Recover a `ValueKind` from its wire byte, rejecting values that were
    /// never assigned (gaps inside a group, or bytes past the last group).
    pub const fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::NewNode,
            1 => Self::WrapNode,
            2 => Self::WrapInheritedNode,
            3 => Self::JustContextNode,
            4 => Self::JustContextInheritedNode,
            5 => Self::LocationNode,
            6 => Self::ForeignErrorText,
            7 => Self::PhantomContextNode,
            32 => Self::Bool,
            33 => Self::Time,
            34 => Self::Duration,
            35 => Self::Int,
            36 => Self::Int8,
            37 => Self::Int16,
            38 => Self::Int32,
            39 => Self::Int64,
            40 => Self::Uint,
            41 => Self::Uint8,
            42 => Self::Uint16,
            43 => Self::Uint32,
            44 => Self::Uint64,
            45 => Self::Float32,
            46 => Self::Float64,
            64 => Self::String,
            65 => Self::Bytes,
            66 => Self::ErrorRaw,
            96 => Self::Error,
            97 => Self::ErrorEmbed,
            98 => Self::Group,
            99 => Self::Serializer,
            128 => Self::SliceBool,
            129 => Self::SliceInt,
            130 => Self::SliceInt8,
            131 => Self::SliceInt16,
            132 => Self::SliceInt32,
            133 => Self::SliceInt64,
            134 => Self::SliceUint,
            135 => Self::SliceUint8,
            136 => Self::SliceUint16,
            137 => Self::SliceUint32,
            138 => Self::SliceUint64,
            139 => Self::SliceFloat32,
            140 => Self::SliceFloat64,
            141 => Self::SliceString,
            _ => return None,
        })
    }
}

/// A 64-bit tag split as `kind_low = Kind & 0xFF` (selects a [`ValueKind`])
/// and `key_index = Kind >> 8` (optionally selects a predefined key; `0`
/// means "use the literal key bytes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kind(u64);

impl Kind {
    #[must_use]
    pub const fn new(kind: ValueKind, key_index: u32) -> Self {
        Self(((key_index as u64) << 8) | kind as u64)
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn kind_low(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    #[must_use]
    pub const fn key_index(self) -> u32 {
        (self.0 >> 8) as u32
    }

    #[must_use]
    pub fn value_kind(self) -> Option<ValueKind> {
        ValueKind::from_u8(self.kind_low())
    }
}
