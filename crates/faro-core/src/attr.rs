//! The attribute factory (C2): typed constructors producing an [`Attr`]
//! without heap allocation for the payload in the common case — every
//! variant borrows from whatever the caller already owns.

use alloc::vec::Vec;

use crate::kind::{Kind, ValueKind};

/// Borrow-and-serialize capability for user-supplied objects (the
/// `Serializer` attribute kind). Implementors append their own
/// representation to `buf` and return it, mirroring [`crate::append`]'s own
/// signature so the two compose without an intermediate buffer.
pub trait Serializer {
    fn serialize(&self, buf: Vec<u8>) -> Vec<u8>;
}

/// How an attribute's key is carried on the wire: either a literal string
/// or an index into the process-wide predefined-key table (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AttrKey<'a> {
    Literal(&'a str),
    Predefined(u32),
}

/// The borrowed value payload of an [`Attr`]. Every variant's lifetime is
/// tied to the caller's inputs; an `Attr` never outlives the call that
/// constructed it.
pub enum ValueRepr<'a> {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Float32(f32),
    Int(i64),
    Int64(i64),
    Uint(u64),
    Uint64(u64),
    Float64(f64),
    /// Nanoseconds since the Unix epoch.
    Time(i64),
    /// Nanoseconds.
    Duration(i64),
    Str(&'a str),
    Bytes(&'a [u8]),
    /// An already-materialized error string (the chain it came from could
    /// not be reconstructed any other way).
    ErrorRaw(&'a str),
    /// A nested, self-sufficient error payload.
    Error(&'a [u8]),
    /// A nested error payload that is not self-sufficient, paired with its
    /// precomputed rendered text.
    ErrorEmbed(&'a str, &'a [u8]),
    Group(&'a [Attr<'a>]),
    Serializer(&'a dyn Serializer),
    SliceBool(&'a [bool]),
    SliceInt(&'a [i64]),
    SliceInt8(&'a [i8]),
    SliceInt16(&'a [i16]),
    SliceInt32(&'a [i32]),
    SliceInt64(&'a [i64]),
    SliceUint(&'a [u64]),
    SliceUint8(&'a [u8]),
    SliceUint16(&'a [u16]),
    SliceUint32(&'a [u32]),
    SliceUint64(&'a [u64]),
    SliceFloat32(&'a [f32]),
    SliceFloat64(&'a [f64]),
    SliceString(&'a [&'a str]),
    /// Frame metadata: the call-site file and line, captured via
    /// `#[track_caller]`.
    Location { file: &'a str, line: u32 },
    NewNode(&'a str),
    WrapNode(&'a str),
    WrapInheritedNode(&'a str),
    ForeignErrorText(&'a str),
    JustContextNode,
    JustContextInheritedNode,
    /// Reserved tag. The grammar defines it; nothing constructs it.
    PhantomContextNode,
}

/// A key/value/kind triple destined to be serialized into a payload (§3).
pub struct Attr<'a> {
    pub key: AttrKey<'a>,
    pub kind: Kind,
    pub repr: ValueRepr<'a>,
}

fn nonempty_key(key: &str) {
    assert!(!key.is_empty(), "attribute key must be nonempty");
}

impl<'a> Attr<'a> {
    /// Repoint this attribute at a predefined key, packing its index into
    /// [`Kind`]'s high bits instead of carrying the literal string.
    #[must_use]
    pub fn with_predefined_key(mut self, index: u32) -> Self {
        let vk = self.kind.value_kind().expect("Attr always carries a known ValueKind");
        self.kind = Kind::new(vk, index);
        self.key = AttrKey::Predefined(index);
        self
    }

    fn new(key: &'a str, vk: ValueKind, repr: ValueRepr<'a>) -> Self {
        nonempty_key(key);
        Self { key: AttrKey::Literal(key), kind: Kind::new(vk, 0), repr }
    }
}

/// Generates the repetitive scalar/slice constructors: one macro invocation
/// per wire kind, matching this workspace's convention of macro-generated
/// accessor families for numeric type fan-out.
macro_rules! scalar_attr {
    ($fn_name:ident, $kind:ident, $repr:ident, $ty:ty) => {
        impl<'a> Attr<'a> {
            #[must_use]
            pub fn $fn_name(key: &'a str, value: $ty) -> Self {
                Self::new(key, ValueKind::$kind, ValueRepr::$repr(value))
            }
        }
    };
}

scalar_attr!(bool_attr, Bool, Bool, bool);
scalar_attr!(int8_attr, Int8, Int8, i8);
scalar_attr!(uint8_attr, Uint8, Uint8, u8);
scalar_attr!(int16_attr, Int16, Int16, i16);
scalar_attr!(uint16_attr, Uint16, Uint16, u16);
scalar_attr!(int32_attr, Int32, Int32, i32);
scalar_attr!(uint32_attr, Uint32, Uint32, u32);
scalar_attr!(f32_attr, Float32, Float32, f32);
scalar_attr!(int_attr, Int, Int, i64);
scalar_attr!(int64_attr, Int64, Int64, i64);
scalar_attr!(uint_attr, Uint, Uint, u64);
scalar_attr!(uint64_attr, Uint64, Uint64, u64);
scalar_attr!(f64_attr, Float64, Float64, f64);
/// Nanoseconds since the Unix epoch.
scalar_attr!(time_attr, Time, Time, i64);
/// Nanoseconds.
scalar_attr!(duration_attr, Duration, Duration, i64);

scalar_attr!(slice_bool_attr, SliceBool, SliceBool, &'a [bool]);
scalar_attr!(slice_int_attr, SliceInt, SliceInt, &'a [i64]);
scalar_attr!(slice_int8_attr, SliceInt8, SliceInt8, &'a [i8]);
scalar_attr!(slice_int16_attr, SliceInt16, SliceInt16, &'a [i16]);
scalar_attr!(slice_int32_attr, SliceInt32, SliceInt32, &'a [i32]);
scalar_attr!(slice_int64_attr, SliceInt64, SliceInt64, &'a [i64]);
scalar_attr!(slice_uint_attr, SliceUint, SliceUint, &'a [u64]);
scalar_attr!(slice_uint16_attr, SliceUint16, SliceUint16, &'a [u16]);
scalar_attr!(slice_uint32_attr, SliceUint32, SliceUint32, &'a [u32]);
scalar_attr!(slice_uint64_attr, SliceUint64, SliceUint64, &'a [u64]);
scalar_attr!(slice_f32_attr, SliceFloat32, SliceFloat32, &'a [f32]);
scalar_attr!(slice_f64_attr, SliceFloat64, SliceFloat64, &'a [f64]);
scalar_attr!(slice_string_attr, SliceString, SliceString, &'a [&'a str]);

impl<'a> Attr<'a> {
    #[must_use]
    pub fn str_attr(key: &'a str, value: &'a str) -> Self {
        Self::new(key, ValueKind::String, ValueRepr::Str(value))
    }

    /// Classifies `value`: every byte printable (ASCII graphic, or
    /// whitespace) is encoded as `String`, otherwise as `Bytes` — so the
    /// viewer can render text attachments as text.
    #[must_use]
    pub fn bytes_attr(key: &'a str, value: &'a [u8]) -> Self {
        if is_printable_with_spaces(value) {
            if let Ok(s) = core::str::from_utf8(value) {
                return Self::new(key, ValueKind::String, ValueRepr::Str(s));
            }
        }
        Self::new(key, ValueKind::Bytes, ValueRepr::Bytes(value))
    }

    /// A user object's `Display`/`Debug` string, captured once at
    /// construction (the `Stg` constructor of the original attribute
    /// factory).
    #[must_use]
    pub fn stg_attr(key: &'a str, value: &'a str) -> Self {
        Self::new(key, ValueKind::String, ValueRepr::Str(value))
    }

    #[must_use]
    pub fn slice_uint8_attr(key: &'a str, value: &'a [u8]) -> Self {
        Self::new(key, ValueKind::SliceUint8, ValueRepr::SliceUint8(value))
    }

    #[must_use]
    pub fn group_attr(key: &'a str, attrs: &'a [Attr<'a>]) -> Self {
        Self::new(key, ValueKind::Group, ValueRepr::Group(attrs))
    }

    #[must_use]
    pub fn obj_attr(key: &'a str, value: &'a dyn Serializer) -> Self {
        Self::new(key, ValueKind::Serializer, ValueRepr::Serializer(value))
    }

    /// A raw, already-materialized error string — used when neither the
    /// payload nor a precomputed text is available (a purely foreign error
    /// reached through something other than the chain's own `wrap`).
    #[must_use]
    pub fn error_raw_attr(key: &'a str, text: &'a str) -> Self {
        Self::new(key, ValueKind::ErrorRaw, ValueRepr::ErrorRaw(text))
    }

    /// A self-sufficient nested error payload.
    #[must_use]
    pub fn error_attr(key: &'a str, payload: &'a [u8]) -> Self {
        Self::new(key, ValueKind::Error, ValueRepr::Error(payload))
    }

    /// A nested error payload that cannot reconstruct its own text alone,
    /// paired with the precomputed text.
    #[must_use]
    pub fn error_embed_attr(key: &'a str, text: &'a str, payload: &'a [u8]) -> Self {
        Self::new(key, ValueKind::ErrorEmbed, ValueRepr::ErrorEmbed(text, payload))
    }
}

/// Frame-node and location constructors used by the error payload engine.
/// These carry no user-facing key; `key` doubles as the frame message for
/// the node tags, and as the source-file string for [`ValueKind::LocationNode`].
impl<'a> Attr<'a> {
    #[must_use]
    pub fn new_node(message: &'a str) -> Self {
        Self { key: AttrKey::Literal(message), kind: Kind::new(ValueKind::NewNode, 0), repr: ValueRepr::NewNode(message) }
    }

    #[must_use]
    pub fn wrap_node(message: &'a str) -> Self {
        Self { key: AttrKey::Literal(message), kind: Kind::new(ValueKind::WrapNode, 0), repr: ValueRepr::WrapNode(message) }
    }

    #[must_use]
    pub fn wrap_inherited_node(message: &'a str) -> Self {
        Self {
            key: AttrKey::Literal(message),
            kind: Kind::new(ValueKind::WrapInheritedNode, 0),
            repr: ValueRepr::WrapInheritedNode(message),
        }
    }

    #[must_use]
    pub fn foreign_error_text(text: &'a str) -> Self {
        Self {
            key: AttrKey::Literal(text),
            kind: Kind::new(ValueKind::ForeignErrorText, 0),
            repr: ValueRepr::ForeignErrorText(text),
        }
    }

    #[must_use]
    pub fn just_context_node() -> Self {
        Self { key: AttrKey::Literal(""), kind: Kind::new(ValueKind::JustContextNode, 0), repr: ValueRepr::JustContextNode }
    }

    #[must_use]
    pub fn just_context_inherited_node() -> Self {
        Self {
            key: AttrKey::Literal(""),
            kind: Kind::new(ValueKind::JustContextInheritedNode, 0),
            repr: ValueRepr::JustContextInheritedNode,
        }
    }

    #[must_use]
    pub fn location_node(file: &'a str, line: u32) -> Self {
        Self {
            key: AttrKey::Literal(file),
            kind: Kind::new(ValueKind::LocationNode, 0),
            repr: ValueRepr::Location { file, line },
        }
    }
}

/// Classifies a byte slice the way the viewer expects: printable text
/// (Unicode `is_alphanumeric`/ASCII graphic or whitespace) renders as a
/// string rather than a hex dump.
#[must_use]
pub fn is_printable_with_spaces(bytes: &[u8]) -> bool {
    let Ok(s) = core::str::from_utf8(bytes) else { return false };
    s.chars().all(|c| !c.is_control() || c.is_whitespace())
}
