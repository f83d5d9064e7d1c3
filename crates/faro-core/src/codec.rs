//! The codec (C3): `append`/`decode`, sole owner of the wire grammar (§4.1).
//!
//! The grammar is shared, byte for byte, between log records and error
//! payloads — both are just sequences of serialized [`Attr`]s. `append` is
//! purely additive (concatenating two calls equals one call over the
//! concatenation of their attrs), so callers can build a record or a
//! payload by folding `append` over a attrs list without any intermediate
//! tree.

use alloc::vec::Vec;
use integer_encoding::VarInt;

use crate::attr::{Attr, AttrKey, ValueRepr};
use crate::kind::ValueKind;

/// Append one self-delimited attribute to `dst`, returning it for chaining.
///
/// # Panics
///
/// Panics if `attr`'s key is an empty literal string (predefined keys are
/// exempt — see [`crate::Attr::with_predefined_key`]).
#[must_use]
pub fn append(mut dst: Vec<u8>, attr: &Attr<'_>) -> Vec<u8> {
    match attr.key {
        // Literal key length is carried as `len + 1` so that a raw `0`
        // marker is reserved exclusively for the predefined-key path below;
        // this is what actually makes "predefined vs. empty literal key"
        // decodable without lookahead (see `decode_key`'s doc comment).
        AttrKey::Literal(key) => {
            push_uvarint(&mut dst, key.len() as u64 + 1);
            dst.extend_from_slice(key.as_bytes());
        }
        AttrKey::Predefined(index) => {
            push_uvarint(&mut dst, 0);
            push_uvarint(&mut dst, u64::from(index));
        }
    }
    dst.push(attr.kind.kind_low());
    append_value(dst, &attr.repr)
}

fn append_value(mut dst: Vec<u8>, repr: &ValueRepr<'_>) -> Vec<u8> {
    match *repr {
        ValueRepr::Bool(v) => dst.push(u8::from(v)),
        ValueRepr::Int8(v) => dst.push(v.to_le_bytes()[0]),
        ValueRepr::Uint8(v) => dst.push(v),
        ValueRepr::Int16(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Uint16(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Int32(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Uint32(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Float32(v) => dst.extend_from_slice(&v.to_bits().to_le_bytes()),
        ValueRepr::Int(v) | ValueRepr::Int64(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Uint(v) | ValueRepr::Uint64(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Float64(v) => dst.extend_from_slice(&v.to_bits().to_le_bytes()),
        ValueRepr::Time(v) | ValueRepr::Duration(v) => dst.extend_from_slice(&v.to_le_bytes()),
        ValueRepr::Str(s) => push_len_prefixed(&mut dst, s.as_bytes()),
        ValueRepr::Bytes(b) => push_len_prefixed(&mut dst, b),
        ValueRepr::ErrorRaw(s) => push_len_prefixed(&mut dst, s.as_bytes()),
        ValueRepr::Error(payload) => push_len_prefixed(&mut dst, payload),
        ValueRepr::ErrorEmbed(text, payload) => {
            push_len_prefixed(&mut dst, text.as_bytes());
            push_len_prefixed(&mut dst, payload);
        }
        ValueRepr::Group(attrs) => {
            push_uvarint(&mut dst, attrs.len() as u64);
            for a in attrs {
                dst = append(dst, a);
            }
        }
        ValueRepr::Serializer(obj) => {
            // Reserve space for the length prefix, serialize in place, then
            // back-fill it now that the encoded size is known.
            let start = dst.len();
            push_uvarint(&mut dst, 0);
            let body_start = dst.len();
            dst = obj.serialize(dst);
            let body_len = (dst.len() - body_start) as u64;
            splice_uvarint(&mut dst, start, body_start, body_len);
        }
        ValueRepr::SliceBool(s) => {
            push_uvarint(&mut dst, s.len() as u64);
            dst.extend(s.iter().map(|&b| u8::from(b)));
        }
        ValueRepr::SliceInt(s) | ValueRepr::SliceInt64(s) => push_fixed_slice(&mut dst, s, i64::to_le_bytes),
        ValueRepr::SliceInt8(s) => {
            push_uvarint(&mut dst, s.len() as u64);
            dst.extend(s.iter().map(|&v| v.to_le_bytes()[0]));
        }
        ValueRepr::SliceInt16(s) => push_fixed_slice(&mut dst, s, i16::to_le_bytes),
        ValueRepr::SliceInt32(s) => push_fixed_slice(&mut dst, s, i32::to_le_bytes),
        ValueRepr::SliceUint(s) | ValueRepr::SliceUint64(s) => push_fixed_slice(&mut dst, s, u64::to_le_bytes),
        ValueRepr::SliceUint8(s) => {
            push_uvarint(&mut dst, s.len() as u64);
            dst.extend_from_slice(s);
        }
        ValueRepr::SliceUint16(s) => push_fixed_slice(&mut dst, s, u16::to_le_bytes),
        ValueRepr::SliceUint32(s) => push_fixed_slice(&mut dst, s, u32::to_le_bytes),
        ValueRepr::SliceFloat32(s) => {
            push_uvarint(&mut dst, s.len() as u64);
            for v in s {
                dst.extend_from_slice(&v.to_bits().to_le_bytes());
            }
        }
        ValueRepr::SliceFloat64(s) => {
            push_uvarint(&mut dst, s.len() as u64);
            for v in s {
                dst.extend_from_slice(&v.to_bits().to_le_bytes());
            }
        }
        ValueRepr::SliceString(s) => {
            push_uvarint(&mut dst, s.len() as u64);
            for part in s {
                push_len_prefixed(&mut dst, part.as_bytes());
            }
        }
        ValueRepr::Location { file, line } => {
            // Key already carried `file`; the value body is just the line.
            let _ = file;
            push_uvarint(&mut dst, u64::from(line));
        }
        ValueRepr::NewNode(_)
        | ValueRepr::WrapNode(_)
        | ValueRepr::WrapInheritedNode(_)
        | ValueRepr::ForeignErrorText(_) => {
            // Frame-node tags carry their message in the key; no value body.
        }
        ValueRepr::JustContextNode | ValueRepr::JustContextInheritedNode | ValueRepr::PhantomContextNode => {
            // No key body, no value body.
        }
    }
    dst
}

fn push_uvarint(dst: &mut Vec<u8>, v: u64) {
    let mut buf = [0u8; 10];
    let n = v.encode_var(&mut buf);
    dst.extend_from_slice(&buf[..n]);
}

fn push_len_prefixed(dst: &mut Vec<u8>, bytes: &[u8]) {
    push_uvarint(dst, bytes.len() as u64);
    dst.extend_from_slice(bytes);
}

fn push_fixed_slice<T: Copy, const N: usize>(dst: &mut Vec<u8>, items: &[T], to_le: fn(T) -> [u8; N]) {
    push_uvarint(dst, items.len() as u64);
    for &item in items {
        dst.extend_from_slice(&to_le(item));
    }
}

/// Back-fills a uvarint length prefix reserved at `start` once the body's
/// true length (`body_len`, ending at `body_start`) is known. Used only by
/// the `Serializer` kind, whose body size is not known ahead of the call.
fn splice_uvarint(dst: &mut Vec<u8>, start: usize, body_start: usize, body_len: u64) {
    let mut buf = [0u8; 10];
    let n = body_len.encode_var(&mut buf);
    let tail: Vec<u8> = dst[body_start..].to_vec();
    dst.truncate(start);
    dst.extend_from_slice(&buf[..n]);
    dst.extend_from_slice(&tail);
}

/// Failure surfaced by [`decode`]: the codec is total on well-formed input,
/// so this is the only way decoding can fail — a field running past the end
/// of `src` (§4.1 "Failure model").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError;

/// One decoded key and its kind, paired with its decoded value. Borrows
/// from the `src` buffer passed to [`decode`]; `Group`/nested `Error`
/// payloads are decoded eagerly into owned event vectors since the grammar
/// nests them inline rather than by reference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AttrEvent<'a> {
    pub key: AttrKey<'a>,
    pub kind: ValueKind,
    pub value: ValueEvent<'a>,
}

/// The decoded mirror of [`crate::attr::ValueRepr`]. `Group` holds fully
/// decoded sub-events rather than a lazy cursor, which keeps the viewer
/// (C6) from having to re-implement cursor bookkeeping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValueEvent<'a> {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Float32(f32),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Time(i64),
    Duration(i64),
    Str(&'a str),
    Bytes(&'a [u8]),
    ErrorRaw(&'a str),
    Error(&'a [u8]),
    ErrorEmbed(&'a str, &'a [u8]),
    Group(Vec<AttrEvent<'a>>),
    Serializer(&'a [u8]),
    SliceBool(Vec<bool>),
    SliceInt64(Vec<i64>),
    SliceInt8(Vec<i8>),
    SliceInt16(Vec<i16>),
    SliceInt32(Vec<i32>),
    SliceUint64(Vec<u64>),
    SliceUint8(&'a [u8]),
    SliceUint16(Vec<u16>),
    SliceUint32(Vec<u32>),
    SliceFloat32(Vec<f32>),
    SliceFloat64(Vec<f64>),
    SliceString(Vec<&'a str>),
    /// The call-site line; the file is already carried by [`AttrEvent::key`].
    Location(u64),
    /// Frame-node tags carry their message in [`AttrEvent::key`]; no value body.
    NewNode,
    WrapNode,
    WrapInheritedNode,
    ForeignErrorText,
    JustContextNode,
    JustContextInheritedNode,
    PhantomContextNode,
}

/// Decode one attribute from the front of `src`, returning the decoded
/// event and the remaining tail.
pub fn decode(src: &[u8]) -> Result<(AttrEvent<'_>, &[u8]), DecodeError> {
    let (key, mut rest) = decode_key(src)?;
    let kind_low = *rest.first().ok_or(DecodeError)?;
    rest = &rest[1..];
    let kind = ValueKind::from_u8(kind_low).ok_or(DecodeError)?;
    let (value, rest) = decode_value(kind, rest)?;
    Ok((AttrEvent { key, kind, value }, rest))
}

/// Decodes the key prefix (§4.1 point 1). A raw `0` marker means "predefined
/// key, index follows"; any other value `v` means "literal key of length
/// `v - 1`" (so a genuinely empty literal key, used by the context-only
/// frame tags, encodes as `1` rather than colliding with the predefined
/// marker). This `+1` offset is this implementation's own choice: the
/// distilled grammar's "leading zero-length varint" phrasing is ambiguous
/// between the two cases (a plain `0x00` byte is what *both* an empty
/// literal key and a predefined key with `index` whose first varint byte is
/// also `0` would start with), and a self-describing codec must be
/// decodable without lookahead into the kind byte that follows.
fn decode_key(src: &[u8]) -> Result<(AttrKey<'_>, &[u8]), DecodeError> {
    let (marker, rest) = take_uvarint(src)?;
    if marker == 0 {
        let (index, rest) = take_uvarint(rest)?;
        return Ok((AttrKey::Predefined(index as u32), rest));
    }
    let len = (marker - 1) as usize;
    let (key_bytes, rest) = take_bytes(rest, len)?;
    let key = core::str::from_utf8(key_bytes).map_err(|_| DecodeError)?;
    Ok((AttrKey::Literal(key), rest))
}

fn take_uvarint(src: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    let (v, n) = u64::decode_var(src).ok_or(DecodeError)?;
    Ok((v, &src[n..]))
}

fn take_bytes(src: &[u8], len: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if src.len() < len {
        return Err(DecodeError);
    }
    Ok(src.split_at(len))
}

fn take_len_prefixed(src: &[u8]) -> Result<(&[u8], &[u8]), DecodeError> {
    let (len, rest) = take_uvarint(src)?;
    take_bytes(rest, len as usize)
}

fn take_array<const N: usize>(src: &[u8]) -> Result<([u8; N], &[u8]), DecodeError> {
    let (bytes, rest) = take_bytes(src, N)?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(bytes);
    Ok((arr, rest))
}

#[allow(clippy::too_many_lines)]
fn decode_value(kind: ValueKind, src: &[u8]) -> Result<(ValueEvent<'_>, &[u8]), DecodeError> {
    Ok(match kind {
        ValueKind::Bool => {
            let (b, rest) = take_array::<1>(src)?;
            (ValueEvent::Bool(b[0] != 0), rest)
        }
        ValueKind::Int8 => {
            let (b, rest) = take_array::<1>(src)?;
            (ValueEvent::Int8(b[0] as i8), rest)
        }
        ValueKind::Uint8 => {
            let (b, rest) = take_array::<1>(src)?;
            (ValueEvent::Uint8(b[0]), rest)
        }
        ValueKind::Int16 => {
            let (b, rest) = take_array::<2>(src)?;
            (ValueEvent::Int16(i16::from_le_bytes(b)), rest)
        }
        ValueKind::Uint16 => {
            let (b, rest) = take_array::<2>(src)?;
            (ValueEvent::Uint16(u16::from_le_bytes(b)), rest)
        }
        ValueKind::Int32 => {
            let (b, rest) = take_array::<4>(src)?;
            (ValueEvent::Int32(i32::from_le_bytes(b)), rest)
        }
        ValueKind::Uint32 => {
            let (b, rest) = take_array::<4>(src)?;
            (ValueEvent::Uint32(u32::from_le_bytes(b)), rest)
        }
        ValueKind::Float32 => {
            let (b, rest) = take_array::<4>(src)?;
            (ValueEvent::Float32(f32::from_bits(u32::from_le_bytes(b))), rest)
        }
        ValueKind::Int | ValueKind::Int64 => {
            let (b, rest) = take_array::<8>(src)?;
            (ValueEvent::Int64(i64::from_le_bytes(b)), rest)
        }
        ValueKind::Uint | ValueKind::Uint64 => {
            let (b, rest) = take_array::<8>(src)?;
            (ValueEvent::Uint64(u64::from_le_bytes(b)), rest)
        }
        ValueKind::Float64 => {
            let (b, rest) = take_array::<8>(src)?;
            (ValueEvent::Float64(f64::from_bits(u64::from_le_bytes(b))), rest)
        }
        ValueKind::Time => {
            let (b, rest) = take_array::<8>(src)?;
            (ValueEvent::Time(i64::from_le_bytes(b)), rest)
        }
        ValueKind::Duration => {
            let (b, rest) = take_array::<8>(src)?;
            (ValueEvent::Duration(i64::from_le_bytes(b)), rest)
        }
        ValueKind::String => {
            let (bytes, rest) = take_len_prefixed(src)?;
            (ValueEvent::Str(core::str::from_utf8(bytes).map_err(|_| DecodeError)?), rest)
        }
        ValueKind::Bytes => {
            let (bytes, rest) = take_len_prefixed(src)?;
            (ValueEvent::Bytes(bytes), rest)
        }
        ValueKind::ErrorRaw => {
            let (bytes, rest) = take_len_prefixed(src)?;
            (ValueEvent::ErrorRaw(core::str::from_utf8(bytes).map_err(|_| DecodeError)?), rest)
        }
        ValueKind::Error => {
            let (bytes, rest) = take_len_prefixed(src)?;
            (ValueEvent::Error(bytes), rest)
        }
        ValueKind::ErrorEmbed => {
            let (text, rest) = take_len_prefixed(src)?;
            let text = core::str::from_utf8(text).map_err(|_| DecodeError)?;
            let (payload, rest) = take_len_prefixed(rest)?;
            (ValueEvent::ErrorEmbed(text, payload), rest)
        }
        ValueKind::Group => {
            let (count, mut rest) = take_uvarint(src)?;
            let mut attrs = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (ev, tail) = decode(rest)?;
                attrs.push(ev);
                rest = tail;
            }
            (ValueEvent::Group(attrs), rest)
        }
        ValueKind::Serializer => {
            let (bytes, rest) = take_len_prefixed(src)?;
            (ValueEvent::Serializer(bytes), rest)
        }
        ValueKind::SliceBool => {
            let (count, rest) = take_uvarint(src)?;
            let (bytes, rest) = take_bytes(rest, count as usize)?;
            (ValueEvent::SliceBool(bytes.iter().map(|&b| b != 0).collect()), rest)
        }
        ValueKind::SliceInt | ValueKind::SliceInt64 => decode_fixed_slice(src, i64::from_le_bytes, ValueEvent::SliceInt64)?,
        ValueKind::SliceInt8 => {
            let (count, rest) = take_uvarint(src)?;
            let (bytes, rest) = take_bytes(rest, count as usize)?;
            (ValueEvent::SliceInt8(bytes.iter().map(|&b| b as i8).collect()), rest)
        }
        ValueKind::SliceInt16 => decode_fixed_slice(src, i16::from_le_bytes, ValueEvent::SliceInt16)?,
        ValueKind::SliceInt32 => decode_fixed_slice(src, i32::from_le_bytes, ValueEvent::SliceInt32)?,
        ValueKind::SliceUint | ValueKind::SliceUint64 => decode_fixed_slice(src, u64::from_le_bytes, ValueEvent::SliceUint64)?,
        ValueKind::SliceUint8 => {
            let (count, rest) = take_uvarint(src)?;
            let (bytes, rest) = take_bytes(rest, count as usize)?;
            (ValueEvent::SliceUint8(bytes), rest)
        }
        ValueKind::SliceUint16 => decode_fixed_slice(src, u16::from_le_bytes, ValueEvent::SliceUint16)?,
        ValueKind::SliceUint32 => decode_fixed_slice(src, u32::from_le_bytes, ValueEvent::SliceUint32)?,
        ValueKind::SliceFloat32 => {
            let (count, mut rest) = take_uvarint(src)?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (bits, tail) = take_array::<4>(rest)?;
                items.push(f32::from_bits(u32::from_le_bytes(bits)));
                rest = tail;
            }
            (ValueEvent::SliceFloat32(items), rest)
        }
        ValueKind::SliceFloat64 => {
            let (count, mut rest) = take_uvarint(src)?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (bits, tail) = take_array::<8>(rest)?;
                items.push(f64::from_bits(u64::from_le_bytes(bits)));
                rest = tail;
            }
            (ValueEvent::SliceFloat64(items), rest)
        }
        ValueKind::SliceString => {
            let (count, mut rest) = take_uvarint(src)?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (bytes, tail) = take_len_prefixed(rest)?;
                items.push(core::str::from_utf8(bytes).map_err(|_| DecodeError)?);
                rest = tail;
            }
            (ValueEvent::SliceString(items), rest)
        }
        ValueKind::LocationNode => {
            // Key already holds the file string; decode_key has consumed it.
            let (line, rest) = take_uvarint(src)?;
            (ValueEvent::Location(line), rest)
        }
        ValueKind::NewNode => (ValueEvent::NewNode, src),
        ValueKind::WrapNode => (ValueEvent::WrapNode, src),
        ValueKind::WrapInheritedNode => (ValueEvent::WrapInheritedNode, src),
        ValueKind::ForeignErrorText => (ValueEvent::ForeignErrorText, src),
        ValueKind::JustContextNode => (ValueEvent::JustContextNode, src),
        ValueKind::JustContextInheritedNode => (ValueEvent::JustContextInheritedNode, src),
        ValueKind::PhantomContextNode => (ValueEvent::PhantomContextNode, src),
    })
}

fn decode_fixed_slice<T, const N: usize, R>(
    src: &[u8],
    from_le: fn([u8; N]) -> T,
    wrap: fn(Vec<T>) -> R,
) -> Result<(R, &[u8]), DecodeError> {
    let (count, mut rest) = take_uvarint(src)?;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (arr, tail) = take_array::<N>(rest)?;
        items.push(from_le(arr));
        rest = tail;
    }
    Ok((wrap(items), rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Attr;
    use crate::predefined::PREDEFINED_USER_ID;

    #[test]
    fn str_attr_round_trips() {
        let attr = Attr::str_attr("k", "v");
        let buf = append(Vec::new(), &attr);
        let (ev, tail) = decode(&buf).unwrap();
        assert!(tail.is_empty());
        assert_eq!(ev.key, AttrKey::Literal("k"));
        assert_eq!(ev.kind, ValueKind::String);
        assert_eq!(ev.value, ValueEvent::Str("v"));
    }

    #[test]
    fn int_attr_round_trips_negative() {
        let attr = Attr::int_attr("n", -1);
        let buf = append(Vec::new(), &attr);
        assert_eq!(buf, {
            let mut expected = Vec::new();
            expected.push(2); // uvarint(len("n") + 1) = 2
            expected.push(b'n');
            expected.push(ValueKind::Int as u8);
            expected.extend_from_slice(&(-1i64).to_le_bytes());
            expected
        });
        let (ev, tail) = decode(&buf).unwrap();
        assert!(tail.is_empty());
        assert_eq!(ev.value, ValueEvent::Int64(-1));
    }

    #[test]
    fn predefined_key_round_trips_without_key_bytes() {
        let attr = Attr::str_attr("user-id", "unused").with_predefined_key(PREDEFINED_USER_ID);
        let buf = append(Vec::new(), &attr);
        // marker byte (0) + uvarint(index=1) + kind byte + value, no key text.
        assert_eq!(buf[0], 0);
        let (ev, _) = decode(&buf).unwrap();
        assert_eq!(ev.key, AttrKey::Predefined(PREDEFINED_USER_ID));
    }

    #[test]
    fn empty_literal_key_does_not_collide_with_predefined_marker() {
        let attr = Attr::just_context_node();
        let buf = append(Vec::new(), &attr);
        let (ev, tail) = decode(&buf).unwrap();
        assert!(tail.is_empty());
        assert_eq!(ev.key, AttrKey::Literal(""));
        assert_eq!(ev.value, ValueEvent::JustContextNode);
    }

    #[test]
    fn group_round_trips_nested_attrs() {
        let inner = [Attr::int_attr("a", 1), Attr::bool_attr("b", true)];
        let attr = Attr::group_attr("g", &inner);
        let buf = append(Vec::new(), &attr);
        let (ev, tail) = decode(&buf).unwrap();
        assert!(tail.is_empty());
        let ValueEvent::Group(items) = ev.value else { panic!("expected Group") };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value, ValueEvent::Int64(1));
        assert_eq!(items[1].value, ValueEvent::Bool(true));
    }

    #[test]
    fn append_is_purely_additive() {
        let a1 = Attr::str_attr("a", "1");
        let a2 = Attr::int_attr("b", 2);
        let combined = append(append(Vec::new(), &a1), &a2);
        let mut expected = append(Vec::new(), &a1);
        expected = append(expected, &a2);
        assert_eq!(combined, expected);
    }

    #[test]
    fn bytes_round_trip_slice() {
        let data = [1u8, 2, 3];
        let attr = Attr::slice_uint8_attr("raw", &data);
        let buf = append(Vec::new(), &attr);
        let (ev, _) = decode(&buf).unwrap();
        assert_eq!(ev.value, ValueEvent::SliceUint8(&data));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let attr = Attr::str_attr("k", "v");
        let buf = append(Vec::new(), &attr);
        for cut in 0..buf.len() {
            assert!(decode(&buf[..cut]).is_err(), "expected truncation at {cut}");
        }
    }
}

#[cfg(test)]
mod proptests {
    use alloc::string::String;
    use proptest::prelude::*;

    use super::*;
    use crate::attr::Attr;

    /// Key text restricted to non-empty ASCII so it never collides with the
    /// frame-node tags' reserved empty key.
    fn key_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_]{0,15}".prop_map(String::from)
    }

    proptest! {
        /// `decode(append(attr))` recovers the exact key/kind/value for any
        /// string or integer attribute over the generated domain (§4.1).
        #[test]
        fn str_attr_round_trips_over_the_key_value_domain(key in key_strategy(), value in ".{0,64}") {
            let attr = Attr::str_attr(&key, &value);
            let buf = append(Vec::new(), &attr);
            let (ev, tail) = decode(&buf).unwrap();
            prop_assert!(tail.is_empty());
            prop_assert_eq!(ev.key, AttrKey::Literal(key.as_str()));
            prop_assert_eq!(ev.value, ValueEvent::Str(value.as_str()));
        }

        #[test]
        fn int_attr_round_trips_over_the_full_i64_domain(key in key_strategy(), value: i64) {
            let attr = Attr::int_attr(&key, value);
            let buf = append(Vec::new(), &attr);
            let (ev, tail) = decode(&buf).unwrap();
            prop_assert!(tail.is_empty());
            prop_assert_eq!(ev.value, ValueEvent::Int64(value));
        }

        #[test]
        fn bytes_attr_round_trips_over_arbitrary_byte_strings(key in key_strategy(), value in prop::collection::vec(any::<u8>(), 0..64)) {
            let attr = Attr::slice_uint8_attr(&key, &value);
            let buf = append(Vec::new(), &attr);
            let (ev, tail) = decode(&buf).unwrap();
            prop_assert!(tail.is_empty());
            prop_assert_eq!(ev.value, ValueEvent::SliceUint8(value.as_slice()));
        }

        /// `append` is purely additive (module doc, §4.1): folding it over two
        /// attrs equals one call per attr chained, for any pair in the domain.
        #[test]
        fn append_concatenation_is_associative(k1 in key_strategy(), v1: i64, k2 in key_strategy(), v2 in ".{0,32}") {
            let a = Attr::int_attr(&k1, v1);
            let b = Attr::str_attr(&k2, &v2);

            let chained = append(append(Vec::new(), &a), &b);

            let mut folded = Vec::new();
            for attr in [&a, &b] {
                folded = append(folded, attr);
            }
            prop_assert_eq!(&chained, &folded);

            let (first, tail) = decode(&chained).unwrap();
            let (second, tail) = decode(tail).unwrap();
            prop_assert!(tail.is_empty());
            prop_assert_eq!(first.value, ValueEvent::Int64(v1));
            prop_assert_eq!(second.value, ValueEvent::Str(v2.as_str()));
        }

        /// Truncating a well-formed encoding anywhere before its end never
        /// panics and never silently succeeds (§4.1 "Failure model").
        #[test]
        fn truncation_never_panics_and_never_falsely_succeeds(key in key_strategy(), value: i64, cut in 0usize..64) {
            let attr = Attr::int_attr(&key, value);
            let buf = append(Vec::new(), &attr);
            let cut = cut.min(buf.len());
            if cut < buf.len() {
                prop_assert!(decode(&buf[..cut]).is_err());
            }
        }
    }
}
