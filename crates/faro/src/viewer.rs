//! The viewer / decoder (C6): walks a framed record (or a nested error
//! payload) driving a consumer interface, without ever building its own
//! opinion of how the result should be displayed — that is [`HumanView`]'s
//! job, one possible consumer among others a caller can supply.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use integer_encoding::VarInt;

use faro_core::{AttrEvent, AttrKey, ValueEvent};

use crate::{Level, ViewerError};

/// Driven once per decoded record: `Time`/`Level`/`Location`/`Message` each
/// fire at most once, in that order, before [`Consumer::attrs`] is asked for
/// the root attribute sink (§4.5).
pub trait Consumer {
    fn set_time(&mut self, unix_nanos: u64);
    fn set_level(&mut self, level: Option<Level>);
    fn set_location(&mut self, location: Option<(&str, u32)>);
    fn set_message(&mut self, msg: &str);
    fn attrs(&mut self) -> &mut dyn AttrConsumer;
}

/// A fully decoded record, returned by [`decode_record_tree`] for callers
/// that want an owned, re-serializable tree (e.g. to JSON via the `serde`
/// feature) rather than driving a [`Consumer`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodedRecord<'a> {
    pub time_unix_nanos: u64,
    pub level: Option<Level>,
    pub location: Option<(&'a str, u32)>,
    pub message: &'a str,
    pub attrs: Vec<AttrEvent<'a>>,
}

/// The attribute sink `Consumer::attrs` hands back (§4.5 `AC`). Nested
/// groups are driven through a callback rather than a returned child
/// builder — the idiomatic Rust shape for "open a scope, do some appends,
/// close it" without fighting the borrow checker over a trait object's
/// lifetime.
pub trait AttrConsumer {
    fn append(&mut self, key: &str, value: &ValueEvent<'_>);
    fn append_group(&mut self, key: &str, body: &mut dyn FnMut(&mut dyn AttrConsumer));
    fn append_empty_group(&mut self, key: &str);
}

/// Resolves a decoded key to its literal text, falling back to the
/// predefined-key table for an index-carried key (§6.3).
fn resolve_key(key: AttrKey<'_>) -> Cow<'_, str> {
    match key {
        AttrKey::Literal(s) => Cow::Borrowed(s),
        AttrKey::Predefined(idx) => match faro_core::predefined_key(idx) {
            Some(s) => Cow::Owned(s),
            None => Cow::Owned(alloc::format!("<predefined:{idx}>")),
        },
    }
}

fn is_frame_marker(v: &ValueEvent<'_>) -> bool {
    matches!(
        v,
        ValueEvent::NewNode
            | ValueEvent::WrapNode
            | ValueEvent::WrapInheritedNode
            | ValueEvent::JustContextNode
            | ValueEvent::JustContextInheritedNode
            | ValueEvent::ForeignErrorText
    )
}

fn decode_all(mut rest: &[u8]) -> Vec<AttrEvent<'_>> {
    let mut events = Vec::new();
    while !rest.is_empty() {
        let Ok((ev, tail)) = faro_core::decode(rest) else { break };
        events.push(ev);
        rest = tail;
    }
    events
}

/// Walks one already-decoded attribute, dispatching nested structure
/// (`Group`, `Error`, `ErrorEmbed`) to the matching `AttrConsumer` call and
/// everything else straight through as a scalar/slice append.
fn emit_event(ev: &AttrEvent<'_>, ac: &mut dyn AttrConsumer) {
    let key = resolve_key(ev.key);
    match &ev.value {
        ValueEvent::Group(items) => {
            if items.is_empty() {
                ac.append_empty_group(&key);
            } else {
                ac.append_group(&key, &mut |inner| {
                    for item in items {
                        emit_event(item, inner);
                    }
                });
            }
        }
        ValueEvent::Error(payload) => {
            let events = decode_all(payload);
            // Identical to `Error`'s own `Display` for the sufficient case
            // (§4.2 "Message rendering"): a nested `Error` attr is only ever
            // encoded with `ValueKind::Error` when its chain is sufficient.
            let text = crate::error::render(payload, || None);
            ac.append_group(&key, &mut |inner| {
                inner.append("text", &ValueEvent::Str(&text));
                inner.append_group("@context", &mut |ctx| emit_payload_frames(&events, ctx));
            });
        }
        ValueEvent::ErrorEmbed(text, payload) => {
            let events = decode_all(payload);
            ac.append_group(&key, &mut |inner| {
                inner.append("text", &ValueEvent::Str(text));
                inner.append_group("@context", &mut |ctx| emit_payload_frames(&events, ctx));
            });
        }
        ValueEvent::Location(line) => {
            ac.append(&key, &ValueEvent::Uint64(*line));
        }
        other => ac.append(&key, other),
    }
}

/// Renders an error payload's frame/context structure into an `AttrConsumer`
/// (§4.5 "Nested error decoding" / "JustContext decoding"): frame-node tags
/// bracket the value attrs that belong to them, and a `JustContext*` node
/// additionally opens a nested `ctx` group so the viewer can tell "context
/// attached at a context-only frame" apart from "context attached at a
/// message frame" (§4.2 "Just-context").
fn emit_payload_frames(events: &[AttrEvent<'_>], ac: &mut dyn AttrConsumer) {
    let mut i = 0;
    while i < events.len() {
        let is_just = matches!(events[i].value, ValueEvent::JustContextNode | ValueEvent::JustContextInheritedNode);
        i += 1;
        let start = i;
        while i < events.len() && !is_frame_marker(&events[i].value) {
            i += 1;
        }
        let slice = &events[start..i];
        if is_just {
            if slice.is_empty() {
                ac.append_empty_group("ctx");
            } else {
                ac.append_group("ctx", &mut |inner| {
                    for ev in slice {
                        emit_event(ev, inner);
                    }
                });
            }
        } else {
            for ev in slice {
                emit_event(ev, ac);
            }
        }
    }
}

/// Computes the total on-wire length (header + body) of the record starting
/// at `bytes`, for callers walking a stream of back-to-back records (e.g.
/// `faro-cli dump`). Does not validate the CRC.
///
/// # Errors
///
/// [`ViewerError::TruncatedRecord`] if `bytes` does not hold a complete
/// header or the declared body does not fit.
pub fn framed_len(bytes: &[u8]) -> Result<usize, ViewerError> {
    if bytes.first().copied() != Some(0xFF) {
        return Err(ViewerError::TruncatedRecord);
    }
    let after_sentinel = bytes.get(1..).ok_or(ViewerError::TruncatedRecord)?;
    let after_crc = after_sentinel.get(4..).ok_or(ViewerError::TruncatedRecord)?;
    let (body_len, n) = u64::decode_var(after_crc).ok_or(ViewerError::TruncatedRecord)?;
    let header_len = 1 + 4 + n;
    let total = header_len + body_len as usize;
    if bytes.len() < total {
        return Err(ViewerError::TruncatedRecord);
    }
    Ok(total)
}

/// Decodes one framed record (§6.1), driving `consumer` with its
/// time/level/location/message and then its full attribute tree.
///
/// When `safe_view` is `false` the CRC32C stored in the header is checked
/// against the body and a mismatch is reported as [`ViewerError::Corrupted`]
/// before any field is decoded; `safe_view = true` skips that check (useful
/// for best-effort inspection of a record a writer may have torn).
///
/// # Errors
///
/// [`ViewerError::TruncatedRecord`] if any field runs past the end of the
/// record; [`ViewerError::Corrupted`] on a CRC mismatch in validating mode.
pub fn decode_record(framed: &[u8], consumer: &mut dyn Consumer, safe_view: bool) -> Result<(), ViewerError> {
    let body = split_frame(framed, safe_view)?;
    let header = parse_header(body)?;
    consumer.set_time(header.time_unix_nanos);
    consumer.set_level(header.level);
    consumer.set_location(header.location);
    consumer.set_message(header.message);

    let mut tail = header.tail;
    while !tail.is_empty() {
        let (ev, next) = faro_core::decode(tail)?;
        emit_event(&ev, consumer.attrs());
        tail = next;
    }
    Ok(())
}

/// Decodes one framed record into an owned tree of [`AttrEvent`]s instead of
/// driving a [`Consumer`] — the shape a caller wants when re-serializing a
/// record (e.g. to JSON via the `serde` feature) rather than rendering it.
/// Unlike [`decode_record`], the `Group`/`Error`/`ErrorEmbed` structure is
/// preserved exactly as decoded; nothing is expanded into a `text`/`@context`
/// pair.
///
/// # Errors
///
/// Same as [`decode_record`].
pub fn decode_record_tree(framed: &[u8], safe_view: bool) -> Result<DecodedRecord<'_>, ViewerError> {
    let body = split_frame(framed, safe_view)?;
    let header = parse_header(body)?;

    let mut attrs = Vec::new();
    let mut tail = header.tail;
    while !tail.is_empty() {
        let (ev, next) = faro_core::decode(tail)?;
        attrs.push(ev);
        tail = next;
    }
    Ok(DecodedRecord {
        time_unix_nanos: header.time_unix_nanos,
        level: header.level,
        location: header.location,
        message: header.message,
        attrs,
    })
}

/// Validates the frame header (sentinel, CRC32C in validating mode, length
/// prefix) and returns the body slice shared by [`decode_record`] and
/// [`decode_record_tree`].
fn split_frame(framed: &[u8], safe_view: bool) -> Result<&[u8], ViewerError> {
    if framed.first().copied() != Some(0xFF) {
        return Err(ViewerError::TruncatedRecord);
    }
    let rest = framed.get(1..).ok_or(ViewerError::TruncatedRecord)?;
    let crc_bytes = rest.get(..4).ok_or(ViewerError::TruncatedRecord)?;
    let crc_stored = u32::from_le_bytes(crc_bytes.try_into().expect("checked length"));
    let rest = &rest[4..];
    let (body_len, n) = u64::decode_var(rest).ok_or(ViewerError::TruncatedRecord)?;
    let rest = rest.get(n..).ok_or(ViewerError::TruncatedRecord)?;
    let body = rest.get(..body_len as usize).ok_or(ViewerError::TruncatedRecord)?;

    if !safe_view {
        let crc = crc32c::crc32c(body);
        if crc != crc_stored {
            return Err(ViewerError::Corrupted);
        }
    }
    Ok(body)
}

/// A decoded record's fixed header fields plus the remaining attribute bytes
/// (not yet walked), shared by [`decode_record`] and [`decode_record_tree`].
struct Header<'a> {
    time_unix_nanos: u64,
    level: Option<Level>,
    location: Option<(&'a str, u32)>,
    message: &'a str,
    tail: &'a [u8],
}

fn parse_header(body: &[u8]) -> Result<Header<'_>, ViewerError> {
    let time_bytes = body.get(..8).ok_or(ViewerError::TruncatedRecord)?;
    let time_unix_nanos = u64::from_le_bytes(time_bytes.try_into().expect("checked length"));
    let mut rest = &body[8..];

    let level_byte = *rest.first().ok_or(ViewerError::TruncatedRecord)?;
    rest = &rest[1..];
    let level = Level::from_u8(level_byte);

    let loc_marker = *rest.first().ok_or(ViewerError::TruncatedRecord)?;
    let location = if loc_marker == 0 {
        rest = &rest[1..];
        None
    } else {
        let (file_len, n) = u64::decode_var(rest).ok_or(ViewerError::TruncatedRecord)?;
        rest = rest.get(n..).ok_or(ViewerError::TruncatedRecord)?;
        let file_bytes = rest.get(..file_len as usize).ok_or(ViewerError::TruncatedRecord)?;
        let file = core::str::from_utf8(file_bytes).map_err(|_| ViewerError::TruncatedRecord)?;
        rest = &rest[file_len as usize..];
        let (line, n2) = u64::decode_var(rest).ok_or(ViewerError::TruncatedRecord)?;
        rest = rest.get(n2..).ok_or(ViewerError::TruncatedRecord)?;
        Some((file, line as u32))
    };

    // `custom_bytes` is an external-collaborator extension point (§1) that
    // carries no length prefix of its own (§6.1); this binding's logger never
    // populates it, so there is nothing to skip here.
    let (msg_len, n) = u64::decode_var(rest).ok_or(ViewerError::TruncatedRecord)?;
    rest = rest.get(n..).ok_or(ViewerError::TruncatedRecord)?;
    let msg_bytes = rest.get(..msg_len as usize).ok_or(ViewerError::TruncatedRecord)?;
    let message = core::str::from_utf8(msg_bytes).map_err(|_| ViewerError::TruncatedRecord)?;
    rest = &rest[msg_len as usize..];

    Ok(Header { time_unix_nanos, level, location, message, tail: rest })
}

/// A reference [`Consumer`]/[`AttrConsumer`] that renders a decoded record
/// as an indented, box-drawn tree (§4.6, §2.1 "a default implementation is
/// provided for usability and testing"). Not the only possible consumer —
/// callers needing different presentation choices implement the traits
/// directly over their own sink.
pub struct HumanView {
    out: String,
    depth: usize,
    color: bool,
}

impl Default for HumanView {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanView {
    #[must_use]
    pub fn new() -> Self {
        Self { out: String::new(), depth: 0, color: false }
    }

    /// Same as [`Self::new`] but wraps the level name in an ANSI color
    /// appropriate to its severity (out-of-scope presentation detail, kept
    /// to a handful of hardcoded escape codes rather than a dependency).
    #[must_use]
    pub fn with_color(color: bool) -> Self {
        Self { out: String::new(), depth: 0, color }
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn level_color(level: Level) -> &'static str {
        match level {
            Level::Trace | Level::Debug => "\x1b[2m",
            Level::Info => "\x1b[36m",
            Level::Warning => "\x1b[33m",
            Level::Error => "\x1b[31m",
            Level::Panic => "\x1b[1;31m",
        }
    }

    fn push_value(&mut self, value: &ValueEvent<'_>) {
        match value {
            ValueEvent::Bool(b) => {
                let _ = write!(self.out, "{b}");
            }
            ValueEvent::Int8(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Uint8(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Int16(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Uint16(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Int32(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Uint32(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Float32(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Int64(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Uint64(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Float64(v) => {
                let _ = write!(self.out, "{v}");
            }
            ValueEvent::Time(v) => {
                let _ = write!(self.out, "{v}ns");
            }
            ValueEvent::Duration(v) => {
                let _ = write!(self.out, "{v}ns");
            }
            ValueEvent::Str(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::Bytes(b) => {
                let _ = write!(self.out, "<{} bytes>", b.len());
            }
            ValueEvent::ErrorRaw(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::Serializer(b) => {
                let _ = write!(self.out, "<serialized {} bytes>", b.len());
            }
            ValueEvent::SliceBool(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceInt64(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceInt8(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceInt16(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceInt32(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceUint64(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceUint8(s) => {
                let _ = write!(self.out, "<{} bytes>", s.len());
            }
            ValueEvent::SliceUint16(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceUint32(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceFloat32(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceFloat64(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::SliceString(s) => {
                let _ = write!(self.out, "{s:?}");
            }
            ValueEvent::Group(_)
            | ValueEvent::Error(_)
            | ValueEvent::ErrorEmbed(_, _)
            | ValueEvent::Location(_)
            | ValueEvent::NewNode
            | ValueEvent::WrapNode
            | ValueEvent::WrapInheritedNode
            | ValueEvent::ForeignErrorText
            | ValueEvent::JustContextNode
            | ValueEvent::JustContextInheritedNode
            | ValueEvent::PhantomContextNode => {
                // Structural kinds never reach here: `emit_event` always
                // dispatches them to `append_group`/`append_empty_group`
                // before a raw `append` call could see them.
            }
        }
    }
}

impl Consumer for HumanView {
    fn set_time(&mut self, unix_nanos: u64) {
        let _ = writeln!(self.out, "time: {unix_nanos}");
    }

    fn set_level(&mut self, level: Option<Level>) {
        match level {
            Some(l) if self.color => {
                let _ = writeln!(self.out, "level: {}{l}\x1b[0m", Self::level_color(l));
            }
            Some(l) => {
                let _ = writeln!(self.out, "level: {l}");
            }
            None => {
                let _ = writeln!(self.out, "level: <invalid>");
            }
        }
    }

    fn set_location(&mut self, location: Option<(&str, u32)>) {
        match location {
            Some((file, line)) => {
                let _ = writeln!(self.out, "at: {file}:{line}");
            }
            None => {}
        }
    }

    fn set_message(&mut self, msg: &str) {
        let _ = writeln!(self.out, "{msg}");
    }

    fn attrs(&mut self) -> &mut dyn AttrConsumer {
        self
    }
}

impl AttrConsumer for HumanView {
    fn append(&mut self, key: &str, value: &ValueEvent<'_>) {
        self.indent();
        let _ = write!(self.out, "├─ {key} = ");
        self.push_value(value);
        self.out.push('\n');
    }

    fn append_group(&mut self, key: &str, body: &mut dyn FnMut(&mut dyn AttrConsumer)) {
        self.indent();
        let _ = writeln!(self.out, "├─ {key}:");
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    fn append_empty_group(&mut self, key: &str) {
        self.indent();
        let _ = writeln!(self.out, "├─ {key}: (empty)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faro_core::Attr;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn record_for(attrs: &[Attr<'_>]) -> Vec<u8> {
        use std::sync::Arc;
        struct Sink(Mutex<Vec<u8>>);
        impl crate::logger::RecordSink for Sink {
            fn write_record(&self, record: &[u8]) -> std::io::Result<()> {
                self.0.lock().extend_from_slice(record);
                Ok(())
            }
        }
        let sink = Arc::new(Sink(Mutex::new(Vec::new())));
        let logger = crate::Logger::new(sink.clone(), crate::Level::Trace as u8, false);
        logger.info("hello", attrs);
        sink.0.lock().clone()
    }

    #[test]
    fn decode_record_drives_time_level_message_and_attrs() {
        let record = record_for(&[Attr::str_attr("k", "v")]);

        let mut view = HumanView::new();
        decode_record(&record, &mut view, false).unwrap();
        let text = view.finish();
        assert!(text.contains("level: INFO"));
        assert!(text.contains("hello"));
        assert!(text.contains(r#"k = "v""#));
    }

    #[test]
    fn crc_mismatch_is_reported_as_corrupted() {
        let mut record = record_for(&[]);
        let last = record.len() - 1;
        record[last] ^= 0xFF;
        let mut view = HumanView::new();
        let err = decode_record(&record, &mut view, false).unwrap_err();
        assert_eq!(err, ViewerError::Corrupted);
    }

    #[test]
    fn truncated_record_is_reported() {
        let record = record_for(&[Attr::str_attr("k", "v")]);
        let mut view = HumanView::new();
        let err = decode_record(&record[..record.len() - 2], &mut view, true).unwrap_err();
        assert_eq!(err, ViewerError::TruncatedRecord);
    }

    #[test]
    fn nested_error_attr_decodes_to_text_and_context_group() {
        let inner = crate::Error::new("root").str_ctx("k", "v");
        let payload = inner.payload().to_vec();
        let attr = Attr::error_attr("err", &payload);
        let record = record_for(&[attr]);

        let mut view = HumanView::new();
        decode_record(&record, &mut view, false).unwrap();
        let text = view.finish();
        assert!(text.contains("err:"));
        assert!(text.contains("text = \"root\""));
        assert!(text.contains("@context:"));
    }

    #[test]
    fn framed_len_matches_total_record_size() {
        let record = record_for(&[Attr::str_attr("k", "v")]);
        assert_eq!(framed_len(&record).unwrap(), record.len());
    }

    #[test]
    fn decode_record_tree_preserves_nested_structure_unexpanded() {
        let record = record_for(&[Attr::group_attr("g", &[Attr::str_attr("k", "v")])]);
        let tree = decode_record_tree(&record, false).unwrap();
        assert_eq!(tree.message, "hello");
        assert_eq!(tree.level, Some(Level::Info));
        assert_eq!(tree.attrs.len(), 1);
        match &tree.attrs[0].value {
            ValueEvent::Group(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].value, ValueEvent::Str("v"));
            }
            other => panic!("expected a Group, got {other:?}"),
        }
    }
}
