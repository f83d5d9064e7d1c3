//! The error payload engine (C4): `new`/`wrap`/`just` accumulate frames and
//! context into one growing byte buffer, shared with a wrapper via a frozen
//! prefix rather than mutated after the fact (§9 "Shared error payloads").

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use faro_core::{Attr, ValueEvent};

/// Process-wide toggle gating per-frame `#[track_caller]` location capture
/// (§9 "Process-wide location toggle"). An atomic with acquire/release
/// ordering; toggling is not transactional across threads — the only
/// observable effect of a race is a one-frame delay in picking up a change.
static INSERT_LOCATIONS: AtomicBool = AtomicBool::new(false);

/// Enable per-frame call-site capture for every `Error` built from this
/// point forward (process-wide).
pub fn insert_locations_on() {
    INSERT_LOCATIONS.store(true, Ordering::Release);
}

/// Disable per-frame call-site capture.
pub fn insert_locations_off() {
    INSERT_LOCATIONS.store(false, Ordering::Release);
}

fn locations_enabled() -> bool {
    INSERT_LOCATIONS.load(Ordering::Acquire)
}

/// A structured error value carrying the full chain of `new`/`wrap`/`just`
/// frames, plus all key/value context attached at each frame, in one
/// serialized payload buffer (§3 "Error").
pub struct Error {
    payload: Vec<u8>,
    wrap: Option<Box<dyn core::error::Error + Send + Sync + 'static>>,
    text: String,
    sufficient: bool,
}

impl Error {
    /// Start a new chain: the initial payload is a single `NewNode(msg)`
    /// frame.
    #[track_caller]
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let mut payload = Vec::new();
        payload = faro_core::append(payload, &Attr::new_node(&msg));
        let mut err = Self { payload, wrap: None, text: String::new(), sufficient: true };
        err.maybe_capture_location();
        err
    }

    /// `new` with a pre-formatted message (the `newf` idiom of §6.4 maps
    /// directly onto `format!` at the call site in this binding).
    #[track_caller]
    #[must_use]
    pub fn newf(args: fmt::Arguments<'_>) -> Self {
        Self::new(args.to_string())
    }

    /// Wrap `source`, opening a new frame whose message is `msg`.
    ///
    /// - If `source` is already a native [`Error`], its payload is reused
    ///   and a `WrapNode` frame is appended past its end.
    /// - If a native `Error` is reachable deeper in `source`'s own chain
    ///   (via repeated [`core::error::Error::source`]), the new `Error`
    ///   shares that error's payload as a frozen prefix, appends a
    ///   `WrapInheritedNode` frame, and becomes `sufficient = false`.
    /// - Otherwise `source` is purely foreign: a `ForeignErrorText` frame
    ///   capturing `source`'s rendered text is appended first, followed by
    ///   `WrapInheritedNode`; the chain remains `sufficient = true` because
    ///   the foreign text was copied into the payload itself.
    #[track_caller]
    pub fn wrap<E>(source: E, msg: impl Into<String>) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        let msg = msg.into();
        Self::wrap_dyn(Box::new(source), &msg, Attr::wrap_node, Attr::wrap_inherited_node)
    }

    #[track_caller]
    fn wrap_dyn(
        source: Box<dyn core::error::Error + Send + Sync + 'static>,
        msg: &str,
        own_node: for<'x> fn(&'x str) -> Attr<'x>,
        inherited_node: for<'x> fn(&'x str) -> Attr<'x>,
    ) -> Self {
        let mut err = match downcast_chain(&*source) {
            ChainLookup::SameInstance(payload) => {
                let mut payload = payload;
                payload = faro_core::append(payload, &own_node(msg));
                Self { payload, wrap: Some(source), text: String::new(), sufficient: true }
            }
            ChainLookup::Deeper(prefix) => {
                let prefix_len = prefix.len();
                let mut payload = prefix;
                payload = faro_core::append(payload, &inherited_node(msg));
                // The prefix bytes are the deeper native `Error`'s own
                // payload: rendering them here would re-derive (possibly
                // incorrectly) what `source.to_string()` already computes.
                // Render only the frame just appended, splicing `source`'s
                // own text in its place, and cache the result now while
                // `source` is still directly at hand (§3 "text").
                let text = render(&payload[prefix_len..], || Some(source.to_string()));
                Self { payload, wrap: Some(source), text, sufficient: false }
            }
            ChainLookup::Foreign => {
                let text = source.to_string();
                let mut payload = Vec::new();
                payload = faro_core::append(payload, &Attr::foreign_error_text(&text));
                payload = faro_core::append(payload, &inherited_node(msg));
                Self { payload, wrap: Some(source), text: String::new(), sufficient: true }
            }
        };
        err.maybe_capture_location();
        err
    }

    /// `wrap` with a pre-formatted message.
    #[track_caller]
    pub fn wrapf<E>(source: E, args: fmt::Arguments<'_>) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::wrap(source, args.to_string())
    }

    /// Open a new frame with no message of its own, so subsequent context
    /// attachers (`.str_ctx`, `.int_ctx`, …) attach to this frame rather
    /// than the wrapped one. Rendered text is unaffected: `Error()` of
    /// `just(e)` equals `e.Error()` (§8 "Just-context preserves text").
    #[track_caller]
    pub fn just<E>(source: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        fn own(_msg: &str) -> Attr<'_> {
            Attr::just_context_node()
        }
        fn inherited(_msg: &str) -> Attr<'_> {
            Attr::just_context_inherited_node()
        }
        Self::wrap_dyn(Box::new(source), "", own, inherited)
    }

    #[track_caller]
    fn maybe_capture_location(&mut self) {
        if locations_enabled() {
            let loc = core::panic::Location::caller();
            let file = loc.file().to_string();
            self.payload = faro_core::append(core::mem::take(&mut self.payload), &Attr::location_node(&file, loc.line()));
        }
    }

    /// Access the serialized payload (for embedding this error inside
    /// another payload via [`Attr::error_attr`]/[`Attr::error_embed_attr`],
    /// or for a log record's `Attr::Error`/`ErrorEmbed` value).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True iff the whole chain's text can be recovered from `payload`
    /// alone (§3 "sufficient").
    #[must_use]
    pub const fn is_sufficient(&self) -> bool {
        self.sufficient
    }

    /// The wrapped error, if any (mirrors `std::error::Error::source`).
    #[must_use]
    pub fn wrapped(&self) -> Option<&(dyn core::error::Error + Send + Sync + 'static)> {
        self.wrap.as_deref()
    }

    /// Attach a string context value to the current (most recent) frame.
    #[must_use]
    pub fn str_ctx(mut self, key: &str, value: &str) -> Self {
        // `key` must outlive the borrow inside `append`; build the Attr and
        // serialize it immediately rather than threading the closure form
        // through `attach`, since `Attr::str_attr` borrows both arguments.
        let attr = Attr::str_attr(key, value);
        self.payload = faro_core::append(core::mem::take(&mut self.payload), &attr);
        self
    }

    /// Attach an integer context value to the current frame.
    #[must_use]
    pub fn int_ctx(mut self, key: &str, value: i64) -> Self {
        let attr = Attr::int_attr(key, value);
        self.payload = faro_core::append(core::mem::take(&mut self.payload), &attr);
        self
    }

    /// Attach a boolean context value to the current frame.
    #[must_use]
    pub fn bool_ctx(mut self, key: &str, value: bool) -> Self {
        let attr = Attr::bool_attr(key, value);
        self.payload = faro_core::append(core::mem::take(&mut self.payload), &attr);
        self
    }

    /// Attach an unsigned integer context value to the current frame.
    #[must_use]
    pub fn uint_ctx(mut self, key: &str, value: u64) -> Self {
        let attr = Attr::uint_attr(key, value);
        self.payload = faro_core::append(core::mem::take(&mut self.payload), &attr);
        self
    }

    /// Attach a floating-point context value to the current frame.
    #[must_use]
    pub fn f64_ctx(mut self, key: &str, value: f64) -> Self {
        let attr = Attr::f64_attr(key, value);
        self.payload = faro_core::append(core::mem::take(&mut self.payload), &attr);
        self
    }

    /// Encode this error as an `Attr` for embedding inside a log record or
    /// another error's payload, classifying it per §4.3 (C2 `Error(key, err)`):
    /// a sufficient chain's payload alone can reconstruct the full message, so
    /// it is carried as a bare `Error` tag; an insufficient chain (§3
    /// "sufficient") additionally carries its already-rendered text, since the
    /// payload alone cannot reproduce the message spliced in from the foreign
    /// carrier it was built from — exactly the `ErrorEmbed` case.
    #[must_use]
    pub fn as_attr<'a>(&'a self, key: &'a str) -> Attr<'a> {
        if self.sufficient {
            Attr::error_attr(key, &self.payload)
        } else {
            Attr::error_embed_attr(key, &self.text, &self.payload)
        }
    }
}

/// The outcome of searching `source`'s own chain for a native [`Error`]
/// that this wrap can reuse or build a prefix from.
enum ChainLookup {
    /// `source` *is* a native `Error`; reuse its payload verbatim.
    SameInstance(Vec<u8>),
    /// A native `Error` is reachable deeper in `source`'s chain; this is
    /// its frozen payload, to be used as a prefix.
    Deeper(Vec<u8>),
    /// No native `Error` anywhere in the chain.
    Foreign,
}

fn downcast_chain(mut source: &(dyn core::error::Error + 'static)) -> ChainLookup {
    if let Some(native) = source.downcast_ref::<Error>() {
        return ChainLookup::SameInstance(native.payload.clone());
    }
    let mut depth = 0usize;
    while let Some(next) = core::error::Error::source(source) {
        if let Some(native) = next.downcast_ref::<Error>() {
            return ChainLookup::Deeper(native.payload.clone());
        }
        source = next;
        depth += 1;
        if depth > 4096 {
            // Defensive bound against a pathological cyclic `source()` chain.
            break;
        }
    }
    ChainLookup::Foreign
}

/// Walks the reversed (innermost-first) frame list, joined by `": "`,
/// splicing `wrap`'s own rendered text in at each inherited-frame sentinel
/// (§4.2 "Message rendering").
pub(crate) fn render(payload: &[u8], wrap_text: impl FnOnce() -> Option<String>) -> String {
    enum Piece<'a> {
        Message(&'a str),
        Splice,
    }

    let mut pieces = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let Ok((ev, tail)) = faro_core::decode(rest) else { break };
        rest = tail;
        match ev.value {
            ValueEvent::NewNode | ValueEvent::WrapNode => {
                if let faro_core::AttrKey::Literal(msg) = ev.key {
                    pieces.push(Piece::Message(msg));
                }
            }
            ValueEvent::WrapInheritedNode => {
                pieces.push(Piece::Splice);
                if let faro_core::AttrKey::Literal(msg) = ev.key {
                    if !msg.is_empty() {
                        pieces.push(Piece::Message(msg));
                    }
                }
            }
            ValueEvent::JustContextInheritedNode => {
                // Carries no message of its own (§4.2 "just"), but still
                // marks where the wrapped chain's own text splices in.
                pieces.push(Piece::Splice);
            }
            ValueEvent::ForeignErrorText => {
                if let faro_core::AttrKey::Literal(msg) = ev.key {
                    pieces.push(Piece::Message(msg));
                }
            }
            _ => {}
        }
    }

    let mut wrap_text = Some(wrap_text);
    let mut out = String::new();
    for piece in pieces.into_iter().rev() {
        match piece {
            Piece::Message(msg) => {
                if !out.is_empty() {
                    out.push_str(": ");
                }
                out.push_str(msg);
            }
            Piece::Splice => {
                if let Some(f) = wrap_text.take() {
                    if let Some(text) = f() {
                        if !out.is_empty() && !text.is_empty() {
                            out.push_str(": ");
                        }
                        out.push_str(&text);
                    }
                }
            }
        }
    }
    out
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.sufficient {
            return f.write_str(&self.text);
        }
        let rendered = render(&self.payload, || -> Option<String> { None });
        f.write_str(&rendered)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("message", &self.to_string())
            .field("sufficient", &self.sufficient)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.wrap.as_ref().map(|w| &**w as &(dyn core::error::Error + 'static))
    }
}

/// Walks `err`'s chain via repeated `source()` until a `downcast_ref::<T>()`
/// succeeds (§4.2.1). `std::error::Error::source()` alone does not offer a
/// one-call downcast-anywhere-in-chain helper; this is that helper for
/// callers migrating from the original `AsType` idiom.
pub fn downcast_ref_chain<T: core::error::Error + 'static>(err: &(dyn core::error::Error + 'static)) -> Option<&T> {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if let Some(t) = e.downcast_ref::<T>() {
            return Some(t);
        }
        cur = e.source();
    }
    None
}

/// A sentinel error: string-only, no payload, orthogonal to the payload
/// engine (§4.2 "Sentinel errors"). Useful as a comparison target for
/// `Result::is_err_and`/pattern matching without constructing a full chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel(String);

impl Sentinel {
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::error::Error for Sentinel {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Foreign(String);

    impl fmt::Display for Foreign {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl core::error::Error for Foreign {}

    fn foreign(msg: &str) -> Foreign {
        Foreign(msg.to_string())
    }

    /// A foreign error whose own `Display` just forwards to a native
    /// `Error` it carries as its `source()` — the shape that triggers
    /// `ChainLookup::Deeper`.
    #[derive(Debug)]
    struct Wrapping {
        inner: Error,
    }

    impl fmt::Display for Wrapping {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.inner)
        }
    }

    impl core::error::Error for Wrapping {
        fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
            Some(&self.inner)
        }
    }

    #[test]
    fn message_equivalence_for_native_chain() {
        let e0 = Error::new("root");
        let e1 = Error::wrap(e0, "mid");
        let e2 = Error::wrap(e1, "top");
        assert_eq!(e2.to_string(), "top: mid: root");
        assert!(e2.is_sufficient());
    }

    #[test]
    fn foreign_interleaving_stays_sufficient() {
        let e1 = Error::wrap(foreign("E"), "a");
        assert!(e1.is_sufficient());
        assert_eq!(e1.to_string(), "a: E");

        let e2 = Error::wrap(e1, "b");
        assert!(e2.is_sufficient());
        assert_eq!(e2.to_string(), "b: a: E");
    }

    #[test]
    fn wrapping_a_foreign_carrier_of_a_native_error_is_insufficient() {
        let e1 = Error::wrap(foreign("E"), "a");
        let e2 = Error::wrap(e1, "b");
        assert_eq!(e2.to_string(), "b: a: E");

        let carrier = Wrapping { inner: e2 };
        let e3 = Error::wrap(carrier, "c");
        assert!(!e3.is_sufficient());
        assert_eq!(e3.to_string(), "c: b: a: E");
    }

    #[test]
    fn just_context_preserves_text() {
        let base = Error::new("base");
        let original = base.to_string();
        let with_ctx = Error::just(base).str_ctx("k", "v").int_ctx("n", 7);
        assert!(with_ctx.is_sufficient());
        assert_eq!(with_ctx.to_string(), original);
    }

    #[test]
    fn just_context_preserves_text_through_a_foreign_carrier() {
        let base = Error::new("root").str_ctx("k", "v");
        let original = base.to_string();
        let carrier = Wrapping { inner: base };
        let with_ctx = Error::just(carrier).str_ctx("n", "7");
        assert!(!with_ctx.is_sufficient());
        assert_eq!(with_ctx.to_string(), original);
    }

    #[test]
    fn source_chain_reaches_the_foreign_root() {
        let e1 = Error::wrap(foreign("root-cause"), "step1");
        let src = core::error::Error::source(&e1).expect("wrap always sets a source");
        assert_eq!(src.to_string(), "root-cause");
    }

    #[test]
    fn downcast_ref_chain_finds_a_type_buried_two_hops_down() {
        let e1 = Error::wrap(foreign("root-cause"), "step1");
        let e2 = Error::wrap(e1, "step2");
        let found = downcast_ref_chain::<Foreign>(&e2).expect("foreign root is two hops down");
        assert_eq!(found.to_string(), "root-cause");
        assert!(downcast_ref_chain::<Sentinel>(&e2).is_none());
    }

    #[test]
    fn as_attr_uses_error_tag_when_sufficient() {
        let e = Error::new("root");
        let attr = e.as_attr("err");
        assert_eq!(attr.kind.value_kind(), Some(faro_core::ValueKind::Error));
        match attr.repr {
            faro_core::ValueRepr::Error(payload) => assert_eq!(payload, e.payload()),
            _ => panic!("expected ValueKind::Error"),
        }
    }

    #[test]
    fn as_attr_uses_error_embed_when_insufficient() {
        let e1 = Error::wrap(foreign("E"), "a");
        let e2 = Error::wrap(e1, "b");
        let carrier = Wrapping { inner: e2 };
        let e3 = Error::wrap(carrier, "c");
        assert!(!e3.is_sufficient());

        let attr = e3.as_attr("err");
        assert_eq!(attr.kind.value_kind(), Some(faro_core::ValueKind::ErrorEmbed));
        match attr.repr {
            faro_core::ValueRepr::ErrorEmbed(text, payload) => {
                assert_eq!(text, "c: b: a: E");
                assert_eq!(payload, e3.payload());
            }
            _ => panic!("expected ValueKind::ErrorEmbed"),
        }
    }

    #[test]
    fn sentinel_matches_by_message() {
        let s = Sentinel::new("not found");
        assert_eq!(s.to_string(), "not found");
        assert_eq!(s, Sentinel::new("not found"));
    }
}
