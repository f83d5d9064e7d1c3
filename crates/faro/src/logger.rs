//! The record assembler (C5): level gating, a pooled per-record buffer,
//! header framing (sentinel + CRC32C + varint length), timestamping, optional
//! caller-location capture, `with()`-derived prefix payloads, and panic
//! capture.

use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::panic::Location;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use integer_encoding::VarInt;

use faro_core::Attr;

use crate::Level;

/// Bytes reserved ahead of the body for the frame header: `0xFF` (1) +
/// `crc32c` (4) + `uvarint(body_len)` (up to 10) = 15, the worst case for a
/// `u64` length (§4.4 point 6).
const HEADER_RESERVE: usize = 15;

/// Capacity of a freshly allocated buffer when the pool is empty.
const FRESH_BUFFER_CAPACITY: usize = 1024;

/// Buffers larger than this are dropped instead of returned to the pool, so
/// one oversized record does not bloat steady-state memory (§5).
const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// Number of free buffers the pool holds onto at once.
const POOL_CAPACITY: usize = 64;

/// In-flight record count above which returned buffers are dropped rather
/// than pooled, bounding retention under a write storm (§4.4 point 8).
const IN_FLIGHT_SOFT_LIMIT: usize = 256;

/// A synchronized byte sink a [`Logger`] hands exactly one framed record to
/// per call (§4.6). Implemented for [`crate::SyncWriter`]; callers needing a
/// different sink (network, async channel, …) can implement it directly.
pub trait RecordSink: Send + Sync {
    /// # Errors
    ///
    /// Returns whatever the underlying sink's write failed with. The logger
    /// itself never propagates this — it logs a diagnostic to stderr and
    /// drops the record (§7: "logging must not panic the application").
    fn write_record(&self, record: &[u8]) -> io::Result<()>;
}

/// Options accepted by [`crate::new_logger`] (§6.4).
#[derive(Debug, Clone, Copy)]
pub enum LoggerOption {
    /// Discard records below this level. Must name one of [`Level`]'s six
    /// values or [`crate::new_logger`] returns [`crate::LoggerBuildError`].
    LogFrom(u8),
    /// Capture the call site of each log call via `#[track_caller]`.
    LogLocations(bool),
}

/// A bounded MPMC channel used as a free-list: `try_recv` on acquire,
/// `try_send` on return. Empty-pop means "allocate fresh" (§5); this is the
/// same "channel as concurrent free-list" idiom this codebase's worker-queue
/// structures use for their own pooled resources.
struct BufferPool {
    free: crossbeam_channel::Receiver<Vec<u8>>,
    spare: crossbeam_channel::Sender<Vec<u8>>,
}

impl BufferPool {
    fn new() -> Self {
        let (spare, free) = crossbeam_channel::bounded(POOL_CAPACITY);
        Self { free, spare }
    }

    fn acquire(&self) -> Vec<u8> {
        self.free.try_recv().unwrap_or_else(|_| Vec::with_capacity(FRESH_BUFFER_CAPACITY))
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let _ = self.spare.try_send(buf);
    }
}

struct Shared {
    sink: Arc<dyn RecordSink>,
    min_level: AtomicU8,
    capture_locations: AtomicBool,
    pool: BufferPool,
    in_flight: AtomicUsize,
}

/// The record assembler (C5). Cheap to derive via [`Logger::with`]: the
/// derived logger shares the parent's sink, level, buffer pool and in-flight
/// counter through one [`Arc`], owning only its own `prefix_payload` bytes
/// (§9 "Logger `With`").
pub struct Logger {
    shared: Arc<Shared>,
    prefix_payload: Vec<u8>,
}

impl Logger {
    pub(crate) fn new(sink: Arc<dyn RecordSink>, min_level: u8, capture_locations: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                sink,
                min_level: AtomicU8::new(min_level),
                capture_locations: AtomicBool::new(capture_locations),
                pool: BufferPool::new(),
                in_flight: AtomicUsize::new(0),
            }),
            prefix_payload: Vec::new(),
        }
    }

    #[track_caller]
    pub fn trace(&self, msg: &str, attrs: &[Attr<'_>]) {
        self.log(Level::Trace, msg.as_bytes(), attrs);
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, attrs: &[Attr<'_>]) {
        self.log(Level::Debug, msg.as_bytes(), attrs);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, attrs: &[Attr<'_>]) {
        self.log(Level::Info, msg.as_bytes(), attrs);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, attrs: &[Attr<'_>]) {
        self.log(Level::Warning, msg.as_bytes(), attrs);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, attrs: &[Attr<'_>]) {
        // Levels Trace/Debug/Info/Warning map onto their own enum variant's
        // numeric value directly; this one is worth calling out because a
        // divergent copy of the source this crate is grounded on mapped
        // `Logger.Error` to level 30 (Info) — almost certainly a bug (see
        // DESIGN.md). This binding always emits level 50.
        self.log(Level::Error, msg.as_bytes(), attrs);
    }

    /// Derive a logger that splices `attrs` ahead of every future call's own
    /// attributes (§4.4 "Prefix payload"). Cheap: shares the parent's sink,
    /// pool and counters through the same `Arc`.
    #[must_use]
    pub fn with(&self, attrs: &[Attr<'_>]) -> Self {
        let mut prefix_payload = self.prefix_payload.clone();
        for attr in attrs {
            prefix_payload = faro_core::append(prefix_payload, attr);
        }
        Self { shared: Arc::clone(&self.shared), prefix_payload }
    }

    #[track_caller]
    fn log(&self, level: Level, msg: &[u8], attrs: &[Attr<'_>]) {
        if (level as u8) < self.shared.min_level.load(Ordering::Relaxed) {
            return;
        }

        self.shared.in_flight.fetch_add(1, Ordering::Relaxed);
        let mut buf = self.shared.pool.acquire();
        buf.clear();
        buf.resize(HEADER_RESERVE, 0);

        let nanos = now_unix_nanos();
        buf.extend_from_slice(&nanos.to_le_bytes());
        buf.push(level as u8);

        if self.shared.capture_locations.load(Ordering::Relaxed) {
            let loc = Location::caller();
            push_uvarint(&mut buf, loc.file().len() as u64);
            buf.extend_from_slice(loc.file().as_bytes());
            push_uvarint(&mut buf, u64::from(loc.line()));
        } else {
            buf.push(0);
        }

        // The ctx hook (custom_bytes, §6.1) is an external-collaborator
        // extension point (§1) this crate does not populate; §6.1's grammar
        // carries no length prefix of its own for this field, so a record
        // built without a hook writes nothing here at all (see the §8
        // end-to-end scenario 1 worked example).
        push_uvarint(&mut buf, msg.len() as u64);
        buf.extend_from_slice(msg);

        buf.extend_from_slice(&self.prefix_payload);

        for attr in attrs {
            buf = faro_core::append(buf, attr);
        }

        let framed = frame(buf);
        let in_flight_now = self.shared.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;

        if let Err(err) = self.shared.sink.write_record(&framed) {
            eprintln!("faro: dropping record after writer error: {err}");
        }

        if framed.capacity() <= MAX_RETAINED_CAPACITY && in_flight_now <= IN_FLIGHT_SOFT_LIMIT {
            self.shared.pool.release(framed);
        }
    }
}

fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

fn push_uvarint(dst: &mut Vec<u8>, v: u64) {
    let mut buf = [0u8; 10];
    let n = v.encode_var(&mut buf);
    dst.extend_from_slice(&buf[..n]);
}

/// Computes the CRC32C over the body, back-fills `[0xFF, crc_le, uvarint(len)]`
/// into the trailing bytes of the leading 15-byte reservation, and drops the
/// unused leading slack (§4.4 points 5-7).
fn frame(mut buf: Vec<u8>) -> Vec<u8> {
    let body_len = (buf.len() - HEADER_RESERVE) as u64;
    let crc = crc32c::crc32c(&buf[HEADER_RESERVE..]);

    let mut len_buf = [0u8; 10];
    let len_n = body_len.encode_var(&mut len_buf);
    let header_len = 5 + len_n;
    let start = HEADER_RESERVE - header_len;

    buf[start] = 0xFF;
    buf[start + 1..start + 5].copy_from_slice(&crc.to_le_bytes());
    buf[start + 5..start + header_len].copy_from_slice(&len_buf[..len_n]);
    buf.drain(0..start);
    buf
}

/// Gzips `stack` and logs it as the message of one `Panic`-level record
/// carrying `info_attr`; on compression failure, degrades to writing the raw
/// stack to standard error rather than losing the panic entirely (§4.4
/// "Panic capture").
pub fn log_panic(logger: &Logger, stack: &[u8], info_attr: &Attr<'_>) {
    match gzip(stack) {
        Ok(compressed) => logger.log(Level::Panic, &compressed, core::slice::from_ref(info_attr)),
        Err(err) => {
            eprintln!("faro: failed to gzip panic stack ({err}); writing raw stack to stderr");
            let _ = io::stderr().write_all(stack);
        }
    }
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Maps a `catch_unwind` payload to an `Attr` keyed `"recovered"` — the
/// structural equivalent of the original `recover()`-to-`Attr` mapping
/// (§4.4 `LogPanicInfo`). Downcasts the common `&str`/`String` panic message
/// shapes directly; anything else cannot be introspected further through
/// `Any` alone and falls back to a fixed placeholder.
#[must_use]
pub fn panic_info_attr(payload: &(dyn core::any::Any + Send)) -> Attr<'_> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return Attr::str_attr("recovered", s);
    }
    if let Some(s) = payload.downcast_ref::<alloc::string::String>() {
        return Attr::str_attr("recovered", s.as_str());
    }
    Attr::str_attr("recovered", "<non-string panic payload>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use faro_core::AttrKey;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct Capture(Mutex<Vec<u8>>);

    impl RecordSink for Capture {
        fn write_record(&self, record: &[u8]) -> io::Result<()> {
            self.0.lock().extend_from_slice(record);
            Ok(())
        }
    }

    fn decode_one<'a>(src: &'a [u8]) -> (u64, u8, &'a [u8]) {
        let body_len_offset = 5;
        assert_eq!(src[0], 0xFF);
        let (body_len, n) = u64::decode_var(&src[body_len_offset..]).expect("uvarint");
        let body = &src[body_len_offset + n..];
        assert_eq!(body.len() as u64, body_len);
        let time = u64::from_le_bytes(body[0..8].try_into().unwrap());
        let level = body[8];
        (time, level, &body[9..])
    }

    #[test]
    fn framing_starts_with_sentinel_and_matches_crc() {
        let sink = Arc::new(Capture(Mutex::new(Vec::new())));
        let logger = Logger::new(sink.clone(), Level::Trace as u8, false);
        logger.info("hello", &[Attr::str_attr("k", "v")]);

        let record = sink.0.lock().clone();
        assert_eq!(record[0], 0xFF);
        let stored_crc = u32::from_le_bytes(record[1..5].try_into().unwrap());
        let (body_len, n) = u64::decode_var(&record[5..]).unwrap();
        let body = &record[5 + n..];
        assert_eq!(body.len() as u64, body_len);
        assert_eq!(crc32c::crc32c(body), stored_crc);
    }

    #[test]
    fn level_gating_drops_below_threshold() {
        let sink = Arc::new(Capture(Mutex::new(Vec::new())));
        let logger = Logger::new(sink.clone(), Level::Warning as u8, false);
        logger.info("should be dropped", &[]);
        assert!(sink.0.lock().is_empty());
        logger.warn("should pass", &[]);
        assert!(!sink.0.lock().is_empty());
    }

    #[test]
    fn with_prefixes_attrs_before_call_site_attrs() {
        let sink = Arc::new(Capture(Mutex::new(Vec::new())));
        let logger = Logger::new(sink.clone(), Level::Trace as u8, false).with(&[Attr::str_attr("svc", "billing")]);
        logger.info("charged", &[Attr::int_attr("cents", 500)]);

        let record = sink.0.lock().clone();
        let (_, level, attrs) = decode_one(&record);
        assert_eq!(level, Level::Info as u8);
        let (_msg_len, tail) = take_msg(attrs);
        let (first, tail) = faro_core::decode(tail).unwrap();
        assert_eq!(first.key, AttrKey::Literal("svc"));
        let (second, tail) = faro_core::decode(tail).unwrap();
        assert_eq!(second.key, AttrKey::Literal("cents"));
        assert!(tail.is_empty());
    }

    fn take_msg(body_after_location: &[u8]) -> (usize, &[u8]) {
        // location absent marker, then msg (no custom_bytes prefix: §6.1).
        assert_eq!(body_after_location[0], 0);
        let rest = &body_after_location[1..];
        let (msg_len, n) = u64::decode_var(rest).unwrap();
        (msg_len as usize, &rest[n + msg_len as usize..])
    }

    #[test]
    fn log_panic_emits_one_panic_level_record() {
        let sink = Arc::new(Capture(Mutex::new(Vec::new())));
        let logger = Logger::new(sink.clone(), Level::Trace as u8, false);
        let attr = Attr::str_attr("recovered", "boom");
        log_panic(&logger, b"stack trace goes here", &attr);

        let record = sink.0.lock().clone();
        let (_, level, _) = decode_one(&record);
        assert_eq!(level, Level::Panic as u8);
    }
}
