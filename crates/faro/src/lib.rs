//! faro — structured logging and error context built on one shared binary
//! codec (`faro-core`).
//!
//! - [`Error`]: the structured error payload engine (C4).
//! - [`Logger`]/[`new_logger`]: the record assembler (C5), available only
//!   with the `std` feature (it needs `std::io::Write`, a mutex and the
//!   process clock).
//! - [`viewer`]: the decoder/consumer interface (C6) plus the [`HumanView`]
//!   reference consumer.
//! - [`SyncWriter`]/[`ViewWriteSyncer`]: the writer wrappers (C7).
//!
//! Without `std`, only the codec re-exports and the error payload engine are
//! available (`alloc-only`), matching `faro-core`'s own feature split.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod error;

#[cfg(feature = "std")]
mod logger;
#[cfg(feature = "std")]
mod viewer;
#[cfg(feature = "std")]
mod writer;

pub use error::{downcast_ref_chain, insert_locations_off, insert_locations_on, Error, Sentinel};
pub use faro_core::{Attr, AttrKey, DecodeError, Serializer, ValueEvent, ValueKind};

#[cfg(feature = "std")]
pub use logger::{log_panic, panic_info_attr, Logger, LoggerOption, RecordSink};
#[cfg(feature = "std")]
pub use viewer::{decode_record, decode_record_tree, framed_len, AttrConsumer, Consumer, DecodedRecord, HumanView};
#[cfg(feature = "std")]
pub use writer::{SyncWriter, ViewWriteSyncer};

/// Convenience re-export for the common import set.
pub mod prelude {
    pub use crate::{Attr, Error};
    #[cfg(feature = "std")]
    pub use crate::{new_logger, Level, Logger, LoggerOption};
}

#[cfg(feature = "std")]
use alloc::sync::Arc;

/// Log severity. `0` is reserved as invalid; every named level is a multiple
/// of ten so that future levels can be inserted between existing ones
/// without renumbering (§6.1).
#[cfg(feature = "std")]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Level {
    Trace = 10,
    Debug = 20,
    Info = 30,
    Warning = 40,
    Error = 50,
    Panic = 60,
}

#[cfg(feature = "std")]
impl Level {
    #[must_use]
    pub const fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            10 => Self::Trace,
            20 => Self::Debug,
            30 => Self::Info,
            40 => Self::Warning,
            50 => Self::Error,
            60 => Self::Panic,
            _ => return None,
        })
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for Level {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Panic => "PANIC",
        })
    }
}

/// The crate's own fallible surfaces (§3.1), distinct from the [`Error`]
/// *value type* product functionality exposed to callers building their own
/// application errors. Always matched on by kind, never boxed at the
/// boundary (§7).
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum LoggerBuildError {
    #[error("invalid log level: {0} (must be one of 10/20/30/40/50/60)")]
    InvalidLevel(u8),
}

/// Decoder failures (§3.1, §7). `TruncatedRecord` is a field running past
/// the end of the buffer; `Corrupted` is a CRC32C mismatch, only checked in
/// validating mode.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("truncated record")]
    TruncatedRecord,
    #[error("corrupted record: crc32c mismatch")]
    Corrupted,
}

#[cfg(feature = "std")]
impl From<faro_core::DecodeError> for ViewerError {
    fn from(_: faro_core::DecodeError) -> Self {
        Self::TruncatedRecord
    }
}

/// Construct a [`Logger`] writing framed records to `sink`.
///
/// # Errors
///
/// Returns [`LoggerBuildError::InvalidLevel`] if an option names a level
/// outside the six defined by [`Level`].
#[cfg(feature = "std")]
pub fn new_logger(sink: Arc<dyn RecordSink>, options: &[LoggerOption]) -> Result<Logger, LoggerBuildError> {
    let mut min_level = Level::Trace as u8;
    let mut capture_locations = false;
    for opt in options {
        match *opt {
            LoggerOption::LogFrom(level) => {
                Level::from_u8(level).ok_or(LoggerBuildError::InvalidLevel(level))?;
                min_level = level;
            }
            LoggerOption::LogLocations(enabled) => capture_locations = enabled,
        }
    }
    Ok(Logger::new(sink, min_level, capture_locations))
}
