//! faro-core — shared primitives of the faro wire codec (no_std-ready).
//!
//! Provides:
//! - `ValueKind`, `Kind` (the 64-bit tag split into `kind_low`/`key_index`)
//! - `Attr<'a>` plus its typed factory (`Attr::str_attr`, `Attr::int_attr`, `Attr::group_attr`, …)
//! - `append`/`decode`: the self-describing binary codec, sole owner of the wire grammar
//! - the predefined-key table (§6.3)
//!
//! This crate knows nothing about application errors (`faro::Error`) or the
//! logger: it only reads and writes bytes according to the frozen grammar.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/* ─────────────────────────────── Modules ───────────────────────────────── */

mod attr;
mod codec;
mod kind;
mod predefined;

pub use attr::{Attr, AttrKey, Serializer, ValueRepr};
pub use codec::{append, decode, AttrEvent, DecodeError, ValueEvent};
pub use kind::{Kind, ValueKind};
pub use predefined::{predefined_key, register_predefined_key, PREDEFINED_USER_ID};

/// Convenience re-export for downstream crates that only want the most
/// commonly used types.
pub mod prelude {
    pub use crate::{append, decode, Attr, AttrEvent, DecodeError, Kind, ValueEvent, ValueKind};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_low_and_key_index_round_trip() {
        let k = Kind::new(ValueKind::Int, 0);
        assert_eq!(k.kind_low(), ValueKind::Int as u8);
        assert_eq!(k.key_index(), 0);

        let k2 = Kind::new(ValueKind::String, 7);
        assert_eq!(k2.kind_low(), ValueKind::String as u8);
        assert_eq!(k2.key_index(), 7);
    }
}
