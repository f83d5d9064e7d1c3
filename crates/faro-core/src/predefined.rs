//! The predefined-key table (§6.3): a small process-wide ordered list,
//! append-only, whose index `i` corresponds to `key_index = i + 1` in a
//! [`Kind`](crate::Kind). Packing a frequent key like `"user-id"` into one
//! byte avoids copying the key string on every hot-path serialization.

/// Index of the built-in `"user-id"` predefined key.
pub const PREDEFINED_USER_ID: u32 = 1;

#[cfg(feature = "std")]
mod table {
    use std::sync::{OnceLock, RwLock};

    fn table() -> &'static RwLock<Vec<String>> {
        static TABLE: OnceLock<RwLock<Vec<String>>> = OnceLock::new();
        TABLE.get_or_init(|| RwLock::new(vec!["user-id".to_string()]))
    }

    /// Look up a predefined key by its 1-based index (`0` is never valid —
    /// it means "use the literal key" and callers should not reach here
    /// with it).
    pub fn predefined_key(index: u32) -> Option<String> {
        let i = index.checked_sub(1)? as usize;
        table().read().unwrap_or_else(std::sync::PoisonError::into_inner).get(i).cloned()
    }

    /// Append a new predefined key, returning its 1-based index. The list
    /// is append-only: existing indices never change, so a `Kind` built
    /// against an older registration remains valid forever.
    pub fn register_predefined_key(key: impl Into<String>) -> u32 {
        let mut guard = table()
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.push(key.into());
        u32::try_from(guard.len()).expect("predefined key table overflowed u32")
    }
}

#[cfg(not(feature = "std"))]
mod table {
    //! Without `std` there is no portable process-wide mutable static
    //! usable from `no_std`; the table is frozen to its built-in content
    //! at compile time and runtime registration is unavailable. Hosts that
    //! need more predefined keys on embedded targets should enable `std`.
    const BUILTIN: &[&str] = &["user-id"];

    pub fn predefined_key(index: u32) -> Option<alloc::string::String> {
        let i = index.checked_sub(1)? as usize;
        BUILTIN.get(i).map(|s| alloc::string::String::from(*s))
    }

    pub fn register_predefined_key(_key: impl Into<alloc::string::String>) -> u32 {
        panic!("predefined key registration requires the `std` feature");
    }
}

pub use table::{predefined_key, register_predefined_key};

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn builtin_user_id_resolves() {
        assert_eq!(predefined_key(PREDEFINED_USER_ID).as_deref(), Some("user-id"));
    }

    #[test]
    fn registration_is_append_only_and_stable() {
        let idx = register_predefined_key("trace-id");
        assert_eq!(predefined_key(idx).as_deref(), Some("trace-id"));
        // Earlier index is still valid.
        assert_eq!(predefined_key(PREDEFINED_USER_ID).as_deref(), Some("user-id"));
    }
}
