//! Deterministic hash-based identity for bound classes and their members.
//!
//! This module provides [`TypeHash`], a 64-bit hash that identifies a bound
//! class or one of its members. Hashes are computed from names, so the same
//! declaration always produces the same identity regardless of the order in
//! which classes are bound.
//!
//! # Examples
//!
//! ```
//! use bindery_core::TypeHash;
//!
//! let headers = TypeHash::from_name("HttpHeaders");
//! assert_eq!(headers, TypeHash::from_name("HttpHeaders"));
//!
//! // Members are scoped to their owner
//! let get = TypeHash::from_member(headers, "get");
//! let other = TypeHash::from_member(TypeHash::from_name("HttpRequest"), "get");
//! assert_ne!(get, other);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// These keep class hashes, member hashes and free function hashes apart
/// even when they share the same name.
pub mod hash_constants {
    /// Separator constant for path components
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes
    pub const CLASS: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for free function hashes
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for class member hashes
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;
}

/// A deterministic 64-bit hash identifying a class, member or function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a hash from a class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::CLASS ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a hash for a free function exported without an enclosing class.
    #[inline]
    pub fn from_function(name: &str) -> Self {
        TypeHash(hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a hash for a member (property or method) of `owner`.
    ///
    /// The owner is folded in with a non-commutative step so that
    /// `(A, "b")` and `(B, "a")` cannot collide by construction.
    #[inline]
    pub fn from_member(owner: TypeHash, member: &str) -> Self {
        let name_hash = hash_constants::MEMBER ^ xxh64(member.as_bytes(), 0);
        TypeHash(owner.0.wrapping_mul(hash_constants::SEP).wrapping_add(name_hash))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
