//! Deterministic hash-based identity for definitions and their instances.
//!
//! [`TypeHash`] is a 64-bit hash computed from a definition's qualified name
//! and, for instances, the hashes of its generic arguments. It is the
//! structured identifier behind every generated artifact name: two
//! compilations of the same program produce the same hashes regardless of the
//! order in which instances were discovered.
//!
//! # Examples
//!
//! ```
//! use kestrel_core::TypeHash;
//!
//! let boxed = TypeHash::from_name("Box");
//! let int = TypeHash::from_name("Int");
//! let string = TypeHash::from_name("String");
//!
//! // Argument order matters.
//! let pair_a = TypeHash::from_instance(boxed, &[int, string]);
//! let pair_b = TypeHash::from_instance(boxed, &[string, int]);
//! assert_ne!(pair_a, pair_b);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Types, methods and instances built from the same name must not collide.
pub mod hash_constants {
    /// Separator constant for chained components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for definition hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for source file hashes.
    pub const FILE: u64 = 0x1a095090689d4647;

    /// Position markers so that argument order changes the hash.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a definition, instance or method.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash a qualified definition name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash a source file name.
    #[inline]
    pub fn from_file(name: &str) -> Self {
        TypeHash(hash_constants::FILE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash a generic instance from its definition hash and argument hashes.
    ///
    /// An instance with no arguments hashes to the definition itself.
    #[inline]
    pub fn from_instance(definition: TypeHash, args: &[TypeHash]) -> Self {
        TypeHash(chain(definition.0, args))
    }

    /// Hash a method instance: owner, name and generic arguments.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, args: &[TypeHash]) -> Self {
        let seed = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(chain(seed, args))
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

    /// Fixed-width lowercase hex form used inside generated names.
    pub fn mangled(self) -> String {
        format!("{:016x}", self.0)
    }
}

fn chain(seed: u64, args: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, arg) in args.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the combination order-sensitive
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(marker ^ arg.0);
    }
    hash
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("Int"), TypeHash::from_name("Int"));
        assert_ne!(TypeHash::from_name("Int"), TypeHash::from_name("Int64"));
    }

    #[test]
    fn instance_without_args_is_definition() {
        let def = TypeHash::from_name("Box");
        assert_eq!(TypeHash::from_instance(def, &[]), def);
    }

    #[test]
    fn nested_instances_differ() {
        let boxed = TypeHash::from_name("Box");
        let int = TypeHash::from_name("Int");
        let box_int = TypeHash::from_instance(boxed, &[int]);
        let box_box_int = TypeHash::from_instance(boxed, &[box_int]);
        assert_ne!(box_int, box_box_int);
    }

    #[test]
    fn method_hash_separates_domains() {
        let owner = TypeHash::from_name("List");
        let method = TypeHash::from_method(owner, "map", &[]);
        assert_ne!(method, TypeHash::from_name("map"));
        assert_ne!(method, TypeHash::from_method(owner, "map", &[owner]));
    }

    #[test]
    fn mangled_is_fixed_width() {
        assert_eq!(TypeHash(0xab).mangled(), "00000000000000ab");
        assert_eq!(TypeHash::from_name("x").mangled().len(), 16);
    }
}
