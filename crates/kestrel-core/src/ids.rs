//! Index types for the tables a compilation builds.
//!
//! - [`DefId`]: index into the global definition table (before instantiation)
//! - [`InstanceId`]: index into the compilation's concrete-type table
//! - [`MethodInstanceId`]: index into the table of instantiated methods
//! - [`FileId`]: index of a source file in the program
//! - [`SessionId`]: the numeric compile-session identifier

use std::fmt;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a table index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Get the underlying index.
            #[inline]
            pub const fn index(self) -> u32 {
                self.0
            }

            /// Get the underlying index as `usize` for table access.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                Self::new(index)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

index_type!(
    /// Index of a definition in the global definition table.
    DefId,
    "def_"
);

index_type!(
    /// Index of a concrete type instance in the compilation's type pool.
    InstanceId,
    "inst_"
);

index_type!(
    /// Index of an instantiated method in the compilation's type pool.
    MethodInstanceId,
    "method_"
);

index_type!(
    /// Index of a source file in the program.
    FileId,
    "file_"
);

/// Identifies one compile invocation.
///
/// Concurrent compilations sharing one loaded-artifact namespace must use
/// distinct sessions; the session is folded into every generated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_u32() {
        let def: DefId = 7.into();
        assert_eq!(def.index(), 7);
        assert_eq!(u32::from(InstanceId::new(3)), 3);
    }

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(DefId::new(2).to_string(), "def_2");
        assert_eq!(MethodInstanceId::new(9).to_string(), "method_9");
        assert_eq!(SessionId(4).to_string(), "s4");
    }
}
