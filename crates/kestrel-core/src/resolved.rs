//! Resolved type references.

use std::fmt;

use crate::DefId;

/// A type reference after name resolution and before instantiation.
///
/// Produced once per syntactic type reference and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    /// A definition applied to (possibly generic) arguments.
    Basic { def: DefId, args: Vec<ResolvedType> },
    /// An unbound generic parameter of the enclosing type or method.
    Generic { index: u32, method_level: bool },
}

impl ResolvedType {
    /// A definition with no generic arguments.
    pub fn simple(def: DefId) -> Self {
        ResolvedType::Basic {
            def,
            args: Vec::new(),
        }
    }

    /// Whether this reference mentions a method-level generic anywhere.
    pub fn mentions_method_generic(&self) -> bool {
        match self {
            ResolvedType::Basic { args, .. } => args.iter().any(Self::mentions_method_generic),
            ResolvedType::Generic { method_level, .. } => *method_level,
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Basic { def, args } if args.is_empty() => write!(f, "{def}"),
            ResolvedType::Basic { def, args } => {
                write!(f, "{def}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            ResolvedType::Generic {
                index,
                method_level: true,
            } => write!(f, "M{index}"),
            ResolvedType::Generic { index, .. } => write!(f, "T{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_generic_detection_recurses() {
        let inner = ResolvedType::Generic {
            index: 0,
            method_level: true,
        };
        let outer = ResolvedType::Basic {
            def: DefId::new(3),
            args: vec![inner],
        };
        assert!(outer.mentions_method_generic());
        assert!(!ResolvedType::simple(DefId::new(1)).mentions_method_generic());
    }

    #[test]
    fn display_shows_structure() {
        let ty = ResolvedType::Basic {
            def: DefId::new(4),
            args: vec![ResolvedType::Generic {
                index: 1,
                method_level: false,
            }],
        };
        assert_eq!(ty.to_string(), "def_4<T1>");
    }
}
