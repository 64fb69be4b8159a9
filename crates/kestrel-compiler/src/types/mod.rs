//! Concrete, instantiated types.
//!
//! A [`Type`] is a handle into the compilation's type pool. Two `Basic`
//! handles are equal exactly when they name the same `(definition, args)`
//! instance, so type equality is handle equality.

mod deferred;
mod method_def;
mod type_def;

use std::fmt;

use kestrel_core::InstanceId;

pub use deferred::Deferred;
pub use method_def::{MethodDef, MethodKind};
pub use type_def::{FieldDef, TypeDef, TypeDefKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// An instance in the type pool.
    Basic(InstanceId),
    /// An unbound method-level generic parameter.
    Generic(u32),
}

impl Type {
    pub fn instance(self) -> Option<InstanceId> {
        match self {
            Type::Basic(id) => Some(id),
            Type::Generic(_) => None,
        }
    }

    pub fn is_generic(self) -> bool {
        matches!(self, Type::Generic(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(id) => write!(f, "{id}"),
            Type::Generic(index) => write!(f, "M{index}"),
        }
    }
}
