//! Kestrel registry crate.
//!
//! Holds every definition of a program in its generic, uninstantiated form,
//! the lexical scope tree that decides which names are visible where, and
//! the builtin prelude.

pub mod builtins;
mod definition;
mod registry;
pub mod scope_tree;

pub use builtins::{BuiltinOp, conversion_name};
pub use definition::{
    DefKind, Definition, FieldTemplate, MethodTemplate, ParamTemplate, TemplateBody,
};
pub use registry::{FileEntry, Prelude, Registry};
pub use scope_tree::{ScopeBinding, ScopeKind, ScopeTree};
