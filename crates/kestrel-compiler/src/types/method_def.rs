//! MethodDef - a method of a concrete instance.

use kestrel_core::ast::NativeMethod;
use kestrel_core::{DefId, InstanceId, MethodInstanceId, Span, TypeHash};
use kestrel_registry::BuiltinOp;

use super::{Deferred, Type};
use crate::check::TypedBody;

/// How a method is implemented.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodKind {
    /// Body written in source, lowered through the IR.
    Source,
    /// Fixed instruction sequence chosen by the op.
    Builtin(BuiltinOp),
    /// Like `Builtin`, but calls with literal operands fold away.
    Folding(BuiltinOp),
    /// Signature only.
    Interface,
    /// Host method called directly.
    Native(NativeMethod),
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub id: MethodInstanceId,
    pub owner: InstanceId,
    pub name: String,
    pub is_static: bool,
    pub generic_arity: usize,
    /// Bound method generics; empty for non-generic methods and for the
    /// unbound signature of a generic method.
    pub generic_args: Vec<Type>,
    pub params: Vec<Type>,
    pub param_names: Vec<String>,
    pub ret: Type,
    pub kind: MethodKind,
    /// Definition and method index this was instantiated from.
    pub template: (DefId, usize),
    /// The unbound generic method this instance binds.
    pub generic_parent: Option<MethodInstanceId>,
    pub body: Deferred<TypedBody>,
    pub hash: TypeHash,
    /// Method instantiation nesting: how many generic-method bodies led here.
    pub depth: usize,
    /// The method whose body requested this instance, and where.
    pub origin: Option<(MethodInstanceId, Span)>,
    pub span: Span,
}

impl MethodDef {
    pub fn is_const(&self) -> bool {
        matches!(self.kind, MethodKind::Folding(_))
    }

    /// A generic method whose generics are not bound yet.
    pub fn is_unbound_generic(&self) -> bool {
        self.generic_arity > 0 && self.generic_args.is_empty()
    }

    pub fn builtin_op(&self) -> Option<BuiltinOp> {
        match self.kind {
            MethodKind::Builtin(op) | MethodKind::Folding(op) => Some(op),
            _ => None,
        }
    }
}
