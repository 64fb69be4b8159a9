//! Definitions: the generic, not-yet-instantiated form of every type.

use kestrel_core::ast::{Expr, NativeMethod};
use kestrel_core::{DefId, FileId, PrimitiveKind, ResolvedType, Span, TypeHash};
use petgraph::graph::NodeIndex;

use crate::builtins::BuiltinOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Primitive(PrimitiveKind),
    /// Root of all reference types.
    Any,
    String,
    Class,
    /// Value type, flattened into whatever holds it.
    Struct,
    Interface,
    /// Holder of a file's free functions, or of the prelude's when `None`.
    Module(Option<FileId>),
}

impl DefKind {
    pub fn is_plural(self) -> bool {
        matches!(self, DefKind::Struct)
    }

    pub fn is_reference(self) -> bool {
        matches!(
            self,
            DefKind::Any | DefKind::String | DefKind::Class | DefKind::Interface
        )
    }
}

/// A type definition before instantiation.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: DefId,
    pub name: String,
    pub kind: DefKind,
    pub generics: Vec<String>,
    pub parent: Option<ResolvedType>,
    pub interfaces: Vec<ResolvedType>,
    pub fields: Vec<FieldTemplate>,
    pub methods: Vec<MethodTemplate>,
    /// Scope in which the definition's own generics are bound.
    pub scope: NodeIndex,
    pub file: Option<FileId>,
    pub hash: TypeHash,
    pub span: Span,
}

impl Definition {
    pub fn generic_count(&self) -> usize {
        self.generics.len()
    }

    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FieldTemplate {
    pub name: String,
    pub ty: ResolvedType,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParamTemplate {
    pub name: String,
    pub ty: ResolvedType,
}

#[derive(Debug, Clone)]
pub struct MethodTemplate {
    pub name: String,
    pub is_static: bool,
    pub generics: Vec<String>,
    pub params: Vec<ParamTemplate>,
    pub ret: ResolvedType,
    pub body: TemplateBody,
    /// Scope in which the method's generics are bound.
    pub scope: NodeIndex,
    pub span: Span,
}

impl MethodTemplate {
    /// Same name, parameter types and return type.
    pub fn same_signature(&self, other: &MethodTemplate) -> bool {
        self.name == other.name
            && self.generics.len() == other.generics.len()
            && self.ret == other.ret
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }
}

#[derive(Debug, Clone)]
pub enum TemplateBody {
    Source(Expr),
    Abstract,
    Native(NativeMethod),
    Builtin(BuiltinOp),
}
