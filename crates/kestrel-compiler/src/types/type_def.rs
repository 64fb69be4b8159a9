//! TypeDef - one concrete instance of a definition.

use kestrel_core::{DefId, FileId, InstanceId, MethodInstanceId, PrimitiveKind, Span, TypeHash};

use super::{Deferred, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDefKind {
    Class,
    /// Value type; flattened wherever it is stored.
    Struct,
    Primitive(PrimitiveKind),
    Interface,
    Any,
    String,
    /// Free functions of a file, or of the prelude when `None`.
    Module(Option<FileId>),
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
    pub owner: InstanceId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: InstanceId,
    pub def: DefId,
    pub args: Vec<Type>,
    /// Source-level name, e.g. `Map<String, Int>`.
    pub name: String,
    pub hash: TypeHash,
    pub kind: TypeDefKind,
    pub supertype: Option<Type>,
    pub interfaces: Vec<Type>,
    /// Fields declared by this type, not inherited ones.
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodInstanceId>,
    pub plural: bool,
    /// Local slots a value occupies; computed late for value types.
    pub slots: Deferred<u16>,
    pub descriptor: String,
    /// Internal class name on the target machine.
    pub runtime_name: String,
    /// Mentions an unbound method generic somewhere in its arguments.
    pub open: bool,
}

impl TypeDef {
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeDefKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self.kind,
            TypeDefKind::Class | TypeDefKind::Interface | TypeDefKind::Any | TypeDefKind::String
        )
    }

    pub fn is_unit(&self) -> bool {
        self.kind == TypeDefKind::Primitive(PrimitiveKind::Unit)
    }

    /// Whether this instance gets its own generated class.
    pub fn needs_artifact(&self) -> bool {
        !self.open
            && match self.kind {
                TypeDefKind::Class | TypeDefKind::Struct | TypeDefKind::Interface => true,
                TypeDefKind::Module(file) => file.is_some(),
                _ => false,
            }
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldDef)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}
