//! Class-file models and their binary form.
//!
//! The backend describes every artifact as a [`ClassModel`]; [`write_class`]
//! turns one into the bytes the host loads. Models are also what the
//! reference evaluator runs, so both see exactly the same code.
//!
//! ## Modules
//!
//! - [`access`]: access flags
//! - [`constant_pool`]: deduplicating constant pool
//! - [`descriptor`]: reading type descriptors
//! - [`opcode`]: operation codes
//! - [`stack`]: operand stack depth analysis
//! - [`writer`]: class-file serialization

pub mod access;
pub mod constant_pool;
pub mod descriptor;
pub mod opcode;
pub mod stack;
pub mod writer;

pub use access::{ClassAccess, FieldAccess, MethodAccess};
pub use constant_pool::{Constant, ConstantPool};
pub use opcode::Opcode;
pub use writer::write_class;

use kestrel_core::Span;

use crate::ir::Instruction;

/// One generated class or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassModel {
    /// Internal name, `/`-separated.
    pub name: String,
    pub super_name: String,
    pub interfaces: Vec<String>,
    pub access: ClassAccess,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
    /// Declaration the class came from, for diagnostics.
    pub span: Span,
}

impl ClassModel {
    pub fn new(
        name: impl Into<String>,
        super_name: impl Into<String>,
        access: ClassAccess,
    ) -> Self {
        Self {
            name: name.into(),
            super_name: super_name.into(),
            interfaces: Vec::new(),
            access,
            fields: Vec::new(),
            methods: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(ClassAccess::INTERFACE)
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodModel> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub access: FieldAccess,
    pub name: String,
    pub descriptor: String,
}

impl FieldModel {
    pub fn new(
        access: FieldAccess,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(FieldAccess::STATIC)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodModel {
    pub access: MethodAccess,
    pub name: String,
    pub descriptor: String,
    /// `None` for abstract methods.
    pub code: Option<CodeModel>,
    /// Checked exceptions the method declares.
    pub exceptions: Vec<String>,
    /// Source-level label, such as `List<Int>.push`.
    pub label: String,
    pub span: Span,
}

impl MethodModel {
    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccess::STATIC)
    }
}

/// A linearized method body.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeModel {
    pub instructions: Vec<Instruction>,
    pub max_locals: u16,
}
