//! Backend: from checked instances to class models and bytes.
//!
//! Every instance that needs an artifact becomes one [`ClassModel`]:
//!
//! | instance      | class                                             |
//! |---------------|---------------------------------------------------|
//! | class         | extends its parent, fields per leaf, `<init>`     |
//! | value type    | final holder of static fields and static methods  |
//! | interface     | abstract methods only                             |
//! | file module   | static methods for the file's free functions      |
//!
//! Two more classes are generated per compile: the files class holding
//! every file's guarded import, and the entry class whose `run()` imports
//! the main file. The entry class also holds the step counter and the
//! scratch statics of value-type returns.
//!
//! ## Modules
//!
//! - [`names`]: runtime names of methods and generated members
//! - [`artifacts`]: serialized output and runtime fault translation

pub mod artifacts;
pub mod names;

pub use artifacts::{ArtifactSet, NameTable};
pub use names::Symbols;

use std::collections::BTreeMap;

use kestrel_core::{CompilationError, FileId, MethodInstanceId, StackKind, internal_fault};
use tracing::debug;

use crate::check::TypedBody;
use crate::classfile::{
    ClassAccess, ClassModel, CodeModel, FieldAccess, FieldModel, MethodAccess, MethodModel,
    write_class,
};
use crate::emit::{self, LoweredBody};
use crate::ir::{Instruction, InvokeKind, MemberRef};
use crate::layout;
use crate::template::TypePool;
use crate::types::{MethodKind, Type, TypeDef, TypeDefKind};
use names::{ENTRY_EXCEPTION, ENTRY_INTERFACE, OBJECT_CLASS, is_static_on_target};

/// Every class of one compile, before serialization.
#[derive(Debug, Clone)]
pub struct LoweredProgram {
    pub classes: Vec<ClassModel>,
    pub entry_class: String,
    /// The static `long` charged by every code block.
    pub counter: MemberRef,
    pub names: NameTable,
}

impl LoweredProgram {
    pub fn class(&self, name: &str) -> Option<&ClassModel> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Serialize every class.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn write(&self) -> Result<ArtifactSet, CompilationError> {
        let mut classes = BTreeMap::new();
        for class in &self.classes {
            classes.insert(class.name.clone(), write_class(class)?);
        }
        Ok(ArtifactSet::new(
            classes,
            self.entry_class.clone(),
            self.names.clone(),
        ))
    }
}

/// Lower a fully checked pool into class models.
///
/// `files` holds the checked top level of every file, in file order.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_program(
    pool: &TypePool<'_>,
    symbols: &Symbols,
    files: &[(FileId, TypedBody)],
    main: FileId,
) -> LoweredProgram {
    let line_numbers = pool.session().options.emit_line_numbers;
    let mut lowering = Lowering {
        pool,
        symbols,
        line_numbers,
        names: NameTable::default(),
    };

    let mut classes = Vec::new();
    for def in pool.types() {
        lowering.names.add_class(&def.runtime_name, &def.name);
        if def.needs_artifact() {
            classes.push(lowering.instance_class(def));
        }
    }
    classes.push(lowering.files_class(files));
    classes.push(lowering.entry_class(main));

    for class in &classes {
        debug!(
            class = %class.name,
            fields = class.fields.len(),
            methods = class.methods.len(),
            "lowered class"
        );
    }

    LoweredProgram {
        classes,
        entry_class: symbols.entry_class.clone(),
        counter: symbols.counter.clone(),
        names: lowering.names,
    }
}

struct Lowering<'a, 'r> {
    pool: &'a TypePool<'r>,
    symbols: &'a Symbols,
    line_numbers: bool,
    names: NameTable,
}

impl Lowering<'_, '_> {
    fn code(&self, body: LoweredBody) -> CodeModel {
        CodeModel {
            instructions: body.code.linearize(&self.symbols.counter),
            max_locals: body.max_locals,
        }
    }

    // ========================================================================
    // Instance classes
    // ========================================================================

    fn instance_class(&mut self, def: &TypeDef) -> ClassModel {
        let pool = self.pool;
        let access = match def.kind {
            TypeDefKind::Interface => ClassAccess::interface(),
            TypeDefKind::Class => ClassAccess::class(),
            _ => ClassAccess::class() | ClassAccess::FINAL,
        };
        let super_name = match (def.kind, def.supertype) {
            (TypeDefKind::Class, Some(parent)) => self.runtime_name(parent).to_string(),
            _ => OBJECT_CLASS.to_string(),
        };
        let mut class = ClassModel::new(&def.runtime_name, super_name, access);
        class.interfaces = def
            .interfaces
            .iter()
            .map(|ty| self.runtime_name(*ty).to_string())
            .collect();
        class.span = pool.registry().get(def.def).span;

        for field in &def.fields {
            // Value types have no instances to hold instance fields
            if !field.is_static && def.kind != TypeDefKind::Class {
                continue;
            }
            let mut access = FieldAccess::PUBLIC;
            if field.is_static {
                access |= FieldAccess::STATIC;
            }
            for leaf in layout::leaves(pool, field.ty) {
                class.fields.push(FieldModel::new(
                    access,
                    leaf.name(&field.name),
                    pool.get_descriptor(leaf.ty),
                ));
            }
        }

        if def.kind == TypeDefKind::Class {
            class.methods.push(constructor(&class.super_name));
        }

        for id in &def.methods {
            if pool.method(*id).owner != def.id {
                continue;
            }
            if let Some(method) = self.method(*id) {
                self.names
                    .add_method(&def.runtime_name, &method.name, &pool.method(*id).name);
                class.methods.push(method);
            }
        }
        class
    }

    fn method(&self, id: MethodInstanceId) -> Option<MethodModel> {
        let pool = self.pool;
        let def = pool.method(id);
        if def.is_unbound_generic() {
            return None;
        }
        let member = self.symbols.method(id);
        let (access, code) = match def.kind {
            MethodKind::Source => {
                let Some(body) = def.body.get() else {
                    internal_fault(format_args!(
                        "body of {} was never checked",
                        pool.method_label(id)
                    ));
                };
                let lowered = emit::lower_method(pool, self.symbols, self.line_numbers, id, body);
                let mut access = MethodAccess::PUBLIC;
                if is_static_on_target(pool, id) {
                    access |= MethodAccess::STATIC;
                }
                (access, Some(self.code(lowered)))
            }
            MethodKind::Interface => (MethodAccess::PUBLIC | MethodAccess::ABSTRACT, None),
            // Called in place; nothing to generate
            MethodKind::Builtin(_) | MethodKind::Folding(_) | MethodKind::Native(_) => {
                return None;
            }
        };
        Some(MethodModel {
            access,
            name: member.name.clone(),
            descriptor: member.descriptor.clone(),
            code,
            exceptions: Vec::new(),
            label: pool.method_label(id),
            span: def.span,
        })
    }

    fn runtime_name(&self, ty: Type) -> &str {
        match self.pool.type_def(ty) {
            Some(def) => &def.runtime_name,
            None => internal_fault("runtime name of an unbound generic"),
        }
    }

    // ========================================================================
    // Generated classes
    // ========================================================================

    /// Guard flag and import method of every file.
    fn files_class(&mut self, files: &[(FileId, TypedBody)]) -> ClassModel {
        let name = &self.symbols.files_class;
        let mut class =
            ClassModel::new(name, OBJECT_CLASS, ClassAccess::class() | ClassAccess::FINAL);
        self.names.add_class(name, "<files>");
        for (file, body) in files {
            let guard = self.symbols.import_guard(*file);
            class.fields.push(FieldModel::new(
                FieldAccess::PUBLIC | FieldAccess::STATIC,
                &guard.name,
                &guard.descriptor,
            ));
            let import = self.symbols.import_method(*file);
            let file_name = &self.pool.registry().file(*file).name;
            let lowered =
                emit::lower_import(self.pool, self.symbols, self.line_numbers, *file, body);
            self.names.add_method(name, &import.name, file_name);
            class.methods.push(MethodModel {
                access: MethodAccess::PUBLIC | MethodAccess::STATIC,
                name: import.name.clone(),
                descriptor: import.descriptor.clone(),
                code: Some(self.code(lowered)),
                exceptions: Vec::new(),
                label: format!("{file_name}.<top level>"),
                span: body.root.span,
            });
        }
        class
    }

    /// The runtime entry: `run()` imports the main file.
    fn entry_class(&mut self, main: FileId) -> ClassModel {
        let name = &self.symbols.entry_class;
        let mut class =
            ClassModel::new(name, OBJECT_CLASS, ClassAccess::class() | ClassAccess::FINAL);
        class.interfaces.push(ENTRY_INTERFACE.to_string());
        self.names.add_class(name, "<entry>");

        let counter = &self.symbols.counter;
        class.fields.push(FieldModel::new(
            FieldAccess::PUBLIC | FieldAccess::STATIC,
            &counter.name,
            &counter.descriptor,
        ));
        for (field, descriptor) in self.scratch_fields() {
            class.fields.push(FieldModel::new(
                FieldAccess::PUBLIC | FieldAccess::STATIC,
                field,
                descriptor,
            ));
        }

        class.methods.push(constructor(OBJECT_CLASS));
        class.methods.push(MethodModel {
            access: MethodAccess::PUBLIC,
            name: "run".into(),
            descriptor: "()V".into(),
            code: Some(CodeModel {
                instructions: vec![
                    Instruction::Invoke(InvokeKind::Static, self.symbols.import_method(main)),
                    Instruction::Pop,
                    Instruction::Return(None),
                ],
                max_locals: 1,
            }),
            exceptions: vec![ENTRY_EXCEPTION.to_string()],
            label: "<entry>.run".into(),
            span: Default::default(),
        });
        class
    }

    /// Scratch statics used by any value-type return, by name.
    fn scratch_fields(&self) -> BTreeMap<String, String> {
        let pool = self.pool;
        let mut fields = BTreeMap::new();
        for method in pool.methods() {
            let generated = matches!(method.kind, MethodKind::Source | MethodKind::Interface)
                && !method.is_unbound_generic()
                && pool.get(method.owner).needs_artifact();
            if !generated || !pool.is_plural(method.ret) {
                continue;
            }
            for (index, leaf) in layout::leaves(pool, method.ret).iter().enumerate() {
                let member = self.symbols.scratch(pool, index, leaf);
                fields.insert(member.name, member.descriptor);
            }
        }
        fields
    }
}

/// `<init>` chaining to the superclass, uncharged.
fn constructor(super_name: &str) -> MethodModel {
    MethodModel {
        access: MethodAccess::PUBLIC,
        name: "<init>".into(),
        descriptor: "()V".into(),
        code: Some(CodeModel {
            instructions: vec![
                Instruction::Load(StackKind::Ref, 0),
                Instruction::Invoke(
                    InvokeKind::Special,
                    MemberRef::new(super_name, "<init>", "()V"),
                ),
                Instruction::Return(None),
            ],
            max_locals: 1,
        }),
        exceptions: Vec::new(),
        label: "<init>".into(),
        span: Default::default(),
    }
}
