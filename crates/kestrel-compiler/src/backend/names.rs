//! Runtime names of generated members.
//!
//! Classes get their runtime names at instantiation. This module names what
//! lives inside them:
//! - Methods: operators spelled out (`<=` becomes `op$lt$eq`), bound generic
//!   methods suffixed with a hash of their arguments, and a signature hash
//!   appended when two methods of one class would otherwise share a name
//!   and descriptor
//! - Scratch statics carrying value-type results back to callers
//! - The per-file import guards on the files class
//!
//! Every suffix hashes the method independently of its owner, so an
//! override keeps the name of the method it replaces.

use std::collections::BTreeMap;

use kestrel_core::{FileId, MethodInstanceId, TypeHash};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::ir::MemberRef;
use crate::layout::{self, Leaf};
use crate::options::CompileSession;
use crate::template::TypePool;
use crate::types::{MethodKind, Type, TypeDefKind};

/// Interface every entry class implements.
pub const ENTRY_INTERFACE: &str = "kestrel/runtime/Entry";
/// Checked exception the entry point declares.
pub const ENTRY_EXCEPTION: &str = "kestrel/runtime/KestrelException";
pub const OBJECT_CLASS: &str = "java/lang/Object";
pub const STEP_COUNTER: &str = "steps";

/// Spell out operator characters so the name is a valid identifier.
pub fn method_name(name: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return name.to_string();
    }
    let parts: Vec<&str> = name
        .chars()
        .map(|c| match c {
            '+' => "plus",
            '-' => "minus",
            '*' => "times",
            '/' => "div",
            '%' => "rem",
            '<' => "lt",
            '>' => "gt",
            '=' => "eq",
            '!' => "not",
            '&' => "and",
            '|' => "or",
            '^' => "xor",
            _ => "x",
        })
        .collect();
    format!("op${}", parts.join("$"))
}

/// Names and descriptors of everything generated code refers to.
#[derive(Debug)]
pub struct Symbols {
    methods: FxHashMap<MethodInstanceId, MemberRef>,
    pub entry_class: String,
    pub files_class: String,
    pub counter: MemberRef,
}

impl Symbols {
    /// Name every method of every instance that gets a class.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(pool: &TypePool<'_>, session: &CompileSession) -> Self {
        let entry_class = session.entry_class();
        let counter = MemberRef::new(&entry_class, STEP_COUNTER, "J");
        let mut methods = FxHashMap::default();

        for def in pool.types().iter().filter(|def| def.needs_artifact()) {
            let mut named: Vec<(MethodInstanceId, String, String)> = Vec::new();
            for id in &def.methods {
                let method = pool.method(*id);
                if !matches!(method.kind, MethodKind::Source | MethodKind::Interface)
                    || method.is_unbound_generic()
                {
                    continue;
                }
                let mut name = method_name(&method.name);
                if !method.generic_args.is_empty() {
                    let hashes: Vec<TypeHash> =
                        method.generic_args.iter().map(|t| pool.type_hash(*t)).collect();
                    let hash = TypeHash::from_method(TypeHash::EMPTY, &method.name, &hashes);
                    name = format!("{name}${}", hash.mangled());
                }
                named.push((*id, name, method_descriptor(pool, *id)));
            }

            let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
            for (_, name, descriptor) in &named {
                *counts.entry((name.as_str(), descriptor.as_str())).or_default() += 1;
            }
            let clashing: Vec<bool> = named
                .iter()
                .map(|(_, name, descriptor)| counts[&(name.as_str(), descriptor.as_str())] > 1)
                .collect();

            for ((id, name, descriptor), clash) in named.iter().zip(clashing) {
                let name = if clash {
                    let method = pool.method(*id);
                    let params: Vec<TypeHash> =
                        method.params.iter().map(|t| pool.type_hash(*t)).collect();
                    let hash = TypeHash::from_method(TypeHash::EMPTY, &method.name, &params);
                    format!("{name}${}", hash.mangled())
                } else {
                    name.clone()
                };
                trace!(method = %pool.method_label(*id), %name, %descriptor, "named method");
                methods.insert(*id, MemberRef::new(&def.runtime_name, name, descriptor.clone()));
            }
        }

        Self {
            methods,
            entry_class,
            files_class: session.files_class(),
            counter,
        }
    }

    /// The generated member for a method instance.
    pub fn method(&self, id: MethodInstanceId) -> &MemberRef {
        match self.methods.get(&id) {
            Some(member) => member,
            None => kestrel_core::internal_fault(format_args!("method {id} has no runtime name")),
        }
    }

    /// The static flag guarding a file's top level.
    pub fn import_guard(&self, file: FileId) -> MemberRef {
        MemberRef::new(&self.files_class, format!("imported${}", file.as_usize()), "Z")
    }

    /// The method running a file's top level once.
    pub fn import_method(&self, file: FileId) -> MemberRef {
        MemberRef::new(&self.files_class, format!("import${}", file.as_usize()), "()Z")
    }

    /// Scratch static carrying leaf `index` of a value-type result.
    pub fn scratch(&self, pool: &TypePool<'_>, index: usize, leaf: &Leaf) -> MemberRef {
        let descriptor = scratch_descriptor(pool, leaf.ty);
        let tag = descriptor.chars().next().unwrap_or('L');
        MemberRef::new(&self.entry_class, format!("ret${index}${tag}"), descriptor)
    }
}

fn scratch_descriptor(pool: &TypePool<'_>, ty: Type) -> String {
    match pool.primitive_kind(ty) {
        Some(kind) => kind.descriptor().to_string(),
        None => format!("L{OBJECT_CLASS};"),
    }
}

/// Whether a method compiles to a static method on its owner's class.
///
/// Value types have no instances on the target, so their instance
/// methods take the receiver's leaves as leading parameters.
pub fn is_static_on_target(pool: &TypePool<'_>, method: MethodInstanceId) -> bool {
    let method = pool.method(method);
    method.is_static || pool.get(method.owner).kind == TypeDefKind::Struct
}

/// Descriptor of a generated method.
pub fn method_descriptor(pool: &TypePool<'_>, id: MethodInstanceId) -> String {
    let method = pool.method(id);
    let mut descriptor = String::from("(");
    if !method.is_static && pool.get(method.owner).kind == TypeDefKind::Struct {
        descriptor.push_str(&layout::param_descriptor(pool, Type::Basic(method.owner)));
    }
    for param in &method.params {
        descriptor.push_str(&layout::param_descriptor(pool, *param));
    }
    descriptor.push(')');
    if pool.is_unit(method.ret) || pool.is_plural(method.ret) {
        descriptor.push('V');
    } else {
        descriptor.push_str(pool.get_descriptor(method.ret));
    }
    descriptor
}
