//! Value-type flattening.
//!
//! A value type has no runtime identity: wherever it is stored (locals,
//! fields, statics, parameters) it is replaced by its leaves, the
//! non-value-typed values reached by unrolling nested value-type fields.
//! Leaf names join the field path with `$`, so `line.start.x` is stored in
//! a field named `start$x` on whatever holds `line`.

use kestrel_core::{CompilationError, PrimitiveKind, Span, StackKind, internal_fault};
use tracing::trace;

use crate::template::TypePool;
use crate::types::{Deferred, Type, TypeDefKind};

/// Separator between the segments of a flattened field path.
pub const LEAF_SEPARATOR: char = '$';

/// One storage unit of a flattened value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Field path relative to the flattened value; empty for the value
    /// itself when it is not a value type.
    pub path: String,
    pub ty: Type,
    pub kind: StackKind,
    /// Slot offset from the first slot of the value.
    pub offset: u16,
}

impl Leaf {
    /// The storage name of this leaf under `prefix`.
    pub fn name(&self, prefix: &str) -> String {
        join(prefix, &self.path)
    }
}

pub fn join(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}{LEAF_SEPARATOR}{path}"),
    }
}

/// Compute and record the slot count of `ty`.
///
/// Value types are computed on first request; one that contains itself,
/// directly or through other value types, cannot be flattened.
pub fn compute_slots(pool: &mut TypePool<'_>, ty: Type) -> Result<u16, CompilationError> {
    let Some(id) = ty.instance() else {
        internal_fault("slot count of an unbound generic");
    };
    let def = pool.get(id);
    match &def.slots {
        Deferred::Ready(slots) => return Ok(*slots),
        Deferred::InProgress => {
            return Err(CompilationError::type_checking(
                def.fields.first().map(|f| f.span).unwrap_or_default(),
                format!("value type {} contains itself", def.name),
            ));
        }
        Deferred::Pending => {}
    }
    pool.get_mut(id).slots.begin();
    let fields: Vec<(Type, Span)> = pool
        .get(id)
        .fields
        .iter()
        .filter(|f| !f.is_static)
        .map(|f| (f.ty, f.span))
        .collect();
    let mut total: u16 = 0;
    for (field, span) in fields {
        let slots = compute_slots(pool, field)?;
        total = total.checked_add(slots).ok_or_else(|| {
            let name = &pool.get(id).name;
            CompilationError::type_checking(
                span,
                format!("value type {name} needs more than {} slots", u16::MAX),
            )
        })?;
    }
    trace!(ty = %pool.get(id).name, slots = total, "flattened value type");
    pool.get_mut(id).slots.fill(total);
    Ok(total)
}

/// Slot count of a type whose layout is already computed.
pub fn slots(pool: &TypePool<'_>, ty: Type) -> u16 {
    let Some(def) = pool.type_def(ty) else {
        internal_fault("slot count of an unbound generic");
    };
    match def.slots.get() {
        Some(slots) => *slots,
        None => internal_fault(format_args!("layout of {} not computed", def.name)),
    }
}

/// The leaves of `ty` in declaration order. `Unit` has none.
pub fn leaves(pool: &TypePool<'_>, ty: Type) -> Vec<Leaf> {
    let mut out = Vec::new();
    collect(pool, ty, String::new(), 0, &mut out);
    out
}

fn collect(pool: &TypePool<'_>, ty: Type, path: String, offset: u16, out: &mut Vec<Leaf>) -> u16 {
    let Some(def) = pool.type_def(ty) else {
        internal_fault("layout of an unbound generic");
    };
    match def.kind {
        TypeDefKind::Struct => {
            let mut offset = offset;
            let mut used = 0;
            for field in def.fields.iter().filter(|f| !f.is_static) {
                let taken = collect(pool, field.ty, join(&path, &field.name), offset, out);
                offset += taken;
                used += taken;
            }
            used
        }
        TypeDefKind::Primitive(PrimitiveKind::Unit) => 0,
        TypeDefKind::Primitive(kind) => {
            let Some(stack) = kind.stack_kind() else {
                return 0;
            };
            out.push(Leaf {
                path,
                ty,
                kind: stack,
                offset,
            });
            stack.width()
        }
        _ => {
            out.push(Leaf {
                path,
                ty,
                kind: StackKind::Ref,
                offset,
            });
            1
        }
    }
}

/// Stack category of a non-value type; `None` for `Unit`.
pub fn stack_kind(pool: &TypePool<'_>, ty: Type) -> Option<StackKind> {
    match pool.type_def(ty).map(|def| def.kind) {
        Some(TypeDefKind::Primitive(kind)) => kind.stack_kind(),
        Some(TypeDefKind::Struct) => None,
        _ => Some(StackKind::Ref),
    }
}

/// Descriptor fragment of a value as a parameter: its leaves' descriptors.
pub fn param_descriptor(pool: &TypePool<'_>, ty: Type) -> String {
    leaves(pool, ty)
        .iter()
        .map(|leaf| pool.get_descriptor(leaf.ty))
        .collect()
}

impl TypePool<'_> {
    /// Field descriptor of a non-value type.
    pub fn get_descriptor(&self, ty: Type) -> &str {
        match self.type_def(ty) {
            Some(def) => &def.descriptor,
            None => internal_fault("descriptor of an unbound generic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompileOptions, CompileSession};
    use crate::passes::RegistrationPass;
    use kestrel_core::ast::{Program, SourceFile, TypeDecl, TypeRef};
    use kestrel_registry::{Registry, ScopeBinding};

    fn registry(file: SourceFile) -> Registry {
        RegistrationPass::new(&Program::new("main").with_file(file))
            .run()
            .unwrap()
            .0
    }

    fn lookup(registry: &Registry, name: &str) -> kestrel_core::DefId {
        let scope = registry.file_by_name("main").unwrap().scope;
        match registry.scopes().resolve(scope, name) {
            Some(ScopeBinding::Definition(def)) => def,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn pair_file() -> SourceFile {
        SourceFile::new("main")
            .with_type(
                TypeDecl::structure("Pair")
                    .with_field("a", TypeRef::named("Int"))
                    .with_field("b", TypeRef::named("Int")),
            )
            .with_type(
                TypeDecl::structure("Quad")
                    .with_field("left", TypeRef::named("Pair"))
                    .with_field("right", TypeRef::named("Pair")),
            )
    }

    #[test]
    fn two_ints_take_two_slots_and_nested_four() {
        let registry = registry(pair_file());
        let session = CompileSession::new(CompileOptions::default(), "main");
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let pair = pool
            .instantiate(lookup(&registry, "Pair"), Vec::new(), Span::default())
            .unwrap();
        let quad = pool
            .instantiate(lookup(&registry, "Quad"), Vec::new(), Span::default())
            .unwrap();
        assert_eq!(compute_slots(&mut pool, pair).unwrap(), 2);
        assert_eq!(compute_slots(&mut pool, quad).unwrap(), 4);

        let names: Vec<String> = leaves(&pool, quad).iter().map(|l| l.name("")).collect();
        assert_eq!(names, vec!["left$a", "left$b", "right$a", "right$b"]);
        let offsets: Vec<u16> = leaves(&pool, quad).iter().map(|l| l.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3]);
        assert_eq!(param_descriptor(&pool, quad), "IIII");
    }

    #[test]
    fn wide_leaves_take_two_slots() {
        let registry = registry(
            SourceFile::new("main").with_type(
                TypeDecl::structure("Mixed")
                    .with_field("big", TypeRef::named("Int64"))
                    .with_field("none", TypeRef::named("Unit"))
                    .with_field("name", TypeRef::named("String")),
            ),
        );
        let session = CompileSession::new(CompileOptions::default(), "main");
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let mixed = pool
            .instantiate(lookup(&registry, "Mixed"), Vec::new(), Span::default())
            .unwrap();
        assert_eq!(compute_slots(&mut pool, mixed).unwrap(), 3);
        let leaves = leaves(&pool, mixed);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[1].offset, 2);
        assert_eq!(leaves[1].kind, StackKind::Ref);
    }

    #[test]
    fn self_containing_value_type_is_rejected() {
        let registry = registry(
            SourceFile::new("main")
                .with_type(TypeDecl::structure("Loop").with_field("next", TypeRef::named("Loop"))),
        );
        let session = CompileSession::new(CompileOptions::default(), "main");
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let ty = pool
            .instantiate(lookup(&registry, "Loop"), Vec::new(), Span::default())
            .unwrap();
        assert!(matches!(
            compute_slots(&mut pool, ty),
            Err(CompilationError::TypeChecking { .. })
        ));
    }

    #[test]
    fn oversized_value_type_is_rejected() {
        // V16 doubles V0 sixteen times: 65536 slots
        let mut file = SourceFile::new("main").with_type(
            TypeDecl::structure("V0").with_field("a", TypeRef::named("Int")),
        );
        for level in 1..=16 {
            let inner = TypeRef::named(format!("V{}", level - 1));
            file = file.with_type(
                TypeDecl::structure(format!("V{level}"))
                    .with_field("left", inner.clone())
                    .with_field("right", inner),
            );
        }
        let registry = registry(file);
        let session = CompileSession::new(CompileOptions::default(), "main");
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let widest = pool
            .instantiate(lookup(&registry, "V15"), Vec::new(), Span::default())
            .unwrap();
        assert_eq!(compute_slots(&mut pool, widest).unwrap(), 32768);

        let too_wide = pool
            .instantiate(lookup(&registry, "V16"), Vec::new(), Span::default())
            .unwrap();
        assert!(matches!(
            compute_slots(&mut pool, too_wide),
            Err(CompilationError::TypeChecking { message, .. }) if message.contains("V16")
        ));
    }

    #[test]
    fn join_skips_empty_segments() {
        assert_eq!(join("", "x"), "x");
        assert_eq!(join("pos", ""), "pos");
        assert_eq!(join("pos", "x"), "pos$x");
    }
}
