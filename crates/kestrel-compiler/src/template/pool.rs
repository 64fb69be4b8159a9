//! The type pool: every concrete instance and method of one compile.

use std::collections::VecDeque;

use kestrel_core::{InstanceId, MethodInstanceId, PrimitiveKind, Span, TypeHash, internal_fault};
use kestrel_registry::Registry;
use tracing::trace;

use super::cache::InstanceCache;
use crate::options::CompileSession;
use crate::types::{FieldDef, MethodDef, Type, TypeDef, TypeDefKind};

/// Bindings for the generic parameters in scope while resolving a type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericEnv {
    pub class_args: Vec<Type>,
    /// `None` leaves method generics unbound (as `Type::Generic`).
    pub method_args: Option<Vec<Type>>,
}

impl GenericEnv {
    pub fn for_class(class_args: Vec<Type>) -> Self {
        Self {
            class_args,
            method_args: None,
        }
    }

    pub fn with_method_args(mut self, method_args: Vec<Type>) -> Self {
        self.method_args = Some(method_args);
        self
    }
}

/// One step of the instantiation chain, kept for depth diagnostics.
#[derive(Debug, Clone)]
pub(super) struct CauseFrame {
    pub what: String,
    pub span: Span,
}

/// Concrete types and methods, created on demand and cached by key.
pub struct TypePool<'r> {
    pub(super) registry: &'r Registry,
    pub(super) session: &'r CompileSession,
    pub(super) types: Vec<TypeDef>,
    pub(super) methods: Vec<MethodDef>,
    pub(super) cache: InstanceCache,
    pub(super) causes: Vec<CauseFrame>,
    pub(super) current_body: Option<MethodInstanceId>,
    pub(super) pending: VecDeque<MethodInstanceId>,
}

impl<'r> TypePool<'r> {
    /// Create a pool with the prelude types instantiated.
    ///
    /// Prelude instances come first and in a fixed order, so their ids are
    /// the same in every compile.
    pub fn new(
        registry: &'r Registry,
        session: &'r CompileSession,
    ) -> Result<Self, kestrel_core::CompilationError> {
        let mut pool = Self {
            registry,
            session,
            types: Vec::new(),
            methods: Vec::new(),
            cache: InstanceCache::new(),
            causes: Vec::new(),
            current_body: None,
            pending: VecDeque::new(),
        };
        let prelude = registry.prelude();
        for kind in PrimitiveKind::ALL {
            pool.instantiate(prelude.primitive(kind), Vec::new(), Span::default())?;
        }
        pool.instantiate(prelude.any, Vec::new(), Span::default())?;
        pool.instantiate(prelude.string, Vec::new(), Span::default())?;
        pool.instantiate(prelude.module, Vec::new(), Span::default())?;
        Ok(pool)
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn session(&self) -> &'r CompileSession {
        self.session
    }

    // ========================================================================
    // Table access
    // ========================================================================

    pub fn get(&self, id: InstanceId) -> &TypeDef {
        match self.types.get(id.as_usize()) {
            Some(def) => def,
            None => internal_fault(format_args!("unknown instance {id}")),
        }
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> &mut TypeDef {
        match self.types.get_mut(id.as_usize()) {
            Some(def) => def,
            None => internal_fault(format_args!("unknown instance {id}")),
        }
    }

    /// The instance behind a type; unbound generics have none.
    pub fn type_def(&self, ty: Type) -> Option<&TypeDef> {
        ty.instance().map(|id| self.get(id))
    }

    pub fn method(&self, id: MethodInstanceId) -> &MethodDef {
        match self.methods.get(id.as_usize()) {
            Some(def) => def,
            None => internal_fault(format_args!("unknown method {id}")),
        }
    }

    pub fn method_mut(&mut self, id: MethodInstanceId) -> &mut MethodDef {
        match self.methods.get_mut(id.as_usize()) {
            Some(def) => def,
            None => internal_fault(format_args!("unknown method {id}")),
        }
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    // ========================================================================
    // Prelude types
    // ========================================================================

    fn prelude_type(&self, def: kestrel_core::DefId) -> Type {
        match self.cache.get_type_instance(def, &[]) {
            Some(id) => Type::Basic(id),
            None => internal_fault(format_args!("prelude type {def} not instantiated")),
        }
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> Type {
        self.prelude_type(self.registry.prelude().primitive(kind))
    }

    pub fn unit(&self) -> Type {
        self.primitive(PrimitiveKind::Unit)
    }

    pub fn bool(&self) -> Type {
        self.primitive(PrimitiveKind::Bool)
    }

    pub fn int(&self) -> Type {
        self.primitive(PrimitiveKind::Int32)
    }

    pub fn any(&self) -> Type {
        self.prelude_type(self.registry.prelude().any)
    }

    pub fn string(&self) -> Type {
        self.prelude_type(self.registry.prelude().string)
    }

    pub fn prelude_module(&self) -> Type {
        self.prelude_type(self.registry.prelude().module)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn primitive_kind(&self, ty: Type) -> Option<PrimitiveKind> {
        self.type_def(ty).and_then(TypeDef::primitive)
    }

    pub fn is_unit(&self, ty: Type) -> bool {
        self.primitive_kind(ty) == Some(PrimitiveKind::Unit)
    }

    pub fn is_plural(&self, ty: Type) -> bool {
        self.type_def(ty).is_some_and(|def| def.plural)
    }

    pub fn is_reference(&self, ty: Type) -> bool {
        self.type_def(ty).is_some_and(TypeDef::is_reference)
    }

    pub fn is_open(&self, ty: Type) -> bool {
        match ty {
            Type::Generic(_) => true,
            Type::Basic(id) => self.get(id).open,
        }
    }

    pub fn type_hash(&self, ty: Type) -> TypeHash {
        match ty {
            Type::Basic(id) => self.get(id).hash,
            Type::Generic(index) => TypeHash::from_instance(
                TypeHash::from_name("<method generic>"),
                &[TypeHash(u64::from(index) + 1)],
            ),
        }
    }

    /// Source-level rendering of a type.
    pub fn display(&self, ty: Type) -> String {
        match ty {
            Type::Basic(id) => self.get(id).name.clone(),
            Type::Generic(index) => format!("M{index}"),
        }
    }

    pub fn display_list(&self, types: &[Type]) -> String {
        types
            .iter()
            .map(|t| self.display(*t))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether `sub` may be used where `sup` is expected.
    ///
    /// Every type except value types and modules is a subtype of `Any`;
    /// primitives get there by boxing.
    pub fn is_subtype(&self, sub: Type, sup: Type) -> bool {
        if sub == sup {
            return true;
        }
        let (Some(sub_def), Some(sup_def)) = (self.type_def(sub), self.type_def(sup)) else {
            return false;
        };
        if sup_def.kind == TypeDefKind::Any {
            return !matches!(sub_def.kind, TypeDefKind::Struct | TypeDefKind::Module(_));
        }
        if !matches!(
            sup_def.kind,
            TypeDefKind::Class | TypeDefKind::Interface
        ) {
            return false;
        }
        let mut stack = vec![sub];
        while let Some(current) = stack.pop() {
            let Some(def) = self.type_def(current) else {
                continue;
            };
            if let Some(parent) = def.supertype {
                if parent == sup {
                    return true;
                }
                stack.push(parent);
            }
            for interface in &def.interfaces {
                if *interface == sup {
                    return true;
                }
                stack.push(*interface);
            }
        }
        false
    }

    pub fn is_strict_subtype(&self, sub: Type, sup: Type) -> bool {
        sub != sup && self.is_subtype(sub, sup)
    }

    /// Find an instance or static field by name on `ty` or its ancestors.
    pub fn find_field(&self, ty: Type, name: &str) -> Option<&FieldDef> {
        let mut current = Some(ty);
        while let Some(ty) = current {
            let def = self.type_def(ty)?;
            if let Some((_, field)) = def.field(name) {
                return Some(field);
            }
            current = def.supertype;
        }
        None
    }

    /// Instance fields of `ty` in construction order: ancestors' first.
    pub fn all_instance_fields(&self, ty: Type) -> Vec<&FieldDef> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(ty) = current {
            let Some(def) = self.type_def(ty) else { break };
            chain.push(def);
            current = def.supertype;
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|def| def.fields.iter().filter(|f| !f.is_static))
            .collect()
    }

    // ========================================================================
    // Deferred bodies
    // ========================================================================

    /// Next method whose body still has to be checked.
    pub fn next_pending(&mut self) -> Option<MethodInstanceId> {
        self.pending.pop_front()
    }

    /// Mark which body is being checked; new instances record it as origin.
    pub fn set_current_body(&mut self, method: Option<MethodInstanceId>) {
        self.current_body = method;
    }

    pub(super) fn body_depth(&self) -> usize {
        self.current_body
            .map(|id| self.method(id).depth)
            .unwrap_or(0)
    }

    pub(super) fn enqueue(&mut self, method: MethodInstanceId) {
        trace!(%method, "queued body");
        self.pending.push_back(method);
    }
}
