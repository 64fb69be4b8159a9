//! Instantiation of definitions and generic methods.
//!
//! A miss in the instance cache goes through a fixed sequence: register a
//! shell, then fill in supertypes, fields and method signatures. Method
//! bodies are never touched here; they are queued and checked later, once
//! per method instance.

use kestrel_core::{
    CompilationError, DefId, InstanceId, MethodInstanceId, ResolvedType, Span, TypeHash,
    internal_fault,
};
use kestrel_registry::{DefKind, Definition, TemplateBody};
use tracing::{debug, trace};

use super::pool::{CauseFrame, GenericEnv, TypePool};
use crate::types::{Deferred, FieldDef, MethodDef, MethodKind, Type, TypeDef, TypeDefKind};

impl<'r> TypePool<'r> {
    /// Instantiate a definition with concrete arguments.
    ///
    /// The same `(def, args)` key always yields the same instance.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn instantiate(
        &mut self,
        def: DefId,
        args: Vec<Type>,
        span: Span,
    ) -> Result<Type, CompilationError> {
        let registry = self.registry;
        let definition = registry.get(def);

        // 1. Generic count
        if args.len() != definition.generic_count() {
            return Err(CompilationError::GenericCountMismatch {
                name: definition.name.clone(),
                expected: definition.generic_count(),
                got: args.len(),
                span,
            });
        }

        // 2. Cache
        if let Some(id) = self.cache.get_type_instance(def, &args) {
            trace!(instance = %id, "instance cache hit");
            return Ok(Type::Basic(id));
        }

        // 3. Everything below may recurse; record why we got here
        let name = self.instance_name(definition, &args);
        self.push_cause(format!("instantiating {name}"), span)?;
        let result = self.instantiate_uncached(definition, args, name);
        self.causes.pop();
        result
    }

    fn instantiate_uncached(
        &mut self,
        definition: &'r Definition,
        args: Vec<Type>,
        name: String,
    ) -> Result<Type, CompilationError> {
        let id = InstanceId::new(self.types.len() as u32);
        let arg_hashes: Vec<TypeHash> = args.iter().map(|a| self.type_hash(*a)).collect();
        let hash = TypeHash::from_instance(definition.hash, &arg_hashes);
        let open = args.iter().any(|a| self.is_open(*a));
        let kind = instance_kind(definition.kind);
        let runtime_name = self.runtime_name(definition, hash, !args.is_empty());
        let descriptor = match kind {
            TypeDefKind::Primitive(p) => p.descriptor().to_string(),
            _ => format!("L{runtime_name};"),
        };
        let slots = match kind {
            TypeDefKind::Primitive(p) => Deferred::ready(p.slot_count()),
            TypeDefKind::Struct => Deferred::Pending,
            TypeDefKind::Module(_) => Deferred::ready(0),
            _ => Deferred::ready(1),
        };

        // 4. Register the shell before anything can refer back to it
        self.types.push(TypeDef {
            id,
            def: definition.id,
            args: args.clone(),
            name,
            hash,
            kind,
            supertype: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            plural: definition.kind.is_plural(),
            slots,
            descriptor,
            runtime_name,
            open,
        });
        self.cache.cache_type_instance(definition.id, args.clone(), id);

        let env = GenericEnv::for_class(args);

        // 5. Supertypes
        let supertype = match &definition.parent {
            Some(parent) => Some(self.resolve(parent, &env, definition.span)?),
            None if kind == TypeDefKind::Class => Some(self.any()),
            None => None,
        };
        let mut interfaces = Vec::with_capacity(definition.interfaces.len());
        for interface in &definition.interfaces {
            interfaces.push(self.resolve(interface, &env, definition.span)?);
        }
        let shell = self.get_mut(id);
        shell.supertype = supertype;
        shell.interfaces = interfaces;

        // 6. Fields
        for field in &definition.fields {
            let ty = self.resolve(&field.ty, &env, field.span)?;
            self.get_mut(id).fields.push(FieldDef {
                name: field.name.clone(),
                ty,
                is_static: field.is_static,
                owner: id,
                span: field.span,
            });
        }

        // 7. Method signatures; bodies stay deferred
        for index in 0..definition.methods.len() {
            let method = self.instantiate_signature(id, definition, index, &env)?;
            self.get_mut(id).methods.push(method);
        }

        if !open {
            let queued: Vec<MethodInstanceId> = self
                .get(id)
                .methods
                .iter()
                .copied()
                .filter(|m| {
                    let method = self.method(*m);
                    method.kind == MethodKind::Source && !method.is_unbound_generic()
                })
                .collect();
            for method in queued {
                self.enqueue(method);
            }
        }

        debug!(
            instance = %self.get(id).name,
            %id,
            runtime = %self.get(id).runtime_name,
            "instantiated type"
        );
        Ok(Type::Basic(id))
    }

    fn instantiate_signature(
        &mut self,
        owner: InstanceId,
        definition: &'r Definition,
        index: usize,
        env: &GenericEnv,
    ) -> Result<MethodInstanceId, CompilationError> {
        let template = &definition.methods[index];
        let mut params = Vec::with_capacity(template.params.len());
        for param in &template.params {
            params.push(self.resolve(&param.ty, env, template.span)?);
        }
        let ret = self.resolve(&template.ret, env, template.span)?;
        let kind = match &template.body {
            TemplateBody::Source(_) => MethodKind::Source,
            TemplateBody::Abstract => MethodKind::Interface,
            TemplateBody::Native(native) => MethodKind::Native(native.clone()),
            TemplateBody::Builtin(op) if op.is_const() => MethodKind::Folding(*op),
            TemplateBody::Builtin(op) => MethodKind::Builtin(*op),
        };
        let mut signature: Vec<TypeHash> = params.iter().map(|p| self.type_hash(*p)).collect();
        signature.push(self.type_hash(ret));
        let hash = TypeHash::from_method(self.get(owner).hash, &template.name, &signature);
        let depth = if self.get(owner).args.is_empty() {
            0
        } else {
            self.body_depth() + 1
        };

        let id = MethodInstanceId::new(self.methods.len() as u32);
        self.methods.push(MethodDef {
            id,
            owner,
            name: template.name.clone(),
            is_static: template.is_static,
            generic_arity: template.generics.len(),
            generic_args: Vec::new(),
            params,
            param_names: template.params.iter().map(|p| p.name.clone()).collect(),
            ret,
            kind,
            template: (definition.id, index),
            generic_parent: None,
            body: Deferred::Pending,
            hash,
            depth,
            origin: self.current_body.map(|m| (m, template.span)),
            span: template.span,
        });
        Ok(id)
    }

    /// Bind the generics of a generic method.
    pub fn instantiate_method(
        &mut self,
        generic: MethodInstanceId,
        args: Vec<Type>,
        span: Span,
    ) -> Result<MethodInstanceId, CompilationError> {
        let template = self.method(generic).clone();
        if args.len() != template.generic_arity {
            return Err(CompilationError::GenericCountMismatch {
                name: template.name,
                expected: template.generic_arity,
                got: args.len(),
                span,
            });
        }
        if let Some(id) = self.cache.get_method_instance(generic, &args) {
            trace!(method = %id, "method cache hit");
            return Ok(id);
        }

        let label = format!(
            "instantiating {}.{}<{}>",
            self.get(template.owner).name,
            template.name,
            self.display_list(&args)
        );
        self.push_cause(label, span)?;
        let result = self.instantiate_method_uncached(generic, template, args, span);
        self.causes.pop();
        result
    }

    fn instantiate_method_uncached(
        &mut self,
        generic: MethodInstanceId,
        template: MethodDef,
        args: Vec<Type>,
        span: Span,
    ) -> Result<MethodInstanceId, CompilationError> {
        let mut params = Vec::with_capacity(template.params.len());
        for param in &template.params {
            params.push(self.substitute(*param, &args, span)?);
        }
        let ret = self.substitute(template.ret, &args, span)?;
        let arg_hashes: Vec<TypeHash> = args.iter().map(|a| self.type_hash(*a)).collect();
        let closed = !self.get(template.owner).open && !args.iter().any(|a| self.is_open(*a));

        let id = MethodInstanceId::new(self.methods.len() as u32);
        self.methods.push(MethodDef {
            id,
            params,
            ret,
            generic_args: args.clone(),
            generic_parent: Some(generic),
            body: Deferred::Pending,
            hash: TypeHash::from_instance(template.hash, &arg_hashes),
            depth: self.body_depth() + 1,
            origin: self.current_body.map(|m| (m, span)),
            ..template
        });
        self.cache.cache_method_instance(generic, args, id);

        if closed && self.method(id).kind == MethodKind::Source {
            self.enqueue(id);
        }
        debug!(method = %self.method_label(id), %id, "instantiated method");
        Ok(id)
    }

    /// Turn a resolved reference into a concrete type under `env`.
    pub fn resolve(
        &mut self,
        ty: &ResolvedType,
        env: &GenericEnv,
        span: Span,
    ) -> Result<Type, CompilationError> {
        match ty {
            ResolvedType::Basic { def, args } => {
                let mut concrete = Vec::with_capacity(args.len());
                for arg in args {
                    concrete.push(self.resolve(arg, env, span)?);
                }
                self.instantiate(*def, concrete, span)
            }
            ResolvedType::Generic {
                index,
                method_level: false,
            } => match env.class_args.get(*index as usize) {
                Some(ty) => Ok(*ty),
                None => internal_fault(format_args!("unbound class generic {index}")),
            },
            ResolvedType::Generic {
                index,
                method_level: true,
            } => match &env.method_args {
                Some(args) => match args.get(*index as usize) {
                    Some(ty) => Ok(*ty),
                    None => internal_fault(format_args!("unbound method generic {index}")),
                },
                None => Ok(Type::Generic(*index)),
            },
        }
    }

    /// Replace unbound method generics in `ty` with `args`.
    pub fn substitute(
        &mut self,
        ty: Type,
        args: &[Type],
        span: Span,
    ) -> Result<Type, CompilationError> {
        match ty {
            Type::Generic(index) => match args.get(index as usize) {
                Some(arg) => Ok(*arg),
                None => internal_fault(format_args!("unbound method generic {index}")),
            },
            Type::Basic(id) if !self.get(id).open => Ok(ty),
            Type::Basic(id) => {
                let def = self.get(id).def;
                let old_args = self.get(id).args.clone();
                let mut new_args = Vec::with_capacity(old_args.len());
                for arg in old_args {
                    new_args.push(self.substitute(arg, args, span)?);
                }
                self.instantiate(def, new_args, span)
            }
        }
    }

    /// `Owner.name<Args>` for diagnostics.
    pub fn method_label(&self, id: MethodInstanceId) -> String {
        let method = self.method(id);
        let owner = &self.get(method.owner).name;
        if method.generic_args.is_empty() {
            format!("{owner}.{}", method.name)
        } else {
            format!(
                "{owner}.{}<{}>",
                method.name,
                self.display_list(&method.generic_args)
            )
        }
    }

    fn push_cause(&mut self, what: String, span: Span) -> Result<(), CompilationError> {
        if self.causes.len() + self.body_depth() >= self.session.max_depth() {
            let mut chain = self.cause_chain();
            chain.push(what);
            return Err(CompilationError::InstantiationTooDeep { chain, span });
        }
        self.causes.push(CauseFrame { what, span });
        Ok(())
    }

    /// The chain of bodies and instantiations that led to the current point,
    /// outermost first.
    fn cause_chain(&self) -> Vec<String> {
        let mut bodies = Vec::new();
        let mut current = self.current_body;
        while let Some(method) = current {
            let label = self.method_label(method);
            match self.method(method).origin {
                Some((origin, span)) => {
                    bodies.push(format!("checking {label} (requested at {span})"));
                    current = Some(origin);
                }
                None => {
                    bodies.push(format!("checking {label}"));
                    current = None;
                }
            }
        }
        bodies.reverse();
        bodies.extend(
            self.causes
                .iter()
                .map(|frame| format!("{} (at {})", frame.what, frame.span)),
        );
        bodies
    }

    fn instance_name(&self, definition: &Definition, args: &[Type]) -> String {
        if args.is_empty() {
            definition.name.clone()
        } else {
            format!("{}<{}>", definition.name, self.display_list(args))
        }
    }

    fn runtime_name(&self, definition: &Definition, hash: TypeHash, has_args: bool) -> String {
        match definition.kind {
            DefKind::Primitive(kind) => kind.name().to_string(),
            DefKind::Any => "java/lang/Object".to_string(),
            DefKind::String => "java/lang/String".to_string(),
            DefKind::Module(None) => "prelude".to_string(),
            DefKind::Module(Some(_)) => self
                .session
                .class_name(&format!("file${}", sanitize(&definition.name))),
            DefKind::Class | DefKind::Struct | DefKind::Interface => {
                let mut simple = sanitize(&definition.name);
                if self.registry.is_name_shared(&definition.name) {
                    simple = format!("{simple}${}", definition.hash.mangled());
                }
                if has_args {
                    simple = format!("{simple}${}", hash.mangled());
                }
                self.session.class_name(&simple)
            }
        }
    }
}

fn instance_kind(kind: DefKind) -> TypeDefKind {
    match kind {
        DefKind::Primitive(p) => TypeDefKind::Primitive(p),
        DefKind::Any => TypeDefKind::Any,
        DefKind::String => TypeDefKind::String,
        DefKind::Class => TypeDefKind::Class,
        DefKind::Struct => TypeDefKind::Struct,
        DefKind::Interface => TypeDefKind::Interface,
        DefKind::Module(file) => TypeDefKind::Module(file),
    }
}

/// Keep a name usable as a class name segment.
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
