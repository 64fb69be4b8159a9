//! Registration Pass - declare every definition and resolve its signature.
//!
//! Walks the parse tree once per concern so that forward references work:
//! all files first, then all type names, then import edges, and only then
//! the members whose types may mention any of those names.
//!
//! ## Responsibilities
//!
//! - One definition per type declaration, one module definition per file
//! - Duplicate names and duplicate method signatures (`AlreadyDeclared`)
//! - Import edges, rejecting imports of files that do not exist
//! - Supertypes, fields and method signatures resolved to `ResolvedType`
//! - Shape rules: what may extend or implement what, no inheritance cycles

use kestrel_core::ast::{
    Expr, ExprKind, MethodBodyDecl, MethodDecl, Program, TypeDecl, TypeDeclKind,
};
use kestrel_core::{CompilationError, DefId, FileId, ResolvedType, Span};
use kestrel_registry::{
    DefKind, FieldTemplate, MethodTemplate, ParamTemplate, Registry, TemplateBody,
};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::type_resolver::TypeResolver;

/// Output of the registration pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOutput {
    pub files_registered: usize,
    pub types_registered: usize,
    pub methods_registered: usize,
}

/// Builds the registry for a whole program.
pub struct RegistrationPass<'a> {
    program: &'a Program,
    registry: Registry,
    /// Definition id per (file, type declaration index).
    declared: Vec<Vec<DefId>>,
    output: RegistrationOutput,
}

impl<'a> RegistrationPass<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            registry: Registry::new(),
            declared: Vec::new(),
            output: RegistrationOutput::default(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> Result<(Registry, RegistrationOutput), CompilationError> {
        self.register_files()?;
        self.declare_types()?;
        self.link_imports()?;
        self.resolve_members()?;
        self.check_inheritance()?;
        debug!(
            files = self.output.files_registered,
            types = self.output.types_registered,
            methods = self.output.methods_registered,
            "registration complete"
        );
        Ok((self.registry, self.output))
    }

    fn register_files(&mut self) -> Result<(), CompilationError> {
        for file in &self.program.files {
            self.registry
                .add_file(&file.name, file.top_level.clone(), Span::default())?;
            self.output.files_registered += 1;
        }
        Ok(())
    }

    fn declare_types(&mut self) -> Result<(), CompilationError> {
        for (index, file) in self.program.files.iter().enumerate() {
            let file_id = FileId::new(index as u32);
            let mut ids = Vec::with_capacity(file.types.len());
            for decl in &file.types {
                let kind = match decl.kind {
                    TypeDeclKind::Class => DefKind::Class,
                    TypeDeclKind::Struct => DefKind::Struct,
                    TypeDeclKind::Interface => DefKind::Interface,
                };
                let id = self.registry.declare_type(
                    file_id,
                    &decl.name,
                    kind,
                    decl.generics.clone(),
                    decl.span,
                )?;
                ids.push(id);
                self.output.types_registered += 1;
            }
            self.declared.push(ids);
        }
        Ok(())
    }

    fn link_imports(&mut self) -> Result<(), CompilationError> {
        for (index, file) in self.program.files.iter().enumerate() {
            let from = FileId::new(index as u32);
            let mut imports = Vec::new();
            let mut collect = |expr: &Expr| {
                if let ExprKind::Import(target) = &expr.kind {
                    imports.push((target.clone(), expr.span));
                }
            };
            file.top_level.iter().for_each(|e| e.walk(&mut collect));
            for body in file
                .functions
                .iter()
                .chain(file.types.iter().flat_map(|t| t.methods.iter()))
                .filter_map(|m| match &m.body {
                    MethodBodyDecl::Source(body) => Some(body),
                    _ => None,
                })
            {
                body.walk(&mut collect);
            }
            for (target, span) in imports {
                let Some(entry) = self.registry.file_by_name(&target) else {
                    return Err(CompilationError::Import {
                        file: target,
                        reason: "no such file in program".into(),
                        span,
                    });
                };
                let target_id = entry.id;
                if target_id != from {
                    self.registry.add_import(from, target_id);
                }
            }
        }
        Ok(())
    }

    fn resolve_members(&mut self) -> Result<(), CompilationError> {
        for (index, file) in self.program.files.iter().enumerate() {
            let file_id = FileId::new(index as u32);
            for (decl_index, decl) in file.types.iter().enumerate() {
                let id = self.declared[index][decl_index];
                self.resolve_type_decl(id, decl)?;
            }
            let module = self.registry.file(file_id).module;
            for function in &file.functions {
                self.register_method(module, function, true)?;
            }
        }
        Ok(())
    }

    fn resolve_type_decl(&mut self, id: DefId, decl: &TypeDecl) -> Result<(), CompilationError> {
        let scope = self.registry.get(id).scope;
        let resolver = TypeResolver::new(&self.registry);
        let parent = decl
            .parent
            .as_ref()
            .map(|p| resolver.resolve(scope, p))
            .transpose()?;
        let interfaces = resolver.resolve_all(scope, &decl.implements)?;
        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            fields.push(FieldTemplate {
                name: field.name.clone(),
                ty: resolver.resolve(scope, &field.ty)?,
                is_static: field.is_static,
                span: field.span,
            });
        }

        let def = self.registry.get_mut(id);
        def.parent = parent;
        def.interfaces = interfaces;
        for field in fields {
            self.registry.add_field(id, field)?;
        }
        for method in &decl.methods {
            if decl.kind == TypeDeclKind::Interface {
                if !matches!(method.body, MethodBodyDecl::Abstract) {
                    return Err(CompilationError::type_checking(
                        method.span,
                        format!("interface method '{}' cannot have a body", method.name),
                    ));
                }
            } else if matches!(method.body, MethodBodyDecl::Abstract) {
                return Err(CompilationError::type_checking(
                    method.span,
                    format!("method '{}' needs a body", method.name),
                ));
            }
            self.register_method(id, method, method.is_static)?;
        }
        Ok(())
    }

    fn register_method(
        &mut self,
        owner: DefId,
        decl: &MethodDecl,
        is_static: bool,
    ) -> Result<(), CompilationError> {
        let scope = self
            .registry
            .method_scope(owner, &decl.generics, decl.span)?;
        let resolver = TypeResolver::new(&self.registry);
        let mut params = Vec::with_capacity(decl.params.len());
        let mut seen = FxHashSet::default();
        for param in &decl.params {
            if !seen.insert(param.name.as_str()) {
                return Err(CompilationError::AlreadyDeclared {
                    name: param.name.clone(),
                    span: param.span,
                });
            }
            params.push(ParamTemplate {
                name: param.name.clone(),
                ty: resolver.resolve(scope, &param.ty)?,
            });
        }
        let ret = resolver.resolve(scope, &decl.ret)?;
        let body = match &decl.body {
            MethodBodyDecl::Source(expr) => TemplateBody::Source(expr.clone()),
            MethodBodyDecl::Abstract => TemplateBody::Abstract,
            MethodBodyDecl::Native(native) => TemplateBody::Native(native.clone()),
        };
        self.registry.add_method(
            owner,
            MethodTemplate {
                name: decl.name.clone(),
                is_static,
                generics: decl.generics.clone(),
                params,
                ret,
                body,
                scope,
                span: decl.span,
            },
        )?;
        self.output.methods_registered += 1;
        Ok(())
    }

    fn check_inheritance(&self) -> Result<(), CompilationError> {
        for def in self.registry.definitions() {
            if !matches!(
                def.kind,
                DefKind::Class | DefKind::Struct | DefKind::Interface
            ) {
                continue;
            }
            if let Some(parent) = &def.parent {
                let parent_kind = self.definition_kind(parent);
                let allowed = def.kind == DefKind::Class && parent_kind == Some(DefKind::Class);
                if !allowed {
                    return Err(CompilationError::type_checking(
                        def.span,
                        format!("'{}' cannot extend this type", def.name),
                    ));
                }
            }
            for interface in &def.interfaces {
                if self.definition_kind(interface) != Some(DefKind::Interface) {
                    return Err(CompilationError::type_checking(
                        def.span,
                        format!("'{}' can only implement interfaces", def.name),
                    ));
                }
                if def.kind == DefKind::Struct {
                    return Err(CompilationError::type_checking(
                        def.span,
                        format!("value type '{}' cannot implement interfaces", def.name),
                    ));
                }
            }

            // Walk parent and interface definitions looking for a way back
            let mut seen = FxHashSet::default();
            let mut stack = vec![def.id];
            while let Some(current) = stack.pop() {
                let current_def = self.registry.get(current);
                for next in current_def.parent.iter().chain(&current_def.interfaces) {
                    if let ResolvedType::Basic { def: next, .. } = next {
                        if *next == def.id {
                            return Err(CompilationError::type_checking(
                                def.span,
                                format!("circular inheritance for '{}'", def.name),
                            ));
                        }
                        if seen.insert(*next) {
                            stack.push(*next);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn definition_kind(&self, ty: &ResolvedType) -> Option<DefKind> {
        match ty {
            ResolvedType::Basic { def, .. } => Some(self.registry.get(*def).kind),
            ResolvedType::Generic { .. } => None,
        }
    }
}
