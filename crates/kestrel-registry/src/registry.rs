//! The global definition table.

use kestrel_core::ast::Expr;
use kestrel_core::{CompilationError, DefId, FileId, PrimitiveKind, Span, TypeHash, internal_fault};
use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::builtins;
use crate::definition::{DefKind, Definition, FieldTemplate, MethodTemplate};
use crate::scope_tree::{ScopeBinding, ScopeKind, ScopeTree};

/// Definitions every program can see without importing anything.
#[derive(Debug, Clone)]
pub struct Prelude {
    pub module: DefId,
    pub any: DefId,
    pub string: DefId,
    pub(crate) primitives: FxHashMap<PrimitiveKind, DefId>,
}

impl Prelude {
    pub fn primitive(&self, kind: PrimitiveKind) -> DefId {
        match self.primitives.get(&kind) {
            Some(id) => *id,
            None => internal_fault(format_args!("prelude has no {kind}")),
        }
    }
}

/// One source file of the program.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: FileId,
    pub name: String,
    pub scope: NodeIndex,
    /// Holder of the file's free functions.
    pub module: DefId,
    pub top_level: Vec<Expr>,
}

/// All definitions of one program plus the scopes that make them visible.
#[derive(Debug)]
pub struct Registry {
    defs: Vec<Definition>,
    scopes: ScopeTree,
    files: Vec<FileEntry>,
    files_by_name: FxHashMap<String, FileId>,
    prelude: Prelude,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry holding only the builtin prelude.
    pub fn new() -> Self {
        let mut defs = Vec::new();
        let mut scopes = ScopeTree::new();
        let prelude = builtins::install(&mut defs, &mut scopes);
        Self {
            defs,
            scopes,
            files: Vec::new(),
            files_by_name: FxHashMap::default(),
            prelude,
        }
    }

    pub fn prelude(&self) -> &Prelude {
        &self.prelude
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    pub fn get(&self, id: DefId) -> &Definition {
        match self.defs.get(id.as_usize()) {
            Some(def) => def,
            None => internal_fault(format_args!("unknown definition {id}")),
        }
    }

    pub fn get_mut(&mut self, id: DefId) -> &mut Definition {
        match self.defs.get_mut(id.as_usize()) {
            Some(def) => def,
            None => internal_fault(format_args!("unknown definition {id}")),
        }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> &FileEntry {
        match self.files.get(id.as_usize()) {
            Some(file) => file,
            None => internal_fault(format_args!("unknown file {id}")),
        }
    }

    pub fn file_by_name(&self, name: &str) -> Option<&FileEntry> {
        self.files_by_name.get(name).map(|id| self.file(*id))
    }

    /// Register a source file, its scope and its module definition.
    pub fn add_file(
        &mut self,
        name: &str,
        top_level: Vec<Expr>,
        span: Span,
    ) -> Result<FileId, CompilationError> {
        if self.files_by_name.contains_key(name) {
            return Err(CompilationError::AlreadyDeclared {
                name: name.to_string(),
                span,
            });
        }
        let id = FileId::new(self.files.len() as u32);
        let root = self.scopes.root();
        let scope = self.scopes.add_child(root, ScopeKind::File(id));
        let module = self.push_definition(Definition {
            id: DefId::new(0),
            name: name.to_string(),
            kind: DefKind::Module(Some(id)),
            generics: Vec::new(),
            parent: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            scope,
            file: Some(id),
            hash: TypeHash::from_file(name),
            span,
        });
        self.files.push(FileEntry {
            id,
            name: name.to_string(),
            scope,
            module,
            top_level,
        });
        self.files_by_name.insert(name.to_string(), id);
        trace!(file = name, %id, "registered file");
        Ok(id)
    }

    /// Declare a named type definition inside `file`.
    ///
    /// The definition gets its own scope under the file scope, with its
    /// generic parameters bound there by position.
    pub fn declare_type(
        &mut self,
        file: FileId,
        name: &str,
        kind: DefKind,
        generics: Vec<String>,
        span: Span,
    ) -> Result<DefId, CompilationError> {
        let file_entry = self.file(file);
        let file_scope = file_entry.scope;
        let qualified = format!("{}::{}", file_entry.name, name);
        let id = DefId::new(self.defs.len() as u32);
        if !self
            .scopes
            .declare(file_scope, name, ScopeBinding::Definition(id))
        {
            return Err(CompilationError::AlreadyDeclared {
                name: name.to_string(),
                span,
            });
        }
        let scope = self.scopes.add_child(file_scope, ScopeKind::Type(id));
        for (index, generic) in generics.iter().enumerate() {
            let binding = ScopeBinding::Generic {
                index: index as u32,
                method_level: false,
            };
            if !self.scopes.declare(scope, generic, binding) {
                return Err(CompilationError::AlreadyDeclared {
                    name: generic.clone(),
                    span,
                });
            }
        }
        self.push_definition(Definition {
            id,
            name: name.to_string(),
            kind,
            generics,
            parent: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            scope,
            file: Some(file),
            hash: TypeHash::from_name(&qualified),
            span,
        });
        trace!(name, %id, "declared type");
        Ok(id)
    }

    /// Create the scope a method's generics are bound in.
    pub fn method_scope(
        &mut self,
        owner: DefId,
        generics: &[String],
        span: Span,
    ) -> Result<NodeIndex, CompilationError> {
        let owner_scope = self.get(owner).scope;
        let scope = self.scopes.add_child(owner_scope, ScopeKind::Method);
        for (index, generic) in generics.iter().enumerate() {
            let binding = ScopeBinding::Generic {
                index: index as u32,
                method_level: true,
            };
            if !self.scopes.declare(scope, generic, binding) {
                return Err(CompilationError::AlreadyDeclared {
                    name: generic.clone(),
                    span,
                });
            }
        }
        Ok(scope)
    }

    pub fn add_field(
        &mut self,
        owner: DefId,
        field: FieldTemplate,
    ) -> Result<(), CompilationError> {
        let def = self.get_mut(owner);
        if def.fields.iter().any(|f| f.name == field.name) {
            return Err(CompilationError::AlreadyDeclared {
                name: field.name,
                span: field.span,
            });
        }
        def.fields.push(field);
        Ok(())
    }

    /// Add a method; a second method with the same signature is rejected.
    pub fn add_method(
        &mut self,
        owner: DefId,
        method: MethodTemplate,
    ) -> Result<(), CompilationError> {
        let def = self.get_mut(owner);
        if def.methods.iter().any(|m| m.same_signature(&method)) {
            return Err(CompilationError::AlreadyDeclared {
                name: format!("{}.{}", def.name, method.name),
                span: method.span,
            });
        }
        def.methods.push(method);
        Ok(())
    }

    /// Make `target`'s names visible inside `from`.
    pub fn add_import(&mut self, from: FileId, target: FileId) {
        let from_scope = self.file(from).scope;
        let target_scope = self.file(target).scope;
        self.scopes.add_import(from_scope, target_scope);
    }

    /// Module definitions whose free functions are callable from `scope`:
    /// the enclosing file's, the files it imports, then the prelude's.
    pub fn visible_modules(&self, scope: NodeIndex) -> Vec<DefId> {
        let mut modules = Vec::new();
        if let Some(file_scope) = self.scopes.enclosing_file(scope) {
            for node in std::iter::once(file_scope).chain(self.scopes.imports(file_scope)) {
                if let Some(ScopeKind::File(file)) = self.scopes.kind(node) {
                    modules.push(self.file(file).module);
                }
            }
        }
        modules.push(self.prelude.module);
        modules
    }

    /// Whether a simple type name is declared by more than one file.
    pub fn is_name_shared(&self, name: &str) -> bool {
        self.defs
            .iter()
            .filter(|d| d.file.is_some() && !matches!(d.kind, DefKind::Module(_)))
            .filter(|d| d.name == name)
            .count()
            > 1
    }

    fn push_definition(&mut self, mut def: Definition) -> DefId {
        let id = DefId::new(self.defs.len() as u32);
        def.id = id;
        self.defs.push(def);
        id
    }

    pub(crate) fn push_prelude_definition(
        defs: &mut Vec<Definition>,
        mut def: Definition,
    ) -> DefId {
        let id = DefId::new(defs.len() as u32);
        def.id = id;
        defs.push(def);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ParamTemplate, TemplateBody};
    use kestrel_core::ResolvedType;

    #[test]
    fn prelude_names_resolve_from_files() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        let scope = registry.file(file).scope;
        let int = registry.prelude().primitive(PrimitiveKind::Int32);
        assert_eq!(
            registry.scopes().resolve(scope, "Int"),
            Some(ScopeBinding::Definition(int))
        );
    }

    #[test]
    fn duplicate_type_in_file_is_rejected() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        registry
            .declare_type(file, "Point", DefKind::Struct, Vec::new(), Span::default())
            .unwrap();
        let err = registry
            .declare_type(file, "Point", DefKind::Class, Vec::new(), Span::new(4, 1, 5))
            .unwrap_err();
        assert!(matches!(err, CompilationError::AlreadyDeclared { .. }));
        assert_eq!(err.span(), Span::new(4, 1, 5));
    }

    #[test]
    fn duplicate_file_is_rejected() {
        let mut registry = Registry::new();
        registry.add_file("a", Vec::new(), Span::default()).unwrap();
        assert!(registry.add_file("a", Vec::new(), Span::default()).is_err());
    }

    #[test]
    fn type_generics_are_bound_in_type_scope() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        let id = registry
            .declare_type(
                file,
                "Box",
                DefKind::Class,
                vec!["T".into()],
                Span::default(),
            )
            .unwrap();
        let scope = registry.get(id).scope;
        assert_eq!(
            registry.scopes().resolve(scope, "T"),
            Some(ScopeBinding::Generic {
                index: 0,
                method_level: false
            })
        );
    }

    #[test]
    fn duplicate_method_signature_is_rejected() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        let owner = registry.file(file).module;
        let int = ResolvedType::simple(registry.prelude().primitive(PrimitiveKind::Int32));
        let scope = registry.method_scope(owner, &[], Span::default()).unwrap();
        let method = MethodTemplate {
            name: "f".into(),
            is_static: true,
            generics: Vec::new(),
            params: vec![ParamTemplate {
                name: "x".into(),
                ty: int.clone(),
            }],
            ret: int,
            body: TemplateBody::Abstract,
            scope,
            span: Span::default(),
        };
        registry.add_method(owner, method.clone()).unwrap();
        assert!(registry.add_method(owner, method).is_err());
    }

    #[test]
    fn visible_modules_follow_imports() {
        let mut registry = Registry::new();
        let a = registry.add_file("a", Vec::new(), Span::default()).unwrap();
        let b = registry.add_file("b", Vec::new(), Span::default()).unwrap();
        registry.add_import(a, b);
        let modules = registry.visible_modules(registry.file(a).scope);
        assert_eq!(
            modules,
            vec![
                registry.file(a).module,
                registry.file(b).module,
                registry.prelude().module
            ]
        );
    }
}
