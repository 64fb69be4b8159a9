//! Type resolution from textual type references to [`ResolvedType`].
//!
//! Names are looked up through the scope tree from the scope the reference
//! appears in. Generic arguments are resolved positionally; whether their
//! number matches the definition is checked later, at instantiation.
//!
//! ## Example
//!
//! ```ignore
//! let resolver = TypeResolver::new(&registry);
//! // `List<T>` inside `class Box<T>`
//! let resolved = resolver.resolve(box_scope, &type_ref)?;
//! ```

use kestrel_core::ast::TypeRef;
use kestrel_core::{CompilationError, ResolvedType};
use kestrel_registry::{Registry, ScopeBinding};
use petgraph::graph::NodeIndex;

/// Resolves type references against a registry's scope tree.
pub struct TypeResolver<'a> {
    registry: &'a Registry,
}

impl<'a> TypeResolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Resolve `ty` as seen from `scope`.
    pub fn resolve(
        &self,
        scope: NodeIndex,
        ty: &TypeRef,
    ) -> Result<ResolvedType, CompilationError> {
        let binding = self
            .registry
            .scopes()
            .resolve(scope, &ty.name)
            .ok_or_else(|| CompilationError::UnknownType {
                name: ty.name.clone(),
                span: ty.span,
            })?;
        match binding {
            ScopeBinding::Definition(def) => {
                let mut args = Vec::with_capacity(ty.args.len());
                for arg in &ty.args {
                    args.push(self.resolve(scope, arg)?);
                }
                Ok(ResolvedType::Basic { def, args })
            }
            ScopeBinding::Generic { .. } if !ty.args.is_empty() => {
                Err(CompilationError::GenericCountMismatch {
                    name: ty.name.clone(),
                    expected: 0,
                    got: ty.args.len(),
                    span: ty.span,
                })
            }
            ScopeBinding::Generic {
                index,
                method_level,
            } => Ok(ResolvedType::Generic {
                index,
                method_level,
            }),
        }
    }

    pub fn resolve_all(
        &self,
        scope: NodeIndex,
        types: &[TypeRef],
    ) -> Result<Vec<ResolvedType>, CompilationError> {
        types.iter().map(|ty| self.resolve(scope, ty)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{PrimitiveKind, Span};
    use kestrel_registry::DefKind;

    #[test]
    fn resolves_prelude_and_generic_args() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        let boxed = registry
            .declare_type(file, "Box", DefKind::Class, vec!["T".into()], Span::default())
            .unwrap();
        let resolver = TypeResolver::new(&registry);
        let scope = registry.file(file).scope;

        let resolved = resolver
            .resolve(scope, &TypeRef::generic("Box", vec![TypeRef::named("Int")]))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedType::Basic {
                def: boxed,
                args: vec![ResolvedType::simple(
                    registry.prelude().primitive(PrimitiveKind::Int32)
                )],
            }
        );
    }

    #[test]
    fn generic_parameter_resolves_in_type_scope() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        let boxed = registry
            .declare_type(file, "Box", DefKind::Class, vec!["T".into()], Span::default())
            .unwrap();
        let resolver = TypeResolver::new(&registry);
        let resolved = resolver
            .resolve(registry.get(boxed).scope, &TypeRef::named("T"))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedType::Generic {
                index: 0,
                method_level: false
            }
        );
    }

    #[test]
    fn unknown_name_fails_with_span() {
        let mut registry = Registry::new();
        let file = registry.add_file("main", Vec::new(), Span::default()).unwrap();
        let resolver = TypeResolver::new(&registry);
        let err = resolver
            .resolve(
                registry.file(file).scope,
                &TypeRef::named("Nope").at(Span::new(2, 9, 4)),
            )
            .unwrap_err();
        assert_eq!(
            err,
            CompilationError::UnknownType {
                name: "Nope".into(),
                span: Span::new(2, 9, 4)
            }
        );
    }

    #[test]
    fn arity_is_not_checked_here() {
        let registry = Registry::new();
        let resolver = TypeResolver::new(&registry);
        let resolved = resolver.resolve(
            registry.scopes().root(),
            &TypeRef::generic("Int", vec![TypeRef::named("Int")]),
        );
        assert!(resolved.is_ok());
    }
}
