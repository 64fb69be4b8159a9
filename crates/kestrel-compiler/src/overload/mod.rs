//! Overload resolution for method calls.
//!
//! Candidates are not filtered by argument compatibility. Among the methods
//! with the right name and arity, the resolver picks the one whose parameter
//! types are most specific; converting the arguments to those parameters is
//! the checker's job afterwards.
//!
//! ## Algorithm
//!
//! 1. Filter candidates by name, parameter count and generic arity
//! 2. Compare every pair position by position (see [`specificity`])
//! 3. The unique candidate more specific than all others wins
//! 4. Anything else is `AmbiguousMethod`

mod specificity;

pub use specificity::{Specificity, compare};

use kestrel_core::{CompilationError, MethodInstanceId, Span, internal_fault};
use tracing::debug;

use crate::template::TypePool;
use crate::types::Type;

/// A method together with the types that take part in ranking it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub method: MethodInstanceId,
    /// Owner type for instance methods; `None` for static methods and free
    /// functions, which have no receiver position.
    pub receiver: Option<Type>,
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Candidate {
    pub fn from_method(pool: &TypePool<'_>, method: MethodInstanceId) -> Self {
        let def = pool.method(method);
        Self {
            method,
            receiver: (!def.is_static).then_some(Type::Basic(def.owner)),
            params: def.params.clone(),
            ret: def.ret,
        }
    }
}

/// Keep methods named `name` taking `arity` arguments and `generic_arity`
/// generic arguments, in their original order.
pub fn filter_candidates(
    pool: &TypePool<'_>,
    methods: impl IntoIterator<Item = MethodInstanceId>,
    name: &str,
    arity: usize,
    generic_arity: usize,
) -> Vec<MethodInstanceId> {
    methods
        .into_iter()
        .filter(|id| {
            let method = pool.method(*id);
            method.name == name
                && method.params.len() == arity
                && method.generic_arity == generic_arity
                && method.generic_parent.is_none()
        })
        .collect()
}

/// Pick the most specific of `candidates`.
///
/// `call` renders the call site for diagnostics, e.g. `f(Int, String)`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve_overload(
    pool: &TypePool<'_>,
    candidates: &[MethodInstanceId],
    name: &str,
    call: &str,
    span: Span,
) -> Result<MethodInstanceId, CompilationError> {
    match candidates {
        [] => Err(CompilationError::NoSuitableMethod {
            name: name.to_string(),
            args: call.to_string(),
            span,
        }),
        [single] => Ok(*single),
        _ => {
            let ranked: Vec<Candidate> = candidates
                .iter()
                .map(|id| Candidate::from_method(pool, *id))
                .collect();
            let winner = most_specific(pool, &ranked, name, call, span)?;
            debug!(
                call,
                chosen = %pool.method_label(winner),
                considered = ranked.len(),
                "overload resolved"
            );
            Ok(winner)
        }
    }
}

fn most_specific(
    pool: &TypePool<'_>,
    candidates: &[Candidate],
    name: &str,
    call: &str,
    span: Span,
) -> Result<MethodInstanceId, CompilationError> {
    let mut winners = Vec::new();
    'outer: for (i, a) in candidates.iter().enumerate() {
        for (j, b) in candidates.iter().enumerate() {
            if i == j {
                continue;
            }
            match compare(pool, a, b) {
                Specificity::MoreSpecific => {}
                Specificity::Identical => {
                    let (owner_a, owner_b) =
                        (pool.method(a.method).owner, pool.method(b.method).owner);
                    if owner_a == owner_b {
                        internal_fault(format_args!(
                            "duplicate signature for {} survived registration",
                            pool.method_label(a.method)
                        ));
                    }
                    continue 'outer;
                }
                Specificity::LessSpecific | Specificity::Indeterminate => continue 'outer,
            }
        }
        winners.push(a.method);
    }

    match winners.as_slice() {
        [winner] => Ok(*winner),
        _ => Err(CompilationError::AmbiguousMethod {
            name: name.to_string(),
            candidates: format!(
                "{call}; candidates: {}",
                candidates
                    .iter()
                    .map(|c| {
                        pool.method_label(c.method) + "(" + &pool.display_list(&c.params) + ")"
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompileOptions, CompileSession};
    use crate::passes::RegistrationPass;
    use kestrel_core::ast::{MethodDecl, Program, SourceFile, TypeDecl, TypeRef};
    use kestrel_registry::Registry;

    fn setup(file: SourceFile) -> (Registry, CompileSession) {
        let program = Program::new("main").with_file(file);
        let (registry, _) = RegistrationPass::new(&program).run().unwrap();
        (registry, CompileSession::new(CompileOptions::default(), "main"))
    }

    fn module_methods(pool: &mut TypePool<'_>) -> Vec<MethodInstanceId> {
        let module = pool.registry().file_by_name("main").unwrap().module;
        let ty = pool.instantiate(module, Vec::new(), Span::default()).unwrap();
        pool.type_def(ty).unwrap().methods.clone()
    }

    fn function(name: &str, params: &[&str]) -> MethodDecl {
        params
            .iter()
            .enumerate()
            .fold(MethodDecl::function(name), |m, (i, ty)| {
                m.with_param(format!("p{i}"), TypeRef::named(*ty))
            })
    }

    #[test]
    fn subtype_in_every_position_wins() {
        let (registry, session) = setup(
            SourceFile::new("main")
                .with_function(function("f", &["Any", "Int"]))
                .with_function(function("f", &["Int", "Int"])),
        );
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let methods = module_methods(&mut pool);
        let candidates = filter_candidates(&pool, methods.iter().copied(), "f", 2, 0);
        let chosen =
            resolve_overload(&pool, &candidates, "f", "f(Int, Int)", Span::default()).unwrap();
        assert_eq!(chosen, methods[1]);
        assert_eq!(pool.method(chosen).params, vec![pool.int(), pool.int()]);
    }

    #[test]
    fn crossed_directions_are_ambiguous() {
        let (registry, session) = setup(
            SourceFile::new("main")
                .with_function(function("g", &["Int", "String"]))
                .with_function(function("g", &["String", "Int"])),
        );
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let methods = module_methods(&mut pool);
        let candidates = filter_candidates(&pool, methods, "g", 2, 0);
        let err = resolve_overload(&pool, &candidates, "g", "g(Int, String)", Span::new(4, 1, 1))
            .unwrap_err();
        assert!(matches!(err, CompilationError::AmbiguousMethod { ref name, .. } if name == "g"));
        assert!(err.to_string().contains("too many suitable methods"));
    }

    #[test]
    fn no_candidates_is_no_suitable_method() {
        let (registry, session) =
            setup(SourceFile::new("main").with_function(function("h", &["Int"])));
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let methods = module_methods(&mut pool);
        let candidates = filter_candidates(&pool, methods, "h", 2, 0);
        assert!(candidates.is_empty());
        assert!(matches!(
            resolve_overload(&pool, &candidates, "h", "h(Int, Int)", Span::default()),
            Err(CompilationError::NoSuitableMethod { .. })
        ));
    }

    #[test]
    fn receiver_position_decides_first() {
        let (registry, session) = setup(
            SourceFile::new("main")
                .with_type(
                    TypeDecl::class("Base")
                        .with_method(MethodDecl::new("m").with_param("x", TypeRef::named("Int"))),
                )
                .with_type(
                    TypeDecl::class("Derived")
                        .with_parent(TypeRef::named("Base"))
                        .with_method(MethodDecl::new("m").with_param("x", TypeRef::named("Any"))),
                ),
        );
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let file = registry.file_by_name("main").unwrap();
        let scope = file.scope;
        let base = match registry.scopes().resolve(scope, "Base") {
            Some(kestrel_registry::ScopeBinding::Definition(def)) => def,
            other => panic!("unexpected {other:?}"),
        };
        let derived = match registry.scopes().resolve(scope, "Derived") {
            Some(kestrel_registry::ScopeBinding::Definition(def)) => def,
            other => panic!("unexpected {other:?}"),
        };
        let base = pool.instantiate(base, Vec::new(), Span::default()).unwrap();
        let derived = pool.instantiate(derived, Vec::new(), Span::default()).unwrap();
        let base_m = pool.type_def(base).unwrap().methods[0];
        let derived_m = pool.type_def(derived).unwrap().methods[0];

        // Derived receiver is more specific, but Any is wider than Int
        let a = Candidate::from_method(&pool, derived_m);
        let b = Candidate::from_method(&pool, base_m);
        assert_eq!(compare(&pool, &a, &b), Specificity::Indeterminate);
    }
}
