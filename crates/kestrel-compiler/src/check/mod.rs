//! Expression checking.
//!
//! Turns parse-tree expressions into the typed tree ([`TExpr`]). This is
//! where instantiation is driven from: every type named in a body and
//! every generic method called from it is instantiated on first use.
//!
//! ## Modules
//!
//! - [`typed`]: the typed expression tree
//! - [`fold`]: constant folding of builtin operations
//! - `checker`: locals, control flow, fields and coercions
//! - `calls`: calls, overload candidates and object construction

mod calls;
mod checker;
pub mod fold;
pub mod typed;

pub use checker::Checker;
pub use typed::{ConstValue, TExpr, TExprKind};

use kestrel_core::{CompilationError, FileId, MethodInstanceId, internal_fault};
use kestrel_registry::TemplateBody;
use tracing::debug;

use crate::template::{GenericEnv, TypePool};

/// The checked body of a method or of a file's top level.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBody {
    pub root: TExpr,
}

/// Check the body of a source method instance.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn check_method(
    pool: &mut TypePool<'_>,
    method: MethodInstanceId,
) -> Result<TypedBody, CompilationError> {
    let registry = pool.registry();
    let def = pool.method(method);
    let (template_def, index) = def.template;
    let template = &registry.get(template_def).methods[index];
    let TemplateBody::Source(body) = &template.body else {
        internal_fault(format_args!(
            "checking method without source body: {}",
            pool.method_label(method)
        ));
    };
    let owner = def.owner;
    let this = (!def.is_static).then_some(crate::types::Type::Basic(owner));
    let ret = def.ret;
    let params: Vec<_> = def
        .param_names
        .iter()
        .cloned()
        .zip(def.params.iter().copied())
        .collect();
    let env = GenericEnv::for_class(pool.get(owner).args.clone())
        .with_method_args(def.generic_args.clone());

    debug!(method = %pool.method_label(method), "checking body");
    let mut checker = Checker::new(pool, template.scope, env, this, Some(ret));
    for (name, ty) in params {
        checker.declare(&name, ty, template.span)?;
    }
    let root = checker.check_body(body, ret)?;
    Ok(TypedBody { root })
}

/// Check a file's top-level statements, the body of its guarded import.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn check_file(pool: &mut TypePool<'_>, file: FileId) -> Result<TypedBody, CompilationError> {
    let entry = pool.registry().file(file);
    debug!(file = %entry.name, "checking top level");
    let mut checker = Checker::new(pool, entry.scope, GenericEnv::default(), None, None);
    let root = checker.check_statements(&entry.top_level)?;
    Ok(TypedBody { root })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompileOptions, CompileSession};
    use crate::passes::RegistrationPass;
    use crate::types::Type;
    use kestrel_core::ast::{Expr, MethodDecl, Program, SourceFile, TypeDecl, TypeRef};
    use kestrel_core::{PrimitiveKind, Span};
    use kestrel_registry::Registry;

    fn registry(file: SourceFile) -> Registry {
        let program = Program::new("main").with_file(file);
        RegistrationPass::new(&program).run().unwrap().0
    }

    fn session() -> CompileSession {
        CompileSession::new(CompileOptions::default(), "main")
    }

    fn check_top_level(file: SourceFile) -> Result<(TypedBody, Vec<Type>), CompilationError> {
        let registry = registry(file);
        let session = session();
        let mut pool = TypePool::new(&registry, &session)?;
        let body = check_file(&mut pool, FileId::new(0))?;
        let types = match &body.root.kind {
            TExprKind::Block(exprs) => exprs.iter().map(|e| e.ty).collect(),
            _ => Vec::new(),
        };
        Ok((body, types))
    }

    fn first_statement(body: &TypedBody) -> &TExpr {
        match &body.root.kind {
            TExprKind::Block(exprs) => &exprs[0],
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn folds_literal_addition() {
        let (body, _) = check_top_level(
            SourceFile::new("main")
                .with_statement(Expr::binary(Expr::int(1), "+", Expr::int(2))),
        )
        .unwrap();
        let expr = first_statement(&body);
        assert_eq!(expr.as_literal(), Some(&ConstValue::Int(3)));
        assert_eq!(
            expr.count(&|e| matches!(e.kind, TExprKind::Call { .. })),
            0
        );
    }

    #[test]
    fn non_literal_operands_stay_calls() {
        let (body, _) = check_top_level(SourceFile::new("main").with_statement(Expr::block(vec![
            Expr::let_("x", None, Expr::int(1)),
            Expr::binary(Expr::local("x"), "+", Expr::int(2)),
        ])))
        .unwrap();
        let expr = first_statement(&body);
        assert_eq!(expr.count(&|e| matches!(e.kind, TExprKind::Call { .. })), 1);
    }

    #[test]
    fn literal_argument_takes_parameter_type() {
        let registry = registry(
            SourceFile::new("main")
                .with_function(
                    MethodDecl::function("wide").with_param("x", TypeRef::named("Int64")),
                )
                .with_statement(Expr::call("wide", vec![Expr::int(5_000_000_000)])),
        );
        let session = session();
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let body = check_file(&mut pool, FileId::new(0)).unwrap();
        match &first_statement(&body).kind {
            TExprKind::Call { args, .. } => {
                assert_eq!(args[0].ty, pool.primitive(PrimitiveKind::Int64));
                assert_eq!(args[0].as_literal(), Some(&ConstValue::Int(5_000_000_000)));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn literal_out_of_range_is_type_error() {
        let err = check_top_level(SourceFile::new("main").with_statement(Expr::let_(
            "b",
            Some(TypeRef::named("Int8")),
            Expr::int(200).at(Span::new(1, 14, 3)),
        )))
        .unwrap_err();
        assert!(matches!(
            err,
            CompilationError::TypeChecking { span, .. } if span == Span::new(1, 14, 3)
        ));
    }

    #[test]
    fn undeclared_and_redeclared_locals() {
        let err = check_top_level(
            SourceFile::new("main").with_statement(Expr::local("nope").at(Span::new(2, 3, 4))),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompilationError::UndeclaredVariable {
                name: "nope".into(),
                span: Span::new(2, 3, 4)
            }
        );

        let err = check_top_level(SourceFile::new("main").with_statement(Expr::block(vec![
            Expr::let_("x", None, Expr::int(1)),
            Expr::let_("x", None, Expr::int(2)),
        ])))
        .unwrap_err();
        assert!(matches!(err, CompilationError::AlreadyDeclared { ref name, .. } if name == "x"));
    }

    #[test]
    fn shadowing_in_nested_block_is_allowed() {
        let result = check_top_level(SourceFile::new("main").with_statement(Expr::block(vec![
            Expr::let_("x", None, Expr::int(1)),
            Expr::block(vec![Expr::let_("x", None, Expr::str("s"))]),
            Expr::local("x"),
        ])));
        assert!(result.is_ok());
    }

    #[test]
    fn return_outside_method_is_rejected() {
        let err = check_top_level(SourceFile::new("main").with_statement(Expr::ret(None)))
            .unwrap_err();
        assert!(matches!(err, CompilationError::TypeChecking { .. }));
    }

    #[test]
    fn println_boxes_primitives() {
        let (body, _) = check_top_level(
            SourceFile::new("main").with_statement(Expr::call("println", vec![Expr::int(7)])),
        )
        .unwrap();
        match &first_statement(&body).kind {
            TExprKind::Call { args, .. } => {
                assert!(matches!(args[0].kind, TExprKind::Boxed(_)));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn if_branches_unify_through_upcast() {
        let (_, types) = check_top_level(
            SourceFile::new("main")
                .with_type(TypeDecl::class("Base"))
                .with_type(TypeDecl::class("Derived").with_parent(TypeRef::named("Base")))
                .with_statement(Expr::if_(
                    Expr::bool(true),
                    Expr::new_object(TypeRef::named("Derived"), Vec::new()),
                    Some(Expr::new_object(TypeRef::named("Base"), Vec::new())),
                )),
        )
        .unwrap();
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn new_requires_every_field() {
        let err = check_top_level(
            SourceFile::new("main")
                .with_type(
                    TypeDecl::structure("Pair")
                        .with_field("a", TypeRef::named("Int"))
                        .with_field("b", TypeRef::named("Int")),
                )
                .with_statement(Expr::new_object(TypeRef::named("Pair"), vec![Expr::int(1)])),
        )
        .unwrap_err();
        assert!(matches!(err, CompilationError::TypeChecking { .. }));
    }

    #[test]
    fn interfaces_cannot_be_constructed() {
        let err = check_top_level(
            SourceFile::new("main")
                .with_type(TypeDecl::interface("Shape"))
                .with_statement(Expr::new_object(TypeRef::named("Shape"), Vec::new())),
        )
        .unwrap_err();
        assert!(matches!(err, CompilationError::TypeChecking { .. }));
    }

    #[test]
    fn generic_method_needs_explicit_arguments() {
        let registry = registry(
            SourceFile::new("main")
                .with_function(
                    MethodDecl::function("id")
                        .with_generics(&["T"])
                        .with_param("x", TypeRef::named("T"))
                        .returns(TypeRef::named("T"))
                        .with_body(Expr::local("x")),
                )
                .with_statement(Expr::call("id", vec![Expr::int(1)])),
        );
        let session = session();
        let mut pool = TypePool::new(&registry, &session).unwrap();
        assert!(matches!(
            check_file(&mut pool, FileId::new(0)),
            Err(CompilationError::NoSuitableMethod { .. })
        ));
    }

    #[test]
    fn method_body_is_checked_against_return_type() {
        let registry = registry(
            SourceFile::new("main").with_function(
                MethodDecl::function("f")
                    .returns(TypeRef::named("Int"))
                    .with_body(Expr::str("no")),
            ),
        );
        let session = session();
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let module = registry.file(FileId::new(0)).module;
        let ty = pool.instantiate(module, Vec::new(), Span::default()).unwrap();
        let method = pool.type_def(ty).unwrap().methods[0];
        assert!(matches!(
            check_method(&mut pool, method),
            Err(CompilationError::TypeChecking { .. })
        ));
    }
}
