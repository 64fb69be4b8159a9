//! Calls, overload candidates and object construction.
//!
//! Handles the three call forms:
//! - Receiver calls: `x.m(args)`, operators included (`a + b`)
//! - Free calls: `f(args)`, searched in the file's module, imported
//!   modules and the prelude
//! - Static calls: `T.m(args)`

use std::collections::VecDeque;

use kestrel_core::ast::{Expr, ExprKind, TypeRef};
use kestrel_core::{CompilationError, MethodInstanceId, Span};
use rustc_hash::FxHashSet;

use super::checker::Checker;
use super::fold::fold;
use super::typed::{TExpr, TExprKind};
use crate::overload::{filter_candidates, resolve_overload};
use crate::types::{Type, TypeDefKind};

type Result<T> = std::result::Result<T, CompilationError>;

fn is_numeric_literal(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Int(_) | ExprKind::Float(_))
}

impl Checker<'_, '_> {
    pub(super) fn check_method_call(
        &mut self,
        receiver: &Expr,
        name: &str,
        generics: &[TypeRef],
        args: &[Expr],
        expected: Option<Type>,
        span: Span,
    ) -> Result<TExpr> {
        // A literal receiver takes its type from context: the expected
        // result, or else the single non-literal operand.
        let mut first_arg = None;
        let receiver = if is_numeric_literal(receiver) {
            let mut hint = expected.filter(|t| {
                self.pool
                    .primitive_kind(*t)
                    .is_some_and(|kind| kind.is_numeric())
            });
            if hint.is_none() && args.len() == 1 && !is_numeric_literal(&args[0]) {
                let arg = self.check(&args[0], None)?;
                if self
                    .pool
                    .primitive_kind(arg.ty)
                    .is_some_and(|kind| kind.is_numeric())
                {
                    hint = Some(arg.ty);
                }
                first_arg = Some(arg);
            }
            self.check(receiver, hint)?
        } else {
            self.check(receiver, None)?
        };

        let methods = self.receiver_methods(receiver.ty);
        let candidates = filter_candidates(self.pool, methods, name, args.len(), generics.len());
        let chosen = self.choose(&candidates, name, Some(receiver.ty), args, span)?;
        let method = self.bind_generics(chosen, generics, span)?;
        let args = self.check_args(method, args, first_arg)?;
        Ok(self.finish_call(method, Some(receiver), args, span))
    }

    pub(super) fn check_free_call(
        &mut self,
        name: &str,
        generics: &[TypeRef],
        args: &[Expr],
        span: Span,
    ) -> Result<TExpr> {
        let registry = self.pool.registry();
        let mut methods = Vec::new();
        for module in registry.visible_modules(self.scope) {
            let ty = self.pool.instantiate(module, Vec::new(), span)?;
            if let Some(def) = self.pool.type_def(ty) {
                methods.extend(def.methods.iter().copied());
            }
        }
        let candidates = filter_candidates(self.pool, methods, name, args.len(), generics.len());
        let chosen = self.choose(&candidates, name, None, args, span)?;
        let method = self.bind_generics(chosen, generics, span)?;
        let args = self.check_args(method, args, None)?;
        Ok(self.finish_call(method, None, args, span))
    }

    pub(super) fn check_static_call(
        &mut self,
        ty: &TypeRef,
        name: &str,
        generics: &[TypeRef],
        args: &[Expr],
        span: Span,
    ) -> Result<TExpr> {
        let owner = self.resolve_type(ty)?;
        let methods: Vec<MethodInstanceId> = self
            .pool
            .type_def(owner)
            .map(|def| {
                def.methods
                    .iter()
                    .copied()
                    .filter(|m| self.pool.method(*m).is_static)
                    .collect()
            })
            .unwrap_or_default();
        let candidates = filter_candidates(self.pool, methods, name, args.len(), generics.len());
        let chosen = self.choose(&candidates, name, Some(owner), args, span)?;
        let method = self.bind_generics(chosen, generics, span)?;
        let args = self.check_args(method, args, None)?;
        Ok(self.finish_call(method, None, args, span))
    }

    pub(super) fn check_new(&mut self, ty: &TypeRef, args: &[Expr], span: Span) -> Result<TExpr> {
        let target = self.resolve_type(ty)?;
        let kind = self.pool.type_def(target).map(|def| def.kind);
        if !matches!(kind, Some(TypeDefKind::Class | TypeDefKind::Struct)) {
            return Err(CompilationError::type_checking(
                span,
                format!("cannot construct {}", self.pool.display(target)),
            ));
        }
        let fields: Vec<Type> = self
            .pool
            .all_instance_fields(target)
            .into_iter()
            .map(|field| field.ty)
            .collect();
        if fields.len() != args.len() {
            return Err(CompilationError::type_checking(
                span,
                format!(
                    "{} takes {} field values, got {}",
                    self.pool.display(target),
                    fields.len(),
                    args.len()
                ),
            ));
        }
        // Field values share one scope that closes with the `new`.
        self.push_scope();
        let values = self.check_fields(args, fields);
        self.pop_scope();
        Ok(TExpr::new(TExprKind::New(values?), target, span))
    }

    fn check_fields(&mut self, args: &[Expr], fields: Vec<Type>) -> Result<Vec<TExpr>> {
        let mut values = Vec::with_capacity(args.len());
        for (arg, field_ty) in args.iter().zip(fields) {
            let value = self.check(arg, Some(field_ty))?;
            values.push(self.coerce(value, field_ty)?);
        }
        Ok(values)
    }

    /// Instance methods callable on `ty`: its own, then inherited ones that
    /// are not overridden with the same parameters.
    fn receiver_methods(&self, ty: Type) -> Vec<MethodInstanceId> {
        let mut found: Vec<MethodInstanceId> = Vec::new();
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([ty]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(def) = self.pool.type_def(current) else {
                continue;
            };
            for method in &def.methods {
                let candidate = self.pool.method(*method);
                if candidate.is_static {
                    continue;
                }
                let overridden = found.iter().any(|existing| {
                    let existing = self.pool.method(*existing);
                    existing.name == candidate.name && existing.params == candidate.params
                });
                if !overridden {
                    found.push(*method);
                }
            }
            queue.extend(def.supertype);
            queue.extend(def.interfaces.iter().copied());
        }
        found
    }

    /// Run overload resolution, rendering the call only when it fails.
    fn choose(
        &mut self,
        candidates: &[MethodInstanceId],
        name: &str,
        receiver: Option<Type>,
        args: &[Expr],
        span: Span,
    ) -> Result<MethodInstanceId> {
        if let [single] = candidates {
            return Ok(*single);
        }
        let call = self.render_call(name, receiver, args)?;
        resolve_overload(self.pool, candidates, name, &call, span)
    }

    fn render_call(&mut self, name: &str, receiver: Option<Type>, args: &[Expr]) -> Result<String> {
        self.push_scope();
        let mut types = Vec::with_capacity(args.len());
        for arg in args {
            match self.check(arg, None) {
                Ok(arg) => types.push(arg.ty),
                Err(err) => {
                    self.pop_scope();
                    return Err(err);
                }
            }
        }
        self.pop_scope();
        let rendered = self.pool.display_list(&types);
        Ok(match receiver {
            Some(receiver) => format!("{}.{name}({rendered})", self.pool.display(receiver)),
            None => format!("{name}({rendered})"),
        })
    }

    fn bind_generics(
        &mut self,
        method: MethodInstanceId,
        generics: &[TypeRef],
        span: Span,
    ) -> Result<MethodInstanceId> {
        if generics.is_empty() {
            return Ok(method);
        }
        let mut args = Vec::with_capacity(generics.len());
        for generic in generics {
            args.push(self.resolve_type(generic)?);
        }
        self.pool.instantiate_method(method, args, span)
    }

    /// Check arguments against the chosen method's parameters.
    fn check_args(
        &mut self,
        method: MethodInstanceId,
        args: &[Expr],
        mut first: Option<TExpr>,
    ) -> Result<Vec<TExpr>> {
        let params = self.pool.method(method).params.clone();
        let mut checked = Vec::with_capacity(args.len());
        for (index, (arg, param)) in args.iter().zip(params).enumerate() {
            let value = match first.take() {
                Some(value) if index == 0 => value,
                _ => self.check(arg, Some(param))?,
            };
            checked.push(self.coerce(value, param)?);
        }
        Ok(checked)
    }

    /// Build the call node, folding it when every operand is a literal.
    fn finish_call(
        &mut self,
        method: MethodInstanceId,
        receiver: Option<TExpr>,
        args: Vec<TExpr>,
        span: Span,
    ) -> TExpr {
        let def = self.pool.method(method);
        let ret = def.ret;
        if def.is_const()
            && let (Some(op), Some(receiver)) = (def.builtin_op(), receiver.as_ref())
            && let Some(value) = receiver.as_literal()
        {
            let literals: Option<Vec<_>> = args.iter().map(TExpr::as_literal).collect();
            let kind = self.pool.primitive_kind(receiver.ty);
            if let Some(result) = literals.and_then(|literals| fold(op, kind, value, &literals)) {
                return TExpr::literal(result, ret, span);
            }
        }
        TExpr::new(
            TExprKind::Call {
                method,
                receiver: receiver.map(Box::new),
                args,
            },
            ret,
            span,
        )
    }
}
