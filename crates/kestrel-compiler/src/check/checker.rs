//! Checker - locals, control flow, fields and coercions.

use kestrel_core::ast::{Expr, ExprKind, TypeRef};
use kestrel_core::{CompilationError, PrimitiveKind, Span};
use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;
use tracing::trace;

use super::typed::{ConstValue, TExpr, TExprKind};
use crate::template::{GenericEnv, TypePool};
use crate::type_resolver::TypeResolver;
use crate::types::Type;

type Result<T> = std::result::Result<T, CompilationError>;

/// Checks the expressions of one body.
///
/// Lexical scopes for locals live here as a stack of maps; a block pushes
/// one and pops it on exit, so inner declarations may shadow outer ones.
pub struct Checker<'p, 'r> {
    pub(super) pool: &'p mut TypePool<'r>,
    /// Scope-tree node type names in this body resolve from.
    pub(super) scope: NodeIndex,
    pub(super) env: GenericEnv,
    this: Option<Type>,
    /// Declared return type; `None` at file top level.
    ret: Option<Type>,
    locals: Vec<FxHashMap<String, Type>>,
}

impl<'p, 'r> Checker<'p, 'r> {
    pub fn new(
        pool: &'p mut TypePool<'r>,
        scope: NodeIndex,
        env: GenericEnv,
        this: Option<Type>,
        ret: Option<Type>,
    ) -> Self {
        Self {
            pool,
            scope,
            env,
            this,
            ret,
            locals: vec![FxHashMap::default()],
        }
    }

    // ========================================================================
    // Locals
    // ========================================================================

    pub fn declare(&mut self, name: &str, ty: Type, span: Span) -> Result<()> {
        let Some(current) = self.locals.last_mut() else {
            return Err(CompilationError::type_checking(span, "no open scope"));
        };
        if current.contains_key(name) {
            return Err(CompilationError::AlreadyDeclared {
                name: name.to_string(),
                span,
            });
        }
        trace!(name, %ty, "declared local");
        current.insert(name.to_string(), ty);
        Ok(())
    }

    fn lookup(&self, name: &str, span: Span) -> Result<Type> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| CompilationError::UndeclaredVariable {
                name: name.to_string(),
                span,
            })
    }

    pub(super) fn push_scope(&mut self) {
        self.locals.push(FxHashMap::default());
    }

    pub(super) fn pop_scope(&mut self) {
        self.locals.pop();
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Check a method body returning `ret`. A `Unit` method discards the
    /// body's value.
    pub fn check_body(&mut self, body: &Expr, ret: Type) -> Result<TExpr> {
        if self.pool.is_unit(ret) {
            return self.check(body, None);
        }
        let expr = self.check(body, Some(ret))?;
        self.coerce(expr, ret)
    }

    /// Check top-level statements in the outermost scope.
    pub fn check_statements(&mut self, statements: &[Expr]) -> Result<TExpr> {
        let mut checked = Vec::with_capacity(statements.len());
        for statement in statements {
            checked.push(self.check(statement, None)?);
        }
        let span = statements
            .first()
            .map(|s| s.span)
            .unwrap_or_default();
        Ok(TExpr::new(TExprKind::Block(checked), self.pool.unit(), span))
    }

    pub fn resolve_type(&mut self, ty: &TypeRef) -> Result<Type> {
        let resolved = TypeResolver::new(self.pool.registry()).resolve(self.scope, ty)?;
        self.pool.resolve(&resolved, &self.env, ty.span)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Check `expr`; `expected` steers literal typing but is not enforced.
    pub fn check(&mut self, expr: &Expr, expected: Option<Type>) -> Result<TExpr> {
        let span = expr.span;
        let unit = self.pool.unit();
        match &expr.kind {
            ExprKind::Int(value) => self.int_literal(*value, expected, span),
            ExprKind::Float(value) => {
                let ty = match expected.and_then(|t| self.pool.primitive_kind(t)) {
                    Some(PrimitiveKind::Float32) => self.pool.primitive(PrimitiveKind::Float32),
                    _ => self.pool.primitive(PrimitiveKind::Float64),
                };
                let value = if ty == self.pool.primitive(PrimitiveKind::Float32) {
                    *value as f32 as f64
                } else {
                    *value
                };
                Ok(TExpr::literal(ConstValue::Float(value), ty, span))
            }
            ExprKind::Bool(value) => Ok(TExpr::literal(
                ConstValue::Bool(*value),
                self.pool.bool(),
                span,
            )),
            ExprKind::Str(value) => Ok(TExpr::literal(
                ConstValue::Str(value.clone()),
                self.pool.string(),
                span,
            )),
            ExprKind::Unit => Ok(TExpr::literal(ConstValue::Unit, unit, span)),
            ExprKind::Local(name) => {
                let ty = self.lookup(name, span)?;
                Ok(TExpr::new(TExprKind::Local(name.clone()), ty, span))
            }
            ExprKind::Let { name, ty, value } => {
                let declared = ty.as_ref().map(|t| self.resolve_type(t)).transpose()?;
                let mut value = self.check(value, declared)?;
                if let Some(declared) = declared {
                    value = self.coerce(value, declared)?;
                }
                self.declare(name, value.ty, span)?;
                Ok(TExpr::new(
                    TExprKind::Let {
                        name: name.clone(),
                        value: Box::new(value),
                    },
                    unit,
                    span,
                ))
            }
            ExprKind::Assign { name, value } => {
                let ty = self.lookup(name, span)?;
                let value = self.check(value, Some(ty))?;
                let value = self.coerce(value, ty)?;
                Ok(TExpr::new(
                    TExprKind::Assign {
                        name: name.clone(),
                        value: Box::new(value),
                    },
                    unit,
                    span,
                ))
            }
            ExprKind::Field { receiver, name } => {
                let receiver = self.check(receiver, None)?;
                let (owner, ty) = self.instance_field(receiver.ty, name, span)?;
                Ok(TExpr::new(
                    TExprKind::GetField {
                        receiver: Box::new(receiver),
                        owner,
                        name: name.clone(),
                    },
                    ty,
                    span,
                ))
            }
            ExprKind::SetField {
                receiver,
                name,
                value,
            } => {
                let receiver = self.check(receiver, None)?;
                if self.pool.is_plural(receiver.ty) && !self.is_place(&receiver) {
                    return Err(CompilationError::type_checking(
                        span,
                        format!("cannot assign to field '{name}' of a temporary value"),
                    ));
                }
                let (owner, ty) = self.instance_field(receiver.ty, name, span)?;
                let value = self.check(value, Some(ty))?;
                let value = self.coerce(value, ty)?;
                Ok(TExpr::new(
                    TExprKind::SetField {
                        receiver: Box::new(receiver),
                        owner,
                        name: name.clone(),
                        value: Box::new(value),
                    },
                    unit,
                    span,
                ))
            }
            ExprKind::StaticField { ty, name } => {
                let ty = self.resolve_type(ty)?;
                let (owner, field_ty) = self.static_field(ty, name, span)?;
                Ok(TExpr::new(
                    TExprKind::GetStatic {
                        owner,
                        name: name.clone(),
                    },
                    field_ty,
                    span,
                ))
            }
            ExprKind::SetStaticField { ty, name, value } => {
                let ty = self.resolve_type(ty)?;
                let (owner, field_ty) = self.static_field(ty, name, span)?;
                let value = self.check(value, Some(field_ty))?;
                let value = self.coerce(value, field_ty)?;
                Ok(TExpr::new(
                    TExprKind::SetStatic {
                        owner,
                        name: name.clone(),
                        value: Box::new(value),
                    },
                    unit,
                    span,
                ))
            }
            ExprKind::Call {
                receiver: Some(receiver),
                name,
                generics,
                args,
            } => self.check_method_call(receiver, name, generics, args, expected, span),
            ExprKind::Call {
                receiver: None,
                name,
                generics,
                args,
            } => self.check_free_call(name, generics, args, span),
            ExprKind::StaticCall {
                ty,
                name,
                generics,
                args,
            } => self.check_static_call(ty, name, generics, args, span),
            ExprKind::New { ty, args } => self.check_new(ty, args, span),
            ExprKind::If {
                cond,
                then,
                otherwise,
            } => self.check_if(cond, then, otherwise.as_deref(), expected, span),
            ExprKind::While { cond, body } => {
                let cond = self.check_condition(cond)?;
                let body = self.check(body, None)?;
                Ok(TExpr::new(
                    TExprKind::While {
                        cond: Box::new(cond),
                        body: Box::new(body),
                    },
                    unit,
                    span,
                ))
            }
            ExprKind::Block(exprs) => {
                self.push_scope();
                let result = self.check_block(exprs, expected, span);
                self.pop_scope();
                result
            }
            ExprKind::Return(value) => {
                let Some(ret) = self.ret else {
                    return Err(CompilationError::type_checking(
                        span,
                        "return outside of a method",
                    ));
                };
                let value = match value {
                    Some(value) => {
                        let value = self.check(value, Some(ret))?;
                        Some(Box::new(self.coerce(value, ret)?))
                    }
                    None if self.pool.is_unit(ret) => None,
                    None => {
                        return Err(CompilationError::type_checking(
                            span,
                            format!("missing return value of type {}", self.pool.display(ret)),
                        ));
                    }
                };
                Ok(TExpr::new(TExprKind::Return(value), unit, span))
            }
            ExprKind::This => match self.this {
                Some(ty) => Ok(TExpr::new(TExprKind::This, ty, span)),
                None => Err(CompilationError::type_checking(
                    span,
                    "'this' outside of an instance method",
                )),
            },
            ExprKind::Import(file) => match self.pool.registry().file_by_name(file) {
                Some(entry) => Ok(TExpr::new(
                    TExprKind::Import(entry.id),
                    self.pool.bool(),
                    span,
                )),
                None => Err(CompilationError::Import {
                    file: file.clone(),
                    reason: "no such file in program".into(),
                    span,
                }),
            },
        }
    }

    fn check_block(
        &mut self,
        exprs: &[Expr],
        expected: Option<Type>,
        span: Span,
    ) -> Result<TExpr> {
        let mut checked = Vec::with_capacity(exprs.len());
        for (index, expr) in exprs.iter().enumerate() {
            let hint = if index + 1 == exprs.len() { expected } else { None };
            checked.push(self.check(expr, hint)?);
        }
        let ty = checked.last().map_or(self.pool.unit(), |last| last.ty);
        Ok(TExpr::new(TExprKind::Block(checked), ty, span))
    }

    fn check_condition(&mut self, cond: &Expr) -> Result<TExpr> {
        let bool_ty = self.pool.bool();
        let cond = self.check(cond, Some(bool_ty))?;
        self.coerce(cond, bool_ty)
    }

    fn check_if(
        &mut self,
        cond: &Expr,
        then: &Expr,
        otherwise: Option<&Expr>,
        expected: Option<Type>,
        span: Span,
    ) -> Result<TExpr> {
        let cond = Box::new(self.check_condition(cond)?);
        let Some(otherwise) = otherwise else {
            let then = self.check(then, None)?;
            return Ok(TExpr::new(
                TExprKind::If {
                    cond,
                    then: Box::new(then),
                    otherwise: None,
                },
                self.pool.unit(),
                span,
            ));
        };
        let then = self.check(then, expected)?;
        let otherwise = self.check(otherwise, expected)?;
        let (then, otherwise) = self.unify(then, otherwise, span)?;
        let ty = if then.diverges() { otherwise.ty } else { then.ty };
        Ok(TExpr::new(
            TExprKind::If {
                cond,
                then: Box::new(then),
                otherwise: Some(Box::new(otherwise)),
            },
            ty,
            span,
        ))
    }

    /// Bring both branches of an `if` to one type.
    fn unify(&mut self, a: TExpr, b: TExpr, span: Span) -> Result<(TExpr, TExpr)> {
        if a.ty == b.ty || a.diverges() || b.diverges() {
            return Ok((a, b));
        }
        if self.pool.is_strict_subtype(a.ty, b.ty) {
            let target = b.ty;
            return Ok((self.coerce(a, target)?, b));
        }
        if self.pool.is_strict_subtype(b.ty, a.ty) {
            let target = a.ty;
            return Ok((a, self.coerce(b, target)?));
        }
        Err(CompilationError::type_checking(
            span,
            format!(
                "if branches have incompatible types {} and {}",
                self.pool.display(a.ty),
                self.pool.display(b.ty)
            ),
        ))
    }

    // ========================================================================
    // Literals and coercion
    // ========================================================================

    fn int_literal(&mut self, value: i128, expected: Option<Type>, span: Span) -> Result<TExpr> {
        let expected_kind = expected.and_then(|t| self.pool.primitive_kind(t));
        let kind = match expected_kind {
            Some(kind) if kind.is_integer() => kind,
            Some(kind) if kind.is_float() => {
                let mut float = value as f64;
                if kind == PrimitiveKind::Float32 {
                    float = float as f32 as f64;
                }
                return Ok(TExpr::literal(
                    ConstValue::Float(float),
                    self.pool.primitive(kind),
                    span,
                ));
            }
            _ if i32::try_from(value).is_ok() => PrimitiveKind::Int32,
            _ => PrimitiveKind::Int64,
        };
        let in_range = kind
            .int_range()
            .is_some_and(|(min, max)| value >= i128::from(min) && value <= i128::from(max));
        if !in_range {
            return Err(CompilationError::type_checking(
                span,
                format!("integer literal {value} is out of range for {kind}"),
            ));
        }
        Ok(TExpr::literal(
            ConstValue::Int(value as i64),
            self.pool.primitive(kind),
            span,
        ))
    }

    /// Convert `expr` to `target`, making implicit conversions explicit.
    pub fn coerce(&mut self, expr: TExpr, target: Type) -> Result<TExpr> {
        if expr.ty == target || expr.diverges() {
            return Ok(expr);
        }
        let span = expr.span;
        if target == self.pool.any() && self.pool.primitive_kind(expr.ty).is_some() {
            return Ok(TExpr::new(TExprKind::Boxed(Box::new(expr)), target, span));
        }
        if self.pool.is_reference(expr.ty) && self.pool.is_strict_subtype(expr.ty, target) {
            return Ok(TExpr::new(TExprKind::Upcast(Box::new(expr)), target, span));
        }
        Err(CompilationError::type_checking(
            span,
            format!(
                "expected {}, found {}",
                self.pool.display(target),
                self.pool.display(expr.ty)
            ),
        ))
    }

    // ========================================================================
    // Fields
    // ========================================================================

    fn instance_field(&self, ty: Type, name: &str, span: Span) -> Result<(Type, Type)> {
        match self.pool.find_field(ty, name) {
            Some(field) if !field.is_static => Ok((Type::Basic(field.owner), field.ty)),
            _ => Err(CompilationError::type_checking(
                span,
                format!("{} has no field '{name}'", self.pool.display(ty)),
            )),
        }
    }

    fn static_field(&self, ty: Type, name: &str, span: Span) -> Result<(Type, Type)> {
        match self.pool.find_field(ty, name) {
            Some(field) if field.is_static => Ok((Type::Basic(field.owner), field.ty)),
            _ => Err(CompilationError::type_checking(
                span,
                format!("{} has no static field '{name}'", self.pool.display(ty)),
            )),
        }
    }

    /// Storage the backend can write a value-type leaf back into.
    fn is_place(&self, expr: &TExpr) -> bool {
        match &expr.kind {
            TExprKind::Local(_) | TExprKind::This | TExprKind::GetStatic { .. } => true,
            TExprKind::GetField { receiver, .. } => {
                self.pool.is_reference(receiver.ty) || self.is_place(receiver)
            }
            _ => false,
        }
    }
}
