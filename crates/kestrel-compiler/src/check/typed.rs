//! The typed expression tree produced by the checker.
//!
//! Every node carries its concrete [`Type`]. Implicit conversions are
//! explicit nodes (`Upcast`, `Boxed`), calls name the exact method instance,
//! and object construction lists one value per instance field.

use std::fmt;

use kestrel_core::{FileId, MethodInstanceId, Span};

use crate::types::Type;

/// A compile-time value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    /// Any integer kind; the value is already within the kind's range.
    Int(i64),
    /// `Float32` values are stored widened but hold an exact `f32`.
    Float(f64),
    Str(String),
    Unit,
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
            ConstValue::Str(v) => write!(f, "{v:?}"),
            ConstValue::Unit => write!(f, "()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TExpr {
    pub kind: TExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TExprKind {
    Literal(ConstValue),
    Local(String),
    Let {
        name: String,
        value: Box<TExpr>,
    },
    Assign {
        name: String,
        value: Box<TExpr>,
    },
    This,
    /// `owner` is the type declaring the field, which may be an ancestor of
    /// the receiver's type.
    GetField {
        receiver: Box<TExpr>,
        owner: Type,
        name: String,
    },
    SetField {
        receiver: Box<TExpr>,
        owner: Type,
        name: String,
        value: Box<TExpr>,
    },
    GetStatic {
        owner: Type,
        name: String,
    },
    SetStatic {
        owner: Type,
        name: String,
        value: Box<TExpr>,
    },
    Call {
        method: MethodInstanceId,
        receiver: Option<Box<TExpr>>,
        args: Vec<TExpr>,
    },
    /// One value per instance field, ancestors' fields first.
    New(Vec<TExpr>),
    If {
        cond: Box<TExpr>,
        then: Box<TExpr>,
        otherwise: Option<Box<TExpr>>,
    },
    While {
        cond: Box<TExpr>,
        body: Box<TExpr>,
    },
    Block(Vec<TExpr>),
    Return(Option<Box<TExpr>>),
    /// Run a file's guarded import; evaluates to whether it had already run.
    Import(FileId),
    /// Reference widening to `ty`.
    Upcast(Box<TExpr>),
    /// Primitive boxed into `Any`.
    Boxed(Box<TExpr>),
}

impl TExpr {
    pub fn new(kind: TExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn literal(value: ConstValue, ty: Type, span: Span) -> Self {
        Self::new(TExprKind::Literal(value), ty, span)
    }

    pub fn as_literal(&self) -> Option<&ConstValue> {
        match &self.kind {
            TExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Control never reaches the end of this expression.
    pub fn diverges(&self) -> bool {
        match &self.kind {
            TExprKind::Return(_) => true,
            TExprKind::Block(exprs) => exprs.iter().any(TExpr::diverges),
            TExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                cond.diverges()
                    || (then.diverges() && otherwise.as_ref().is_some_and(|o| o.diverges()))
            }
            TExprKind::Let { value, .. }
            | TExprKind::Assign { value, .. }
            | TExprKind::SetStatic { value, .. } => value.diverges(),
            TExprKind::Upcast(inner) | TExprKind::Boxed(inner) => inner.diverges(),
            _ => false,
        }
    }

    /// Count nodes matching `pred`, this one included.
    pub fn count(&self, pred: &impl Fn(&TExpr) -> bool) -> usize {
        let own = usize::from(pred(self));
        let nested: usize = match &self.kind {
            TExprKind::Literal(_)
            | TExprKind::Local(_)
            | TExprKind::This
            | TExprKind::GetStatic { .. }
            | TExprKind::Import(_) => 0,
            TExprKind::Let { value, .. }
            | TExprKind::Assign { value, .. }
            | TExprKind::SetStatic { value, .. } => value.count(pred),
            TExprKind::GetField { receiver, .. } => receiver.count(pred),
            TExprKind::SetField {
                receiver, value, ..
            } => receiver.count(pred) + value.count(pred),
            TExprKind::Call { receiver, args, .. } => {
                receiver.as_ref().map_or(0, |r| r.count(pred))
                    + args.iter().map(|a| a.count(pred)).sum::<usize>()
            }
            TExprKind::New(args) | TExprKind::Block(args) => {
                args.iter().map(|a| a.count(pred)).sum()
            }
            TExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                cond.count(pred)
                    + then.count(pred)
                    + otherwise.as_ref().map_or(0, |o| o.count(pred))
            }
            TExprKind::While { cond, body } => cond.count(pred) + body.count(pred),
            TExprKind::Return(value) => value.as_ref().map_or(0, |v| v.count(pred)),
            TExprKind::Upcast(inner) | TExprKind::Boxed(inner) => inner.count(pred),
        };
        own + nested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::InstanceId;

    fn unit() -> Type {
        Type::Basic(InstanceId::new(0))
    }

    #[test]
    fn divergence_through_blocks_and_ifs() {
        let ret = TExpr::new(TExprKind::Return(None), unit(), Span::default());
        let lit = TExpr::literal(ConstValue::Unit, unit(), Span::default());
        let block = TExpr::new(
            TExprKind::Block(vec![lit.clone(), ret.clone()]),
            unit(),
            Span::default(),
        );
        assert!(block.diverges());

        let half = TExpr::new(
            TExprKind::If {
                cond: Box::new(TExpr::literal(ConstValue::Bool(true), unit(), Span::default())),
                then: Box::new(ret.clone()),
                otherwise: Some(Box::new(lit)),
            },
            unit(),
            Span::default(),
        );
        assert!(!half.diverges());
    }

    #[test]
    fn count_visits_nested_nodes() {
        let lit = TExpr::literal(ConstValue::Int(1), unit(), Span::default());
        let block = TExpr::new(TExprKind::Block(vec![lit.clone(), lit]), unit(), Span::default());
        assert_eq!(block.count(&|e| e.as_literal().is_some()), 2);
    }
}
