//! The parse tree consumed by the compiler core.
//!
//! The front end (outside this workspace) produces a [`Program`]: per-file
//! type declarations, free functions and top-level expressions. Type
//! references are still textual here; the registration pass resolves them.
//!
//! Operators are ordinary method calls: `a + b` arrives as a call of method
//! `+` on receiver `a`. The constructor helpers on [`Expr`] and [`TypeRef`]
//! build trees with default spans, which is what tests and embedders without
//! a parser use.

use crate::Span;

/// A whole program: every source file plus the name of the main file.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub files: Vec<SourceFile>,
    pub main: String,
}

impl Program {
    pub fn new(main: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            main: main.into(),
        }
    }

    pub fn with_file(mut self, file: SourceFile) -> Self {
        self.files.push(file);
        self
    }
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceFile {
    pub name: String,
    pub types: Vec<TypeDecl>,
    pub functions: Vec<MethodDecl>,
    /// Top-level statements, run by the file's guarded import.
    pub top_level: Vec<Expr>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    pub fn with_function(mut self, decl: MethodDecl) -> Self {
        self.functions.push(decl);
        self
    }

    pub fn with_statement(mut self, expr: Expr) -> Self {
        self.top_level.push(expr);
        self
    }
}

/// A textual type reference such as `Map<String, List<Int>>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
    pub span: Span,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDeclKind {
    /// Heap-allocated, reference semantics, single parent.
    Class,
    /// Value type without identity, flattened into its container.
    Struct,
    /// Signature-only contract.
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeDeclKind,
    pub generics: Vec<String>,
    pub parent: Option<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

impl TypeDecl {
    pub fn new(kind: TypeDeclKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            generics: Vec::new(),
            parent: None,
            implements: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(TypeDeclKind::Class, name)
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(TypeDeclKind::Struct, name)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(TypeDeclKind::Interface, name)
    }

    pub fn with_generics(mut self, names: &[&str]) -> Self {
        self.generics = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_parent(mut self, parent: TypeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.implements.push(interface);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            is_static: false,
            span: Span::default(),
        });
        self
    }

    pub fn with_static_field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            is_static: true,
            span: Span::default(),
        });
        self
    }

    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub is_static: bool,
    pub generics: Vec<String>,
    pub params: Vec<ParamDecl>,
    pub ret: TypeRef,
    pub body: MethodBodyDecl,
    pub span: Span,
}

impl MethodDecl {
    /// An instance method returning `Unit` with an empty body.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: false,
            generics: Vec::new(),
            params: Vec::new(),
            ret: TypeRef::named("Unit"),
            body: MethodBodyDecl::Source(Expr::block(Vec::new())),
            span: Span::default(),
        }
    }

    /// A free function (static, owned by the file's module).
    pub fn function(name: impl Into<String>) -> Self {
        Self::new(name).static_()
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_generics(mut self, names: &[&str]) -> Self {
        self.generics = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            ty,
            span: Span::default(),
        });
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.ret = ty;
        self
    }

    pub fn with_body(mut self, body: Expr) -> Self {
        self.body = MethodBodyDecl::Source(body);
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.body = MethodBodyDecl::Abstract;
        self
    }

    pub fn native(mut self, native: NativeMethod) -> Self {
        self.body = MethodBodyDecl::Native(native);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodBodyDecl {
    Source(Expr),
    /// Interface method: signature only.
    Abstract,
    /// Host method supplied by the native-interop adapter.
    Native(NativeMethod),
}

/// A host-platform method wrapped by the native-interop adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeMethod {
    /// Internal name of the host class, e.g. `java/lang/Math`.
    pub owner: String,
    pub name: String,
    /// Host method descriptor, e.g. `(II)I`.
    pub descriptor: String,
    pub dispatch: NativeDispatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeDispatch {
    Static,
    Virtual,
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i128),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
    Local(String),
    Let {
        name: String,
        ty: Option<TypeRef>,
        value: Box<Expr>,
    },
    Assign {
        name: String,
        value: Box<Expr>,
    },
    Field {
        receiver: Box<Expr>,
        name: String,
    },
    SetField {
        receiver: Box<Expr>,
        name: String,
        value: Box<Expr>,
    },
    StaticField {
        ty: TypeRef,
        name: String,
    },
    SetStaticField {
        ty: TypeRef,
        name: String,
        value: Box<Expr>,
    },
    /// Method call on a receiver, or a free call when `receiver` is `None`.
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        generics: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    StaticCall {
        ty: TypeRef,
        name: String,
        generics: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
    },
    Block(Vec<Expr>),
    Return(Option<Box<Expr>>),
    This,
    Import(String),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: i128) -> Self {
        Self::new(ExprKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Str(value.into()))
    }

    pub fn unit() -> Self {
        Self::new(ExprKind::Unit)
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Local(name.into()))
    }

    pub fn let_(name: impl Into<String>, ty: Option<TypeRef>, value: Expr) -> Self {
        Self::new(ExprKind::Let {
            name: name.into(),
            ty,
            value: Box::new(value),
        })
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Self::new(ExprKind::Assign {
            name: name.into(),
            value: Box::new(value),
        })
    }

    pub fn field(receiver: Expr, name: impl Into<String>) -> Self {
        Self::new(ExprKind::Field {
            receiver: Box::new(receiver),
            name: name.into(),
        })
    }

    pub fn set_field(receiver: Expr, name: impl Into<String>, value: Expr) -> Self {
        Self::new(ExprKind::SetField {
            receiver: Box::new(receiver),
            name: name.into(),
            value: Box::new(value),
        })
    }

    pub fn static_field(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ExprKind::StaticField {
            ty,
            name: name.into(),
        })
    }

    pub fn set_static_field(ty: TypeRef, name: impl Into<String>, value: Expr) -> Self {
        Self::new(ExprKind::SetStaticField {
            ty,
            name: name.into(),
            value: Box::new(value),
        })
    }

    pub fn method(receiver: Expr, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            receiver: Some(Box::new(receiver)),
            name: name.into(),
            generics: Vec::new(),
            args,
        })
    }

    /// `lhs op rhs`, i.e. method `op` called on `lhs`.
    pub fn binary(lhs: Expr, op: &str, rhs: Expr) -> Self {
        Self::method(lhs, op, vec![rhs])
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            receiver: None,
            name: name.into(),
            generics: Vec::new(),
            args,
        })
    }

    pub fn generic_call(name: impl Into<String>, generics: Vec<TypeRef>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            receiver: None,
            name: name.into(),
            generics,
            args,
        })
    }

    pub fn static_call(ty: TypeRef, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::StaticCall {
            ty,
            name: name.into(),
            generics: Vec::new(),
            args,
        })
    }

    pub fn new_object(ty: TypeRef, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::New { ty, args })
    }

    pub fn if_(cond: Expr, then: Expr, otherwise: Option<Expr>) -> Self {
        Self::new(ExprKind::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
    }

    pub fn while_(cond: Expr, body: Expr) -> Self {
        Self::new(ExprKind::While {
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    pub fn block(exprs: Vec<Expr>) -> Self {
        Self::new(ExprKind::Block(exprs))
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(ExprKind::Return(value.map(Box::new)))
    }

    pub fn this() -> Self {
        Self::new(ExprKind::This)
    }

    pub fn import(file: impl Into<String>) -> Self {
        Self::new(ExprKind::Import(file.into()))
    }

    /// Visit this expression and every nested expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match &self.kind {
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Bool(_)
            | ExprKind::Str(_)
            | ExprKind::Unit
            | ExprKind::Local(_)
            | ExprKind::StaticField { .. }
            | ExprKind::This
            | ExprKind::Import(_) => {}
            ExprKind::Let { value, .. }
            | ExprKind::Assign { value, .. }
            | ExprKind::SetStaticField { value, .. } => value.walk(visit),
            ExprKind::Field { receiver, .. } => receiver.walk(visit),
            ExprKind::SetField {
                receiver, value, ..
            } => {
                receiver.walk(visit);
                value.walk(visit);
            }
            ExprKind::Call { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    receiver.walk(visit);
                }
                args.iter().for_each(|a| a.walk(visit));
            }
            ExprKind::StaticCall { args, .. } | ExprKind::New { args, .. } => {
                args.iter().for_each(|a| a.walk(visit))
            }
            ExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(visit);
                then.walk(visit);
                if let Some(otherwise) = otherwise {
                    otherwise.walk(visit);
                }
            }
            ExprKind::While { cond, body } => {
                cond.walk(visit);
                body.walk(visit);
            }
            ExprKind::Block(exprs) => exprs.iter().for_each(|e| e.walk(visit)),
            ExprKind::Return(value) => {
                if let Some(value) = value {
                    value.walk(visit);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_is_a_method_call() {
        let expr = Expr::binary(Expr::int(1), "+", Expr::int(2));
        match expr.kind {
            ExprKind::Call {
                receiver: Some(receiver),
                name,
                args,
                ..
            } => {
                assert_eq!(receiver.kind, ExprKind::Int(1));
                assert_eq!(name, "+");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn walk_finds_nested_imports() {
        let expr = Expr::block(vec![
            Expr::if_(Expr::bool(true), Expr::import("a"), Some(Expr::import("b"))),
            Expr::import("c"),
        ]);
        let mut found = Vec::new();
        expr.walk(&mut |e| {
            if let ExprKind::Import(name) = &e.kind {
                found.push(name.clone());
            }
        });
        assert_eq!(found, vec!["a", "b", "c"]);
    }
}
