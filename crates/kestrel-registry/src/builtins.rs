//! The builtin prelude: primitive types, `Any`, `String` and their methods.
//!
//! Operators are ordinary methods on the receiver's type (`a + b` calls `+`
//! on `a`), so every primitive carries one method per operator it supports.
//! Each builtin method is tagged with a [`BuiltinOp`]; the compiler decides
//! from the op how to fold it and which instructions implement it.

use kestrel_core::ast::{NativeDispatch, NativeMethod};
use kestrel_core::{DefId, PrimitiveKind, ResolvedType, Span, TypeHash};
use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;

use crate::definition::{DefKind, Definition, MethodTemplate, ParamTemplate, TemplateBody};
use crate::registry::{Prelude, Registry};
use crate::scope_tree::{ScopeBinding, ScopeTree};

/// Operation implemented directly by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Neg,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Numeric conversion to the given kind.
    Convert(PrimitiveKind),
    Concat,
    StrEq,
    Println,
}

impl BuiltinOp {
    /// Whether calls with literal operands may be replaced by their result.
    pub fn is_const(self) -> bool {
        !matches!(self, BuiltinOp::Println)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BuiltinOp::Eq
                | BuiltinOp::Ne
                | BuiltinOp::Lt
                | BuiltinOp::Le
                | BuiltinOp::Gt
                | BuiltinOp::Ge
        )
    }
}

const ARITHMETIC: [(&str, BuiltinOp); 5] = [
    ("+", BuiltinOp::Add),
    ("-", BuiltinOp::Sub),
    ("*", BuiltinOp::Mul),
    ("/", BuiltinOp::Div),
    ("%", BuiltinOp::Rem),
];

const BITWISE: [(&str, BuiltinOp); 3] = [
    ("&", BuiltinOp::And),
    ("|", BuiltinOp::Or),
    ("^", BuiltinOp::Xor),
];

const COMPARISON: [(&str, BuiltinOp); 6] = [
    ("==", BuiltinOp::Eq),
    ("!=", BuiltinOp::Ne),
    ("<", BuiltinOp::Lt),
    ("<=", BuiltinOp::Le),
    (">", BuiltinOp::Gt),
    (">=", BuiltinOp::Ge),
];

/// Name of the conversion method targeting `kind`, e.g. `toInt64`.
pub fn conversion_name(kind: PrimitiveKind) -> String {
    format!("to{}", kind.name())
}

/// Populate `defs` and `scopes` with the prelude definitions.
pub(crate) fn install(defs: &mut Vec<Definition>, scopes: &mut ScopeTree) -> Prelude {
    let root = scopes.root();
    let mut declare = |defs: &mut Vec<Definition>, name: &str, kind: DefKind| -> DefId {
        let id = Registry::push_prelude_definition(defs, bare_definition(name, kind, root));
        scopes.declare(root, name, ScopeBinding::Definition(id));
        id
    };

    let mut primitives = FxHashMap::default();
    for kind in PrimitiveKind::ALL {
        let id = declare(defs, kind.name(), DefKind::Primitive(kind));
        primitives.insert(kind, id);
    }
    let any = declare(defs, "Any", DefKind::Any);
    let string = declare(defs, "String", DefKind::String);
    let module = Registry::push_prelude_definition(
        defs,
        bare_definition("prelude", DefKind::Module(None), root),
    );

    let bool_ty = ResolvedType::simple(primitives[&PrimitiveKind::Bool]);
    let unit_ty = ResolvedType::simple(primitives[&PrimitiveKind::Unit]);
    let int_ty = ResolvedType::simple(primitives[&PrimitiveKind::Int32]);
    let string_ty = ResolvedType::simple(string);

    for kind in PrimitiveKind::ALL {
        let id = primitives[&kind];
        let this = ResolvedType::simple(id);
        let methods = &mut defs[id.as_usize()].methods;
        if kind.is_numeric() {
            for (name, op) in ARITHMETIC {
                methods.push(binary(name, op, &this, &this, root));
            }
            if kind.is_integer() {
                for (name, op) in BITWISE {
                    methods.push(binary(name, op, &this, &this, root));
                }
            }
            for (name, op) in COMPARISON {
                methods.push(binary(name, op, &this, &bool_ty, root));
            }
            methods.push(unary("neg", BuiltinOp::Neg, &this, root));
            for target in PrimitiveKind::ALL {
                if target.is_numeric() && target != kind {
                    let ret = ResolvedType::simple(primitives[&target]);
                    methods.push(unary(
                        &conversion_name(target),
                        BuiltinOp::Convert(target),
                        &ret,
                        root,
                    ));
                }
            }
        } else if kind == PrimitiveKind::Bool {
            methods.push(unary("!", BuiltinOp::Not, &this, root));
            methods.push(binary("&", BuiltinOp::And, &this, &this, root));
            methods.push(binary("|", BuiltinOp::Or, &this, &this, root));
            methods.push(binary("^", BuiltinOp::Xor, &this, &this, root));
            methods.push(binary("==", BuiltinOp::Eq, &this, &this, root));
            methods.push(binary("!=", BuiltinOp::Ne, &this, &this, root));
        }
    }

    let string_methods = &mut defs[string.as_usize()].methods;
    string_methods.push(binary("+", BuiltinOp::Concat, &string_ty, &string_ty, root));
    string_methods.push(binary("==", BuiltinOp::StrEq, &string_ty, &bool_ty, root));
    string_methods.push(MethodTemplate {
        name: "length".into(),
        is_static: false,
        generics: Vec::new(),
        params: Vec::new(),
        ret: int_ty,
        body: TemplateBody::Native(NativeMethod {
            owner: "java/lang/String".into(),
            name: "length".into(),
            descriptor: "()I".into(),
            dispatch: NativeDispatch::Virtual,
        }),
        scope: root,
        span: Span::default(),
    });

    defs[module.as_usize()].methods.push(MethodTemplate {
        name: "println".into(),
        is_static: true,
        generics: Vec::new(),
        params: vec![ParamTemplate {
            name: "value".into(),
            ty: ResolvedType::simple(any),
        }],
        ret: unit_ty,
        body: TemplateBody::Builtin(BuiltinOp::Println),
        scope: root,
        span: Span::default(),
    });

    Prelude {
        module,
        any,
        string,
        primitives,
    }
}

fn bare_definition(name: &str, kind: DefKind, scope: NodeIndex) -> Definition {
    Definition {
        id: DefId::new(0),
        name: name.to_string(),
        kind,
        generics: Vec::new(),
        parent: None,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        scope,
        file: None,
        hash: TypeHash::from_name(name),
        span: Span::default(),
    }
}

fn binary(
    name: &str,
    op: BuiltinOp,
    operand: &ResolvedType,
    ret: &ResolvedType,
    scope: NodeIndex,
) -> MethodTemplate {
    MethodTemplate {
        name: name.to_string(),
        is_static: false,
        generics: Vec::new(),
        params: vec![ParamTemplate {
            name: "other".into(),
            ty: operand.clone(),
        }],
        ret: ret.clone(),
        body: TemplateBody::Builtin(op),
        scope,
        span: Span::default(),
    }
}

fn unary(name: &str, op: BuiltinOp, ret: &ResolvedType, scope: NodeIndex) -> MethodTemplate {
    MethodTemplate {
        name: name.to_string(),
        is_static: false,
        generics: Vec::new(),
        params: Vec::new(),
        ret: ret.clone(),
        body: TemplateBody::Builtin(op),
        scope,
        span: Span::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methods_named<'a>(
        registry: &'a Registry,
        def: DefId,
        name: &str,
    ) -> Vec<&'a MethodTemplate> {
        registry
            .get(def)
            .methods
            .iter()
            .filter(|m| m.name == name)
            .collect()
    }

    #[test]
    fn int_has_arithmetic_and_comparison() {
        let registry = Registry::new();
        let int = registry.prelude().primitive(PrimitiveKind::Int32);
        for name in ["+", "-", "*", "/", "%", "&", "<", "==", "neg", "toInt64"] {
            assert_eq!(methods_named(&registry, int, name).len(), 1, "{name}");
        }
        assert!(methods_named(&registry, int, "toInt").is_empty());
    }

    #[test]
    fn floats_have_no_bitwise_ops() {
        let registry = Registry::new();
        let float = registry.prelude().primitive(PrimitiveKind::Float64);
        assert!(methods_named(&registry, float, "&").is_empty());
        assert_eq!(methods_named(&registry, float, "+").len(), 1);
    }

    #[test]
    fn string_methods() {
        let registry = Registry::new();
        let string = registry.prelude().string;
        assert!(matches!(
            methods_named(&registry, string, "+")[0].body,
            TemplateBody::Builtin(BuiltinOp::Concat)
        ));
        assert!(matches!(
            methods_named(&registry, string, "length")[0].body,
            TemplateBody::Native(_)
        ));
    }

    #[test]
    fn println_takes_any() {
        let registry = Registry::new();
        let module = registry.prelude().module;
        let println = methods_named(&registry, module, "println");
        assert_eq!(println.len(), 1);
        assert_eq!(
            println[0].params[0].ty,
            ResolvedType::simple(registry.prelude().any)
        );
        assert!(!BuiltinOp::Println.is_const());
    }

    #[test]
    fn unit_has_no_methods() {
        let registry = Registry::new();
        let unit = registry.prelude().primitive(PrimitiveKind::Unit);
        assert!(registry.get(unit).methods.is_empty());
    }
}
