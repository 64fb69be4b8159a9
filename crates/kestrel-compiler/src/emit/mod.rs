//! Lowering of checked bodies into IR.
//!
//! One [`MethodEmitter`] lowers one body. Control flow splits the code into
//! nested [`CodeBlock`]s so the step counter charges each branch and each
//! loop iteration separately:
//!
//! ```text
//! if c { a } else { b }      while c { body }
//!
//!   <c>                        start:
//!   ifeq else                  [ <c>; ifeq end ]
//!   [ <a>; goto end ]          [ <body>; goto start ]
//! else:                        end:
//!   [ <b> ]
//! end:
//! ```
//!
//! Value types never exist as objects: they are handled leaf by leaf
//! through [`place::Place`].

mod calls;
mod place;

pub use place::{Place, Value};

use kestrel_core::{FileId, MethodInstanceId, PrimitiveKind, Span, StackKind, internal_fault};
use tracing::trace;

use crate::backend::Symbols;
use crate::check::{ConstValue, TExpr, TExprKind, TypedBody};
use crate::ir::{CodeBlock, Condition, Instruction, LabelAllocator};
use crate::layout;
use crate::scope::LocalSlots;
use crate::template::TypePool;
use crate::types::Type;

/// A lowered body ready for linearization.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredBody {
    pub code: CodeBlock,
    pub max_locals: u16,
}

/// Lower the body of a source method.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_method(
    pool: &TypePool<'_>,
    symbols: &Symbols,
    line_numbers: bool,
    method: MethodInstanceId,
    body: &TypedBody,
) -> LoweredBody {
    let def = pool.method(method);
    let mut emitter = MethodEmitter::new(pool, symbols, line_numbers, Some(def.ret));
    if !def.is_static {
        let owner = Type::Basic(def.owner);
        emitter.locals.temp(layout::slots(pool, owner));
        emitter.this = Some(owner);
    }
    for (name, ty) in def.param_names.iter().zip(&def.params) {
        emitter.locals.declare(name, *ty, layout::slots(pool, *ty));
    }

    let mut code = CodeBlock::new();
    emitter.line(def.span, &mut code);
    let root = &body.root;
    let value = emitter.expr(root, &mut code);
    if !root.diverges() {
        if pool.is_unit(def.ret) {
            emitter.discard(value, root.ty, &mut code);
        } else {
            emitter.push(value, root.ty, &mut code);
        }
        emitter.emit_return(def.ret, &mut code);
    }
    trace!(method = %pool.method_label(method), cost = code.cost(), "lowered method");
    emitter.finish(code)
}

/// Lower a file's top level into the body of its guarded import.
///
/// The import returns whether the file had already run; the top level runs
/// only the first time.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_import(
    pool: &TypePool<'_>,
    symbols: &Symbols,
    line_numbers: bool,
    file: FileId,
    body: &TypedBody,
) -> LoweredBody {
    let mut emitter = MethodEmitter::new(pool, symbols, line_numbers, None);
    let guard = symbols.import_guard(file);
    let fresh = emitter.labels.next();

    let mut code = CodeBlock::new();
    code.push(Instruction::GetStatic(guard.clone()));
    code.push(Instruction::JumpIfZero(Condition::Eq, fresh));
    code.push(Instruction::PushInt(1));
    code.push(Instruction::Return(Some(StackKind::Int)));
    code.push(Instruction::Label(fresh));

    let mut run = CodeBlock::new();
    run.push(Instruction::PushInt(1));
    run.push(Instruction::PutStatic(guard));
    let value = emitter.expr(&body.root, &mut run);
    emitter.discard(value, body.root.ty, &mut run);
    run.push(Instruction::PushInt(0));
    run.push(Instruction::Return(Some(StackKind::Int)));
    code.push_block(run);
    emitter.finish(code)
}

pub struct MethodEmitter<'a, 'r> {
    pub(crate) pool: &'a TypePool<'r>,
    symbols: &'a Symbols,
    locals: LocalSlots,
    labels: LabelAllocator,
    /// Return type of the method; `None` for a file's top level.
    ret: Option<Type>,
    /// Type of `this`, held from slot 0.
    this: Option<Type>,
    line: u32,
    line_numbers: bool,
}

impl<'a, 'r> MethodEmitter<'a, 'r> {
    fn new(
        pool: &'a TypePool<'r>,
        symbols: &'a Symbols,
        line_numbers: bool,
        ret: Option<Type>,
    ) -> Self {
        Self {
            pool,
            symbols,
            locals: LocalSlots::new(),
            labels: LabelAllocator::new(),
            ret,
            this: None,
            line: 0,
            line_numbers,
        }
    }

    fn finish(self, code: CodeBlock) -> LoweredBody {
        LoweredBody {
            code,
            max_locals: self.locals.max_locals(),
        }
    }

    fn line(&mut self, span: Span, out: &mut CodeBlock) {
        if self.line_numbers && span.is_known() && span.line != self.line {
            self.line = span.line;
            out.push(Instruction::LineNumber(span.line));
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn expr(&mut self, expr: &TExpr, out: &mut CodeBlock) -> Value {
        match &expr.kind {
            TExprKind::Literal(value) => {
                self.literal(value, expr.ty, out);
                Value::Stack
            }
            TExprKind::Local(name) => {
                let local = self.locals.lookup(name);
                self.local_value(local.slot, expr.ty, out)
            }
            TExprKind::This => match self.this {
                Some(this) => self.local_value(0, this, out),
                None => internal_fault("this outside an instance method"),
            },
            TExprKind::Let { name, value } => {
                let source = self.expr(value, out);
                self.push(source, value.ty, out);
                let slot = self
                    .locals
                    .declare(name, value.ty, layout::slots(self.pool, value.ty));
                self.store_place(&Place::Slots(slot), value.ty, out);
                Value::Stack
            }
            TExprKind::Assign { name, value } => {
                let source = self.expr(value, out);
                self.push(source, value.ty, out);
                let slot = self.locals.lookup(name).slot;
                self.store_place(&Place::Slots(slot), value.ty, out);
                Value::Stack
            }
            TExprKind::GetField {
                receiver,
                owner,
                name,
            } => self.get_field(receiver, *owner, name, expr.ty, out),
            TExprKind::SetField {
                receiver,
                owner,
                name,
                value,
            } => {
                self.set_field(receiver, *owner, name, value, out);
                Value::Stack
            }
            TExprKind::GetStatic { owner, name } => Value::Place(Place::Static {
                class: self.runtime_name(*owner).to_string(),
                prefix: name.clone(),
            }),
            TExprKind::SetStatic { owner, name, value } => {
                let source = self.expr(value, out);
                self.push(source, value.ty, out);
                let place = Place::Static {
                    class: self.runtime_name(*owner).to_string(),
                    prefix: name.clone(),
                };
                self.store_place(&place, value.ty, out);
                Value::Stack
            }
            TExprKind::Call {
                method,
                receiver,
                args,
            } => self.call(*method, receiver.as_deref(), args, out),
            TExprKind::New(args) => self.new_value(expr.ty, args, out),
            TExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.if_(cond, then, otherwise.as_deref(), expr.ty, out);
                Value::Stack
            }
            TExprKind::While { cond, body } => {
                self.while_(cond, body, out);
                Value::Stack
            }
            TExprKind::Block(exprs) => {
                self.block(exprs, expr.ty, out);
                Value::Stack
            }
            TExprKind::Return(value) => {
                let Some(ret) = self.ret else {
                    internal_fault("return outside a method");
                };
                if let Some(value) = value {
                    let result = self.expr(value, out);
                    if self.pool.is_unit(ret) {
                        self.discard(result, value.ty, out);
                    } else {
                        self.push(result, value.ty, out);
                    }
                }
                self.emit_return(ret, out);
                Value::Stack
            }
            TExprKind::Import(file) => {
                out.push(Instruction::Invoke(
                    crate::ir::InvokeKind::Static,
                    self.symbols.import_method(*file),
                ));
                Value::Stack
            }
            TExprKind::Upcast(inner) => {
                let value = self.expr(inner, out);
                self.push(value, inner.ty, out);
                Value::Stack
            }
            TExprKind::Boxed(inner) => {
                let value = self.expr(inner, out);
                self.push(value, inner.ty, out);
                self.box_value(inner.ty, out);
                Value::Stack
            }
        }
    }

    fn literal(&mut self, value: &ConstValue, ty: Type, out: &mut CodeBlock) {
        let kind = self.pool.primitive_kind(ty);
        let instruction = match (value, kind) {
            (ConstValue::Unit, _) => return,
            (ConstValue::Bool(v), _) => Instruction::PushInt(i32::from(*v)),
            (ConstValue::Int(v), Some(PrimitiveKind::Int64)) => Instruction::PushLong(*v),
            (ConstValue::Int(v), _) => Instruction::PushInt(*v as i32),
            (ConstValue::Float(v), Some(PrimitiveKind::Float32)) => {
                Instruction::PushFloat(*v as f32)
            }
            (ConstValue::Float(v), _) => Instruction::PushDouble(*v),
            (ConstValue::Str(v), _) => Instruction::PushString(v.clone()),
        };
        out.push(instruction);
    }

    fn local_value(&mut self, slot: u16, ty: Type, out: &mut CodeBlock) -> Value {
        if self.pool.is_plural(ty) {
            return Value::Place(Place::Slots(slot));
        }
        if let Some(kind) = layout::stack_kind(self.pool, ty) {
            out.push(Instruction::Load(kind, slot));
        }
        Value::Stack
    }

    fn runtime_name(&self, ty: Type) -> &str {
        match self.pool.type_def(ty) {
            Some(def) => &def.runtime_name,
            None => internal_fault("runtime name of an unbound generic"),
        }
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Place of field `name` of the value `receiver` evaluates to.
    fn field_place(
        &mut self,
        receiver: &TExpr,
        owner: Type,
        name: &str,
        out: &mut CodeBlock,
    ) -> Place {
        let value = self.expr(receiver, out);
        if self.pool.is_plural(receiver.ty) {
            let place = self.to_place(value, receiver.ty, out);
            return place.field(self, receiver.ty, name);
        }
        self.push(value, receiver.ty, out);
        let slot = self.locals.temp(1);
        out.push(Instruction::Store(StackKind::Ref, slot));
        Place::Object {
            slot,
            class: self.runtime_name(owner).to_string(),
            prefix: name.to_string(),
        }
    }

    fn get_field(
        &mut self,
        receiver: &TExpr,
        owner: Type,
        name: &str,
        ty: Type,
        out: &mut CodeBlock,
    ) -> Value {
        if self.pool.is_plural(receiver.ty) || self.pool.is_plural(ty) {
            return Value::Place(self.field_place(receiver, owner, name, out));
        }
        let value = self.expr(receiver, out);
        self.push(value, receiver.ty, out);
        match layout::stack_kind(self.pool, ty) {
            Some(_) => out.push(Instruction::GetField(crate::ir::MemberRef::new(
                self.runtime_name(owner),
                name,
                self.pool.get_descriptor(ty),
            ))),
            // A Unit field has no storage
            None => out.push(Instruction::Pop),
        }
        Value::Stack
    }

    fn set_field(
        &mut self,
        receiver: &TExpr,
        owner: Type,
        name: &str,
        value: &TExpr,
        out: &mut CodeBlock,
    ) {
        if self.pool.is_plural(receiver.ty) || self.pool.is_plural(value.ty) {
            let place = self.field_place(receiver, owner, name, out);
            let source = self.expr(value, out);
            self.push(source, value.ty, out);
            self.store_place(&place, value.ty, out);
            return;
        }
        let target = self.expr(receiver, out);
        self.push(target, receiver.ty, out);
        let source = self.expr(value, out);
        self.push(source, value.ty, out);
        match layout::stack_kind(self.pool, value.ty) {
            Some(_) => out.push(Instruction::PutField(crate::ir::MemberRef::new(
                self.runtime_name(owner),
                name,
                self.pool.get_descriptor(value.ty),
            ))),
            None => out.push(Instruction::Pop),
        }
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn if_(
        &mut self,
        cond: &TExpr,
        then: &TExpr,
        otherwise: Option<&TExpr>,
        ty: Type,
        out: &mut CodeBlock,
    ) {
        let value = self.expr(cond, out);
        self.push(value, cond.ty, out);
        let end = self.labels.next();
        let Some(otherwise) = otherwise else {
            out.push(Instruction::JumpIfZero(Condition::Eq, end));
            let mut block = CodeBlock::new();
            self.branch(then, ty, &mut block);
            out.push_block(block);
            out.push(Instruction::Label(end));
            return;
        };

        let other = self.labels.next();
        out.push(Instruction::JumpIfZero(Condition::Eq, other));
        let mut block = CodeBlock::new();
        self.branch(then, ty, &mut block);
        if !then.diverges() {
            block.push(Instruction::Jump(end));
        }
        out.push_block(block);
        out.push(Instruction::Label(other));
        let mut block = CodeBlock::new();
        self.branch(otherwise, ty, &mut block);
        out.push_block(block);
        out.push(Instruction::Label(end));
    }

    /// Lower one arm of an `if` of type `ty`, leaving its leaves stacked
    /// unless the `if` is `Unit`.
    fn branch(&mut self, arm: &TExpr, ty: Type, out: &mut CodeBlock) {
        let value = self.expr(arm, out);
        if arm.diverges() {
            return;
        }
        if self.pool.is_unit(ty) {
            self.discard(value, arm.ty, out);
        } else {
            self.push(value, arm.ty, out);
        }
    }

    fn while_(&mut self, cond: &TExpr, body: &TExpr, out: &mut CodeBlock) {
        let start = self.labels.next();
        let end = self.labels.next();
        out.push(Instruction::Label(start));

        let mut test = CodeBlock::new();
        let value = self.expr(cond, &mut test);
        self.push(value, cond.ty, &mut test);
        test.push(Instruction::JumpIfZero(Condition::Eq, end));
        out.push_block(test);

        let mut block = CodeBlock::new();
        let value = self.expr(body, &mut block);
        self.discard(value, body.ty, &mut block);
        block.push(Instruction::Jump(start));
        out.push_block(block);
        out.push(Instruction::Label(end));
    }

    /// Lower a block; its value, the last expression's, ends up stacked.
    fn block(&mut self, exprs: &[TExpr], ty: Type, out: &mut CodeBlock) {
        self.locals.push_scope();
        let last = exprs.len().saturating_sub(1);
        for (index, expr) in exprs.iter().enumerate() {
            self.line(expr.span, out);
            let value = self.expr(expr, out);
            if index == last && !self.pool.is_unit(ty) {
                self.push(value, expr.ty, out);
            } else {
                self.discard(value, expr.ty, out);
            }
        }
        self.locals.pop_scope();
    }

    /// Return the stacked value of type `ret`.
    fn emit_return(&mut self, ret: Type, out: &mut CodeBlock) {
        if self.pool.is_plural(ret) {
            let leaves = layout::leaves(self.pool, ret);
            for (index, leaf) in leaves.iter().enumerate().rev() {
                out.push(Instruction::PutStatic(
                    self.symbols.scratch(self.pool, index, leaf),
                ));
            }
            out.push(Instruction::Return(None));
            return;
        }
        out.push(Instruction::Return(layout::stack_kind(self.pool, ret)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check_file;
    use crate::ir::{ArithOp, BlockItem};
    use crate::options::{CompileOptions, CompileSession};
    use crate::passes::RegistrationPass;
    use kestrel_core::ast::{Expr, Program, SourceFile, TypeDecl, TypeRef};

    fn lower_top_level(file: SourceFile) -> LoweredBody {
        let program = Program::new("main").with_file(file);
        let (registry, _) = RegistrationPass::new(&program).run().unwrap();
        let session = CompileSession::new(CompileOptions::default(), "main");
        let mut pool = TypePool::new(&registry, &session).unwrap();
        let body = check_file(&mut pool, FileId::new(0)).unwrap();
        let ids: Vec<_> = pool.types().iter().map(|def| def.id).collect();
        for id in ids {
            layout::compute_slots(&mut pool, Type::Basic(id)).unwrap();
        }
        let symbols = Symbols::build(&pool, &session);
        lower_import(&pool, &symbols, false, FileId::new(0), &body)
    }

    /// Instructions of the block that runs the top level.
    fn run_block(body: &LoweredBody) -> &CodeBlock {
        body.code
            .items()
            .iter()
            .find_map(|item| match item {
                BlockItem::Block(block) => Some(block),
                _ => None,
            })
            .unwrap()
    }

    fn flat(block: &CodeBlock) -> Vec<Instruction> {
        let mut out = Vec::new();
        for item in block.items() {
            match item {
                BlockItem::Instruction(i) => out.push(i.clone()),
                BlockItem::Block(inner) => out.extend(flat(inner)),
            }
        }
        out
    }

    #[test]
    fn folded_addition_is_a_single_push() {
        let body = lower_top_level(
            SourceFile::new("main").with_statement(Expr::let_(
                "x",
                None,
                Expr::binary(Expr::int(1), "+", Expr::int(2)),
            )),
        );
        let code = flat(run_block(&body));
        assert!(code.contains(&Instruction::PushInt(3)));
        assert!(!code.iter().any(|i| matches!(i, Instruction::Arith(..))));
        // guard set (2) + push + store + result (2)
        assert_eq!(run_block(&body).cost(), 6);
    }

    #[test]
    fn int64_arithmetic_uses_long_ops() {
        let body = lower_top_level(SourceFile::new("main").with_statement(Expr::block(vec![
            Expr::let_("a", Some(TypeRef::named("Int64")), Expr::int(2)),
            Expr::binary(Expr::local("a"), "*", Expr::local("a")),
        ])));
        let code = flat(run_block(&body));
        assert!(code.contains(&Instruction::Arith(ArithOp::Mul, StackKind::Long)));
        assert!(code.contains(&Instruction::Pop2));
    }

    #[test]
    fn value_type_local_takes_its_leaves() {
        let body = lower_top_level(
            SourceFile::new("main")
                .with_type(
                    TypeDecl::structure("Pair")
                        .with_field("a", TypeRef::named("Int"))
                        .with_field("b", TypeRef::named("Int")),
                )
                .with_statement(Expr::block(vec![
                    Expr::let_(
                        "p",
                        None,
                        Expr::new_object(TypeRef::named("Pair"), vec![Expr::int(1), Expr::int(2)]),
                    ),
                    Expr::field(Expr::local("p"), "b"),
                ])),
        );
        let code = flat(run_block(&body));
        assert!(code.contains(&Instruction::Store(StackKind::Int, 1)));
        assert!(code.contains(&Instruction::Store(StackKind::Int, 0)));
        assert!(code.contains(&Instruction::Load(StackKind::Int, 1)));
        assert_eq!(body.max_locals, 2);
    }

    #[test]
    fn while_splits_condition_and_body_blocks() {
        let body = lower_top_level(SourceFile::new("main").with_statement(Expr::block(vec![
            Expr::let_("i", None, Expr::int(0)),
            Expr::while_(
                Expr::binary(Expr::local("i"), "<", Expr::int(3)),
                Expr::assign("i", Expr::binary(Expr::local("i"), "+", Expr::int(1))),
            ),
        ])));
        let nested = run_block(&body)
            .items()
            .iter()
            .filter(|item| matches!(item, BlockItem::Block(_)))
            .count();
        assert_eq!(nested, 2);
    }
}
