//! Calls, builtin operations, boxing and construction.

use kestrel_core::ast::NativeDispatch;
use kestrel_core::{MethodInstanceId, PrimitiveKind, StackKind, internal_fault};
use kestrel_registry::BuiltinOp;

use super::MethodEmitter;
use super::place::Value;
use crate::backend::names::{OBJECT_CLASS, is_static_on_target};
use crate::check::TExpr;
use crate::ir::{ArithOp, CodeBlock, Condition, Instruction, InvokeKind, MemberRef, Narrow};
use crate::layout;
use crate::types::{MethodKind, Type, TypeDefKind};

const PRINT_STREAM: &str = "java/io/PrintStream";
const STRING_CLASS: &str = "java/lang/String";

/// Truncation restoring a sub-word kind after int arithmetic.
fn narrow_for(kind: PrimitiveKind) -> Option<Narrow> {
    match kind {
        PrimitiveKind::Int8 => Some(Narrow::Byte),
        PrimitiveKind::Int16 => Some(Narrow::Short),
        PrimitiveKind::UInt16 => Some(Narrow::Char),
        PrimitiveKind::UInt8 => Some(Narrow::UnsignedByte),
        _ => None,
    }
}

fn condition(op: BuiltinOp) -> Condition {
    match op {
        BuiltinOp::Eq => Condition::Eq,
        BuiltinOp::Ne => Condition::Ne,
        BuiltinOp::Lt => Condition::Lt,
        BuiltinOp::Le => Condition::Le,
        BuiltinOp::Gt => Condition::Gt,
        BuiltinOp::Ge => Condition::Ge,
        _ => internal_fault(format_args!("{op:?} is not a comparison")),
    }
}

impl MethodEmitter<'_, '_> {
    pub(super) fn call(
        &mut self,
        method: MethodInstanceId,
        receiver: Option<&TExpr>,
        args: &[TExpr],
        out: &mut CodeBlock,
    ) -> Value {
        let pool = self.pool;
        let def = pool.method(method);
        let ret = def.ret;
        match &def.kind {
            MethodKind::Builtin(op) | MethodKind::Folding(op) => {
                self.builtin(*op, receiver, args, out);
                Value::Stack
            }
            MethodKind::Native(native) => {
                let member = MemberRef::new(&native.owner, &native.name, &native.descriptor);
                let kind = match native.dispatch {
                    NativeDispatch::Static => InvokeKind::Static,
                    NativeDispatch::Virtual => InvokeKind::Virtual,
                    NativeDispatch::Interface => InvokeKind::Interface,
                };
                self.operands(receiver, args, out);
                out.push(Instruction::Invoke(kind, member));
                Value::Stack
            }
            MethodKind::Source | MethodKind::Interface => {
                let kind = if is_static_on_target(self.pool, method) {
                    InvokeKind::Static
                } else if pool.get(def.owner).kind == TypeDefKind::Interface {
                    InvokeKind::Interface
                } else {
                    InvokeKind::Virtual
                };
                self.operands(receiver, args, out);
                out.push(Instruction::Invoke(kind, self.symbols.method(method).clone()));
                if self.pool.is_plural(ret) {
                    self.reload_result(ret, out);
                }
                Value::Stack
            }
        }
    }

    fn operands(&mut self, receiver: Option<&TExpr>, args: &[TExpr], out: &mut CodeBlock) {
        for operand in receiver.into_iter().chain(args) {
            let value = self.expr(operand, out);
            self.push(value, operand.ty, out);
        }
    }

    /// Push the leaves a value-type result left in the scratch statics.
    fn reload_result(&mut self, ret: Type, out: &mut CodeBlock) {
        for (index, leaf) in layout::leaves(self.pool, ret).iter().enumerate() {
            out.push(Instruction::GetStatic(
                self.symbols.scratch(self.pool, index, leaf),
            ));
            if leaf.kind == StackKind::Ref {
                let class = self.runtime_name(leaf.ty);
                if class != OBJECT_CLASS {
                    out.push(Instruction::CheckCast(class.to_string()));
                }
            }
        }
    }

    // ========================================================================
    // Builtins
    // ========================================================================

    fn builtin(
        &mut self,
        op: BuiltinOp,
        receiver: Option<&TExpr>,
        args: &[TExpr],
        out: &mut CodeBlock,
    ) {
        match op {
            BuiltinOp::Println => {
                out.push(Instruction::GetStatic(MemberRef::new(
                    "java/lang/System",
                    "out",
                    format!("L{PRINT_STREAM};"),
                )));
                self.operands(receiver, args, out);
                out.push(Instruction::Invoke(
                    InvokeKind::Virtual,
                    MemberRef::new(PRINT_STREAM, "println", format!("(L{OBJECT_CLASS};)V")),
                ));
            }
            BuiltinOp::Concat => {
                self.operands(receiver, args, out);
                out.push(Instruction::Invoke(
                    InvokeKind::Virtual,
                    MemberRef::new(
                        STRING_CLASS,
                        "concat",
                        format!("(L{STRING_CLASS};)L{STRING_CLASS};"),
                    ),
                ));
            }
            BuiltinOp::StrEq => {
                self.operands(receiver, args, out);
                out.push(Instruction::Invoke(
                    InvokeKind::Virtual,
                    MemberRef::new(STRING_CLASS, "equals", format!("(L{OBJECT_CLASS};)Z")),
                ));
            }
            op => {
                let Some(receiver) = receiver else {
                    internal_fault(format_args!("{op:?} without a receiver"));
                };
                let Some(kind) = self.pool.primitive_kind(receiver.ty) else {
                    internal_fault(format_args!("{op:?} on a non-primitive receiver"));
                };
                self.operands(Some(receiver), args, out);
                self.primitive_op(op, kind, out);
            }
        }
    }

    /// Instructions for `op` on operands of `kind` already on the stack.
    fn primitive_op(&mut self, op: BuiltinOp, kind: PrimitiveKind, out: &mut CodeBlock) {
        let Some(stack) = kind.stack_kind() else {
            internal_fault("operation on Unit");
        };
        let arith = match op {
            BuiltinOp::Add => Some(ArithOp::Add),
            BuiltinOp::Sub => Some(ArithOp::Sub),
            BuiltinOp::Mul => Some(ArithOp::Mul),
            BuiltinOp::Div => Some(ArithOp::Div),
            BuiltinOp::Rem => Some(ArithOp::Rem),
            BuiltinOp::Neg => Some(ArithOp::Neg),
            _ => None,
        };
        if let Some(arith) = arith {
            out.push(Instruction::Arith(arith, stack));
            if let Some(narrow) = narrow_for(kind) {
                out.push(Instruction::Narrow(narrow));
            }
            return;
        }
        match op {
            BuiltinOp::And => out.push(Instruction::Arith(ArithOp::And, stack)),
            BuiltinOp::Or => out.push(Instruction::Arith(ArithOp::Or, stack)),
            BuiltinOp::Xor => out.push(Instruction::Arith(ArithOp::Xor, stack)),
            BuiltinOp::Not => {
                out.push(Instruction::PushInt(1));
                out.push(Instruction::Arith(ArithOp::Xor, StackKind::Int));
            }
            BuiltinOp::Convert(target) => self.convert(kind, target, out),
            op if op.is_comparison() => self.compare(condition(op), stack, out),
            op => internal_fault(format_args!("{op:?} on {kind}")),
        }
    }

    fn convert(&mut self, from: PrimitiveKind, to: PrimitiveKind, out: &mut CodeBlock) {
        if from == to {
            return;
        }
        let (Some(source), Some(target)) = (from.stack_kind(), to.stack_kind()) else {
            internal_fault("conversion involving Unit");
        };
        if source != target {
            out.push(Instruction::Convert {
                from: source,
                to: target,
            });
        }
        if let Some(narrow) = narrow_for(to) {
            out.push(Instruction::Narrow(narrow));
        }
    }

    /// Replace the two operands with a `Bool`. NaN operands compare false
    /// except under `!=`.
    fn compare(&mut self, condition: Condition, stack: StackKind, out: &mut CodeBlock) {
        let otherwise = self.labels.next();
        let end = self.labels.next();
        match stack {
            StackKind::Int => {
                out.push(Instruction::JumpIfCompare(condition.negate(), otherwise));
            }
            StackKind::Long => {
                out.push(Instruction::LongCompare);
                out.push(Instruction::JumpIfZero(condition.negate(), otherwise));
            }
            StackKind::Float | StackKind::Double => {
                let nan_greater = matches!(condition, Condition::Lt | Condition::Le);
                out.push(Instruction::FloatCompare {
                    kind: stack,
                    nan_greater,
                });
                out.push(Instruction::JumpIfZero(condition.negate(), otherwise));
            }
            StackKind::Ref => internal_fault("primitive comparison of references"),
        }
        out.push(Instruction::PushInt(1));
        out.push(Instruction::Jump(end));
        out.push(Instruction::Label(otherwise));
        out.push(Instruction::PushInt(0));
        out.push(Instruction::Label(end));
    }

    // ========================================================================
    // Boxing and construction
    // ========================================================================

    /// Box the stacked primitive of type `ty` for use as `Any`.
    pub(super) fn box_value(&mut self, ty: Type, out: &mut CodeBlock) {
        let Some(kind) = self.pool.primitive_kind(ty) else {
            return;
        };
        let Some(class) = kind.box_class() else {
            // Unit boxes to null
            out.push(Instruction::PushNull);
            return;
        };
        // Unsigned kinds widen to int so they print as numbers
        let descriptor = match kind {
            PrimitiveKind::UInt8 | PrimitiveKind::UInt16 => "I",
            _ => kind.descriptor(),
        };
        out.push(Instruction::Invoke(
            InvokeKind::Static,
            MemberRef::new(class, "valueOf", format!("({descriptor})L{class};")),
        ));
    }

    /// Construct a class instance or a value-type value.
    ///
    /// Field values are evaluated before the object is allocated, so no
    /// uninitialized object is live across the control flow inside them.
    pub(super) fn new_value(&mut self, ty: Type, args: &[TExpr], out: &mut CodeBlock) -> Value {
        self.locals.push_scope();
        if self.pool.is_plural(ty) {
            // Leaves of consecutive fields are consecutive leaves
            self.operands(None, args, out);
            self.locals.pop_scope();
            return Value::Stack;
        }

        let mut temps = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.expr(arg, out);
            self.push(value, arg.ty, out);
            let slot = self.locals.temp(layout::slots(self.pool, arg.ty));
            self.store_place(&super::Place::Slots(slot), arg.ty, out);
            temps.push(slot);
        }

        let class = self.runtime_name(ty).to_string();
        out.push(Instruction::New(class.clone()));
        out.push(Instruction::Dup);
        out.push(Instruction::Invoke(
            InvokeKind::Special,
            MemberRef::new(&class, "<init>", "()V"),
        ));

        let fields: Vec<(Type, String, Type)> = self
            .pool
            .all_instance_fields(ty)
            .into_iter()
            .map(|field| (Type::Basic(field.owner), field.name.clone(), field.ty))
            .collect();
        for ((owner, name, field_ty), slot) in fields.into_iter().zip(temps) {
            let owner = self.runtime_name(owner).to_string();
            for leaf in layout::leaves(self.pool, field_ty) {
                out.push(Instruction::Dup);
                out.push(Instruction::Load(leaf.kind, slot + leaf.offset));
                out.push(Instruction::PutField(MemberRef::new(
                    &owner,
                    leaf.name(&name),
                    self.pool.get_descriptor(leaf.ty),
                )));
            }
        }
        self.locals.pop_scope();
        Value::Stack
    }
}
