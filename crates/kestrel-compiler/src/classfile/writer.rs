//! Class-file serialization.
//!
//! Output targets format version 49.0, the last one verified by type
//! inference, so no stack map frames are written. Jumps use 16-bit offsets
//! where they fit and `goto_w` where they do not; a conditional jump that is
//! too far becomes the negated branch over a `goto_w`.

use kestrel_core::{CompilationError, StackKind, internal_fault};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use super::constant_pool::{Constant, ConstantPool};
use super::descriptor::MethodShape;
use super::opcode::Opcode;
use super::stack::max_stack;
use super::{ClassModel, CodeModel, MethodModel};
use crate::ir::{ArithOp, Condition, Instruction, InvokeKind, Label, MemberRef, Narrow};

const MAGIC: u32 = 0xCAFE_BABE;
const MAJOR_VERSION: u16 = 49;
const MINOR_VERSION: u16 = 0;
const MAX_CODE_LEN: usize = 65535;

type Result<T> = std::result::Result<T, CompilationError>;

/// Serialize one class.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn write_class(class: &ClassModel) -> Result<Vec<u8>> {
    let mut pool = ConstantPool::new();
    let overflow = || CompilationError::CodeTooLarge {
        method: class.name.clone(),
        span: class.span,
    };

    let mut body = Vec::new();
    put_u16(&mut body, class.access.bits());
    put_u16(&mut body, pool.class(&class.name).ok_or_else(overflow)?);
    put_u16(&mut body, pool.class(&class.super_name).ok_or_else(overflow)?);
    put_u16(&mut body, class.interfaces.len() as u16);
    for interface in &class.interfaces {
        put_u16(&mut body, pool.class(interface).ok_or_else(overflow)?);
    }

    put_u16(&mut body, class.fields.len() as u16);
    for field in &class.fields {
        put_u16(&mut body, field.access.bits());
        put_u16(&mut body, pool.utf8(&field.name).ok_or_else(overflow)?);
        put_u16(&mut body, pool.utf8(&field.descriptor).ok_or_else(overflow)?);
        put_u16(&mut body, 0);
    }

    put_u16(&mut body, class.methods.len() as u16);
    for method in &class.methods {
        write_method(&mut pool, method, &mut body)?;
    }

    // No class attributes
    put_u16(&mut body, 0);

    let mut out = Vec::with_capacity(body.len() + 1024);
    out.extend_from_slice(&MAGIC.to_be_bytes());
    put_u16(&mut out, MINOR_VERSION);
    put_u16(&mut out, MAJOR_VERSION);
    put_u16(&mut out, pool.count());
    pool.write(&mut out);
    out.extend_from_slice(&body);
    trace!(class = %class.name, bytes = out.len(), "wrote class");
    Ok(out)
}

fn write_method(pool: &mut ConstantPool, method: &MethodModel, out: &mut Vec<u8>) -> Result<()> {
    let too_large = || CompilationError::CodeTooLarge {
        method: method.label.clone(),
        span: method.span,
    };

    put_u16(out, method.access.bits());
    put_u16(out, pool.utf8(&method.name).ok_or_else(too_large)?);
    put_u16(out, pool.utf8(&method.descriptor).ok_or_else(too_large)?);

    let attributes =
        usize::from(method.code.is_some()) + usize::from(!method.exceptions.is_empty());
    put_u16(out, attributes as u16);

    if let Some(code) = &method.code {
        write_code(pool, code, out).map_err(|_| too_large())?;
    }

    if !method.exceptions.is_empty() {
        put_u16(out, pool.utf8("Exceptions").ok_or_else(too_large)?);
        put_u32(out, 2 + 2 * method.exceptions.len() as u32);
        put_u16(out, method.exceptions.len() as u16);
        for exception in &method.exceptions {
            put_u16(out, pool.class(exception).ok_or_else(too_large)?);
        }
    }
    Ok(())
}

/// The code or the pool ran out of 16-bit room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooLarge;

fn write_code(
    pool: &mut ConstantPool,
    code: &CodeModel,
    out: &mut Vec<u8>,
) -> std::result::Result<(), TooLarge> {
    let max_stack = max_stack(&code.instructions);
    let assembled = assemble(pool, &code.instructions)?;

    let has_lines = !assembled.lines.is_empty();
    let lines_len = if has_lines {
        8 + 4 * assembled.lines.len() as u32
    } else {
        0
    };

    put_u16(out, pool.utf8("Code").ok_or(TooLarge)?);
    put_u32(out, 12 + assembled.code.len() as u32 + lines_len);
    put_u16(out, max_stack);
    put_u16(out, code.max_locals);
    put_u32(out, assembled.code.len() as u32);
    out.extend_from_slice(&assembled.code);
    // No exception handlers
    put_u16(out, 0);

    if has_lines {
        put_u16(out, 1);
        put_u16(out, pool.utf8("LineNumberTable").ok_or(TooLarge)?);
        put_u32(out, 2 + 4 * assembled.lines.len() as u32);
        put_u16(out, assembled.lines.len() as u16);
        for (pc, line) in &assembled.lines {
            put_u16(out, *pc);
            put_u16(out, *line);
        }
    } else {
        put_u16(out, 0);
    }
    Ok(())
}

// ============================================================================
// Assembly
// ============================================================================

/// Machine code of one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub code: Vec<u8>,
    /// `(pc, line)` pairs in code order.
    pub lines: Vec<(u16, u16)>,
}

/// Encode instructions into machine code.
///
/// Jumps start out short. Each pass widens the jumps whose offsets did not
/// fit and assembles again; widening only grows the set, so this settles.
pub fn assemble(
    pool: &mut ConstantPool,
    instructions: &[Instruction],
) -> std::result::Result<Assembled, TooLarge> {
    let mut far = FxHashSet::default();
    loop {
        let mut asm = Assembler {
            pool: &mut *pool,
            far: &far,
            current: 0,
            code: Vec::new(),
            labels: FxHashMap::default(),
            fixups: Vec::new(),
            lines: Vec::new(),
        };
        for (index, instruction) in instructions.iter().enumerate() {
            asm.current = index;
            asm.instruction(instruction)?;
        }
        if asm.code.len() > MAX_CODE_LEN {
            return Err(TooLarge);
        }
        let widen = asm.patch();
        if widen.is_empty() {
            return Ok(Assembled {
                code: asm.code,
                lines: asm.lines,
            });
        }
        trace!(jumps = widen.len(), "widening far jumps");
        far.extend(widen);
    }
}

/// A jump whose offset is written once every label is placed.
struct Fixup {
    /// Start of the `goto`, `goto_w` or `if*` the offset belongs to.
    at: usize,
    label: Label,
    /// Index of the jump in the instruction list.
    index: usize,
    wide: bool,
}

struct Assembler<'p> {
    pool: &'p mut ConstantPool,
    /// Jumps, by instruction index, that need a 32-bit offset.
    far: &'p FxHashSet<usize>,
    current: usize,
    code: Vec<u8>,
    labels: FxHashMap<Label, usize>,
    fixups: Vec<Fixup>,
    lines: Vec<(u16, u16)>,
}

impl Assembler<'_> {
    fn op(&mut self, op: Opcode) {
        self.code.push(op.into());
    }

    fn op_u16(&mut self, op: Opcode, operand: u16) {
        self.op(op);
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    fn instruction(&mut self, instruction: &Instruction) -> std::result::Result<(), TooLarge> {
        match instruction {
            Instruction::Label(label) => {
                self.labels.insert(*label, self.code.len());
            }
            Instruction::LineNumber(line) => {
                let pc = u16::try_from(self.code.len()).map_err(|_| TooLarge)?;
                let line = u16::try_from(*line).unwrap_or(u16::MAX);
                match self.lines.last_mut() {
                    Some(last) if last.0 == pc => last.1 = line,
                    _ => self.lines.push((pc, line)),
                }
            }
            Instruction::PushInt(value) => self.push_int(*value)?,
            Instruction::PushLong(value) => match value {
                0 => self.op(Opcode::Lconst0),
                1 => self.op(Opcode::Lconst1),
                _ => self.ldc2(Constant::Long(*value))?,
            },
            Instruction::PushFloat(value) => match value.to_bits() {
                0 => self.op(Opcode::Fconst0),
                bits if bits == 1.0f32.to_bits() => self.op(Opcode::Fconst1),
                bits if bits == 2.0f32.to_bits() => self.op(Opcode::Fconst2),
                _ => {
                    let idx = self.pool.add(Constant::Float(*value)).ok_or(TooLarge)?;
                    self.ldc(idx);
                }
            },
            Instruction::PushDouble(value) => match value.to_bits() {
                0 => self.op(Opcode::Dconst0),
                bits if bits == 1.0f64.to_bits() => self.op(Opcode::Dconst1),
                _ => self.ldc2(Constant::Double(*value))?,
            },
            Instruction::PushString(text) => {
                let idx = self.pool.string(text).ok_or(TooLarge)?;
                self.ldc(idx);
            }
            Instruction::PushNull => self.op(Opcode::AconstNull),
            Instruction::Load(kind, slot) => self.local(load_op(*kind), *slot),
            Instruction::Store(kind, slot) => self.local(store_op(*kind), *slot),
            Instruction::Pop => self.op(Opcode::Pop),
            Instruction::Pop2 => self.op(Opcode::Pop2),
            Instruction::Dup => self.op(Opcode::Dup),
            Instruction::Swap => self.op(Opcode::Swap),
            Instruction::DupX2 => self.op(Opcode::DupX2),
            Instruction::Arith(op, kind) => self.op(arith_op(*op, *kind)),
            Instruction::Narrow(narrow) => match narrow {
                Narrow::Byte => self.op(Opcode::I2b),
                Narrow::Short => self.op(Opcode::I2s),
                Narrow::Char => self.op(Opcode::I2c),
                Narrow::UnsignedByte => {
                    self.op_u16(Opcode::Sipush, 0xff);
                    self.op(Opcode::Iand);
                }
            },
            Instruction::Convert { from, to } => {
                if let Some(op) = convert_op(*from, *to) {
                    self.op(op);
                }
            }
            Instruction::LongCompare => self.op(Opcode::Lcmp),
            Instruction::FloatCompare { kind, nan_greater } => self.op(match (kind, nan_greater) {
                (StackKind::Float, true) => Opcode::Fcmpg,
                (StackKind::Float, false) => Opcode::Fcmpl,
                (StackKind::Double, true) => Opcode::Dcmpg,
                (StackKind::Double, false) => Opcode::Dcmpl,
                (kind, _) => internal_fault(format_args!("float compare of {kind:?}")),
            }),
            Instruction::Jump(label) => self.jump(Opcode::Goto, *label),
            Instruction::JumpIfZero(condition, label) => self.jump(
                match condition {
                    Condition::Eq => Opcode::Ifeq,
                    Condition::Ne => Opcode::Ifne,
                    Condition::Lt => Opcode::Iflt,
                    Condition::Ge => Opcode::Ifge,
                    Condition::Gt => Opcode::Ifgt,
                    Condition::Le => Opcode::Ifle,
                },
                *label,
            ),
            Instruction::JumpIfCompare(condition, label) => self.jump(
                match condition {
                    Condition::Eq => Opcode::IfIcmpeq,
                    Condition::Ne => Opcode::IfIcmpne,
                    Condition::Lt => Opcode::IfIcmplt,
                    Condition::Ge => Opcode::IfIcmpge,
                    Condition::Gt => Opcode::IfIcmpgt,
                    Condition::Le => Opcode::IfIcmple,
                },
                *label,
            ),
            Instruction::Return(kind) => self.op(match kind {
                None => Opcode::Return,
                Some(StackKind::Int) => Opcode::Ireturn,
                Some(StackKind::Long) => Opcode::Lreturn,
                Some(StackKind::Float) => Opcode::Freturn,
                Some(StackKind::Double) => Opcode::Dreturn,
                Some(StackKind::Ref) => Opcode::Areturn,
            }),
            Instruction::New(class) => {
                let idx = self.pool.class(class).ok_or(TooLarge)?;
                self.op_u16(Opcode::New, idx);
            }
            Instruction::CheckCast(class) => {
                let idx = self.pool.class(class).ok_or(TooLarge)?;
                self.op_u16(Opcode::Checkcast, idx);
            }
            Instruction::GetField(member) => self.field(Opcode::Getfield, member)?,
            Instruction::PutField(member) => self.field(Opcode::Putfield, member)?,
            Instruction::GetStatic(member) => self.field(Opcode::Getstatic, member)?,
            Instruction::PutStatic(member) => self.field(Opcode::Putstatic, member)?,
            Instruction::Invoke(kind, member) => self.invoke(*kind, member)?,
        }
        Ok(())
    }

    fn push_int(&mut self, value: i32) -> std::result::Result<(), TooLarge> {
        match value {
            -1..=5 => self.code.push((i32::from(u8::from(Opcode::Iconst0)) + value) as u8),
            -128..=127 => {
                self.op(Opcode::Bipush);
                self.code.push(value as i8 as u8);
            }
            -32768..=32767 => self.op_u16(Opcode::Sipush, value as i16 as u16),
            _ => {
                let idx = self.pool.add(Constant::Integer(value)).ok_or(TooLarge)?;
                self.ldc(idx);
            }
        }
        Ok(())
    }

    fn ldc(&mut self, idx: u16) {
        match u8::try_from(idx) {
            Ok(short) => {
                self.op(Opcode::Ldc);
                self.code.push(short);
            }
            Err(_) => self.op_u16(Opcode::LdcW, idx),
        }
    }

    fn ldc2(&mut self, constant: Constant) -> std::result::Result<(), TooLarge> {
        let idx = self.pool.add(constant).ok_or(TooLarge)?;
        self.op_u16(Opcode::Ldc2W, idx);
        Ok(())
    }

    /// `base` is the long form; the `_<n>` shorthands sit at fixed offsets.
    fn local(&mut self, base: Opcode, slot: u16) {
        let short_base = match base {
            Opcode::Iload => Opcode::Iload0,
            Opcode::Lload => Opcode::Lload0,
            Opcode::Fload => Opcode::Fload0,
            Opcode::Dload => Opcode::Dload0,
            Opcode::Aload => Opcode::Aload0,
            Opcode::Istore => Opcode::Istore0,
            Opcode::Lstore => Opcode::Lstore0,
            Opcode::Fstore => Opcode::Fstore0,
            Opcode::Dstore => Opcode::Dstore0,
            Opcode::Astore => Opcode::Astore0,
            other => internal_fault(format_args!("{other:?} is not a local access")),
        };
        if let Some(byte) = Opcode::short_local(short_base, slot) {
            self.code.push(byte);
        } else if let Ok(short) = u8::try_from(slot) {
            self.op(base);
            self.code.push(short);
        } else {
            self.op(Opcode::Wide);
            self.op_u16(base, slot);
        }
    }

    fn jump(&mut self, op: Opcode, label: Label) {
        let wide = self.far.contains(&self.current);
        if wide && op != Opcode::Goto {
            // Skip the 5-byte goto_w when the condition does not hold
            self.op_u16(op.negated(), 8);
        }
        self.fixups.push(Fixup {
            at: self.code.len(),
            label,
            index: self.current,
            wide,
        });
        if wide {
            self.op(Opcode::GotoW);
            self.code.extend_from_slice(&0i32.to_be_bytes());
        } else {
            self.op_u16(op, 0);
        }
    }

    /// Write every jump offset; returns the jumps that need widening.
    fn patch(&mut self) -> Vec<usize> {
        let mut widen = Vec::new();
        for fixup in std::mem::take(&mut self.fixups) {
            let Some(&target) = self.labels.get(&fixup.label) else {
                internal_fault(format_args!("jump to unplaced label {}", fixup.label));
            };
            let offset = target as i64 - fixup.at as i64;
            let operand = fixup.at + 1;
            if fixup.wide {
                // Code is at most 64KB, so the offset always fits
                let offset = offset as i32;
                self.code[operand..operand + 4].copy_from_slice(&offset.to_be_bytes());
            } else if let Ok(offset) = i16::try_from(offset) {
                self.code[operand..operand + 2].copy_from_slice(&offset.to_be_bytes());
            } else {
                widen.push(fixup.index);
            }
        }
        widen
    }

    fn field(&mut self, op: Opcode, member: &MemberRef) -> std::result::Result<(), TooLarge> {
        let idx = self
            .pool
            .field(&member.owner, &member.name, &member.descriptor)
            .ok_or(TooLarge)?;
        self.op_u16(op, idx);
        Ok(())
    }

    fn invoke(
        &mut self,
        kind: InvokeKind,
        member: &MemberRef,
    ) -> std::result::Result<(), TooLarge> {
        let interface = kind == InvokeKind::Interface;
        let idx = self
            .pool
            .method(&member.owner, &member.name, &member.descriptor, interface)
            .ok_or(TooLarge)?;
        match kind {
            InvokeKind::Static => self.op_u16(Opcode::Invokestatic, idx),
            InvokeKind::Virtual => self.op_u16(Opcode::Invokevirtual, idx),
            InvokeKind::Special => self.op_u16(Opcode::Invokespecial, idx),
            InvokeKind::Interface => {
                let words = MethodShape::parse(&member.descriptor).param_words() + 1;
                self.op_u16(Opcode::Invokeinterface, idx);
                self.code.push(words as u8);
                self.code.push(0);
            }
        }
        Ok(())
    }
}

fn load_op(kind: StackKind) -> Opcode {
    match kind {
        StackKind::Int => Opcode::Iload,
        StackKind::Long => Opcode::Lload,
        StackKind::Float => Opcode::Fload,
        StackKind::Double => Opcode::Dload,
        StackKind::Ref => Opcode::Aload,
    }
}

fn store_op(kind: StackKind) -> Opcode {
    match kind {
        StackKind::Int => Opcode::Istore,
        StackKind::Long => Opcode::Lstore,
        StackKind::Float => Opcode::Fstore,
        StackKind::Double => Opcode::Dstore,
        StackKind::Ref => Opcode::Astore,
    }
}

fn arith_op(op: ArithOp, kind: StackKind) -> Opcode {
    use StackKind::*;
    match (op, kind) {
        (ArithOp::Add, Int) => Opcode::Iadd,
        (ArithOp::Add, Long) => Opcode::Ladd,
        (ArithOp::Add, Float) => Opcode::Fadd,
        (ArithOp::Add, Double) => Opcode::Dadd,
        (ArithOp::Sub, Int) => Opcode::Isub,
        (ArithOp::Sub, Long) => Opcode::Lsub,
        (ArithOp::Sub, Float) => Opcode::Fsub,
        (ArithOp::Sub, Double) => Opcode::Dsub,
        (ArithOp::Mul, Int) => Opcode::Imul,
        (ArithOp::Mul, Long) => Opcode::Lmul,
        (ArithOp::Mul, Float) => Opcode::Fmul,
        (ArithOp::Mul, Double) => Opcode::Dmul,
        (ArithOp::Div, Int) => Opcode::Idiv,
        (ArithOp::Div, Long) => Opcode::Ldiv,
        (ArithOp::Div, Float) => Opcode::Fdiv,
        (ArithOp::Div, Double) => Opcode::Ddiv,
        (ArithOp::Rem, Int) => Opcode::Irem,
        (ArithOp::Rem, Long) => Opcode::Lrem,
        (ArithOp::Rem, Float) => Opcode::Frem,
        (ArithOp::Rem, Double) => Opcode::Drem,
        (ArithOp::Neg, Int) => Opcode::Ineg,
        (ArithOp::Neg, Long) => Opcode::Lneg,
        (ArithOp::Neg, Float) => Opcode::Fneg,
        (ArithOp::Neg, Double) => Opcode::Dneg,
        (ArithOp::And, Int) => Opcode::Iand,
        (ArithOp::And, Long) => Opcode::Land,
        (ArithOp::Or, Int) => Opcode::Ior,
        (ArithOp::Or, Long) => Opcode::Lor,
        (ArithOp::Xor, Int) => Opcode::Ixor,
        (ArithOp::Xor, Long) => Opcode::Lxor,
        (op, kind) => internal_fault(format_args!("no {op:?} on {kind:?}")),
    }
}

fn convert_op(from: StackKind, to: StackKind) -> Option<Opcode> {
    use StackKind::*;
    match (from, to) {
        (a, b) if a == b => None,
        (Int, Long) => Some(Opcode::I2l),
        (Int, Float) => Some(Opcode::I2f),
        (Int, Double) => Some(Opcode::I2d),
        (Long, Int) => Some(Opcode::L2i),
        (Long, Float) => Some(Opcode::L2f),
        (Long, Double) => Some(Opcode::L2d),
        (Float, Int) => Some(Opcode::F2i),
        (Float, Long) => Some(Opcode::F2l),
        (Float, Double) => Some(Opcode::F2d),
        (Double, Int) => Some(Opcode::D2i),
        (Double, Long) => Some(Opcode::D2l),
        (Double, Float) => Some(Opcode::D2f),
        (from, to) => internal_fault(format_args!("no conversion from {from:?} to {to:?}")),
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
