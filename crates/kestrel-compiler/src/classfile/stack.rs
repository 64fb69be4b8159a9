//! Operand stack depth analysis.
//!
//! Walks every path through a linearized body, tracking the stack depth in
//! words. Paths meeting at a label must agree on the depth.

use kestrel_core::{StackKind, internal_fault};
use rustc_hash::FxHashMap;

use super::descriptor::{MethodShape, field_kind};
use crate::ir::{ArithOp, Instruction, InvokeKind, Label, Narrow};

/// Change in stack depth, and the words briefly needed above the result.
fn effect(instruction: &Instruction) -> (i32, u16) {
    let words = |kind: StackKind| i32::from(kind.width());
    let field = |descriptor: &str| field_kind(descriptor).map_or(0, words);
    match instruction {
        Instruction::Label(_) | Instruction::LineNumber(_) => (0, 0),
        Instruction::PushInt(_)
        | Instruction::PushFloat(_)
        | Instruction::PushString(_)
        | Instruction::PushNull => (1, 0),
        Instruction::PushLong(_) | Instruction::PushDouble(_) => (2, 0),
        Instruction::Load(kind, _) => (words(*kind), 0),
        Instruction::Store(kind, _) => (-words(*kind), 0),
        Instruction::Pop => (-1, 0),
        Instruction::Pop2 => (-2, 0),
        Instruction::Dup | Instruction::DupX2 => (1, 0),
        Instruction::Swap => (0, 0),
        Instruction::Arith(ArithOp::Neg, _) => (0, 0),
        Instruction::Arith(_, kind) => (-words(*kind), 0),
        // The mask is pushed before `iand`
        Instruction::Narrow(Narrow::UnsignedByte) => (0, 1),
        Instruction::Narrow(_) => (0, 0),
        Instruction::Convert { from, to } => (words(*to) - words(*from), 0),
        Instruction::LongCompare => (-3, 0),
        Instruction::FloatCompare { kind, .. } => (1 - 2 * words(*kind), 0),
        Instruction::Jump(_) => (0, 0),
        Instruction::JumpIfZero(..) => (-1, 0),
        Instruction::JumpIfCompare(..) => (-2, 0),
        Instruction::Return(kind) => (-kind.map_or(0, words), 0),
        Instruction::New(_) => (1, 0),
        Instruction::CheckCast(_) => (0, 0),
        Instruction::GetField(member) => (field(&member.descriptor) - 1, 0),
        Instruction::PutField(member) => (-field(&member.descriptor) - 1, 0),
        Instruction::GetStatic(member) => (field(&member.descriptor), 0),
        Instruction::PutStatic(member) => (-field(&member.descriptor), 0),
        Instruction::Invoke(kind, member) => {
            let shape = MethodShape::parse(&member.descriptor);
            let receiver = i32::from(*kind != InvokeKind::Static);
            (
                i32::from(shape.ret_words()) - i32::from(shape.param_words()) - receiver,
                0,
            )
        }
    }
}

/// Maximum operand stack depth, in words, of a linearized body.
pub fn max_stack(instructions: &[Instruction]) -> u16 {
    let labels: FxHashMap<Label, usize> = instructions
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| match instr {
            Instruction::Label(label) => Some((*label, i)),
            _ => None,
        })
        .collect();

    let mut depths: Vec<Option<i32>> = vec![None; instructions.len()];
    let mut work = Vec::new();
    reach(&mut depths, &mut work, 0, 0);
    let mut max = 0i32;

    while let Some((at, depth)) = work.pop() {
        let instruction = &instructions[at];
        let (delta, extra) = effect(instruction);
        let after = depth + delta;
        if after < 0 {
            internal_fault(format_args!("stack underflow at instruction {at}"));
        }
        max = max.max(after).max(depth + i32::from(extra));
        if let Some(target) = instruction.target() {
            let Some(&index) = labels.get(&target) else {
                internal_fault(format_args!("jump to unplaced label {target}"));
            };
            reach(&mut depths, &mut work, index, after);
        }
        if !instruction.is_terminal() {
            reach(&mut depths, &mut work, at + 1, after);
        }
    }

    u16::try_from(max).unwrap_or(u16::MAX)
}

fn reach(depths: &mut [Option<i32>], work: &mut Vec<(usize, i32)>, at: usize, depth: i32) {
    let Some(slot) = depths.get_mut(at) else {
        return;
    };
    match *slot {
        Some(seen) if seen == depth => {}
        Some(seen) => internal_fault(format_args!(
            "stack depth {depth} meets {seen} at instruction {at}"
        )),
        None => {
            *slot = Some(depth);
            work.push((at, depth));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Condition, MemberRef};

    #[test]
    fn straight_line() {
        let code = vec![
            Instruction::PushLong(1),
            Instruction::PushLong(2),
            Instruction::Arith(ArithOp::Add, StackKind::Long),
            Instruction::Return(Some(StackKind::Long)),
        ];
        assert_eq!(max_stack(&code), 4);
    }

    #[test]
    fn branches_merge() {
        let (els, end) = (Label(0), Label(1));
        let code = vec![
            Instruction::Load(StackKind::Int, 0),
            Instruction::JumpIfZero(Condition::Eq, els),
            Instruction::PushInt(1),
            Instruction::Jump(end),
            Instruction::Label(els),
            Instruction::PushInt(0),
            Instruction::Label(end),
            Instruction::Return(Some(StackKind::Int)),
        ];
        assert_eq!(max_stack(&code), 1);
    }

    #[test]
    fn invoke_pops_arguments() {
        let call = MemberRef::new("a/B", "f", "(IJ)J");
        let code = vec![
            Instruction::Load(StackKind::Ref, 0),
            Instruction::PushInt(1),
            Instruction::PushLong(2),
            Instruction::Invoke(InvokeKind::Virtual, call),
            Instruction::Pop2,
            Instruction::Return(None),
        ];
        assert_eq!(max_stack(&code), 4);
    }

    #[test]
    fn unsigned_narrow_needs_a_word() {
        let code = vec![
            Instruction::PushInt(300),
            Instruction::Narrow(Narrow::UnsignedByte),
            Instruction::Return(Some(StackKind::Int)),
        ];
        assert_eq!(max_stack(&code), 2);
    }

    #[test]
    fn loops_terminate() {
        let top = Label(0);
        let code = vec![
            Instruction::Label(top),
            Instruction::PushInt(1),
            Instruction::JumpIfZero(Condition::Ne, top),
            Instruction::Return(None),
        ];
        assert_eq!(max_stack(&code), 1);
    }

    #[test]
    #[should_panic(expected = "internal compiler fault")]
    fn mismatched_merge_faults() {
        let end = Label(0);
        let code = vec![
            Instruction::PushInt(0),
            Instruction::JumpIfZero(Condition::Eq, end),
            Instruction::PushInt(1),
            Instruction::Label(end),
            Instruction::Return(None),
        ];
        max_stack(&code);
    }
}
