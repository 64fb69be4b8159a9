//! Instructions of the lowered method body.
//!
//! Instructions are close to the target machine: one variant usually maps
//! to one machine instruction, with the operand type carried as a
//! [`StackKind`] instead of being baked into the opcode. Every instruction
//! has a fixed cost used by the step counter.

use std::fmt;

use kestrel_core::StackKind;

/// A jump target, unique within one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A field or method on the target machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberRef {
    /// Internal class name.
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    /// Constructors and super calls.
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
}

/// Truncation back to a sub-word integer after int arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Narrow {
    /// Sign-extend the low 8 bits.
    Byte,
    /// Sign-extend the low 16 bits.
    Short,
    /// Zero-extend the low 16 bits.
    Char,
    /// Zero-extend the low 8 bits by masking.
    UnsignedByte,
}

/// Comparison of the top int value(s) in a conditional jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    pub fn negate(self) -> Self {
        match self {
            Condition::Eq => Condition::Ne,
            Condition::Ne => Condition::Eq,
            Condition::Lt => Condition::Ge,
            Condition::Ge => Condition::Lt,
            Condition::Gt => Condition::Le,
            Condition::Le => Condition::Gt,
        }
    }

    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Condition::Eq => ordering == Equal,
            Condition::Ne => ordering != Equal,
            Condition::Lt => ordering == Less,
            Condition::Ge => ordering != Less,
            Condition::Gt => ordering == Greater,
            Condition::Le => ordering != Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Marks a jump target; emits nothing.
    Label(Label),
    /// Source line of the code that follows; emits nothing.
    LineNumber(u32),

    // Constants
    PushInt(i32),
    PushLong(i64),
    PushFloat(f32),
    PushDouble(f64),
    PushString(String),
    PushNull,

    // Locals
    Load(StackKind, u16),
    Store(StackKind, u16),

    // Stack shuffling
    Pop,
    Pop2,
    Dup,
    Swap,
    /// Duplicate the top word under a two-word value below it.
    DupX2,

    // Arithmetic
    Arith(ArithOp, StackKind),
    Narrow(Narrow),
    /// Widen or narrow between stack categories.
    Convert { from: StackKind, to: StackKind },
    /// Three-way compare of longs, pushing -1, 0 or 1.
    LongCompare,
    /// Three-way compare of floats; NaN pushes 1 when `nan_greater`,
    /// else -1.
    FloatCompare { kind: StackKind, nan_greater: bool },

    // Control flow
    Jump(Label),
    /// Compare the int on top of the stack against zero.
    JumpIfZero(Condition, Label),
    /// Compare the two ints on top of the stack.
    JumpIfCompare(Condition, Label),
    Return(Option<StackKind>),

    // Objects
    New(String),
    CheckCast(String),
    GetField(MemberRef),
    PutField(MemberRef),
    GetStatic(MemberRef),
    PutStatic(MemberRef),
    Invoke(InvokeKind, MemberRef),
}

impl Instruction {
    /// Step cost charged when the instruction's block runs.
    pub fn cost(&self) -> u64 {
        match self {
            Instruction::Label(_) | Instruction::LineNumber(_) => 0,
            Instruction::Arith(ArithOp::Div | ArithOp::Rem, _) => 3,
            Instruction::Invoke(..) => 2,
            Instruction::New(_) => 5,
            _ => 1,
        }
    }

    /// Whether control never falls through to the next instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Instruction::Jump(_) | Instruction::Return(_))
    }

    /// The target of a jump.
    pub fn target(&self) -> Option<Label> {
        match self {
            Instruction::Jump(label)
            | Instruction::JumpIfZero(_, label)
            | Instruction::JumpIfCompare(_, label) => Some(*label),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs() {
        assert_eq!(Instruction::Label(Label(0)).cost(), 0);
        assert_eq!(Instruction::LineNumber(3).cost(), 0);
        assert_eq!(Instruction::PushInt(1).cost(), 1);
        assert_eq!(Instruction::Arith(ArithOp::Add, StackKind::Int).cost(), 1);
        assert_eq!(Instruction::Arith(ArithOp::Div, StackKind::Long).cost(), 3);
        assert_eq!(Instruction::Arith(ArithOp::Rem, StackKind::Int).cost(), 3);
        let member = MemberRef::new("a/B", "m", "()V");
        assert_eq!(Instruction::Invoke(InvokeKind::Static, member).cost(), 2);
        assert_eq!(Instruction::New("a/B".into()).cost(), 5);
    }

    #[test]
    fn negated_conditions_are_complements() {
        use std::cmp::Ordering::*;
        let all = [
            Condition::Eq,
            Condition::Ne,
            Condition::Lt,
            Condition::Ge,
            Condition::Gt,
            Condition::Le,
        ];
        for condition in all {
            for ordering in [Less, Equal, Greater] {
                assert_ne!(condition.holds(ordering), condition.negate().holds(ordering));
            }
        }
    }
}
