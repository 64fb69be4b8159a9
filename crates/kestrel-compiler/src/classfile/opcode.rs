//! Target machine operation codes.
//!
//! Only the opcodes the backend emits are listed. Each is a single byte,
//! with operands following inline (big-endian).

use kestrel_core::internal_fault;
use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    // =========================================================================
    // Constants
    // =========================================================================
    AconstNull = 0x01,
    IconstM1 = 0x02,
    Iconst0 = 0x03,
    Iconst1 = 0x04,
    Iconst2 = 0x05,
    Iconst3 = 0x06,
    Iconst4 = 0x07,
    Iconst5 = 0x08,
    Lconst0 = 0x09,
    Lconst1 = 0x0a,
    Fconst0 = 0x0b,
    Fconst1 = 0x0c,
    Fconst2 = 0x0d,
    Dconst0 = 0x0e,
    Dconst1 = 0x0f,
    /// Operand: i8
    Bipush = 0x10,
    /// Operand: i16
    Sipush = 0x11,
    /// Operand: u8 pool index
    Ldc = 0x12,
    /// Operand: u16 pool index
    LdcW = 0x13,
    /// Operand: u16 pool index of a long or double
    Ldc2W = 0x14,

    // =========================================================================
    // Locals
    // =========================================================================
    Iload = 0x15,
    Lload = 0x16,
    Fload = 0x17,
    Dload = 0x18,
    Aload = 0x19,
    Iload0 = 0x1a,
    Lload0 = 0x1e,
    Fload0 = 0x22,
    Dload0 = 0x26,
    Aload0 = 0x2a,
    Istore = 0x36,
    Lstore = 0x37,
    Fstore = 0x38,
    Dstore = 0x39,
    Astore = 0x3a,
    Istore0 = 0x3b,
    Lstore0 = 0x3f,
    Fstore0 = 0x43,
    Dstore0 = 0x47,
    Astore0 = 0x4b,

    // =========================================================================
    // Stack
    // =========================================================================
    Pop = 0x57,
    Pop2 = 0x58,
    Dup = 0x59,
    DupX2 = 0x5b,
    Swap = 0x5f,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    Iadd = 0x60,
    Ladd = 0x61,
    Fadd = 0x62,
    Dadd = 0x63,
    Isub = 0x64,
    Lsub = 0x65,
    Fsub = 0x66,
    Dsub = 0x67,
    Imul = 0x68,
    Lmul = 0x69,
    Fmul = 0x6a,
    Dmul = 0x6b,
    Idiv = 0x6c,
    Ldiv = 0x6d,
    Fdiv = 0x6e,
    Ddiv = 0x6f,
    Irem = 0x70,
    Lrem = 0x71,
    Frem = 0x72,
    Drem = 0x73,
    Ineg = 0x74,
    Lneg = 0x75,
    Fneg = 0x76,
    Dneg = 0x77,
    Iand = 0x7e,
    Land = 0x7f,
    Ior = 0x80,
    Lor = 0x81,
    Ixor = 0x82,
    Lxor = 0x83,

    // =========================================================================
    // Conversions
    // =========================================================================
    I2l = 0x85,
    I2f = 0x86,
    I2d = 0x87,
    L2i = 0x88,
    L2f = 0x89,
    L2d = 0x8a,
    F2i = 0x8b,
    F2l = 0x8c,
    F2d = 0x8d,
    D2i = 0x8e,
    D2l = 0x8f,
    D2f = 0x90,
    I2b = 0x91,
    I2c = 0x92,
    I2s = 0x93,

    // =========================================================================
    // Comparisons and jumps
    // =========================================================================
    Lcmp = 0x94,
    Fcmpl = 0x95,
    Fcmpg = 0x96,
    Dcmpl = 0x97,
    Dcmpg = 0x98,
    /// Operand: i16 branch offset (applies to every jump below)
    Ifeq = 0x99,
    Ifne = 0x9a,
    Iflt = 0x9b,
    Ifge = 0x9c,
    Ifgt = 0x9d,
    Ifle = 0x9e,
    IfIcmpeq = 0x9f,
    IfIcmpne = 0xa0,
    IfIcmplt = 0xa1,
    IfIcmpge = 0xa2,
    IfIcmpgt = 0xa3,
    IfIcmple = 0xa4,
    Goto = 0xa7,

    // =========================================================================
    // Returns
    // =========================================================================
    Ireturn = 0xac,
    Lreturn = 0xad,
    Freturn = 0xae,
    Dreturn = 0xaf,
    Areturn = 0xb0,
    Return = 0xb1,

    // =========================================================================
    // Objects
    // =========================================================================
    /// Operand: u16 pool index (fields, methods and classes below alike)
    Getstatic = 0xb2,
    Putstatic = 0xb3,
    Getfield = 0xb4,
    Putfield = 0xb5,
    Invokevirtual = 0xb6,
    Invokespecial = 0xb7,
    Invokestatic = 0xb8,
    /// Operands: u16 pool index, u8 argument words, u8 zero
    Invokeinterface = 0xb9,
    New = 0xbb,
    Checkcast = 0xc0,

    /// Prefix widening the next local access to a u16 slot.
    Wide = 0xc4,
    /// Operand: i32 branch offset
    GotoW = 0xc8,
}

impl Opcode {
    /// Bytes of inline operands following the opcode.
    ///
    /// `wide` is reported as zero; the widened instruction that follows
    /// takes two bytes more than usual.
    pub fn operand_len(self) -> usize {
        use Opcode::*;
        match self {
            Bipush | Ldc => 1,
            Iload | Lload | Fload | Dload | Aload | Istore | Lstore | Fstore | Dstore
            | Astore => 1,
            Sipush | LdcW | Ldc2W => 2,
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt
            | IfIcmpge | IfIcmpgt | IfIcmple | Goto => 2,
            Getstatic | Putstatic | Getfield | Putfield | Invokevirtual | Invokespecial
            | Invokestatic | New | Checkcast => 2,
            Invokeinterface | GotoW => 4,
            _ => 0,
        }
    }

    /// The branch taken exactly when `self` falls through.
    pub fn negated(self) -> Opcode {
        use Opcode::*;
        match self {
            Ifeq => Ifne,
            Ifne => Ifeq,
            Iflt => Ifge,
            Ifge => Iflt,
            Ifgt => Ifle,
            Ifle => Ifgt,
            IfIcmpeq => IfIcmpne,
            IfIcmpne => IfIcmpeq,
            IfIcmplt => IfIcmpge,
            IfIcmpge => IfIcmplt,
            IfIcmpgt => IfIcmple,
            IfIcmple => IfIcmpgt,
            other => internal_fault(format_args!("{other:?} is not a conditional branch")),
        }
    }

    /// Whether the opcode is one of the `xload_<n>`/`xstore_<n>` shorthands
    /// (an offset from the listed `_0` form).
    pub fn short_local(base: Opcode, slot: u16) -> Option<u8> {
        (slot <= 3).then(|| u8::from(base) + slot as u8)
    }
}

/// Split a code array into its opcodes.
pub fn decode(code: &[u8]) -> Result<Vec<Opcode>, u8> {
    let mut ops = Vec::new();
    let mut pc = 0;
    let mut widened = false;
    while pc < code.len() {
        let byte = code[pc];
        let op = match Opcode::try_from(byte) {
            Ok(op) => op,
            // xload_<n> and xstore_<n> other than the _0 forms
            Err(_) if is_short_local(byte) => {
                pc += 1;
                continue;
            }
            Err(_) => return Err(byte),
        };
        ops.push(op);
        let mut len = op.operand_len();
        if widened {
            len += 1;
        }
        widened = op == Opcode::Wide;
        pc += 1 + len;
    }
    Ok(ops)
}

fn is_short_local(byte: u8) -> bool {
    matches!(byte, 0x1a..=0x2d | 0x3b..=0x4e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values() {
        assert_eq!(u8::from(Opcode::Goto), 0xa7);
        assert_eq!(Opcode::try_from(0xb8), Ok(Opcode::Invokestatic));
        assert!(Opcode::try_from(0xff).is_err());
    }

    #[test]
    fn negation_pairs_up() {
        assert_eq!(Opcode::Iflt.negated(), Opcode::Ifge);
        assert_eq!(Opcode::IfIcmpgt.negated(), Opcode::IfIcmple);
        assert_eq!(Opcode::Ifne.negated().negated(), Opcode::Ifne);
    }

    #[test]
    fn short_locals() {
        assert_eq!(Opcode::short_local(Opcode::Iload0, 2), Some(0x1c));
        assert_eq!(Opcode::short_local(Opcode::Astore0, 3), Some(0x4e));
        assert_eq!(Opcode::short_local(Opcode::Lload0, 4), None);
    }

    #[test]
    fn decode_skips_operands() {
        // bipush 7; istore_1; wide iload 300; ireturn
        let code = [0x10, 7, 0x3c, 0xc4, 0x15, 0x01, 0x2c, 0xac];
        assert_eq!(
            decode(&code),
            Ok(vec![Opcode::Bipush, Opcode::Wide, Opcode::Iload, Opcode::Ireturn])
        );
        // goto_w +5; return
        assert_eq!(
            decode(&[0xc8, 0, 0, 0, 5, 0xb1]),
            Ok(vec![Opcode::GotoW, Opcode::Return])
        );
    }
}
