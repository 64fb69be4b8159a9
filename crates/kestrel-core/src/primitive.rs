//! Builtin primitive kinds.

use std::fmt;

/// Width- and signedness-tagged builtin primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Unit,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    Float32,
    Float64,
}

/// The computational category a value occupies on the operand stack and in
/// local slots of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    Int,
    Long,
    Float,
    Double,
    Ref,
}

impl StackKind {
    /// Number of local slots / stack words a value of this kind takes.
    pub const fn width(self) -> u16 {
        match self {
            StackKind::Long | StackKind::Double => 2,
            _ => 1,
        }
    }
}

impl PrimitiveKind {
    /// Every primitive, in prelude registration order.
    pub const ALL: [PrimitiveKind; 10] = [
        PrimitiveKind::Unit,
        PrimitiveKind::Bool,
        PrimitiveKind::Int8,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::UInt8,
        PrimitiveKind::UInt16,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
    ];

    /// Source-level name.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Unit => "Unit",
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::Int8 => "Int8",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::Int32 => "Int",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt8 => "UInt8",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Float32 => "Float32",
            PrimitiveKind::Float64 => "Float64",
        }
    }

    /// Field/parameter descriptor on the target machine.
    ///
    /// `UInt8` is carried as a full int and kept in range by masking;
    /// `UInt16` maps onto the machine's unsigned 16-bit `char`.
    pub const fn descriptor(self) -> &'static str {
        match self {
            PrimitiveKind::Unit => "V",
            PrimitiveKind::Bool => "Z",
            PrimitiveKind::Int8 => "B",
            PrimitiveKind::Int16 => "S",
            PrimitiveKind::Int32 => "I",
            PrimitiveKind::Int64 => "J",
            PrimitiveKind::UInt8 => "I",
            PrimitiveKind::UInt16 => "C",
            PrimitiveKind::Float32 => "F",
            PrimitiveKind::Float64 => "D",
        }
    }

    /// Stack category, or `None` for `Unit` which has no runtime value.
    pub const fn stack_kind(self) -> Option<StackKind> {
        match self {
            PrimitiveKind::Unit => None,
            PrimitiveKind::Int64 => Some(StackKind::Long),
            PrimitiveKind::Float32 => Some(StackKind::Float),
            PrimitiveKind::Float64 => Some(StackKind::Double),
            _ => Some(StackKind::Int),
        }
    }

    /// Local slots a value of this kind reserves.
    pub const fn slot_count(self) -> u16 {
        match self.stack_kind() {
            Some(kind) => kind.width(),
            None => 0,
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Int8
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
                | PrimitiveKind::UInt8
                | PrimitiveKind::UInt16
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::Float32 | PrimitiveKind::Float64)
    }

    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub const fn is_signed(self) -> bool {
        !matches!(self, PrimitiveKind::UInt8 | PrimitiveKind::UInt16)
    }

    /// Inclusive range of an integer kind.
    pub const fn int_range(self) -> Option<(i64, i64)> {
        match self {
            PrimitiveKind::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            PrimitiveKind::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            PrimitiveKind::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            PrimitiveKind::Int64 => Some((i64::MIN, i64::MAX)),
            PrimitiveKind::UInt8 => Some((0, u8::MAX as i64)),
            PrimitiveKind::UInt16 => Some((0, u16::MAX as i64)),
            _ => None,
        }
    }

    /// Reduce an integer to this kind's width with two's-complement wrapping,
    /// the same truncation the generated code performs after arithmetic.
    pub const fn wrap(self, value: i64) -> i64 {
        match self {
            PrimitiveKind::Int8 => value as i8 as i64,
            PrimitiveKind::Int16 => value as i16 as i64,
            PrimitiveKind::Int32 => value as i32 as i64,
            PrimitiveKind::UInt8 => value as u8 as i64,
            PrimitiveKind::UInt16 => value as u16 as i64,
            _ => value,
        }
    }

    /// Host wrapper class used when a value of this kind is boxed into `Any`.
    pub const fn box_class(self) -> Option<&'static str> {
        match self {
            PrimitiveKind::Unit => None,
            PrimitiveKind::Bool => Some("java/lang/Boolean"),
            PrimitiveKind::Int8 => Some("java/lang/Byte"),
            PrimitiveKind::Int16 => Some("java/lang/Short"),
            PrimitiveKind::Int32 | PrimitiveKind::UInt8 | PrimitiveKind::UInt16 => {
                Some("java/lang/Integer")
            }
            PrimitiveKind::Int64 => Some("java/lang/Long"),
            PrimitiveKind::Float32 => Some("java/lang/Float"),
            PrimitiveKind::Float64 => Some("java/lang/Double"),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_kinds_take_two_slots() {
        assert_eq!(PrimitiveKind::Int64.slot_count(), 2);
        assert_eq!(PrimitiveKind::Float64.slot_count(), 2);
        assert_eq!(PrimitiveKind::Int32.slot_count(), 1);
        assert_eq!(PrimitiveKind::Bool.slot_count(), 1);
        assert_eq!(PrimitiveKind::Unit.slot_count(), 0);
    }

    #[test]
    fn wrap_truncates_to_width() {
        assert_eq!(PrimitiveKind::Int8.wrap(200), -56);
        assert_eq!(PrimitiveKind::UInt8.wrap(-1), 255);
        assert_eq!(PrimitiveKind::Int32.wrap(i32::MAX as i64 + 1), i32::MIN as i64);
        assert_eq!(PrimitiveKind::Int64.wrap(i64::MIN), i64::MIN);
    }

    #[test]
    fn ranges_follow_signedness() {
        assert_eq!(PrimitiveKind::UInt16.int_range(), Some((0, 65535)));
        assert_eq!(PrimitiveKind::Int8.int_range(), Some((-128, 127)));
        assert_eq!(PrimitiveKind::Float32.int_range(), None);
    }

    #[test]
    fn unsigned_kinds_box_as_integers() {
        assert_eq!(PrimitiveKind::UInt8.box_class(), Some("java/lang/Integer"));
        assert_eq!(PrimitiveKind::UInt16.box_class(), Some("java/lang/Integer"));
        assert_eq!(PrimitiveKind::Int16.box_class(), Some("java/lang/Short"));
        assert_eq!(PrimitiveKind::Unit.box_class(), None);
    }
}
