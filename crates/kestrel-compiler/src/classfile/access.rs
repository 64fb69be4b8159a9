//! Access flags of classes, fields and methods.

use bitflags::bitflags;

bitflags! {
    /// Flags on a generated class.
    ///
    /// Every generated class carries `SUPER`, which asks the host to use
    /// modern `invokespecial` semantics.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccess: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        /// No body; only valid on interfaces and abstract classes.
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

impl ClassAccess {
    /// Flags of a plain generated class.
    pub fn class() -> Self {
        ClassAccess::PUBLIC | ClassAccess::SUPER
    }

    /// Flags of a generated interface.
    pub fn interface() -> Self {
        ClassAccess::PUBLIC | ClassAccess::INTERFACE | ClassAccess::ABSTRACT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits() {
        assert_eq!(ClassAccess::class().bits(), 0x0021);
        assert_eq!(ClassAccess::interface().bits(), 0x0601);
        assert_eq!((MethodAccess::PUBLIC | MethodAccess::STATIC).bits(), 0x0009);
        assert!(!ClassAccess::class().contains(ClassAccess::INTERFACE));
    }
}
