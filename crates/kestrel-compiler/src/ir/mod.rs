//! Intermediate representation between checked bodies and class files.
//!
//! This module contains the core IR types:
//!
//! - [`Instruction`] - Machine-level instructions with symbolic labels
//! - [`CodeBlock`] - Nested blocks carrying step costs
//! - [`LabelAllocator`] - Method-wide label numbering

mod code_block;
mod instruction;

pub use code_block::{BlockItem, CodeBlock};
pub use instruction::{ArithOp, Condition, Instruction, InvokeKind, Label, MemberRef, Narrow};

/// Hands out labels unique within one method.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}
