//! Straight-line code blocks and their step accounting.
//!
//! A block is charged as a whole: when control enters it, the counter goes
//! up by the summed cost of the block's own instructions. Nested blocks are
//! charged separately when (and each time) control enters them, so a loop
//! body nested in a method block is charged once per iteration.

use kestrel_core::StackKind;

use super::instruction::{ArithOp, Instruction, MemberRef};

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Instruction(Instruction),
    Block(CodeBlock),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBlock {
    items: Vec<BlockItem>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.items.push(BlockItem::Instruction(instruction));
    }

    pub fn push_block(&mut self, block: CodeBlock) {
        self.items.push(BlockItem::Block(block));
    }

    pub fn items(&self) -> &[BlockItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The last instruction directly in this block.
    pub fn last(&self) -> Option<&Instruction> {
        match self.items.last() {
            Some(BlockItem::Instruction(instruction)) => Some(instruction),
            _ => None,
        }
    }

    /// Cost of this block's own instructions, nested blocks excluded.
    pub fn cost(&self) -> u64 {
        self.items
            .iter()
            .map(|item| match item {
                BlockItem::Instruction(instruction) => instruction.cost(),
                BlockItem::Block(_) => 0,
            })
            .sum()
    }

    /// Flatten into a single instruction list, charging each block to
    /// `counter` (a static `long`) on entry.
    ///
    /// Blocks of cost zero get no prologue.
    pub fn linearize(&self, counter: &MemberRef) -> Vec<Instruction> {
        let mut out = Vec::new();
        self.linearize_into(counter, &mut out);
        out
    }

    fn linearize_into(&self, counter: &MemberRef, out: &mut Vec<Instruction>) {
        let cost = self.cost();
        if cost > 0 {
            // Leading labels stay ahead of the charge so jumps to them pay
            let skip = leading_labels(&self.items);
            self.emit_items(&self.items[..skip], counter, out);
            out.push(Instruction::GetStatic(counter.clone()));
            out.push(Instruction::PushLong(cost as i64));
            out.push(Instruction::Arith(ArithOp::Add, StackKind::Long));
            out.push(Instruction::PutStatic(counter.clone()));
            self.emit_items(&self.items[skip..], counter, out);
        } else {
            self.emit_items(&self.items, counter, out);
        }
    }

    fn emit_items(&self, items: &[BlockItem], counter: &MemberRef, out: &mut Vec<Instruction>) {
        for item in items {
            match item {
                BlockItem::Instruction(instruction) => out.push(instruction.clone()),
                BlockItem::Block(block) => block.linearize_into(counter, out),
            }
        }
    }
}

fn leading_labels(items: &[BlockItem]) -> usize {
    items
        .iter()
        .take_while(|item| matches!(item, BlockItem::Instruction(Instruction::Label(_))))
        .count()
}

impl From<Vec<Instruction>> for CodeBlock {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self {
            items: instructions
                .into_iter()
                .map(BlockItem::Instruction)
                .collect(),
        }
    }
}
