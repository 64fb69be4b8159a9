//! Where values live while a body runs.
//!
//! A lowered expression either leaves its leaves on the operand stack or
//! names a [`Place`] holding them. Value types are usually places: reading
//! a field of a flattened local should not copy the whole local first.

use kestrel_core::{StackKind, internal_fault};

use super::MethodEmitter;
use crate::ir::{CodeBlock, Instruction, MemberRef};
use crate::layout::{self, join};
use crate::types::Type;

/// Storage of a flattened value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    /// Leaves in consecutive local slots from the given one.
    Slots(u16),
    /// Leaves in fields `prefix$leaf` of the object held in a local slot.
    Object {
        slot: u16,
        class: String,
        prefix: String,
    },
    /// Leaves in static fields `prefix$leaf` of a class.
    Static { class: String, prefix: String },
}

/// Result of lowering an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The leaves were pushed in order.
    Stack,
    Place(Place),
}

impl Place {
    /// The place of field `name` inside the value type `ty` stored here.
    pub fn field(&self, emitter: &MethodEmitter<'_, '_>, ty: Type, name: &str) -> Place {
        match self {
            Place::Slots(base) => {
                let Some(def) = emitter.pool.type_def(ty) else {
                    internal_fault("field of an unbound generic");
                };
                let mut offset = 0;
                for field in def.fields.iter().filter(|f| !f.is_static) {
                    if field.name == name {
                        return Place::Slots(base + offset);
                    }
                    offset += layout::slots(emitter.pool, field.ty);
                }
                internal_fault(format_args!("{} has no field {name}", def.name))
            }
            Place::Object {
                slot,
                class,
                prefix,
            } => Place::Object {
                slot: *slot,
                class: class.clone(),
                prefix: join(prefix, name),
            },
            Place::Static { class, prefix } => Place::Static {
                class: class.clone(),
                prefix: join(prefix, name),
            },
        }
    }
}

impl MethodEmitter<'_, '_> {
    /// Make sure the value's leaves are on the stack.
    pub(super) fn push(&mut self, value: Value, ty: Type, out: &mut CodeBlock) {
        if let Value::Place(place) = value {
            self.load_place(&place, ty, out);
        }
    }

    /// Drop a value nobody uses.
    pub(super) fn discard(&mut self, value: Value, ty: Type, out: &mut CodeBlock) {
        if value != Value::Stack {
            return;
        }
        for leaf in layout::leaves(self.pool, ty).iter().rev() {
            out.push(if leaf.kind.width() == 2 {
                Instruction::Pop2
            } else {
                Instruction::Pop
            });
        }
    }

    /// Give the value a place, spilling stacked leaves into temporaries.
    pub(super) fn to_place(&mut self, value: Value, ty: Type, out: &mut CodeBlock) -> Place {
        match value {
            Value::Place(place) => place,
            Value::Stack => {
                let slot = self.locals.temp(layout::slots(self.pool, ty));
                let place = Place::Slots(slot);
                self.store_place(&place, ty, out);
                place
            }
        }
    }

    /// Push every leaf of the value stored at `place`.
    pub(super) fn load_place(&mut self, place: &Place, ty: Type, out: &mut CodeBlock) {
        for leaf in layout::leaves(self.pool, ty) {
            match place {
                Place::Slots(base) => out.push(Instruction::Load(leaf.kind, base + leaf.offset)),
                Place::Object {
                    slot,
                    class,
                    prefix,
                } => {
                    out.push(Instruction::Load(StackKind::Ref, *slot));
                    out.push(Instruction::GetField(self.leaf_member(class, prefix, &leaf)));
                }
                Place::Static { class, prefix } => {
                    out.push(Instruction::GetStatic(self.leaf_member(class, prefix, &leaf)));
                }
            }
        }
    }

    /// Pop the leaves on top of the stack into `place`, last leaf first.
    ///
    /// Every source leaf is pushed before the first store, so a copy
    /// between overlapping places is safe.
    pub(super) fn store_place(&mut self, place: &Place, ty: Type, out: &mut CodeBlock) {
        for leaf in layout::leaves(self.pool, ty).iter().rev() {
            match place {
                Place::Slots(base) => out.push(Instruction::Store(leaf.kind, base + leaf.offset)),
                Place::Object {
                    slot,
                    class,
                    prefix,
                } => {
                    // Get the object under the value
                    out.push(Instruction::Load(StackKind::Ref, *slot));
                    if leaf.kind.width() == 2 {
                        out.push(Instruction::DupX2);
                        out.push(Instruction::Pop);
                    } else {
                        out.push(Instruction::Swap);
                    }
                    out.push(Instruction::PutField(self.leaf_member(class, prefix, leaf)));
                }
                Place::Static { class, prefix } => {
                    out.push(Instruction::PutStatic(self.leaf_member(class, prefix, leaf)));
                }
            }
        }
    }

    fn leaf_member(&self, class: &str, prefix: &str, leaf: &layout::Leaf) -> MemberRef {
        MemberRef::new(
            class,
            leaf.name(prefix),
            self.pool.get_descriptor(leaf.ty),
        )
    }
}
