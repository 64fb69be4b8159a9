//! Local slot allocation for method lowering.
//!
//! `LocalSlots` maps the locals of a checked body onto machine slots. It
//! handles:
//! - Multi-slot locals (wide primitives, flattened value types)
//! - Nested block scopes, reclaiming slots on exit
//! - Shadowing with restoration on scope exit
//! - Unnamed temporaries for intermediate values
//!
//! Names were validated by the checker, so a duplicate or missing local
//! here is an internal fault rather than a user error.

use kestrel_core::internal_fault;
use rustc_hash::FxHashMap;

use crate::types::Type;

// ============================================================================
// Types
// ============================================================================

/// A local bound to a run of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSlot {
    pub ty: Type,
    /// First slot of the run.
    pub slot: u16,
    /// Scope depth where declared
    pub depth: u32,
}

// ============================================================================
// LocalSlots
// ============================================================================

#[derive(Debug, Default)]
pub struct LocalSlots {
    variables: FxHashMap<String, LocalSlot>,
    /// Variables hidden by a declaration at a deeper scope, with the depth
    /// at which the shadowing happened.
    shadowed: Vec<(u32, String, LocalSlot)>,
    /// `next_slot` at each scope entry.
    checkpoints: Vec<u16>,
    scope_depth: u32,
    next_slot: u16,
    max_slot: u16,
}

impl LocalSlots {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Scope Management
    // ==========================================================================

    pub fn push_scope(&mut self) {
        self.checkpoints.push(self.next_slot);
        self.scope_depth += 1;
    }

    /// Exit the current scope; its locals and temporaries become reusable.
    pub fn pop_scope(&mut self) {
        let Some(checkpoint) = self.checkpoints.pop() else {
            internal_fault("popped the method scope");
        };
        let depth = self.scope_depth;
        self.variables.retain(|_, var| var.depth < depth);
        while let Some((shadowing_depth, _, _)) = self.shadowed.last() {
            if *shadowing_depth != depth {
                break;
            }
            if let Some((_, name, var)) = self.shadowed.pop() {
                self.variables.insert(name, var);
            }
        }
        self.next_slot = checkpoint;
        self.scope_depth -= 1;
    }

    pub fn depth(&self) -> u32 {
        self.scope_depth
    }

    // ==========================================================================
    // Allocation
    // ==========================================================================

    /// Bind `name` to `slots` fresh slots and return the first.
    pub fn declare(&mut self, name: &str, ty: Type, slots: u16) -> u16 {
        if let Some(existing) = self.variables.get(name) {
            if existing.depth == self.scope_depth {
                internal_fault(format_args!("local {name} declared twice in one scope"));
            }
            self.shadowed
                .push((self.scope_depth, name.to_string(), *existing));
        }
        let slot = self.allocate(slots);
        self.variables.insert(
            name.to_string(),
            LocalSlot {
                ty,
                slot,
                depth: self.scope_depth,
            },
        );
        slot
    }

    /// Reserve `slots` unnamed slots, released with the enclosing scope.
    pub fn temp(&mut self, slots: u16) -> u16 {
        self.allocate(slots)
    }

    fn allocate(&mut self, slots: u16) -> u16 {
        let slot = self.next_slot;
        self.next_slot += slots;
        self.max_slot = self.max_slot.max(self.next_slot);
        slot
    }

    #[track_caller]
    pub fn lookup(&self, name: &str) -> LocalSlot {
        match self.variables.get(name) {
            Some(var) => *var,
            None => internal_fault(format_args!("local {name} has no slot")),
        }
    }

    /// Slots the method frame needs.
    pub fn max_locals(&self) -> u16 {
        self.max_slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::InstanceId;

    fn ty() -> Type {
        Type::Basic(InstanceId::new(0))
    }

    #[test]
    fn slots_are_consecutive() {
        let mut locals = LocalSlots::new();
        assert_eq!(locals.declare("a", ty(), 1), 0);
        assert_eq!(locals.declare("b", ty(), 2), 1);
        assert_eq!(locals.declare("c", ty(), 0), 3);
        assert_eq!(locals.declare("d", ty(), 1), 3);
        assert_eq!(locals.max_locals(), 4);
    }

    #[test]
    fn scope_exit_reclaims_and_restores() {
        let mut locals = LocalSlots::new();
        locals.declare("x", ty(), 1);
        locals.push_scope();
        let inner = locals.declare("x", ty(), 2);
        assert_eq!(locals.lookup("x").slot, inner);
        locals.temp(3);
        locals.pop_scope();
        assert_eq!(locals.lookup("x").slot, 0);
        assert_eq!(locals.declare("y", ty(), 1), 1);
        assert_eq!(locals.max_locals(), 6);
        assert_eq!(locals.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "declared twice")]
    fn duplicate_in_one_scope_faults() {
        let mut locals = LocalSlots::new();
        locals.declare("x", ty(), 1);
        locals.declare("x", ty(), 1);
    }

    #[test]
    #[should_panic(expected = "has no slot")]
    fn missing_local_faults() {
        LocalSlots::new().lookup("ghost");
    }
}
