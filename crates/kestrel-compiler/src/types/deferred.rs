//! Write-once cells for data computed after a shell is registered.

use kestrel_core::internal_fault;

/// A value filled in at most once, after the thing that owns it exists.
///
/// Instances are registered as shells before their members are known, so
/// anything that can refer back to its owner (method bodies, the slot count
/// of a value type) lives in one of these.
#[derive(Debug, Clone)]
pub enum Deferred<T> {
    Pending,
    InProgress,
    Ready(T),
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Deferred::Pending
    }
}

impl<T> Deferred<T> {
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Deferred::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Deferred::InProgress)
    }

    /// Claim the cell for computation. Returns `false` unless it was pending.
    pub fn begin(&mut self) -> bool {
        if matches!(self, Deferred::Pending) {
            *self = Deferred::InProgress;
            true
        } else {
            false
        }
    }

    /// Store the computed value.
    #[track_caller]
    pub fn fill(&mut self, value: T) {
        if self.is_ready() {
            internal_fault("deferred cell filled twice");
        }
        *self = Deferred::Ready(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_only_once() {
        let mut cell: Deferred<u16> = Deferred::default();
        assert!(cell.begin());
        assert!(cell.is_in_progress());
        assert!(!cell.begin());
        cell.fill(4);
        assert_eq!(cell.get(), Some(&4));
        assert!(!cell.begin());
    }

    #[test]
    #[should_panic(expected = "filled twice")]
    fn fill_is_write_once() {
        let mut cell = Deferred::ready(1u8);
        cell.fill(2);
    }
}
