//! Pairwise specificity between two overload candidates.

use super::Candidate;
use crate::template::TypePool;
use crate::types::Type;

/// How the first candidate relates to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specificity {
    MoreSpecific,
    LessSpecific,
    /// Positions disagree on direction, or hold unrelated types.
    Indeterminate,
    /// Same types everywhere, return type included.
    Identical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    First,
    Second,
}

/// Compare `a` against `b`.
///
/// The receiver is position 0 when both candidates have one. Every position
/// where the types differ must be a strict subtype relation, and all such
/// positions must point the same way. When every position is equal the
/// return types decide with the same rule.
pub fn compare(pool: &TypePool<'_>, a: &Candidate, b: &Candidate) -> Specificity {
    let receivers = match (a.receiver, b.receiver) {
        (Some(ra), Some(rb)) => Some((ra, rb)),
        _ => None,
    };
    let positions = receivers
        .into_iter()
        .chain(a.params.iter().copied().zip(b.params.iter().copied()));

    match direction(pool, positions) {
        Err(()) => Specificity::Indeterminate,
        Ok(Some(Direction::First)) => Specificity::MoreSpecific,
        Ok(Some(Direction::Second)) => Specificity::LessSpecific,
        Ok(None) => match direction(pool, std::iter::once((a.ret, b.ret))) {
            Err(()) => Specificity::Indeterminate,
            Ok(Some(Direction::First)) => Specificity::MoreSpecific,
            Ok(Some(Direction::Second)) => Specificity::LessSpecific,
            Ok(None) => Specificity::Identical,
        },
    }
}

/// The agreed direction over all positions; `Err` when they disagree.
fn direction(
    pool: &TypePool<'_>,
    positions: impl Iterator<Item = (Type, Type)>,
) -> Result<Option<Direction>, ()> {
    let mut established = None;
    for (x, y) in positions {
        if x == y {
            continue;
        }
        let here = if pool.is_strict_subtype(x, y) {
            Direction::First
        } else if pool.is_strict_subtype(y, x) {
            Direction::Second
        } else {
            return Err(());
        };
        match established {
            None => established = Some(here),
            Some(existing) if existing != here => return Err(()),
            Some(_) => {}
        }
    }
    Ok(established)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompileOptions, CompileSession};
    use kestrel_core::MethodInstanceId;
    use kestrel_registry::Registry;

    fn candidate(receiver: Option<Type>, params: Vec<Type>, ret: Type) -> Candidate {
        Candidate {
            method: MethodInstanceId::new(0),
            receiver,
            params,
            ret,
        }
    }

    #[test]
    fn equal_positions_fall_back_to_return_type() {
        let registry = Registry::new();
        let session = CompileSession::new(CompileOptions::default(), "main");
        let pool = TypePool::new(&registry, &session).unwrap();
        let (int, any, string) = (pool.int(), pool.any(), pool.string());

        let a = candidate(None, vec![int], string);
        let b = candidate(None, vec![int], any);
        assert_eq!(compare(&pool, &a, &b), Specificity::MoreSpecific);
        assert_eq!(compare(&pool, &b, &a), Specificity::LessSpecific);
        assert_eq!(compare(&pool, &a, &a), Specificity::Identical);
    }

    #[test]
    fn unrelated_types_are_indeterminate() {
        let registry = Registry::new();
        let session = CompileSession::new(CompileOptions::default(), "main");
        let pool = TypePool::new(&registry, &session).unwrap();
        let a = candidate(None, vec![pool.int()], pool.unit());
        let b = candidate(None, vec![pool.string()], pool.unit());
        assert_eq!(compare(&pool, &a, &b), Specificity::Indeterminate);
    }

    #[test]
    fn receiver_ignored_when_one_side_is_static() {
        let registry = Registry::new();
        let session = CompileSession::new(CompileOptions::default(), "main");
        let pool = TypePool::new(&registry, &session).unwrap();
        let a = candidate(Some(pool.string()), vec![pool.int()], pool.unit());
        let b = candidate(None, vec![pool.any()], pool.unit());
        assert_eq!(compare(&pool, &a, &b), Specificity::MoreSpecific);
    }
}
