//! State-based CRDT building blocks.
//!
//! A state-based CRDT forms a join-semilattice under merge:
//! - Commutativity: a ⊔ b = b ⊔ a
//! - Associativity: (a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)
//! - Idempotence:  a ⊔ a = a
//!
//! Replicas that have seen the same set of states converge regardless of
//! the order in which merges were applied.

pub mod grow_set;
pub mod lww_set;

pub use grow_set::TimestampedGrowSet;
pub use lww_set::LwwElementSet;

/// Join of two replica states, applied in place.
pub trait Merge {
    /// Fold `other` into `self`. Must be commutative, associative and idempotent.
    fn merge_from(&mut self, other: &Self);

    /// Non-mutating join: `self ⊔ other`.
    fn merged(&self, other: &Self) -> Self
    where
        Self: Clone,
    {
        let mut joined = self.clone();
        joined.merge_from(other);
        joined
    }
}
