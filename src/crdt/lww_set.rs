//! Last-Writer-Wins element set.
//!
//! Pairs an add-set and a remove-set of [`TimestampedGrowSet`]. An element is
//! a member when its add timestamp is strictly newer than its remove
//! timestamp. Equal timestamps resolve to *removed*.

use super::grow_set::TimestampedGrowSet;
use super::Merge;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, C: Serialize",
    deserialize = "T: Deserialize<'de>, C: Deserialize<'de>"
))]
pub struct LwwElementSet<T: Eq + Hash, C = Timestamp> {
    adds: TimestampedGrowSet<T, C>,
    removes: TimestampedGrowSet<T, C>,
}

impl<T: Eq + Hash, C> Default for LwwElementSet<T, C> {
    fn default() -> Self {
        LwwElementSet {
            adds: TimestampedGrowSet::default(),
            removes: TimestampedGrowSet::default(),
        }
    }
}

impl<T, C> LwwElementSet<T, C>
where
    T: Eq + Hash + Clone,
    C: Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Added-and-not-removed elements, derived from both grow-sets on every call.
    pub fn effective_members(&self) -> HashSet<T> {
        self.members().cloned().collect()
    }

    pub(crate) fn members(&self) -> impl Iterator<Item = &T> {
        self.adds
            .elements()
            .filter(move |element| self.lookup(element).is_some())
    }

    /// Add timestamp of `element` if it is currently a member.
    pub fn lookup(&self, element: &T) -> Option<&C> {
        let added = self.adds.timestamp_of(element)?;
        match self.removes.timestamp_of(element) {
            None => Some(added),
            // Ties go to the remove
            Some(removed) if added > removed => Some(added),
            Some(_) => None,
        }
    }

    pub fn contains(&self, element: &T) -> bool {
        self.lookup(element).is_some()
    }

    pub fn add(&mut self, element: T, timestamp: C) {
        self.adds.assert(element, timestamp);
    }

    /// Tombstone `element` at `timestamp`.
    ///
    /// Returns `false` and records nothing when the element is not currently a
    /// member, or when `timestamp` is older than its add. An equal timestamp is
    /// accepted and resolves to removed.
    pub fn remove(&mut self, element: T, timestamp: C) -> bool {
        match self.lookup(&element) {
            Some(added) if *added <= timestamp => {}
            _ => return false,
        }
        self.removes.assert(element, timestamp);
        true
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.adds.is_subset_of(&other.adds) && self.removes.is_subset_of(&other.removes)
    }

    pub fn adds(&self) -> &TimestampedGrowSet<T, C> {
        &self.adds
    }

    pub fn removes(&self) -> &TimestampedGrowSet<T, C> {
        &self.removes
    }

    /// Number of effective members.
    pub fn len(&self) -> usize {
        self.members().count()
    }

    pub fn is_empty(&self) -> bool {
        self.members().next().is_none()
    }
}

impl<T, C> Merge for LwwElementSet<T, C>
where
    T: Eq + Hash + Clone,
    C: Ord + Clone,
{
    fn merge_from(&mut self, other: &Self) {
        self.adds.merge_from(&other.adds);
        self.removes.merge_from(&other.removes);
    }
}
