use super::Merge;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{Entry, Iter};
use std::collections::HashMap;
use std::hash::Hash;

/// Grow-only map from element to the latest timestamp it was asserted at.
///
/// Entries are never removed and a stored timestamp only ever increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, C: Serialize",
    deserialize = "T: Deserialize<'de>, C: Deserialize<'de>"
))]
pub struct TimestampedGrowSet<T: Eq + Hash, C = Timestamp> {
    entries: HashMap<T, C>,
}

impl<T: Eq + Hash, C> Default for TimestampedGrowSet<T, C> {
    fn default() -> Self {
        TimestampedGrowSet {
            entries: HashMap::new(),
        }
    }
}

impl<T, C> TimestampedGrowSet<T, C>
where
    T: Eq + Hash + Clone,
    C: Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `element` was seen at `timestamp`.
    ///
    /// Only a strictly newer timestamp replaces the stored one; equal or
    /// older assertions are ignored.
    pub fn assert(&mut self, element: T, timestamp: C) {
        match self.entries.entry(element) {
            Entry::Occupied(mut slot) => {
                if *slot.get() < timestamp {
                    slot.insert(timestamp);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(timestamp);
            }
        }
    }

    pub fn timestamp_of(&self, element: &T) -> Option<&C> {
        self.entries.get(element)
    }

    pub fn contains(&self, element: &T) -> bool {
        self.entries.contains_key(element)
    }

    /// Presence-only comparison: timestamps are not consulted.
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.entries.keys().all(|element| other.contains(element))
    }

    pub fn elements(&self) -> impl Iterator<Item = &T> {
        self.entries.keys()
    }

    pub fn iter(&self) -> Iter<'_, T, C> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// TigerStyle: verify `self` dominates `before` entry by entry.
    #[cfg(debug_assertions)]
    pub(crate) fn verify_grew_from(&self, before: &Self) {
        for (element, ts) in &before.entries {
            let now = self.entries.get(element);
            debug_assert!(
                now.is_some_and(|now| now >= ts),
                "Invariant violated: grow-set lost or regressed an entry"
            );
        }
    }
}

impl<T, C> Merge for TimestampedGrowSet<T, C>
where
    T: Eq + Hash + Clone,
    C: Ord + Clone,
{
    fn merge_from(&mut self, other: &Self) {
        #[cfg(debug_assertions)]
        let before = self.clone();

        for (element, timestamp) in &other.entries {
            self.assert(element.clone(), timestamp.clone());
        }

        #[cfg(debug_assertions)]
        self.verify_grew_from(&before);
    }
}

impl<'a, T: Eq + Hash, C> IntoIterator for &'a TimestampedGrowSet<T, C> {
    type Item = (&'a T, &'a C);
    type IntoIter = Iter<'a, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
