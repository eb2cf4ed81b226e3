//! Fixed-vocabulary counters.
//!
//! Counts are stored densely, indexed by vocabulary position, so iteration
//! and mode selection never depend on hash-map ordering.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// A closed set of keys with a fixed traversal order.
pub trait Vocabulary: Copy + Eq + fmt::Display + 'static {
    /// Every key, in tie-break order.
    const ALL: &'static [Self];

    /// Position of this key in `ALL`.
    fn index(self) -> usize;
}

/// Count per vocabulary entry.
#[derive(Clone, PartialEq, Eq)]
pub struct Histogram<K: Vocabulary> {
    counts: Vec<u64>,
    _key: PhantomData<K>,
}

impl<K: Vocabulary> Histogram<K> {
    pub fn new() -> Self {
        Self {
            counts: vec![0; K::ALL.len()],
            _key: PhantomData,
        }
    }

    pub fn increment(&mut self, key: K) {
        self.counts[key.index()] += 1;
    }

    pub fn get(&self, key: K) -> u64 {
        self.counts[key.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero entries in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = (K, u64)> + '_ {
        K::ALL
            .iter()
            .map(|key| (*key, self.get(*key)))
            .filter(|(_, count)| *count > 0)
    }

    /// Key with the highest count; ties go to the earliest vocabulary entry.
    /// `None` when nothing has been counted.
    pub fn mode(&self) -> Option<K> {
        let mut best: Option<(K, u64)> = None;
        for (key, count) in self.iter() {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((key, count)),
            }
        }
        best.map(|(key, _)| key)
    }
}

impl<K: Vocabulary> Default for Histogram<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Vocabulary> FromIterator<K> for Histogram<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut histogram = Self::new();
        for key in iter {
            histogram.increment(key);
        }
        histogram
    }
}

impl<K: Vocabulary> fmt::Debug for Histogram<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(key, count)| (key.to_string(), count)))
            .finish()
    }
}

/// Serialized as `{ "<key>": count, ... }` with zero entries omitted.
impl<K: Vocabulary> Serialize for Histogram<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, count) in self.iter() {
            map.serialize_entry(&key.to_string(), &count)?;
        }
        map.end()
    }
}
