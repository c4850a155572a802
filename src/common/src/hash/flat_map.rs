//! Open-addressed hash table used for hash-join build sides and hash
//! aggregation grouping.
//!
//! Spec.md §4.5 calls for a table that is insert-only for the lifetime of a
//! query (no deletions, so no tombstones), with power-of-two capacity and
//! linear probing — simpler than a Robin-Hood or SwissTable scheme, and
//! sufficient because nothing is ever removed mid-build. Hashing itself uses
//! `ahash`, matching the teacher's own preference for it over the stdlib's
//! SipHash throughout `common::hash`.

use std::hash::{BuildHasher, Hash};

use ahash::RandomState;

const MAX_LOAD_FACTOR_NUM: usize = 7;
const MAX_LOAD_FACTOR_DEN: usize = 8;

enum Slot<K, V> {
    Empty,
    Occupied(K, V),
}

/// An insert-only open-addressed map from `K` to `V`, probing linearly on
/// collision. `get_or_insert_with` is the primary entry point: the hash-join
/// build side and hash-aggregate both want "the bucket for this key,
/// creating it empty if absent" rather than a plain `insert`.
pub struct FlatHashMap<K, V> {
    slots: Vec<Slot<K, V>>,
    len: usize,
    hasher: RandomState,
}

impl<K: Eq + Hash, V> FlatHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(16);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);
        Self { slots, len: 0, hasher: RandomState::new() }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn bucket_for(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) as usize) & self.mask()
    }

    fn grow(&mut self) {
        let mut bigger = Self::with_capacity(self.slots.len() * 2);
        for slot in self.slots.drain(..) {
            if let Slot::Occupied(k, v) = slot {
                bigger.insert_new(k, v);
            }
        }
        *self = bigger;
    }

    fn insert_new(&mut self, key: K, value: V) {
        let mut idx = self.bucket_for(&key);
        loop {
            match &self.slots[idx] {
                Slot::Empty => {
                    self.slots[idx] = Slot::Occupied(key, value);
                    self.len += 1;
                    return;
                }
                Slot::Occupied(_, _) => idx = (idx + 1) & self.mask(),
            }
        }
    }

    /// Returns the value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        if (self.len + 1) * MAX_LOAD_FACTOR_DEN > self.slots.len() * MAX_LOAD_FACTOR_NUM {
            self.grow();
        }
        let mut idx = self.bucket_for(&key);
        loop {
            match &self.slots[idx] {
                Slot::Empty => {
                    self.slots[idx] = Slot::Occupied(key, default());
                    self.len += 1;
                    break;
                }
                Slot::Occupied(k, _) if *k == key => break,
                Slot::Occupied(_, _) => idx = (idx + 1) & self.mask(),
            }
        }
        match &mut self.slots[idx] {
            Slot::Occupied(_, v) => v,
            Slot::Empty => unreachable!(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut idx = self.bucket_for(key);
        loop {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied(k, v) if k == key => return Some(v),
                Slot::Occupied(_, _) => idx = (idx + 1) & self.mask(),
            }
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Occupied(k, v) => Some((k, v)),
            Slot::Empty => None,
        })
    }
}

impl<K: Eq + Hash, V> Default for FlatHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// An insert-only open-addressed set, built on [`FlatHashMap`] with a unit
/// value — used by DISTINCT and semi/anti join probes, which only need
/// membership, not an associated payload.
pub struct FlatHashSet<K> {
    map: FlatHashMap<K, ()>,
}

impl<K: Eq + Hash> FlatHashSet<K> {
    pub fn new() -> Self {
        Self { map: FlatHashMap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { map: FlatHashMap::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Inserts `key`, returning `true` if it was newly inserted (matches
    /// `std::collections::HashSet::insert`'s return convention).
    pub fn insert(&mut self, key: K) -> bool {
        let before = self.map.len();
        self.map.get_or_insert_with(key, || ());
        self.map.len() > before
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }
}

impl<K: Eq + Hash> Default for FlatHashSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_insert_with_groups_rows_under_same_key() {
        let mut map: FlatHashMap<u64, Vec<u32>> = FlatHashMap::new();
        map.get_or_insert_with(7, Vec::new).push(0);
        map.get_or_insert_with(7, Vec::new).push(1);
        map.get_or_insert_with(9, Vec::new).push(2);
        assert_eq!(map.get(&7), Some(&vec![0, 1]));
        assert_eq!(map.get(&9), Some(&vec![2]));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn grows_past_initial_capacity_without_losing_entries() {
        let mut map: FlatHashMap<u64, u64> = FlatHashMap::with_capacity(16);
        for i in 0..200u64 {
            map.get_or_insert_with(i, || i * 2);
        }
        for i in 0..200u64 {
            assert_eq!(map.get(&i), Some(&(i * 2)));
        }
    }

    #[test]
    fn set_insert_reports_first_insertion_only() {
        let mut set: FlatHashSet<i32> = FlatHashSet::new();
        assert!(set.insert(1));
        assert!(!set.insert(1));
        assert!(set.contains(&1));
        assert_eq!(set.len(), 1);
    }
}
