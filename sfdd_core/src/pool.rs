//! Weakly-held hash-consing pool.
//!
//! A [`WeakPool`] maps a value to its canonical representative so that
//! structural equality collapses to pointer equality. Entries are held
//! through [`Weak`] references: the pool never keeps a value alive on its
//! own, and slots whose value has been dropped are discarded on rehash.

use std::hash::Hash;
use std::rc::{Rc, Weak};

use ahash::RandomState;
use tracing::debug;

const MIN_BUCKETS: usize = 16;

/// Hash-bucket array of weakly-held canonical entries.
///
/// The occupancy counter is an overestimate: it is incremented on every
/// insertion and only reconciled with the live population when the pool
/// rehashes. Dead slots are skipped on lookup and iteration and dropped on
/// rehash.
pub struct WeakPool<T> {
    buckets: Vec<Vec<(u64, Weak<T>)>>,
    occupied: usize,
    hasher: RandomState,
}

impl<T> Default for WeakPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WeakPool<T> {
    /// Creates a pool with the default initial bucket count.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Creates a pool with at least `capacity` buckets.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let buckets = capacity.max(MIN_BUCKETS).next_power_of_two();
        WeakPool {
            buckets: (0..buckets).map(|_| Vec::new()).collect(),
            occupied: 0,
            hasher: RandomState::new(),
        }
    }

    /// Upper bound on the number of live entries.
    #[must_use]
    pub fn estimated_len(&self) -> usize {
        self.occupied
    }

    /// Number of entries that are still alive. Walks every slot.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.iter().count()
    }

    /// Visits live entries in `(bucket, entry)` lexicographic order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            buckets: &self.buckets,
            bucket: 0,
            entry: 0,
        }
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn rehash(&mut self) {
        let next = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, (0..next).map(|_| Vec::new()).collect());
        let mut live = 0usize;
        for (hash, slot) in old.into_iter().flatten() {
            if slot.strong_count() > 0 {
                let idx = (hash as usize) & (next - 1);
                self.buckets[idx].push((hash, slot));
                live += 1;
            }
        }
        debug!(buckets = next, live, "weak pool rehashed");
        self.occupied = live;
    }
}

impl<T: Hash> WeakPool<T> {
    /// Inserts `candidate` unless an equal live entry already exists.
    ///
    /// Returns `(true, candidate)` when the candidate became the canonical
    /// entry, and `(false, existing)` when an equal entry was already
    /// pooled.
    pub fn insert(&mut self, candidate: Rc<T>) -> (bool, Rc<T>)
    where
        T: PartialEq,
    {
        self.insert_with(candidate, T::eq)
    }

    /// Inserts `candidate` under a caller-supplied equality predicate.
    ///
    /// The hash is always the value's own [`Hash`]; `eq` decides whether a
    /// pooled entry with the same hash is the same value. The predicate must
    /// not re-enter the pool.
    pub fn insert_with<F>(&mut self, candidate: Rc<T>, eq: F) -> (bool, Rc<T>)
    where
        F: Fn(&T, &T) -> bool,
    {
        if self.occupied + 1 > self.buckets.len() * 4 / 5 {
            self.rehash();
        }
        let hash = self.hasher.hash_one(&*candidate);
        let idx = self.bucket_of(hash);
        for (slot_hash, slot) in &self.buckets[idx] {
            if *slot_hash != hash {
                continue;
            }
            if let Some(existing) = slot.upgrade() {
                if eq(&existing, &candidate) {
                    return (false, existing);
                }
            }
        }
        self.buckets[idx].push((hash, Rc::downgrade(&candidate)));
        self.occupied += 1;
        (true, candidate)
    }
}

/// Live-entry iterator over a [`WeakPool`], ordered by `(bucket, entry)`.
pub struct Iter<'a, T> {
    buckets: &'a [Vec<(u64, Weak<T>)>],
    bucket: usize,
    entry: usize,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = Rc<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.bucket < self.buckets.len() {
            let slots = &self.buckets[self.bucket];
            while self.entry < slots.len() {
                let upgraded = slots[self.entry].1.upgrade();
                self.entry += 1;
                if let Some(value) = upgraded {
                    return Some(value);
                }
            }
            self.bucket += 1;
            self.entry = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_returns_existing_for_equal_values() {
        let mut pool: WeakPool<String> = WeakPool::new();
        let first = Rc::new("alpha".to_string());
        let (inserted, canonical) = pool.insert(first.clone());
        assert!(inserted);
        assert!(Rc::ptr_eq(&canonical, &first));

        let (inserted, canonical) = pool.insert(Rc::new("alpha".to_string()));
        assert!(!inserted);
        assert!(Rc::ptr_eq(&canonical, &first));
    }

    #[test]
    fn test_dead_entries_are_skipped_and_replaced() {
        let mut pool: WeakPool<String> = WeakPool::new();
        {
            let transient = Rc::new("beta".to_string());
            pool.insert(transient.clone());
        }
        assert_eq!(pool.live_len(), 0);

        let revived = Rc::new("beta".to_string());
        let (inserted, canonical) = pool.insert(revived.clone());
        assert!(inserted);
        assert!(Rc::ptr_eq(&canonical, &revived));
    }

    #[test]
    fn test_rehash_discards_dead_slots() {
        let mut pool: WeakPool<usize> = WeakPool::with_capacity(MIN_BUCKETS);
        let mut keep = Vec::new();
        for i in 0..64 {
            let value = Rc::new(i);
            if i % 2 == 0 {
                keep.push(value.clone());
            }
            pool.insert(value);
        }
        assert_eq!(pool.live_len(), keep.len());
        assert!(pool.estimated_len() >= pool.live_len());
    }

    #[test]
    fn test_insert_with_custom_equality() {
        let mut pool: WeakPool<(u32, u32)> = WeakPool::new();
        let first = Rc::new((1, 10));
        pool.insert_with(first.clone(), |a, b| a.0 == b.0);

        // Same hash path only matters for equal hashes; equal first fields
        // with identical hashes must resolve to the pooled entry.
        let (inserted, canonical) = pool.insert_with(Rc::new((1, 10)), |a, b| a.0 == b.0);
        assert!(!inserted);
        assert!(Rc::ptr_eq(&canonical, &first));
    }

    #[test]
    fn test_iteration_yields_each_live_entry_once() {
        let mut pool: WeakPool<usize> = WeakPool::new();
        let held: Vec<Rc<usize>> = (0..10).map(Rc::new).collect();
        for value in &held {
            pool.insert(value.clone());
        }
        let mut seen: Vec<usize> = pool.iter().map(|v| *v).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
}
