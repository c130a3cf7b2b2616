//! # Bounded Ordered Store
//!
//! Holds the listings seen during a session: a key index plus a newest-first
//! sequence, both behind a single lock so they can never disagree. The only
//! mutation is [`ListingStore::merge`].
//!
//! ## Retention
//!
//! The sequence is capped at `capacity` entries (200 by default). When a merge
//! pushes it past the cap, `capacity - floor` of the oldest entries (100 by
//! default) are dropped in one pass rather than one at a time. A batch that
//! overflows by more than that loses its whole overflow instead, so a merge
//! never returns with more than `capacity` entries.
//!
//! ## Readers
//!
//! Every changing merge rebuilds an immutable [`Snapshot`]. Readers only clone
//! an `Arc` under a read lock, so they never see a half-applied merge and never
//! hold the ingestion path up for longer than that clone.

use std::collections::{HashSet, VecDeque};
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::Listing;

/// Default hard cap on retained listings.
pub const DEFAULT_CAPACITY: usize = 200;
/// Default floor; an eviction pass removes `capacity - floor` listings.
pub const DEFAULT_FLOOR: usize = 100;

/// Capacity bounds for a [`ListingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Maximum length of the sequence once a merge has returned.
    pub capacity: usize,
    /// `capacity - floor` oldest listings are evicted each time `capacity` is
    /// exceeded, so 200 + 1 leaves 101 with the defaults.
    pub floor: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            floor: DEFAULT_FLOOR,
        }
    }
}

impl StoreLimits {
    /// Returns `true` when `floor < capacity` and `capacity > 0`.
    pub fn is_valid(&self) -> bool {
        self.capacity > 0 && self.floor < self.capacity
    }
}

/// # Snapshot
///
/// An immutable, newest-first copy of the store contents. Cloning is an `Arc`
/// bump; the listings themselves are shared, never copied.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<[Arc<Listing>]>);

impl Default for Snapshot {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Snapshot {
    /// Identity keys in snapshot order.
    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|l| l.id.as_str()).collect()
    }

    /// Returns `true` if both snapshots share the same allocation.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Snapshot {
    type Target = [Arc<Listing>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct StoreInner {
    index: HashSet<String>,
    ordered: VecDeque<Arc<Listing>>,
    snapshot: Snapshot,
}

impl StoreInner {
    fn rebuild_snapshot(&mut self) {
        self.snapshot = Snapshot(self.ordered.iter().cloned().collect());
    }
}

/// # Listing Store
///
/// Deduplicating, bounded, newest-first collection. First-seen wins: a later
/// listing with a known id is discarded, its attributes are not merged in.
pub struct ListingStore {
    limits: StoreLimits,
    inner: RwLock<StoreInner>,
}

impl Default for ListingStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

impl ListingStore {
    /// Creates an empty store.
    ///
    /// Limits with `floor >= capacity` are clamped so the floor sits one below
    /// the capacity; callers wanting an error validate via [`StoreLimits::is_valid`].
    pub fn new(limits: StoreLimits) -> Self {
        let capacity = limits.capacity.max(1);
        let limits = StoreLimits {
            capacity,
            floor: limits.floor.min(capacity - 1),
        };

        Self {
            limits,
            inner: RwLock::new(StoreInner {
                index: HashSet::with_capacity(capacity + 1),
                ordered: VecDeque::with_capacity(capacity + 1),
                snapshot: Snapshot::default(),
            }),
        }
    }

    /// The effective limits.
    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// # Merge
    ///
    /// Applies one batch in input order. Unknown ids become the new head of the
    /// sequence; known ids are skipped. If the sequence then exceeds the
    /// capacity, `capacity - floor` listings are evicted from the tail, or the
    /// whole overflow if that is larger, so the store never stays above capacity.
    ///
    /// # Returns
    /// The number of listings actually inserted. Zero means the store is
    /// unchanged and nobody needs to be told.
    pub fn merge<I>(&self, batch: I) -> usize
    where
        I: IntoIterator<Item = Listing>,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;

        for listing in batch {
            if inner.index.contains(&listing.id) {
                continue;
            }
            inner.index.insert(listing.id.clone());
            inner.ordered.push_front(Arc::new(listing));
            added += 1;
        }

        if added == 0 {
            return 0;
        }

        if inner.ordered.len() > self.limits.capacity {
            let overflow = inner.ordered.len() - self.limits.capacity;
            let evict = (self.limits.capacity - self.limits.floor).max(overflow);
            for _ in 0..evict {
                if let Some(old) = inner.ordered.pop_back() {
                    inner.index.remove(&old.id);
                }
            }
            log::debug!(
                "Store over capacity ({}), evicted {} oldest listings",
                self.limits.capacity,
                evict
            );
        }

        inner.rebuild_snapshot();
        added
    }

    /// Point-in-time copy of the newest-first sequence.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    /// Number of retained listings.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).ordered.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a listing with this id is retained.
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .index
            .contains(id)
    }

    /// Drops every listing. Used on session teardown.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.index.clear();
        inner.ordered.clear();
        inner.snapshot = Snapshot::default();
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let inner = self.inner.read().unwrap();
        assert_eq!(inner.index.len(), inner.ordered.len());
        for l in &inner.ordered {
            assert!(inner.index.contains(&l.id), "{} missing from index", l.id);
        }
        assert_eq!(inner.snapshot.len(), inner.ordered.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(ids: &[&str]) -> Vec<Listing> {
        ids.iter().map(|id| Listing::with_id(*id)).collect()
    }

    #[test]
    fn merge_scenario_prepends_and_dedups() {
        let store = ListingStore::default();

        assert_eq!(store.merge(batch(&["A", "B", "C"])), 3);
        assert_eq!(store.snapshot().ids(), vec!["C", "B", "A"]);

        assert_eq!(store.merge(batch(&["B", "D"])), 1);
        assert_eq!(store.snapshot().ids(), vec!["D", "C", "B", "A"]);

        let before = store.snapshot();
        assert_eq!(store.merge(batch(&["A"])), 0);
        let after = store.snapshot();
        assert_eq!(after.ids(), vec!["D", "C", "B", "A"]);
        assert!(before.ptr_eq(&after));
        store.assert_consistent();
    }

    #[test]
    fn first_seen_wins() {
        let store = ListingStore::default();
        store.merge(vec![Listing::with_id("x").titled("original")]);

        let added = store.merge(vec![
            Listing::with_id("x").titled("update"),
            Listing::with_id("y").titled("first"),
            Listing::with_id("y").titled("second"),
        ]);

        assert_eq!(added, 1);
        let snap = store.snapshot();
        assert_eq!(snap.ids(), vec!["y", "x"]);
        assert_eq!(snap[0].title.as_deref(), Some("first"));
        assert_eq!(snap[1].title.as_deref(), Some("original"));
        store.assert_consistent();
    }

    #[test]
    fn eviction_removes_one_fixed_block() {
        let store = ListingStore::default();
        let initial: Vec<Listing> = (0..200).map(|i| Listing::with_id(format!("K{i}"))).collect();
        assert_eq!(store.merge(initial), 200);
        assert_eq!(store.len(), 200);

        assert_eq!(store.merge(vec![Listing::with_id("fresh")]), 1);
        assert_eq!(store.len(), 101);
        assert_eq!(store.snapshot()[0].id, "fresh");

        for i in 0..100 {
            assert!(!store.contains(&format!("K{i}")), "K{i} should be evicted");
        }
        for i in 100..200 {
            assert!(store.contains(&format!("K{i}")));
        }
        store.assert_consistent();
    }

    #[test]
    fn sequential_merges_keep_newest_window() {
        let store = ListingStore::default();
        for i in 1..=250 {
            store.merge(vec![Listing::with_id(format!("K{i}"))]);
            assert!(store.len() <= 200);
        }

        // One cut at K201 (201 -> 101), then 49 more arrivals.
        let snap = store.snapshot();
        assert_eq!(snap.len(), 150);
        let expected: Vec<String> = (101..=250).rev().map(|i| format!("K{i}")).collect();
        assert_eq!(snap.ids(), expected.iter().map(String::as_str).collect::<Vec<_>>());
        store.assert_consistent();
    }

    #[test]
    fn oversized_batch_is_trimmed_in_one_merge() {
        let store = ListingStore::default();
        let big: Vec<Listing> = (0..350).map(|i| Listing::with_id(format!("B{i}"))).collect();

        assert_eq!(store.merge(big), 350);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 200);
        assert_eq!(snap[0].id, "B349");
        assert_eq!(snap[199].id, "B150");
        assert!(!store.contains("B149"));
        store.assert_consistent();
    }

    #[test]
    fn single_key_merges_evict_from_index_too() {
        let store = ListingStore::default();
        for i in 0..=200 {
            assert_eq!(store.merge(vec![Listing::with_id(format!("S{i}"))]), 1);
        }

        assert_eq!(store.len(), 101);
        for i in 0..100 {
            assert!(!store.contains(&format!("S{i}")), "S{i} should be evicted");
        }
        for i in 100..=200 {
            assert!(store.contains(&format!("S{i}")));
        }
        store.assert_consistent();

        // An evicted id is new again.
        assert_eq!(store.merge(vec![Listing::with_id("S0")]), 1);
        assert_eq!(store.snapshot()[0].id, "S0");
        assert_eq!(store.len(), 102);
    }

    #[test]
    fn snapshot_is_independent_of_later_merges() {
        let store = ListingStore::default();
        store.merge(batch(&["a"]));
        let snap = store.snapshot();
        store.merge(batch(&["b"]));

        assert_eq!(snap.ids(), vec!["a"]);
        assert_eq!(store.snapshot().ids(), vec!["b", "a"]);
    }

    #[test]
    fn custom_limits_and_clamping() {
        let store = ListingStore::new(StoreLimits { capacity: 4, floor: 2 });
        store.merge(batch(&["1", "2", "3", "4"]));
        assert_eq!(store.len(), 4);
        store.merge(batch(&["5"]));
        assert_eq!(store.snapshot().ids(), vec!["5", "4", "3"]);

        let clamped = ListingStore::new(StoreLimits { capacity: 3, floor: 9 });
        assert_eq!(clamped.limits(), StoreLimits { capacity: 3, floor: 2 });
        assert!(!StoreLimits { capacity: 3, floor: 9 }.is_valid());
    }

    #[test]
    fn reset_empties_everything() {
        let store = ListingStore::default();
        store.merge(batch(&["a", "b"]));
        store.reset();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
        assert!(!store.contains("a"));
        assert_eq!(store.merge(batch(&["a"])), 1);
    }

    #[test]
    fn concurrent_readers_never_see_torn_state() {
        let store = Arc::new(ListingStore::default());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for round in 0..300 {
                    let ids: Vec<Listing> = (0..3)
                        .map(|i| Listing::with_id(format!("r{round}-{i}")))
                        .collect();
                    store.merge(ids);
                }
            })
        };

        for _ in 0..300 {
            let snap = store.snapshot();
            assert!(snap.len() <= 200);
            // A merge adds whole batches of three, so the count is a multiple of three
            // until the first eviction pass, which never leaves fewer than 100.
            assert!(snap.len() % 3 == 0 || snap.len() >= 100);
        }
        writer.join().unwrap();
        store.assert_consistent();
    }
}
