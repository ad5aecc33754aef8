// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared tile cache.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared residency accounting for every [`TileStore`] created from the
/// same cache.
///
/// The cache does not own tile buffers; stores do. It tracks how many bytes
/// of tile data are resident across all of its stores, hands out the
/// last-access stamps the LRU policy orders by, and answers whether the
/// configured budget has been exceeded. Eviction itself is cooperative: the
/// store whose fault pushed the total over budget evicts its own
/// least-recently-used clean tiles. A store never reclaims memory held by
/// *other* stores; under the engine's single-threaded model every store
/// gets its turn at the budget the next time it faults a tile in.
///
/// Dirty tiles are never evicted.
///
/// Create one cache at host startup and pass it to every store, rather
/// than keeping residency limits in module-level statics. Handles are
/// cheap to clone and all refer to the same accounting.
///
/// [`TileStore`]: crate::store::TileStore
#[derive(Clone, Debug)]
pub struct TileCache {
    inner: Rc<RefCell<CacheInner>>,
}

#[derive(Debug)]
struct CacheInner {
    budget: Option<usize>,
    resident: usize,
    clock: u64,
    evictions: u64,
}

impl TileCache {
    /// A cache that asks stores to evict once more than `budget_bytes` of
    /// tile data are resident.
    pub fn new(budget_bytes: usize) -> Self {
        Self::with_budget(Some(budget_bytes))
    }

    /// A cache that never asks for eviction.
    pub fn unbounded() -> Self {
        Self::with_budget(None)
    }

    fn with_budget(budget: Option<usize>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CacheInner {
                budget,
                resident: 0,
                clock: 0,
                evictions: 0,
            })),
        }
    }

    /// The configured byte budget, or `None` for an unbounded cache.
    pub fn budget(&self) -> Option<usize> {
        self.inner.borrow().budget
    }

    /// Bytes of tile data currently resident across all stores.
    pub fn resident_bytes(&self) -> usize {
        self.inner.borrow().resident
    }

    /// How many tiles have been evicted over the cache's lifetime.
    pub fn evictions(&self) -> u64 {
        self.inner.borrow().evictions
    }

    pub(crate) fn next_stamp(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        inner.clock += 1;
        inner.clock
    }

    pub(crate) fn charge(&self, bytes: usize) {
        self.inner.borrow_mut().resident += bytes;
    }

    pub(crate) fn release(&self, bytes: usize) {
        let mut inner = self.inner.borrow_mut();
        debug_assert!(inner.resident >= bytes, "released more bytes than charged");
        inner.resident = inner.resident.saturating_sub(bytes);
    }

    pub(crate) fn note_eviction(&self) {
        self.inner.borrow_mut().evictions += 1;
    }

    pub(crate) fn over_budget(&self) -> bool {
        let inner = self.inner.borrow();
        match inner.budget {
            Some(budget) => inner.resident > budget,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_is_never_over_budget() {
        let cache = TileCache::unbounded();
        cache.charge(usize::MAX / 2);
        assert!(!cache.over_budget());
    }

    #[test]
    fn charge_and_release_balance() {
        let cache = TileCache::new(100);
        cache.charge(60);
        assert!(!cache.over_budget());
        cache.charge(60);
        assert!(cache.over_budget());
        cache.release(60);
        assert!(!cache.over_budget());
        assert_eq!(cache.resident_bytes(), 60);
        cache.note_eviction();
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn clones_share_accounting() {
        let cache = TileCache::new(10);
        let other = cache.clone();
        cache.charge(25);
        assert_eq!(other.resident_bytes(), 25);
        assert!(other.over_budget());
    }

    #[test]
    fn stamps_increase() {
        let cache = TileCache::unbounded();
        let a = cache.next_stamp();
        let b = cache.next_stamp();
        assert!(b > a);
    }
}
