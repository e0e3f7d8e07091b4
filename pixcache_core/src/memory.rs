//! Memory tier: a capacity-bounded key/item store ordered by a [`CachePolicy`]
//!
//! Entries live in an arena of nodes threaded into a doubly linked list. Two
//! sentinel nodes sit at fixed slots: [`HEAD`] in front of the entry most
//! worth keeping, [`TAIL`] behind the next eviction victim. A hash index maps
//! every key to its node, so unlinking and relinking on a hit is O(1) for LRU.
//!
//! All operations run as one critical section under a single mutex. Helpers
//! on [`Inner`] never take the lock themselves.

use crate::clock::{SharedClock, system_clock};
use crate::config::MemoryTierConfig;
use crate::error::CacheError;
use crate::item::CacheItem;
use crate::policy::{CachePolicy, EvictionStrategy};
use crate::size::DataSize;
use crate::stats::CacheStats;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

const HEAD: usize = 0;
const TAIL: usize = 1;

struct Node<T> {
    key: String,
    /// `None` for sentinels and for free slots
    item: Option<CacheItem<T>>,
    prev: usize,
    next: usize,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            key: String::new(),
            item: None,
            prev: HEAD,
            next: TAIL,
        }
    }
}

struct Inner<T> {
    index: HashMap<String, usize>,
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    current_cost: u64,
    max_hit_count: u64,
    min_hit_count: u64,
    capacity: DataSize,
    item_size_limit: DataSize,
    policy: CachePolicy<T>,
    hits: u64,
    misses: u64,
}

impl<T> Inner<T> {
    fn new(capacity: DataSize, item_size_limit: DataSize, policy: CachePolicy<T>) -> Self {
        Self {
            index: HashMap::new(),
            nodes: vec![Node::sentinel(), Node::sentinel()],
            free: Vec::new(),
            current_cost: 0,
            max_hit_count: 0,
            min_hit_count: 0,
            capacity,
            item_size_limit,
            policy,
            hits: 0,
            misses: 0,
        }
    }

    fn first(&self) -> usize {
        self.nodes[HEAD].next
    }

    fn last(&self) -> usize {
        self.nodes[TAIL].prev
    }

    fn hit_count(&self, idx: usize) -> u64 {
        self.nodes[idx].item.as_ref().map_or(0, CacheItem::hit_count)
    }

    fn allocate(&mut self, key: String, item: CacheItem<T>) -> usize {
        let node = Node {
            key,
            item: Some(item),
            prev: HEAD,
            next: TAIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn splice(&mut self, prev: usize, next: usize, idx: usize) {
        self.nodes[idx].prev = prev;
        self.nodes[idx].next = next;
        self.nodes[prev].next = idx;
        self.nodes[next].prev = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.refresh_hit_bounds();
    }

    fn link(&mut self, idx: usize) {
        match self.policy.clone() {
            CachePolicy::Lru => {
                let front = self.first();
                self.splice(HEAD, front, idx);
            }
            CachePolicy::Lfu => self.link_by_frequency(idx),
            CachePolicy::Custom(strategy) => self.link_by_strategy(strategy.as_ref(), idx),
        }
        self.refresh_hit_bounds();
    }

    /// Keeps the list sorted by descending hit count. The new node lands in
    /// front of every node with an equal or lower count, so among equals the
    /// earlier insert is evicted first.
    fn link_by_frequency(&mut self, idx: usize) {
        if self.first() == TAIL {
            self.splice(HEAD, TAIL, idx);
            return;
        }

        let hits = self.hit_count(idx);
        let from_head = self.max_hit_count.abs_diff(hits);
        let from_tail = self.min_hit_count.abs_diff(hits);

        if from_head <= from_tail {
            let mut cur = self.first();
            while cur != TAIL && self.hit_count(cur) > hits {
                cur = self.nodes[cur].next;
            }
            let prev = self.nodes[cur].prev;
            self.splice(prev, cur, idx);
        } else {
            let mut cur = self.last();
            while cur != HEAD && self.hit_count(cur) <= hits {
                cur = self.nodes[cur].prev;
            }
            let next = self.nodes[cur].next;
            self.splice(cur, next, idx);
        }
    }

    fn link_by_strategy(&mut self, strategy: &dyn EvictionStrategy<T>, idx: usize) {
        let mut cur = self.first();
        while cur != TAIL {
            let keeps_ahead = match (&self.nodes[cur].item, &self.nodes[idx].item) {
                (Some(existing), Some(candidate)) => strategy.precedes(existing, candidate),
                _ => false,
            };
            if !keeps_ahead {
                break;
            }
            cur = self.nodes[cur].next;
        }
        let prev = self.nodes[cur].prev;
        self.splice(prev, cur, idx);
    }

    fn refresh_hit_bounds(&mut self) {
        if self.first() == TAIL {
            self.max_hit_count = 0;
            self.min_hit_count = 0;
        } else {
            self.max_hit_count = self.hit_count(self.first());
            self.min_hit_count = self.hit_count(self.last());
        }
    }

    /// Drop a node from both the list and the index
    fn remove(&mut self, idx: usize) -> Option<CacheItem<T>> {
        self.unlink(idx);
        let node = &mut self.nodes[idx];
        let key = std::mem::take(&mut node.key);
        let item = node.item.take();
        self.index.remove(&key);
        self.free.push(idx);
        if let Some(item) = &item {
            self.current_cost = self.current_cost.saturating_sub(item.size.as_bytes());
        }
        item
    }

    /// Evict from the tail end until `incoming` more bytes fit
    fn make_room(&mut self, incoming: u64) -> usize {
        let mut evicted = 0;
        while self.capacity.as_bytes() <= self.current_cost.saturating_add(incoming) {
            let victim = self.last();
            if victim == HEAD {
                break;
            }
            trace!("Evicting '{}' from memory cache", self.nodes[victim].key);
            self.remove(victim);
            evicted += 1;
        }
        evicted
    }

    /// Node indices from the evict-next end to the keep end
    fn indices_tail_first(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.index.len());
        let mut cur = self.last();
        while cur != HEAD {
            order.push(cur);
            cur = self.nodes[cur].prev;
        }
        order
    }

    fn reset_list(&mut self) {
        self.nodes[HEAD].next = TAIL;
        self.nodes[TAIL].prev = HEAD;
        self.refresh_hit_bounds();
    }
}

/// Thread-safe, capacity-bounded memory cache
pub struct MemoryCache<T> {
    inner: Mutex<Inner<T>>,
    clock: SharedClock,
}

impl<T> fmt::Debug for MemoryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MemoryCache");
        match self.inner.try_lock() {
            Some(inner) => debug
                .field("entries", &inner.index.len())
                .field("current_cost", &inner.current_cost)
                .field("capacity", &inner.capacity)
                .field("policy", &inner.policy),
            None => debug.field("entries", &"<locked>"),
        };
        debug.finish()
    }
}

impl<T: Clone> MemoryCache<T> {
    /// Create a memory cache on the wall clock
    pub fn new(capacity: DataSize, item_size_limit: DataSize, policy: CachePolicy<T>) -> Self {
        Self {
            inner: Mutex::new(Inner::new(capacity, item_size_limit, policy)),
            clock: system_clock(),
        }
    }

    /// Create a memory cache from tier configuration
    pub fn from_config(config: &MemoryTierConfig) -> Self {
        Self::new(
            config.capacity(),
            config.item_size_limit(),
            config.policy.into(),
        )
    }

    /// Use a different time source for recency bookkeeping
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Look up an entry, recording the hit and moving it toward the keep end.
    ///
    /// Entries that have expired but not yet been swept are still returned.
    pub fn get(&self, key: &str) -> Option<CacheItem<T>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let Some(&idx) = inner.index.get(key) else {
            inner.misses += 1;
            return None;
        };

        inner.unlink(idx);
        if let Some(item) = inner.nodes[idx].item.as_mut() {
            item.record_hit(now);
        }
        inner.link(idx);
        inner.hits += 1;

        inner.nodes[idx].item.clone()
    }

    /// Store an entry, evicting from the tail end until it fits.
    ///
    /// Storing over an existing key counts as a hit on that entry and adopts
    /// the incoming payload. Fails with [`CacheError::AlreadyExists`] when the
    /// key is present and `overwrite` is false.
    pub fn put(&self, key: &str, item: CacheItem<T>, overwrite: bool) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();

        let existing = inner.index.get(key).copied();
        if existing.is_some() && !overwrite {
            return Err(CacheError::already_exists(key));
        }

        if let Some(idx) = existing {
            let old_size = inner.nodes[idx].item.as_ref().map_or(0, |i| i.size.as_bytes());
            inner.current_cost = inner.current_cost.saturating_sub(old_size);
            inner.unlink(idx);
        }

        let incoming = item.size.as_bytes();
        let evicted = inner.make_room(incoming);
        if evicted > 0 {
            debug!("Memory cache evicted {evicted} entries to fit '{key}'");
        }

        match existing {
            Some(idx) => {
                if let Some(current) = inner.nodes[idx].item.as_mut() {
                    current.absorb(item);
                }
                inner.link(idx);
            }
            None => {
                let idx = inner.allocate(key.to_string(), item);
                inner.index.insert(key.to_string(), idx);
                inner.link(idx);
            }
        }

        inner.current_cost = inner.current_cost.saturating_add(incoming);
        Ok(())
    }

    /// Remove an entry, returning it if it was present
    pub fn delete(&self, key: &str) -> Option<CacheItem<T>> {
        let mut inner = self.inner.lock();
        let idx = inner.index.get(key).copied()?;
        inner.remove(idx)
    }

    /// Remove every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let mut removed = 0;
        let mut cur = inner.first();
        while cur != TAIL {
            let next = inner.nodes[cur].next;
            let expired = inner.nodes[cur]
                .item
                .as_ref()
                .is_some_and(|item| item.is_expired_at(now));
            if expired {
                inner.remove(cur);
                removed += 1;
            }
            cur = next;
        }

        if removed > 0 {
            debug!("Memory cache swept {removed} expired entries");
        }
        removed
    }

    /// Whether a single item of `size` may be stored in this tier
    pub fn fits_size_limit(&self, size: DataSize) -> bool {
        size <= self.inner.lock().item_size_limit
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let Inner {
            capacity,
            item_size_limit,
            policy,
            hits,
            misses,
            ..
        } = &*inner;
        let mut fresh = Inner::new(*capacity, *item_size_limit, policy.clone());
        fresh.hits = *hits;
        fresh.misses = *misses;
        *inner = fresh;
    }

    /// Takes effect on the next `put`
    pub fn set_capacity(&self, capacity: DataSize) {
        self.inner.lock().capacity = capacity;
    }

    pub fn set_item_size_limit(&self, limit: DataSize) {
        self.inner.lock().item_size_limit = limit;
    }

    /// Switch policy and relink every entry under it.
    ///
    /// Entries are reinserted from the evict-next end forward so the relative
    /// age of equal-ranked entries survives the switch.
    pub fn set_policy(&self, policy: CachePolicy<T>) {
        let mut inner = self.inner.lock();
        let order = inner.indices_tail_first();
        inner.reset_list();
        inner.policy = policy;
        for idx in order {
            inner.link(idx);
        }
    }

    /// Keys from the keep end to the evict-next end
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.index.len());
        let mut cur = inner.first();
        while cur != TAIL {
            keys.push(inner.nodes[cur].key.clone());
            cur = inner.nodes[cur].next;
        }
        keys
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_cost(&self) -> DataSize {
        DataSize::bytes(self.inner.lock().current_cost)
    }

    pub fn capacity(&self) -> DataSize {
        self.inner.lock().capacity
    }

    pub fn item_size_limit(&self) -> DataSize {
        self.inner.lock().item_size_limit
    }

    pub fn policy_name(&self) -> String {
        self.inner.lock().policy.name().to_string()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entry_count: inner.index.len(),
            hit_count: inner.hits,
            miss_count: inner.misses,
            total_size_bytes: inner.current_cost,
        }
    }

    /// Walk the list and index and check they describe the same entries
    #[cfg(test)]
    fn assert_consistent(&self) {
        let inner = self.inner.lock();
        let mut seen = 0;
        let mut cost = 0;
        let mut prev = HEAD;
        let mut cur = inner.first();
        while cur != TAIL {
            assert_eq!(inner.nodes[cur].prev, prev, "broken back link");
            let key = &inner.nodes[cur].key;
            assert_eq!(inner.index.get(key), Some(&cur), "list node missing from index");
            cost += inner.nodes[cur].item.as_ref().map_or(0, |i| i.size.as_bytes());
            seen += 1;
            prev = cur;
            cur = inner.nodes[cur].next;
        }
        assert_eq!(inner.nodes[TAIL].prev, prev);
        assert_eq!(seen, inner.index.len(), "index holds nodes absent from the list");
        assert_eq!(cost, inner.current_cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::expiration::{Expiration, ExpirationBasis};
    use crate::policy::PriorityFirst;
    use chrono::{DateTime, TimeDelta, Utc};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn item(bytes: u64) -> CacheItem<u64> {
        CacheItem::new(bytes, DataSize::bytes(bytes), t0())
    }

    fn cache(capacity: u64, policy: CachePolicy<u64>) -> MemoryCache<u64> {
        MemoryCache::new(DataSize::bytes(capacity), DataSize::UNBOUNDED, policy)
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let cache = cache(100, CachePolicy::Lru);

        cache.put("A", item(60), true).unwrap();
        cache.put("B", item(60), true).unwrap();

        assert!(!cache.contains_key("A"));
        assert!(cache.contains_key("B"));
        assert_eq!(cache.current_cost(), DataSize::bytes(60));
        cache.assert_consistent();
    }

    #[test]
    fn test_lru_touch_reorders() {
        let cache = cache(1000, CachePolicy::Lru);
        for key in ["A", "B", "C"] {
            cache.put(key, item(10), true).unwrap();
        }

        assert!(cache.get("A").is_some());
        assert_eq!(cache.keys(), vec!["A", "C", "B"]);

        cache.set_capacity(DataSize::bytes(35));
        cache.put("D", item(10), true).unwrap();
        assert!(!cache.contains_key("B"));
        assert_eq!(cache.keys(), vec!["D", "A", "C"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_lfu_ties_evict_earliest_insert() {
        let cache = cache(30, CachePolicy::Lfu);
        cache.put("old", item(10), true).unwrap();
        cache.put("new", item(10), true).unwrap();

        assert_eq!(cache.keys(), vec!["new", "old"]);

        cache.put("third", item(15), true).unwrap();
        assert!(!cache.contains_key("old"));
        assert!(cache.contains_key("new"));
        cache.assert_consistent();
    }

    #[test]
    fn test_lfu_keeps_frequent_entries() {
        let cache = cache(1000, CachePolicy::Lfu);
        for key in ["a", "b", "c", "d"] {
            cache.put(key, item(10), true).unwrap();
        }
        for _ in 0..3 {
            cache.get("a");
        }
        cache.get("c");
        cache.get("c");
        cache.get("d");

        assert_eq!(cache.keys(), vec!["a", "c", "d", "b"]);

        // Scanning from the tail end must land in the same place.
        cache.get("b");
        assert_eq!(cache.keys(), vec!["a", "c", "b", "d"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_custom_strategy_orders_by_priority() {
        let cache = cache(1000, CachePolicy::custom(PriorityFirst));
        cache.put("low", item(1).with_priority(1), true).unwrap();
        cache.put("high", item(1).with_priority(9), true).unwrap();
        cache.put("mid", item(1).with_priority(5), true).unwrap();
        cache.put("mid2", item(1).with_priority(5), true).unwrap();

        assert_eq!(cache.keys(), vec!["high", "mid2", "mid", "low"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_custom_strategy_inserts_between_neighbours() {
        let cache = cache(1000, CachePolicy::custom(PriorityFirst));
        for (key, priority) in [("nine", 9), ("seven", 7), ("one", 1)] {
            cache.put(key, item(1).with_priority(priority), true).unwrap();
        }
        assert_eq!(cache.keys(), vec!["nine", "seven", "one"]);

        cache.put("five", item(1).with_priority(5), true).unwrap();
        assert_eq!(cache.keys(), vec!["nine", "seven", "five", "one"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_put_without_overwrite_fails_on_existing_key() {
        let cache = cache(1000, CachePolicy::Lru);
        cache.put("k", item(10), false).unwrap();

        let error = cache.put("k", item(20), false).unwrap_err();
        assert!(matches!(error, CacheError::AlreadyExists { .. }));
        assert_eq!(cache.current_cost(), DataSize::bytes(10));
    }

    #[test]
    fn test_overwrite_counts_as_hit_and_updates_cost() {
        let cache = cache(1000, CachePolicy::Lru);
        cache.put("k", item(10), true).unwrap();
        cache.put("k", item(25), true).unwrap();

        let stored = cache.get("k").unwrap();
        assert_eq!(stored.data, 25);
        assert_eq!(stored.hit_count(), 2);
        assert_eq!(cache.current_cost(), DataSize::bytes(25));
        assert_eq!(cache.len(), 1);
        cache.assert_consistent();
    }

    #[test]
    fn test_overwrite_never_evicts_itself() {
        let cache = cache(100, CachePolicy::Lru);
        cache.put("a", item(40), true).unwrap();
        cache.put("b", item(40), true).unwrap();
        cache.get("a");
        cache.get("b");

        // "a" is now at the evict end; re-storing it must not double-count.
        cache.put("a", item(70), true).unwrap();
        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert_eq!(cache.current_cost(), DataSize::bytes(70));
        cache.assert_consistent();
    }

    #[test]
    fn test_oversized_item_still_lands() {
        let cache = cache(100, CachePolicy::Lru);
        cache.put("a", item(10), true).unwrap();
        cache.put("huge", item(500), true).unwrap();

        assert_eq!(cache.keys(), vec!["huge"]);
        assert_eq!(cache.current_cost(), DataSize::bytes(500));
    }

    #[test]
    fn test_delete_releases_cost() {
        let cache = cache(1000, CachePolicy::Lru);
        cache.put("a", item(10), true).unwrap();
        cache.put("b", item(20), true).unwrap();

        assert_eq!(cache.delete("a").map(|i| i.data), Some(10));
        assert!(cache.delete("a").is_none());
        assert_eq!(cache.current_cost(), DataSize::bytes(20));

        // Freed slots are reused.
        cache.put("c", item(5), true).unwrap();
        assert_eq!(cache.keys(), vec!["c", "b"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_last_access_expiry_resets_on_get() {
        let clock = Arc::new(ManualClock::new(t0()));
        let cache = cache(1000, CachePolicy::Lru).with_clock(clock.clone());
        let entry = || {
            item(1).with_expiration(Expiration::Minutes(5), ExpirationBasis::LastAccessTime)
        };

        cache.put("untouched", entry(), true).unwrap();
        cache.put("touched", entry(), true).unwrap();

        clock.advance(TimeDelta::minutes(4));
        cache.get("touched");

        clock.advance(TimeDelta::minutes(2));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.keys(), vec!["touched"]);

        clock.set(t0() + TimeDelta::minutes(8));
        assert_eq!(cache.sweep_expired(), 0);

        clock.set(t0() + TimeDelta::minutes(10));
        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let clock = Arc::new(ManualClock::new(t0()));
        let cache = cache(1000, CachePolicy::Lru).with_clock(clock.clone());
        cache
            .put("short", item(1).with_expiration(Expiration::Minutes(1), ExpirationBasis::CreationTime), true)
            .unwrap();
        cache
            .put("long", item(1).with_expiration(Expiration::Never, ExpirationBasis::CreationTime), true)
            .unwrap();
        cache
            .put("stale", item(1).with_expiration(Expiration::Expired, ExpirationBasis::CreationTime), true)
            .unwrap();

        clock.advance(TimeDelta::minutes(2));
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.sweep_expired(), 0);
        assert_eq!(cache.keys(), vec!["long"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_fits_size_limit() {
        let cache: MemoryCache<u64> =
            MemoryCache::new(DataSize::kib(1), DataSize::bytes(100), CachePolicy::Lru);

        assert!(cache.fits_size_limit(DataSize::bytes(100)));
        assert!(!cache.fits_size_limit(DataSize::bytes(101)));

        cache.set_item_size_limit(DataSize::UNBOUNDED);
        assert!(cache.fits_size_limit(DataSize::gib(4)));
    }

    #[test]
    fn test_switching_policy_relinks_entries() {
        let cache = cache(1000, CachePolicy::Lru);
        for key in ["a", "b", "c"] {
            cache.put(key, item(1), true).unwrap();
        }
        cache.get("a");
        cache.get("a");
        cache.get("b");

        cache.set_policy(CachePolicy::Lfu);
        assert_eq!(cache.policy_name(), "lfu");
        assert_eq!(cache.keys(), vec!["a", "b", "c"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = cache(1000, CachePolicy::Lru);
        cache.put("a", item(10), true).unwrap();
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.total_size_bytes, 10);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_cost(), DataSize::ZERO);
        assert_eq!(cache.stats().hit_count, 1);
        cache.assert_consistent();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, u64),
        Get(u8),
        Delete(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, 1u64..60).prop_map(|(k, s)| Op::Put(k, s)),
            (0u8..16).prop_map(Op::Get),
            (0u8..16).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn test_cost_never_exceeds_capacity(ops in prop::collection::vec(op(), 1..200), lfu in any::<bool>()) {
            let policy = if lfu { CachePolicy::Lfu } else { CachePolicy::Lru };
            let cache = cache(100, policy);

            for op in ops {
                match op {
                    Op::Put(k, size) => {
                        cache.put(&k.to_string(), item(size), true).unwrap();
                        prop_assert!(cache.current_cost() <= cache.capacity());
                    }
                    Op::Get(k) => {
                        cache.get(&k.to_string());
                    }
                    Op::Delete(k) => {
                        cache.delete(&k.to_string());
                    }
                }
                cache.assert_consistent();
            }
        }
    }
}
