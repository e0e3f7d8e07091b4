//! Eviction policies for the memory tier

use crate::item::CacheItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Caller-supplied ordering for [`CachePolicy::Custom`]
///
/// The memory cache keeps its entries in a list running from "keep" to
/// "evict next". A candidate is placed right before the first entry, walking
/// from the front, that does not precede it.
///
/// This is a sorted insert: the list stays ordered by `precedes`, and a
/// candidate lands ahead of the entries it ties with, so among equals the
/// oldest is evicted first. With [`PriorityFirst`], inserting priority 5 into
/// `[9, 7, 1]` gives `[9, 7, 5, 1]`.
pub trait EvictionStrategy<T>: Send + Sync {
    /// Whether `existing` should stay ahead of (be evicted after) `candidate`
    fn precedes(&self, existing: &CacheItem<T>, candidate: &CacheItem<T>) -> bool;

    /// Name used in logs
    fn name(&self) -> &str {
        "custom"
    }
}

/// Keeps higher-priority items longest; equal priorities evict oldest first
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityFirst;

impl<T> EvictionStrategy<T> for PriorityFirst {
    fn precedes(&self, existing: &CacheItem<T>, candidate: &CacheItem<T>) -> bool {
        existing.priority > candidate.priority
    }

    fn name(&self) -> &str {
        "priority-first"
    }
}

/// Selects how the memory cache orders entries for eviction
pub enum CachePolicy<T> {
    /// Least recently used is evicted first
    Lru,
    /// Least frequently hit is evicted first; ties evict the earlier insert
    Lfu,
    Custom(Arc<dyn EvictionStrategy<T>>),
}

impl<T> CachePolicy<T> {
    pub fn custom(strategy: impl EvictionStrategy<T> + 'static) -> Self {
        Self::Custom(Arc::new(strategy))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Custom(strategy) => strategy.name(),
        }
    }
}

impl<T> Clone for CachePolicy<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Lru => Self::Lru,
            Self::Lfu => Self::Lfu,
            Self::Custom(strategy) => Self::Custom(Arc::clone(strategy)),
        }
    }
}

impl<T> Default for CachePolicy<T> {
    fn default() -> Self {
        Self::Lru
    }
}

impl<T> fmt::Debug for CachePolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => write!(f, "Lru"),
            Self::Lfu => write!(f, "Lfu"),
            Self::Custom(strategy) => f.debug_tuple("Custom").field(&strategy.name()).finish(),
        }
    }
}

/// Configuration-level policy selector
///
/// Custom strategies cannot be named in a config file, so only the built-in
/// policies are representable here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Lru,
    Lfu,
}

impl<T> From<PolicyKind> for CachePolicy<T> {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Lru => Self::Lru,
            PolicyKind::Lfu => Self::Lfu,
        }
    }
}
