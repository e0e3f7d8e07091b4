//! Metadata envelope around a cached payload

use crate::expiration::{Expiration, ExpirationBasis};
use crate::size::DataSize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payload plus the bookkeeping a cache tier needs to order and expire it
///
/// `first_cached_at` is fixed at construction and `last_accessed_at` never
/// moves before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem<T> {
    /// Caller-assigned priority. Only custom eviction strategies look at it.
    pub priority: i64,
    /// Accounted cost of the payload
    pub size: DataSize,
    first_cached_at: DateTime<Utc>,
    hit_count: u64,
    last_accessed_at: DateTime<Utc>,
    pub expiration: Expiration,
    pub expiration_basis: ExpirationBasis,
    pub data: T,
}

impl<T> CacheItem<T> {
    /// Default lifetime for an item built without explicit expiration settings
    pub const DEFAULT_EXPIRATION: Expiration = Expiration::Minutes(5);

    /// Create an item first cached at `now`
    pub fn new(data: T, size: DataSize, now: DateTime<Utc>) -> Self {
        Self {
            priority: 0,
            size,
            first_cached_at: now,
            hit_count: 0,
            last_accessed_at: now,
            expiration: Self::DEFAULT_EXPIRATION,
            expiration_basis: ExpirationBasis::LastAccessTime,
            data,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expiration(mut self, expiration: Expiration, basis: ExpirationBasis) -> Self {
        self.expiration = expiration;
        self.expiration_basis = basis;
        self
    }

    pub fn first_cached_at(&self) -> DateTime<Utc> {
        self.first_cached_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Instant at which the item goes stale, `None` if never
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let basis = match self.expiration_basis {
            ExpirationBasis::CreationTime => self.first_cached_at,
            ExpirationBasis::LastAccessTime => self.last_accessed_at,
        };
        self.expiration.expires_at(basis)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now > expires_at)
    }

    /// Record a read hit at `now`
    pub fn record_hit(&mut self, now: DateTime<Utc>) {
        self.hit_count = self.hit_count.saturating_add(1);
        self.touch(now);
    }

    /// Record a store-driven hit: count it and adopt the incoming payload,
    /// its size and its access time. Creation time and hit history stay.
    pub fn absorb(&mut self, incoming: CacheItem<T>) {
        self.hit_count = self.hit_count.saturating_add(1);
        self.size = incoming.size;
        self.data = incoming.data;
        self.touch(incoming.last_accessed_at);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_accessed_at = at.max(self.first_cached_at);
    }
}
