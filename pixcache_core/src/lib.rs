//! Pixcache Core Library
//!
//! A client-side image cache: a bounded in-memory tier with pluggable
//! eviction, a file-backed disk tier, and a downloader that coalesces
//! concurrent fetches and revalidates stored copies with entity tags.

pub mod clock;
pub mod codec;
pub mod config;
pub mod disk;
pub mod downloader;
pub mod error;
pub mod expiration;
pub mod facade;
pub mod http;
pub mod item;
pub mod memory;
pub mod payload;
pub mod policy;
pub mod size;
pub mod stats;

// Re-export main types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use codec::{BincodeCodec, ItemCodec, JsonCodec};
pub use config::{CacheConfig, DiskTierConfig, MemoryTierConfig, NetworkConfig};
pub use disk::{DiskCache, DiskUsage};
pub use downloader::{Downloader, FetchRequest, Transport};
pub use error::{CacheError, DownloadError, Error, Result, SaveFailure, ValidationError};
pub use expiration::{Expiration, ExpirationBasis};
pub use facade::{ImageCache, ResolveOptions, SweepReport, Tier};
pub use http::HttpTransport;
pub use item::CacheItem;
pub use memory::MemoryCache;
pub use payload::{ImageFormat, ImagePayload};
pub use policy::{CachePolicy, EvictionStrategy, PolicyKind, PriorityFirst};
pub use size::DataSize;
pub use stats::CacheStats;
