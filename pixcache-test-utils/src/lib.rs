//! Test utilities for pixcache
//!
//! This crate provides a scripted transport and payload builders for
//! exercising the cache tiers and the downloader without a network.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::TestPayloadBuilder;
pub use mocks::MockTransport;
