//! Pixcache CLI library
//!
//! Configuration loading and path helpers shared by the `pixcache` binary
//! and its tests.

pub mod config;
pub mod paths;

pub use config::{ConfigManager, get_config};
