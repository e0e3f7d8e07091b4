//! Construction-time configuration for the cache tiers and the fetch layer

use crate::error::ValidationError;
use crate::expiration::{Expiration, ExpirationBasis};
use crate::policy::PolicyKind;
use crate::size::DataSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The name of the application cache directory
const APP_CACHE_DIR: &str = "pixcache";

/// Default folder holding disk entries
const DEFAULT_FOLDER: &str = "images";

/// Complete cache configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub memory: MemoryTierConfig,

    #[serde(default)]
    pub disk: DiskTierConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// Memory tier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTierConfig {
    pub capacity_bytes: u64,
    /// `None` means no per-item ceiling
    pub item_size_limit_bytes: Option<u64>,
    pub policy: PolicyKind,
    pub expiration: Expiration,
    pub expiration_basis: ExpirationBasis,
    pub sweep_interval_secs: u64,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DataSize::mib(8192).as_bytes(),
            item_size_limit_bytes: None,
            policy: PolicyKind::Lru,
            expiration: Expiration::Minutes(30),
            expiration_basis: ExpirationBasis::LastAccessTime,
            sweep_interval_secs: 30 * 60,
        }
    }
}

impl MemoryTierConfig {
    pub fn capacity(&self) -> DataSize {
        DataSize::bytes(self.capacity_bytes)
    }

    pub fn item_size_limit(&self) -> DataSize {
        DataSize::from_limit(self.item_size_limit_bytes)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Disk tier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskTierConfig {
    /// Directory the entry folder lives under
    pub root: PathBuf,
    /// Folder name prefixed to every sanitized key
    pub folder: String,
    pub capacity_bytes: u64,
    pub item_size_limit_bytes: Option<u64>,
    pub expiration: Expiration,
    pub expiration_basis: ExpirationBasis,
    pub sweep_interval_secs: u64,
}

impl Default for DiskTierConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            folder: DEFAULT_FOLDER.to_string(),
            capacity_bytes: DataSize::mib(100).as_bytes(),
            item_size_limit_bytes: None,
            expiration: Expiration::Days(7),
            expiration_basis: ExpirationBasis::CreationTime,
            sweep_interval_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl DiskTierConfig {
    /// Disk settings rooted at a specific directory (for tests and embedding)
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> DataSize {
        DataSize::bytes(self.capacity_bytes)
    }

    pub fn item_size_limit(&self) -> DataSize {
        DataSize::from_limit(self.item_size_limit_bytes)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Folder holding the entry files
    pub fn folder_path(&self) -> PathBuf {
        self.root.join(&self.folder)
    }
}

/// Fetch layer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("pixcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CacheConfig {
    /// Create a test configuration rooted at `root`
    pub fn test(root: impl Into<PathBuf>) -> Self {
        Self {
            memory: MemoryTierConfig {
                capacity_bytes: DataSize::mib(1).as_bytes(),
                sweep_interval_secs: 60,
                ..MemoryTierConfig::default()
            },
            disk: DiskTierConfig {
                capacity_bytes: DataSize::mib(4).as_bytes(),
                sweep_interval_secs: 60,
                ..DiskTierConfig::at(root)
            },
            network: NetworkConfig {
                timeout_seconds: 5,
                ..NetworkConfig::default()
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.memory.capacity_bytes == 0 {
            return Err(ValidationError::invalid_parameter(
                "memory.capacity_bytes",
                "must be greater than zero",
            ));
        }
        if self.disk.capacity_bytes == 0 {
            return Err(ValidationError::invalid_parameter(
                "disk.capacity_bytes",
                "must be greater than zero",
            ));
        }
        if self.memory.sweep_interval_secs == 0 || self.disk.sweep_interval_secs == 0 {
            return Err(ValidationError::invalid_configuration(
                "sweep intervals must be at least one second",
            ));
        }
        let folder = self.disk.folder.as_str();
        if folder.is_empty() || folder.contains(['/', '\\']) || folder == "." || folder == ".." {
            return Err(ValidationError::invalid_parameter(
                "disk.folder",
                "must be a single, non-empty path component",
            ));
        }
        if self.network.timeout_seconds == 0 {
            return Err(ValidationError::invalid_parameter(
                "network.timeout_seconds",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Platform cache directory for pixcache
///
/// Falls back to `.pixcache` in the working directory when the platform
/// directory cannot be determined.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join(APP_CACHE_DIR))
        .unwrap_or_else(|| PathBuf::from(".pixcache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();

        assert_eq!(config.memory.capacity(), DataSize::mib(8192));
        assert!(config.memory.item_size_limit().is_unbounded());
        assert_eq!(config.memory.expiration, Expiration::Minutes(30));
        assert_eq!(config.memory.expiration_basis, ExpirationBasis::LastAccessTime);
        assert_eq!(config.disk.capacity(), DataSize::mib(100));
        assert_eq!(config.disk.expiration, Expiration::Days(7));
        assert_eq!(config.disk.expiration_basis, ExpirationBasis::CreationTime);
        assert_eq!(config.disk.sweep_interval(), Duration::from_secs(604_800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_folder_path() {
        let disk = DiskTierConfig::at("/tmp/pix");
        assert_eq!(disk.folder_path(), PathBuf::from("/tmp/pix/images"));
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let mut config = CacheConfig::test("/tmp/pix");
        config.memory.capacity_bytes = 0;

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("memory.capacity_bytes"));
    }

    #[test]
    fn test_validation_rejects_nested_folder() {
        let mut config = CacheConfig::test("/tmp/pix");
        config.disk.folder = "a/b".to_string();
        assert!(config.validate().is_err());

        config.disk.folder = "..".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"memory":{"policy":"lfu","expiration":"never"}}"#).unwrap();

        assert_eq!(config.memory.policy, PolicyKind::Lfu);
        assert_eq!(config.memory.expiration, Expiration::Never);
        assert_eq!(config.memory.sweep_interval_secs, 30 * 60);
        assert_eq!(config.disk.folder, "images");
    }
}
