//! Tiered image lookup: memory, then disk (with revalidation), then network
//!
//! [`ImageCache`] is the only type that talks to all three layers. Tier
//! failures other than a total miss are logged and swallowed, so callers only
//! ever see "here is the image" or `None`.

use crate::clock::{SharedClock, system_clock};
use crate::config::CacheConfig;
use crate::disk::DiskCache;
use crate::downloader::{Downloader, Transport};
use crate::error::{CacheError, DownloadError, Result, ValidationError};
use crate::expiration::{Expiration, ExpirationBasis};
use crate::http::HttpTransport;
use crate::item::CacheItem;
use crate::memory::MemoryCache;
use crate::payload::ImagePayload;
use crate::stats::CacheStats;
use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

/// One of the two cache tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Memory,
    Disk,
}

/// Per-lookup switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    memory_only: bool,
    cache_only: bool,
    force_refresh: bool,
    revalidate: bool,
}

impl ResolveOptions {
    /// Default options: every tier, network allowed, revalidation on
    pub fn new() -> Self {
        Self {
            memory_only: false,
            cache_only: false,
            force_refresh: false,
            revalidate: true,
        }
    }

    /// Neither read nor write the disk tier
    pub fn with_memory_only(mut self, enabled: bool) -> Self {
        self.memory_only = enabled;
        self
    }

    /// Never go to the network; a double miss yields `None`
    pub fn with_cache_only(mut self, enabled: bool) -> Self {
        self.cache_only = enabled;
        self
    }

    /// Skip both tiers, fetch, then write through
    pub fn with_force_refresh(mut self, enabled: bool) -> Self {
        self.force_refresh = enabled;
        self
    }

    /// Whether disk hits carrying a validator are revalidated
    pub fn with_revalidation(mut self, enabled: bool) -> Self {
        self.revalidate = enabled;
        self
    }

    pub fn memory_only(&self) -> bool {
        self.memory_only
    }

    pub fn cache_only(&self) -> bool {
        self.cache_only
    }

    pub fn force_refresh(&self) -> bool {
        self.force_refresh
    }

    pub fn revalidate(&self) -> bool {
        self.revalidate
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries removed by one manual sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub memory: usize,
    pub disk: usize,
}

#[derive(Debug, Clone, Copy)]
struct TierSettings {
    expiration: Expiration,
    basis: ExpirationBasis,
    sweep_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    memory: TierSettings,
    disk: TierSettings,
}

impl Settings {
    fn tier(&self, tier: Tier) -> TierSettings {
        match tier {
            Tier::Memory => self.memory,
            Tier::Disk => self.disk,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut TierSettings {
        match tier {
            Tier::Memory => &mut self.memory,
            Tier::Disk => &mut self.disk,
        }
    }
}

type ImageDisk = DiskCache<ImagePayload>;

/// Two-tier image cache in front of a coalescing downloader
pub struct ImageCache {
    memory: Arc<MemoryCache<ImagePayload>>,
    disk: Arc<ImageDisk>,
    downloader: Downloader,
    clock: SharedClock,
    settings: RwLock<Settings>,
    memory_sweeper: Mutex<Option<AbortHandle>>,
    disk_sweeper: Mutex<Option<AbortHandle>>,
}

impl fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .field("downloader", &self.downloader)
            .field("settings", &*self.settings.read())
            .finish()
    }
}

impl ImageCache {
    /// Build the cache over the HTTP transport described by `config`
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config.network)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Build the cache over any transport
    pub fn new(config: &CacheConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, system_clock())
    }

    /// Build the cache with every tier reading time from `clock`
    pub fn with_clock(
        config: &CacheConfig,
        transport: Arc<dyn Transport>,
        clock: SharedClock,
    ) -> Self {
        let memory = MemoryCache::from_config(&config.memory).with_clock(Arc::clone(&clock));
        let disk = DiskCache::from_config(&config.disk).with_clock(Arc::clone(&clock));

        let settings = Settings {
            memory: TierSettings {
                expiration: config.memory.expiration,
                basis: config.memory.expiration_basis,
                sweep_interval: config.memory.sweep_interval(),
            },
            disk: TierSettings {
                expiration: config.disk.expiration,
                basis: config.disk.expiration_basis,
                sweep_interval: config.disk.sweep_interval(),
            },
        };

        Self {
            memory: Arc::new(memory),
            disk: Arc::new(disk),
            downloader: Downloader::new(transport),
            clock,
            settings: RwLock::new(settings),
            memory_sweeper: Mutex::new(None),
            disk_sweeper: Mutex::new(None),
        }
    }

    /// Look `key` up in memory, then on disk, then over the network.
    ///
    /// Returns `None` when the image is unavailable: every consulted tier
    /// missed and the fetch failed or was not allowed.
    pub async fn resolve(&self, key: &str, options: ResolveOptions) -> Option<ImagePayload> {
        if !options.force_refresh {
            if let Some(item) = self.memory.get(key) {
                debug!("Memory hit for {key}");
                return Some(item.data);
            }

            if !options.memory_only
                && let Some(payload) = self.resolve_from_disk(key, options).await
            {
                return Some(payload);
            }
        }

        if options.cache_only {
            debug!("Cache-only lookup missed for {key}");
            return None;
        }

        match self.fetch_unconditional(key).await {
            Ok(payload) => {
                self.write_through(key, &payload, !options.memory_only).await;
                Some(payload)
            }
            Err(e) => {
                warn!("Could not fetch {key}: {e}");
                None
            }
        }
    }

    /// Write `payload` through both tiers as a fresh entry
    pub async fn store(&self, key: &str, payload: &ImagePayload) {
        self.write_through(key, payload, true).await;
    }

    /// Stop tracking in-flight fetches of `key`
    pub fn cancel(&self, key: &str) {
        self.downloader.cancel(key);
    }

    /// Drop an entry from both tiers
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.memory.delete(key);
        let key = key.to_string();
        on_disk(&self.disk, move |disk| disk.delete(&key)).await?;
        Ok(())
    }

    /// Empty both tiers, returning how many disk entries were removed
    pub async fn clear(&self) -> Result<usize> {
        self.memory.clear();
        Ok(on_disk(&self.disk, |disk| disk.delete_all()).await?)
    }

    /// Sweep both tiers once, outside the timers
    pub async fn sweep(&self) -> Result<SweepReport> {
        let memory = self.memory.sweep_expired();
        let disk = on_disk(&self.disk, |disk| disk.sweep_expired()).await?;
        Ok(SweepReport { memory, disk })
    }

    /// Start both sweep timers. The disk tier is swept right away.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_sweeps(&self) {
        self.restart_sweeper(Tier::Memory, false);
        self.restart_sweeper(Tier::Disk, true);
    }

    pub fn stop_sweeps(&self) {
        for slot in [&self.memory_sweeper, &self.disk_sweeper] {
            if let Some(handle) = slot.lock().take() {
                handle.abort();
            }
        }
    }

    /// Expiration applied to entries written to `tier` from now on
    pub fn set_expiration(&self, tier: Tier, expiration: Expiration, basis: ExpirationBasis) {
        let mut settings = self.settings.write();
        let target = settings.tier_mut(tier);
        target.expiration = expiration;
        target.basis = basis;
    }

    /// Change how often `tier` is swept, restarting its timer if running
    pub fn set_sweep_interval(
        &self,
        tier: Tier,
        every: Duration,
    ) -> std::result::Result<(), ValidationError> {
        if every.is_zero() {
            return Err(ValidationError::invalid_parameter(
                "sweep_interval",
                "must be greater than zero",
            ));
        }
        self.settings.write().tier_mut(tier).sweep_interval = every;

        if self.sweeper_slot(tier).lock().is_some() {
            self.restart_sweeper(tier, false);
        }
        Ok(())
    }

    pub fn memory(&self) -> &MemoryCache<ImagePayload> {
        &self.memory
    }

    pub fn disk(&self) -> &DiskCache<ImagePayload> {
        &self.disk
    }

    /// Memory tier statistics
    pub fn stats(&self) -> CacheStats {
        self.memory.stats()
    }

    async fn resolve_from_disk(&self, key: &str, options: ResolveOptions) -> Option<ImagePayload> {
        let owned = key.to_string();
        let item = match on_disk(&self.disk, move |disk| disk.get(&owned)).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                trace!("Disk miss for {key}");
                return None;
            }
            Err(e) => {
                warn!("Disk lookup for {key} failed: {e}");
                return None;
            }
        };

        if item.is_expired_at(self.clock.now()) {
            debug!("Disk entry for {key} has expired");
            return None;
        }
        debug!("Disk hit for {key}");

        let mut payload = item.data;
        if options.revalidate
            && let Some(validator) = payload.validator.clone()
        {
            match self.downloader.fetch(key, Some(&validator)).await {
                Ok(fresh) => {
                    debug!("{key} changed upstream, replacing stored copy");
                    self.write_disk(key, &fresh).await;
                    payload = fresh;
                }
                Err(e) if e.is_not_changed() => trace!("{key} is still current"),
                Err(e) => warn!("Revalidation of {key} failed, serving stored copy: {e}"),
            }
        }

        self.write_memory(key, &payload);
        Some(payload)
    }

    /// Fetch without a validator. A joined conditional flight can still
    /// answer `NotChanged`; that answer carries no bytes, so fetch again.
    async fn fetch_unconditional(
        &self,
        key: &str,
    ) -> std::result::Result<ImagePayload, DownloadError> {
        match self.downloader.fetch(key, None).await {
            Err(e) if e.is_not_changed() => {
                debug!("Joined a revalidation of {key}, fetching it again");
                self.downloader.fetch(key, None).await
            }
            outcome => outcome,
        }
    }

    async fn write_through(&self, key: &str, payload: &ImagePayload, include_disk: bool) {
        self.write_memory(key, payload);
        if include_disk {
            self.write_disk(key, payload).await;
        }
    }

    fn write_memory(&self, key: &str, payload: &ImagePayload) {
        if !self.memory.fits_size_limit(payload.size()) {
            debug!("{key} ({}) exceeds the memory item limit", payload.size());
            return;
        }
        let item = self.new_item(Tier::Memory, payload);
        if let Err(e) = self.memory.put(key, item, true) {
            warn!("Memory write for {key} failed: {e}");
        }
    }

    async fn write_disk(&self, key: &str, payload: &ImagePayload) {
        let owned = key.to_string();
        let result = if self.disk.fits_size_limit(payload.size()) {
            let item = self.new_item(Tier::Disk, payload);
            on_disk(&self.disk, move |disk| disk.put(&owned, &item, true)).await
        } else {
            debug!("{key} ({}) exceeds the disk item limit", payload.size());
            // An older copy must not outlive the payload that replaced it.
            on_disk(&self.disk, move |disk| disk.delete(&owned).map(|_| ())).await
        };

        if let Err(e) = result {
            warn!("Disk write for {key} failed: {e}");
        }
    }

    fn new_item(&self, tier: Tier, payload: &ImagePayload) -> CacheItem<ImagePayload> {
        let settings = self.settings.read().tier(tier);
        CacheItem::new(payload.clone(), payload.size(), self.clock.now())
            .with_expiration(settings.expiration, settings.basis)
    }

    fn sweeper_slot(&self, tier: Tier) -> &Mutex<Option<AbortHandle>> {
        match tier {
            Tier::Memory => &self.memory_sweeper,
            Tier::Disk => &self.disk_sweeper,
        }
    }

    fn restart_sweeper(&self, tier: Tier, sweep_now: bool) {
        let every = self.settings.read().tier(tier).sweep_interval;
        let task = match tier {
            Tier::Memory => {
                let memory = Arc::clone(&self.memory);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    if !sweep_now {
                        ticker.tick().await;
                    }
                    loop {
                        ticker.tick().await;
                        memory.sweep_expired();
                    }
                })
            }
            Tier::Disk => {
                let disk = Arc::clone(&self.disk);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    if !sweep_now {
                        ticker.tick().await;
                    }
                    loop {
                        ticker.tick().await;
                        if let Err(e) = on_disk(&disk, |disk| disk.sweep_expired()).await {
                            warn!("Disk sweep failed: {e}");
                        }
                    }
                })
            }
        };

        info!("{tier:?} sweep scheduled every {every:?}");
        if let Some(previous) = self.sweeper_slot(tier).lock().replace(task.abort_handle()) {
            previous.abort();
        }
    }
}

impl Drop for ImageCache {
    fn drop(&mut self) {
        self.stop_sweeps();
    }
}

/// Run a blocking disk operation on the blocking pool
async fn on_disk<R, F>(disk: &Arc<ImageDisk>, op: F) -> std::result::Result<R, CacheError>
where
    F: FnOnce(&ImageDisk) -> std::result::Result<R, CacheError> + Send + 'static,
    R: Send + 'static,
{
    let disk = Arc::clone(disk);
    let folder = disk.folder().to_path_buf();
    tokio::task::spawn_blocking(move || op(&disk))
        .await
        .map_err(|e| CacheError::fetch(&folder, format!("disk task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_options_defaults() {
        let options = ResolveOptions::default();
        assert!(!options.memory_only());
        assert!(!options.cache_only());
        assert!(!options.force_refresh());
        assert!(options.revalidate());

        let options = options.with_cache_only(true).with_revalidation(false);
        assert!(options.cache_only());
        assert!(!options.revalidate());
    }
}
