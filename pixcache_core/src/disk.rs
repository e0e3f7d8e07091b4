//! Disk tier: one encoded [`CacheItem`] per file under a single folder
//!
//! Keys are normalized by dropping every `/` and `.` character, so distinct
//! resource identifiers that differ only in those characters share a file.
//! Changing the derivation would orphan existing cache folders, so it stays.
//!
//! Every call goes to the filesystem; no directory state is kept between calls.
//! All operations block and should be run off latency-sensitive paths.

use crate::clock::{SharedClock, system_clock};
use crate::codec::{BincodeCodec, ItemCodec};
use crate::config::DiskTierConfig;
use crate::error::{CacheError, IoError, SaveFailure};
use crate::item::CacheItem;
use crate::size::DataSize;
use chrono::{DateTime, Utc};
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

/// Staged writes untouched for this long were abandoned mid-put
const STAGED_FILE_GRACE: Duration = Duration::from_secs(60 * 60);

/// Folder occupancy as seen by a directory listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub entry_count: usize,
    pub total_size: DataSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemovalReason {
    Expired,
    OverCapacity,
}

/// A decoded entry as seen by a sweep
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub path: PathBuf,
    pub file_size: u64,
    pub first_cached_at: DateTime<Utc>,
    pub expired: bool,
}

/// Decide which entries a sweep removes: expired ones first, then the
/// oldest survivors until the folder fits within `capacity`.
pub(crate) fn plan_removals(
    entries: Vec<StoredEntry>,
    capacity: u64,
) -> Vec<(StoredEntry, RemovalReason)> {
    let mut total: u64 = entries.iter().map(|e| e.file_size).sum();
    let mut planned = Vec::new();

    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.expired {
            total = total.saturating_sub(entry.file_size);
            planned.push((entry, RemovalReason::Expired));
        } else {
            kept.push(entry);
        }
    }

    if total > capacity {
        kept.sort_by_key(|e| e.first_cached_at);
        for entry in kept {
            if total <= capacity {
                break;
            }
            total = total.saturating_sub(entry.file_size);
            planned.push((entry, RemovalReason::OverCapacity));
        }
    }

    planned
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    capacity: DataSize,
    item_size_limit: DataSize,
}

/// File-backed cache tier
pub struct DiskCache<T, C = BincodeCodec> {
    folder: PathBuf,
    limits: Mutex<Limits>,
    codec: C,
    clock: SharedClock,
    _items: PhantomData<fn() -> T>,
}

impl<T, C: ItemCodec> std::fmt::Debug for DiskCache<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let limits = *self.limits.lock();
        f.debug_struct("DiskCache")
            .field("folder", &self.folder)
            .field("codec", &C::NAME)
            .field("capacity", &limits.capacity)
            .field("item_size_limit", &limits.item_size_limit)
            .finish()
    }
}

impl<T, C> DiskCache<T, C>
where
    T: Serialize + DeserializeOwned,
    C: ItemCodec,
{
    /// Create a disk cache storing entries in `root/folder`.
    ///
    /// The folder is created if missing. Failing to create it is logged and
    /// every later operation then fails on its own.
    pub fn new(
        root: impl AsRef<Path>,
        folder: &str,
        capacity: DataSize,
        item_size_limit: DataSize,
    ) -> Self {
        let folder = root.as_ref().join(folder);
        if let Err(e) = fs::create_dir_all(&folder) {
            error!(
                "Failed to prepare disk cache folder: {}",
                IoError::from_std(e).with_path(&folder)
            );
        }

        Self {
            folder,
            limits: Mutex::new(Limits {
                capacity,
                item_size_limit,
            }),
            codec: C::default(),
            clock: system_clock(),
            _items: PhantomData,
        }
    }

    pub fn from_config(config: &DiskTierConfig) -> Self {
        Self::new(
            &config.root,
            &config.folder,
            config.capacity(),
            config.item_size_limit(),
        )
    }

    /// Use a different time source for expiry checks
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Directory holding the entry files
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Storage path for `key`, or `None` if nothing is left after normalization
    pub fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let name: String = key.chars().filter(|c| !matches!(c, '/' | '.')).collect();
        if name.is_empty() {
            None
        } else {
            Some(self.folder.join(name))
        }
    }

    /// Read the entry for `key`. A missing file is a miss, not an error.
    ///
    /// Expired entries are returned as stored; judging staleness is up to the
    /// caller.
    pub fn get(&self, key: &str) -> Result<Option<CacheItem<T>>, CacheError> {
        let Some(path) = self.entry_path(key) else {
            return Ok(None);
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::fetch(&path, e.to_string())),
        };

        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|e| CacheError::fetch(&path, format!("undecodable {} entry: {e}", C::NAME)))
    }

    /// Write the entry for `key` atomically
    pub fn put(&self, key: &str, item: &CacheItem<T>, overwrite: bool) -> Result<(), CacheError> {
        let path = self
            .entry_path(key)
            .ok_or_else(|| CacheError::save(key, SaveFailure::UnresolvedPath))?;

        if !overwrite && path.exists() {
            return Err(CacheError::save(key, SaveFailure::AlreadyExists));
        }

        let bytes = self
            .codec
            .encode(item)
            .map_err(|e| CacheError::save(key, SaveFailure::Encode(e)))?;

        let write_failed = |e: io::Error| CacheError::save(key, SaveFailure::Write(e.to_string()));
        let mut staged = NamedTempFile::new_in(&self.folder).map_err(write_failed)?;
        staged.write_all(&bytes).map_err(write_failed)?;

        let persisted = if overwrite {
            staged.persist(&path)
        } else {
            staged.persist_noclobber(&path)
        };

        match persisted {
            Ok(_) => {
                trace!("Wrote {} bytes to {}", bytes.len(), path.display());
                Ok(())
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(CacheError::save(key, SaveFailure::AlreadyExists))
            }
            Err(e) => Err(write_failed(e.error)),
        }
    }

    /// Remove the entry for `key`, returning whether a file was removed
    pub fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let Some(path) = self.entry_path(key) else {
            return Ok(false);
        };
        remove_entry(&path)
    }

    /// Remove every entry, returning how many files were removed.
    ///
    /// Entries that cannot be removed are skipped.
    pub fn delete_all(&self) -> Result<usize, CacheError> {
        let paths = self
            .entry_files()
            .map_err(|e| CacheError::delete(&self.folder, e.to_string()))?;

        let mut removed = 0;
        for path in paths {
            match remove_entry(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Skipping disk entry during delete_all: {e}"),
            }
        }

        self.remove_abandoned_staged_files();
        debug!("Removed {removed} entries from {}", self.folder.display());
        Ok(removed)
    }

    /// Remove expired entries, then trim the oldest entries while the folder
    /// exceeds capacity. Returns how many files were removed.
    ///
    /// Entries that cannot be read or decoded are left alone.
    pub fn sweep_expired(&self) -> Result<usize, CacheError> {
        let paths = self
            .entry_files()
            .map_err(|e| CacheError::fetch(&self.folder, e.to_string()))?;

        let now = self.clock.now();
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            let item: CacheItem<T> = match self.codec.decode(&bytes) {
                Ok(item) => item,
                Err(e) => {
                    debug!("Skipping undecodable entry {}: {e}", path.display());
                    continue;
                }
            };
            entries.push(StoredEntry {
                path,
                file_size: bytes.len() as u64,
                first_cached_at: item.first_cached_at(),
                expired: item.is_expired_at(now),
            });
        }

        let capacity = self.limits.lock().capacity.as_bytes();
        let mut removed = 0;
        for (entry, reason) in plan_removals(entries, capacity) {
            match remove_entry(&entry.path) {
                Ok(true) => {
                    trace!("Removed {} ({reason:?})", entry.path.display());
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Skipping disk entry during sweep: {e}"),
            }
        }

        self.remove_abandoned_staged_files();
        if removed > 0 {
            debug!("Disk sweep removed {removed} entries");
        }
        Ok(removed)
    }

    /// Whether a single item of `size` may be stored in this tier
    pub fn fits_size_limit(&self, size: DataSize) -> bool {
        size <= self.limits.lock().item_size_limit
    }

    /// Count entries and their bytes on disk
    pub fn usage(&self) -> Result<DiskUsage, CacheError> {
        let paths = self
            .entry_files()
            .map_err(|e| CacheError::fetch(&self.folder, e.to_string()))?;

        let mut usage = DiskUsage::default();
        for path in paths {
            if let Ok(metadata) = fs::metadata(&path) {
                usage.entry_count += 1;
                usage.total_size = usage
                    .total_size
                    .saturating_add(DataSize::bytes(metadata.len()));
            }
        }
        Ok(usage)
    }

    /// Takes effect on the next sweep
    pub fn set_capacity(&self, capacity: DataSize) {
        self.limits.lock().capacity = capacity;
    }

    pub fn set_item_size_limit(&self, limit: DataSize) {
        self.limits.lock().item_size_limit = limit;
    }

    pub fn capacity(&self) -> DataSize {
        self.limits.lock().capacity
    }

    /// Regular files in the folder, excluding in-flight temp files
    fn entry_files(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.list_files()?.0)
    }

    /// Regular files in the folder, split into entries and staged temp files
    fn list_files(&self) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut entries = Vec::new();
        let mut staged = Vec::new();
        for entry in fs::read_dir(&self.folder)? {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                staged.push(entry.path());
            } else {
                entries.push(entry.path());
            }
        }
        Ok((entries, staged))
    }

    /// Delete temp files left behind by puts that never reached `persist`.
    ///
    /// Files modified within [`STAGED_FILE_GRACE`] may belong to a put still
    /// running and are kept.
    fn remove_abandoned_staged_files(&self) -> usize {
        let Ok((_, staged)) = self.list_files() else {
            return 0;
        };
        let now = SystemTime::now();
        let mut removed = 0;
        for path in staged {
            let abandoned = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| {
                    now.duration_since(modified)
                        .is_ok_and(|age| age >= STAGED_FILE_GRACE)
                });
            if !abandoned {
                continue;
            }
            match remove_entry(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not remove abandoned temp file: {e}"),
            }
        }
        if removed > 0 {
            debug!("Removed {removed} abandoned temp files from {}", self.folder.display());
        }
        removed
    }
}

fn remove_entry(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::delete(path, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codec::JsonCodec;
    use crate::expiration::{Expiration, ExpirationBasis};
    use chrono::TimeDelta;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn disk(dir: &TempDir) -> DiskCache<Vec<u8>> {
        DiskCache::new(dir.path(), "images", DataSize::mib(1), DataSize::UNBOUNDED)
    }

    fn item(bytes: &[u8], at: DateTime<Utc>) -> CacheItem<Vec<u8>> {
        CacheItem::new(bytes.to_vec(), DataSize::from_len(bytes.len()), at)
            .with_expiration(Expiration::Days(7), ExpirationBasis::CreationTime)
    }

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);
        let stored = item(b"png bytes", t0());

        disk.put("https://img.example.com/logo.png", &stored, true).unwrap();

        let loaded = disk.get("https://img.example.com/logo.png").unwrap();
        assert_eq!(loaded, Some(stored));
        assert!(dir.path().join("images").join("https:imgexamplecomlogopng").is_file());
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        assert!(disk(&dir).get("nothing-here").unwrap().is_none());
    }

    #[test]
    fn test_put_without_overwrite_twice_fails() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);

        disk.put("k", &item(b"one", t0()), false).unwrap();
        let error = disk.put("k", &item(b"two", t0()), false).unwrap_err();

        assert!(matches!(
            error,
            CacheError::Save {
                reason: SaveFailure::AlreadyExists,
                ..
            }
        ));
        assert_eq!(disk.get("k").unwrap().unwrap().data, b"one");
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);

        disk.put("k", &item(b"one", t0()), false).unwrap();
        disk.put("k", &item(b"two", t0()), true).unwrap();

        assert_eq!(disk.get("k").unwrap().unwrap().data, b"two");
    }

    #[test]
    fn test_keys_differing_only_in_separators_share_a_file() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);

        disk.put("a/b.c", &item(b"first", t0()), true).unwrap();
        assert_eq!(disk.get("abc").unwrap().unwrap().data, b"first");
    }

    #[test]
    fn test_key_with_nothing_left_is_unresolved() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);

        let error = disk.put("./..//", &item(b"x", t0()), true).unwrap_err();
        assert!(matches!(
            error,
            CacheError::Save {
                reason: SaveFailure::UnresolvedPath,
                ..
            }
        ));
        assert!(disk.get("./").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_fetch_error() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);
        fs::write(disk.folder().join("broken"), b"\x00\x01").unwrap();

        assert!(matches!(disk.get("broken"), Err(CacheError::Fetch { .. })));
    }

    #[test]
    fn test_delete_and_delete_all() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);
        for key in ["a", "b", "c"] {
            disk.put(key, &item(key.as_bytes(), t0()), true).unwrap();
        }

        assert!(disk.delete("a").unwrap());
        assert!(!disk.delete("a").unwrap());
        assert_eq!(disk.delete_all().unwrap(), 2);
        assert_eq!(disk.usage().unwrap(), DiskUsage::default());
    }

    #[test]
    fn test_sweep_removes_expired_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let disk = disk(&dir).with_clock(clock.clone());

        let short = item(b"short", t0())
            .with_expiration(Expiration::Hours(1), ExpirationBasis::CreationTime);
        disk.put("short", &short, true).unwrap();
        disk.put("long", &item(b"long", t0()), true).unwrap();
        fs::write(disk.folder().join("garbage"), b"not an entry").unwrap();

        clock.advance(TimeDelta::hours(2));
        assert_eq!(disk.sweep_expired().unwrap(), 1);
        assert_eq!(disk.sweep_expired().unwrap(), 0);

        assert!(disk.get("short").unwrap().is_none());
        assert!(disk.get("long").unwrap().is_some());
        assert!(disk.folder().join("garbage").exists());
    }

    #[test]
    fn test_sweep_removes_abandoned_staged_files_only() {
        let dir = TempDir::new().unwrap();
        let disk = disk(&dir);
        disk.put("kept", &item(b"kept", t0()), true).unwrap();

        let abandoned = disk.folder().join(".tmpAbandoned");
        let in_progress = disk.folder().join(".tmpInProgress");
        fs::write(&abandoned, b"half a write").unwrap();
        fs::write(&in_progress, b"still writing").unwrap();
        fs::File::options()
            .write(true)
            .open(&abandoned)
            .unwrap()
            .set_modified(SystemTime::now() - STAGED_FILE_GRACE * 2)
            .unwrap();

        assert_eq!(disk.sweep_expired().unwrap(), 0);
        assert!(!abandoned.exists());
        assert!(in_progress.exists());
        assert!(disk.get("kept").unwrap().is_some());

        assert_eq!(disk.usage().unwrap().entry_count, 1);
    }

    #[test]
    fn test_sweep_trims_oldest_entries_over_capacity() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(t0() + TimeDelta::hours(1)));
        let disk = disk(&dir).with_clock(clock);
        let payload = vec![7u8; 1000];

        for (minute, key) in ["oldest", "middle", "newest"].iter().enumerate() {
            let at = t0() + TimeDelta::minutes(minute as i64);
            disk.put(key, &item(&payload, at), true).unwrap();
        }

        let entry_size = disk.usage().unwrap().total_size.as_bytes() / 3;
        disk.set_capacity(DataSize::bytes(entry_size * 2));

        assert_eq!(disk.sweep_expired().unwrap(), 1);
        assert!(disk.get("oldest").unwrap().is_none());
        assert!(disk.get("middle").unwrap().is_some());
        assert!(disk.get("newest").unwrap().is_some());
    }

    #[test]
    fn test_unusable_folder_fails_each_operation() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let disk: DiskCache<Vec<u8>> =
            DiskCache::new(&blocker, "images", DataSize::mib(1), DataSize::UNBOUNDED);

        assert!(matches!(
            disk.put("k", &item(b"x", t0()), true),
            Err(CacheError::Save {
                reason: SaveFailure::Write(_),
                ..
            })
        ));
        assert!(matches!(disk.delete_all(), Err(CacheError::Delete { .. })));
        assert!(matches!(disk.sweep_expired(), Err(CacheError::Fetch { .. })));
    }

    #[test]
    fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let disk: DiskCache<Vec<u8>> =
            DiskCache::new(dir.path(), "images", DataSize::mib(1), DataSize::kib(1));

        assert!(disk.fits_size_limit(DataSize::kib(1)));
        assert!(!disk.fits_size_limit(DataSize::bytes(1025)));
    }

    #[test]
    fn test_json_codec_entries_are_readable() {
        let dir = TempDir::new().unwrap();
        let disk: DiskCache<Vec<u8>, JsonCodec> =
            DiskCache::new(dir.path(), "json", DataSize::mib(1), DataSize::UNBOUNDED);

        disk.put("k", &item(b"ab", t0()), true).unwrap();
        let raw = fs::read_to_string(disk.folder().join("k")).unwrap();
        assert!(raw.contains("\"first_cached_at\""));
    }

    #[test]
    fn test_plan_removals_orders_by_age() {
        let entry = |name: &str, minute: i64, expired: bool| StoredEntry {
            path: PathBuf::from(name),
            file_size: 10,
            first_cached_at: t0() + TimeDelta::minutes(minute),
            expired,
        };

        let plan = plan_removals(
            vec![
                entry("c", 3, false),
                entry("a", 1, false),
                entry("x", 0, true),
                entry("b", 2, false),
            ],
            20,
        );

        let names: Vec<_> = plan
            .iter()
            .map(|(e, reason)| (e.path.to_string_lossy().into_owned(), *reason))
            .collect();
        assert_eq!(
            names,
            vec![
                ("x".to_string(), RemovalReason::Expired),
                ("a".to_string(), RemovalReason::OverCapacity),
            ]
        );
    }
}
