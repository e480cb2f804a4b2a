/// Persistent content-digest cache keyed by `(path, modification time)`.
///
/// Each entry maps `"{path}|{secs}.{nanos}"` to a hex digest. A file whose
/// mtime changes simply misses on its next lookup and gets a fresh entry;
/// the superseded key is never deleted. The cache therefore only grows, and
/// that is accepted: storage pressure is traded for a trivially correct
/// invalidation rule. [`HashCache::prune_missing`] is available as an
/// explicit, opt-in compaction.
///
/// # Lifecycle
///
/// 1. [`HashCache::open`] loads the persisted map once at start-up.
/// 2. Digest workers call [`HashCache::get`] / [`HashCache::put`]
///    concurrently. Keys never collide across files, so one coarse
///    `RwLock` around the map is all the synchronisation needed.
/// 3. [`HashCache::flush_to_storage`] rewrites the whole file at the end of
///    a scan or duplicate-detection pass, never per insert.
///
/// Load and flush failures are logged and swallowed: a missing or corrupt
/// cache file behaves as an empty cache.
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub struct HashCache {
    storage_path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Build the cache key for a file at a given modification time.
///
/// Sub-second precision is kept so two writes within the same second still
/// produce distinct keys on filesystems that record nanoseconds.
pub fn cache_key(path: &Path, modified: SystemTime) -> String {
    let (secs, nanos) = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i128, d.subsec_nanos()),
        // Pre-epoch timestamps are rare but legal.
        Err(e) => (-(e.duration().as_secs() as i128), e.duration().subsec_nanos()),
    };
    format!("{}|{secs}.{nanos:09}", path.display())
}

/// Split a key back into its path component.
fn key_path(key: &str) -> Option<&str> {
    key.rsplit_once('|').map(|(path, _)| path)
}

impl HashCache {
    /// An empty cache that will persist to `storage_path`. Nothing is read.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache backed by `storage_path` and load whatever it holds.
    pub fn open(storage_path: impl Into<PathBuf>) -> Self {
        let cache = Self::new(storage_path);
        cache.load_from_storage();
        cache
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Replace the in-memory map with the persisted one.
    ///
    /// Absence is normal on first run. Any other failure is logged as a
    /// warning and leaves the cache empty.
    pub fn load_from_storage(&self) {
        match self.read_storage() {
            Ok(Some(map)) => {
                info!(
                    "Loaded {} cached digests from {}",
                    map.len(),
                    self.storage_path.display()
                );
                *self.entries.write() = map;
            }
            Ok(None) => {
                debug!("No digest cache at {}", self.storage_path.display());
                self.entries.write().clear();
            }
            Err(e) => {
                warn!("Could not load digest cache: {e}");
                self.entries.write().clear();
            }
        }
    }

    fn read_storage(&self) -> Result<Option<HashMap<String, String>>> {
        let file = match fs::File::open(&self.storage_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.cache_error(e)),
        };
        let map = serde_json::from_reader(BufReader::new(file)).map_err(|e| self.cache_error(e))?;
        Ok(Some(map))
    }

    /// Persist the whole map, replacing the previous file.
    ///
    /// Writes to a sibling temporary file and renames it into place so an
    /// interrupted flush never leaves a truncated cache behind. Failures are
    /// logged; the in-memory cache stays usable either way.
    pub fn flush_to_storage(&self) {
        if let Err(e) = self.try_flush() {
            warn!("Could not save digest cache: {e}");
        }
    }

    /// [`flush_to_storage`](Self::flush_to_storage) with the error surfaced.
    pub fn try_flush(&self) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.cache_error(e))?;
            }
        }

        let mut tmp_name = self.storage_path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let file = fs::File::create(&tmp_path).map_err(|e| self.cache_error(e))?;
            let mut writer = BufWriter::new(file);
            let entries = self.entries.read();
            serde_json::to_writer(&mut writer, &*entries).map_err(|e| self.cache_error(e))?;
            writer.flush().map_err(|e| self.cache_error(e))?;
            debug!(
                "Flushed {} digests to {}",
                entries.len(),
                self.storage_path.display()
            );
        }

        fs::rename(&tmp_path, &self.storage_path).map_err(|e| self.cache_error(e))?;
        Ok(())
    }

    fn cache_error(&self, e: impl std::fmt::Display) -> Error {
        Error::CacheIo {
            path: self.storage_path.clone(),
            message: e.to_string(),
        }
    }

    /// Look up the digest recorded for `path` at `modified`.
    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<String> {
        let found = self.entries.read().get(&cache_key(path, modified)).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Record `digest` for `path` at `modified`. Older keys for the same
    /// path are left in place.
    pub fn put(&self, path: &Path, modified: SystemTime, digest: String) {
        self.entries.write().insert(cache_key(path, modified), digest);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Lookups answered from the cache since creation (or the last reset).
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to fall through to hashing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Drop every entry whose path no longer exists on disk.
    ///
    /// Returns the number of entries removed. Entries for files that still
    /// exist under an older mtime are kept; only vanished paths go.
    pub fn prune_missing(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key_path(key).is_some_and(|p| Path::new(p).exists()));
        let removed = before - entries.len();
        if removed > 0 {
            info!("Pruned {removed} digest cache entries for missing files");
        }
        removed
    }

    /// Forget everything in memory. Call [`flush_to_storage`](Self::flush_to_storage)
    /// to make it stick.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.reset_counters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn ts(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn get_after_put_hits() {
        let tmp = TempDir::new().unwrap();
        let cache = HashCache::new(tmp.path().join("cache.json"));
        let file = tmp.path().join("a.txt");

        assert_eq!(cache.get(&file, ts(10)), None);
        cache.put(&file, ts(10), "abc".into());
        assert_eq!(cache.get(&file, ts(10)).as_deref(), Some("abc"));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    /// A new mtime is a different key; the old entry stays behind.
    #[test]
    fn mtime_change_misses_and_keeps_old_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = HashCache::new(tmp.path().join("cache.json"));
        let file = tmp.path().join("a.txt");

        cache.put(&file, ts(10), "old".into());
        assert_eq!(cache.get(&file, ts(11)), None);
        cache.put(&file, ts(11), "new".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&file, ts(10)).as_deref(), Some("old"));
    }

    #[test]
    fn flush_then_open_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("cache.json");
        let file = tmp.path().join("a.txt");

        let cache = HashCache::new(&path);
        cache.put(&file, ts(42), "feed".into());
        cache.try_flush().unwrap();
        assert!(path.exists());

        let reopened = HashCache::open(&path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get(&file, ts(42)).as_deref(), Some("feed"));
    }

    #[test]
    fn corrupt_storage_loads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        fs::write(&path, b"\x00not json at all").unwrap();

        let cache = HashCache::open(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_storage_loads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = HashCache::open(tmp.path().join("absent.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn prune_drops_only_vanished_paths() {
        let tmp = TempDir::new().unwrap();
        let kept = tmp.path().join("kept.txt");
        fs::write(&kept, b"x").unwrap();
        let gone = tmp.path().join("gone.txt");

        let cache = HashCache::new(tmp.path().join("cache.json"));
        cache.put(&kept, ts(1), "k".into());
        cache.put(&gone, ts(1), "g".into());

        assert_eq!(cache.prune_missing(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&kept, ts(1)).is_some());
    }

    #[test]
    fn key_keeps_subsecond_precision() {
        let p = Path::new("/data/f.bin");
        let a = UNIX_EPOCH + Duration::new(5, 1);
        let b = UNIX_EPOCH + Duration::new(5, 2);
        assert_ne!(cache_key(p, a), cache_key(p, b));
        assert_eq!(key_path(&cache_key(p, a)), Some("/data/f.bin"));
    }
}
