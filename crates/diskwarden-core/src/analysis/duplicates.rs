/// Duplicate file detection by content digest.
///
/// Every file gets its own pool task that either finds its digest in the
/// [`HashCache`] (keyed by path and *current* mtime) or streams the file
/// through xxHash3-128 in 8 KiB chunks. Files sharing a digest are grouped.
///
/// # Collision risk
///
/// xxHash3 is fast and well distributed but **not** cryptographic. A shared
/// digest means "almost certainly identical", not "proven identical". That is
/// an accepted trade-off for a cleanup tool; callers that must be certain
/// before deleting should compare bytes directly.
use crate::cache::HashCache;
use crate::model::FileRecord;
use crate::pool::percent;
use rayon::ThreadPool;
use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use twox_hash::xxh3::Hash128;
use twox_hash::xxh3::HasherExt as _;

/// Read buffer size for streaming digests.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Digest (lowercase hex) → files sharing it. Only groups of two or more.
pub type DuplicateGroups = HashMap<String, Vec<FileRecord>>;

/// Stream `path` through xxHash3-128 and return the 32-char hex digest.
///
/// Memory use is bounded by [`CHUNK_SIZE`] whatever the file size.
pub fn digest_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hash128::with_seed(0);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.write(&buffer[..n]);
    }
    Ok(format!("{:032x}", hasher.finish_ext()))
}

/// Digest `path`, consulting and updating `cache`.
///
/// The mtime is read fresh from disk rather than taken from a scan record,
/// so a file modified after the scan still misses and gets re-hashed.
pub fn cached_digest(cache: &HashCache, path: &Path) -> io::Result<String> {
    let modified = fs::metadata(path)?.modified()?;
    if let Some(digest) = cache.get(path, modified) {
        return Ok(digest);
    }
    let digest = digest_file(path)?;
    cache.put(path, modified, digest.clone());
    Ok(digest)
}

/// Group `files` by content digest.
///
/// `progress` receives `files completed / total × 100` after every file. A
/// file that cannot be read is logged and left out of every group. The cache
/// is flushed once all digests are in.
pub fn find_duplicates(
    pool: &ThreadPool,
    cache: &Arc<HashCache>,
    files: &[FileRecord],
    progress: Option<&dyn Fn(f32)>,
) -> DuplicateGroups {
    let start = Instant::now();
    let total = files.len();
    let (tx, rx) = crossbeam_channel::unbounded::<(FileRecord, io::Result<String>)>();

    for record in files.iter().cloned() {
        let tx = tx.clone();
        let cache = Arc::clone(cache);
        pool.spawn(move || {
            let digest = cached_digest(&cache, &record.path);
            let _ = tx.send((record, digest));
        });
    }
    drop(tx);

    let mut by_digest: HashMap<String, Vec<FileRecord>> = HashMap::new();
    let mut completed = 0usize;
    let mut failed = 0usize;

    for (record, digest) in rx.iter() {
        match digest {
            Ok(d) => by_digest.entry(d).or_default().push(record),
            Err(e) => {
                failed += 1;
                warn!("Cannot hash {}: {e}", record.path.display());
            }
        }
        completed += 1;
        if let Some(cb) = progress {
            cb(percent(completed, total));
        }
    }

    cache.flush_to_storage();

    by_digest.retain(|_, group| group.len() > 1);
    for group in by_digest.values_mut() {
        group.sort_by(|a, b| a.path.cmp(&b.path));
    }

    debug!(
        "Digest cache: {} hits, {} misses",
        cache.hits(),
        cache.misses()
    );
    info!(
        "Duplicate search over {total} files: {} groups, {failed} unreadable, in {:?}",
        by_digest.len(),
        start.elapsed()
    );
    by_digest
}

/// Bytes reclaimable by keeping one copy per group.
pub fn wasted_bytes(groups: &DuplicateGroups) -> u64 {
    groups.values().map(|g| group_waste(g)).sum()
}

fn group_waste(group: &[FileRecord]) -> u64 {
    let size = group.first().map_or(0, |f| f.size);
    size * (group.len() as u64).saturating_sub(1)
}

/// Groups ordered by reclaimable bytes, largest first (digest breaks ties).
pub fn largest_first(groups: &DuplicateGroups) -> Vec<(&str, &[FileRecord])> {
    let mut sorted: Vec<(&str, &[FileRecord])> = groups
        .iter()
        .map(|(d, g)| (d.as_str(), g.as_slice()))
        .collect();
    sorted.sort_by(|a, b| {
        group_waste(b.1)
            .cmp(&group_waste(a.1))
            .then_with(|| a.0.cmp(b.0))
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord::new(path.into(), size, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn identical_content_has_identical_digest() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let c = tmp.path().join("c");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        fs::write(&c, b"different!").unwrap();

        let da = digest_file(&a).unwrap();
        assert_eq!(da.len(), 32);
        assert_eq!(da, digest_file(&b).unwrap());
        assert_ne!(da, digest_file(&c).unwrap());
    }

    /// Content spanning several chunks must hash the same as a one-shot
    /// digest of the same bytes.
    #[test]
    fn chunked_digest_matches_one_shot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let mut hasher = Hash128::with_seed(0);
        hasher.write(&data);
        assert_eq!(
            digest_file(&path).unwrap(),
            format!("{:032x}", hasher.finish_ext())
        );
    }

    #[test]
    fn cached_digest_hits_on_second_call() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, b"hello").unwrap();
        let cache = HashCache::new(tmp.path().join("cache.json"));

        let first = cached_digest(&cache, &path).unwrap();
        let second = cached_digest(&cache, &path).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn wasted_bytes_counts_extra_copies() {
        let mut groups = DuplicateGroups::new();
        groups.insert("d1".into(), vec![record("/a", 100), record("/b", 100), record("/c", 100)]);
        groups.insert("d2".into(), vec![record("/x", 7), record("/y", 7)]);
        assert_eq!(wasted_bytes(&groups), 207);

        let ordered = largest_first(&groups);
        assert_eq!(ordered[0].0, "d1");
        assert_eq!(ordered[1].0, "d2");
    }

    #[test]
    fn empty_input_gives_no_groups() {
        let tmp = TempDir::new().unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let cache = Arc::new(HashCache::new(tmp.path().join("cache.json")));
        assert!(find_duplicates(&pool, &cache, &[], None).is_empty());
    }
}
