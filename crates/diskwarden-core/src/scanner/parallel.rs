/// Two-pass parallel directory scan.
///
/// Pass 1 enumerates every directory in the subtree (root included) with
/// `jwalk`, without following symlinks. Pass 2 fans out one task per
/// directory onto the shared worker pool; each task lists only the *direct*
/// file entries of its directory, so recursion comes entirely from pass 1.
///
/// Results are fanned back in over a crossbeam channel in completion order.
/// The calling thread is the only consumer, which makes it the only caller of
/// the progress callback.
use crate::model::FileRecord;
use crate::pool::{percent, WorkerPool};
use rayon::ThreadPool;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Directories discovered by the enumeration pass.
pub struct DirectoryList {
    pub dirs: Vec<PathBuf>,
    /// Subtrees that could not be entered (permissions, races).
    pub errors: usize,
}

/// Result of the per-directory fan-out.
#[derive(Default)]
pub struct FileBatch {
    pub files: Vec<FileRecord>,
    pub total_size: u64,
    pub failed_directories: usize,
}

enum DirResult {
    Listed(Vec<FileRecord>),
    Failed(io::Error),
    Skipped,
}

/// Enumerate `root` and every directory beneath it, reading directories on
/// `pool`.
///
/// Must not be called from a `pool` worker: the walk is consumed on the
/// calling thread while its read tasks run on the pool.
pub fn enumerate_directories(root: &Path, pool: &WorkerPool, cancel: &AtomicBool) -> DirectoryList {
    let mut dirs = Vec::new();
    let mut errors = 0usize;

    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonExistingPool {
            pool: Arc::clone(pool),
            busy_timeout: None,
        });

    for (seen, entry_result) in walker.into_iter().enumerate() {
        if seen % 1_000 == 0 && cancel.load(Ordering::Relaxed) {
            break;
        }
        match entry_result {
            Ok(entry) => {
                if entry.file_type().is_dir() {
                    dirs.push(entry.path());
                }
            }
            Err(err) => {
                errors += 1;
                let err_path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!("Cannot enter directory {err_path}: {err}");
            }
        }
    }

    debug!("Enumerated {} directories under {}", dirs.len(), root.display());
    DirectoryList { dirs, errors }
}

/// List the regular files directly inside `dir` (non-recursive).
///
/// Symlinks are followed when stat-ing, so a link to a file counts as a
/// file. Entries that vanish or cannot be stat-ed are skipped individually.
pub fn scan_directory(dir: &Path) -> io::Result<Vec<FileRecord>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!("Skipping unreadable entry in {}: {err}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(err) => {
                debug!("Cannot stat {}: {err}", path.display());
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        files.push(FileRecord::new(path, meta.len(), modified));
    }
    Ok(files)
}

/// Fan out one [`scan_directory`] task per directory and fan the results in.
///
/// `progress` receives `completed / total × 100` after every directory,
/// successful or not. A failed directory is logged and contributes nothing.
/// Once `cancel` is set, tasks that have not started yet are skipped.
pub fn scan_directories(
    pool: &ThreadPool,
    dirs: Vec<PathBuf>,
    progress: Option<&dyn Fn(f32)>,
    cancel: &Arc<AtomicBool>,
) -> FileBatch {
    let total = dirs.len();
    let (tx, rx) = crossbeam_channel::unbounded::<(PathBuf, DirResult)>();

    for dir in dirs {
        let tx = tx.clone();
        let cancel = Arc::clone(cancel);
        pool.spawn(move || {
            let result = if cancel.load(Ordering::Relaxed) {
                DirResult::Skipped
            } else {
                match scan_directory(&dir) {
                    Ok(files) => DirResult::Listed(files),
                    Err(err) => DirResult::Failed(err),
                }
            };
            let _ = tx.send((dir, result));
        });
    }
    // Only the task clones remain; the loop below ends when the last task reports.
    drop(tx);

    let mut batch = FileBatch::default();
    let mut completed = 0usize;

    for (dir, result) in rx.iter() {
        match result {
            DirResult::Listed(files) => {
                batch.total_size += files.iter().map(|f| f.size).sum::<u64>();
                batch.files.extend(files);
            }
            DirResult::Failed(err) => {
                batch.failed_directories += 1;
                warn!("Failed to scan directory {}: {err}", dir.display());
            }
            DirResult::Skipped => {}
        }

        completed += 1;
        if let Some(cb) = progress {
            cb(percent(completed, total));
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scan_directory_is_not_recursive() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("top.txt"), b"abc").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("deep.txt"), b"abcdef").unwrap();

        let files = scan_directory(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 3);
        assert!(files[0].path.ends_with("top.txt"));
    }

    #[test]
    fn scan_directory_missing_dir_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_directory(&tmp.path().join("gone")).is_err());
    }

    #[test]
    fn enumeration_includes_root_and_nested_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a").join("b")).unwrap();
        fs::create_dir(tmp.path().join("c")).unwrap();
        fs::write(tmp.path().join("a").join("f.txt"), b"x").unwrap();

        let pool = crate::pool::build_pool(2).unwrap();
        let list = enumerate_directories(tmp.path(), &pool, &AtomicBool::new(false));
        assert_eq!(list.dirs.len(), 4, "root, a, a/b, c");
        assert!(list.dirs.iter().any(|d| d == tmp.path()));
        assert_eq!(list.errors, 0);
    }

    #[test]
    fn enumeration_runs_on_a_single_worker_pool() {
        let tmp = TempDir::new().unwrap();
        for i in 0..8 {
            fs::create_dir_all(tmp.path().join(format!("d{i}")).join("inner")).unwrap();
        }

        let pool = crate::pool::build_pool(1).unwrap();
        let list = enumerate_directories(tmp.path(), &pool, &AtomicBool::new(false));
        assert_eq!(list.dirs.len(), 17);
        assert_eq!(list.errors, 0);
    }

    /// A directory that disappears between enumeration and listing counts as
    /// failed but does not take the rest of the batch down with it.
    #[test]
    fn vanished_directory_is_counted_not_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.bin"), vec![0u8; 10]).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let dirs = vec![tmp.path().to_path_buf(), tmp.path().join("never-existed")];

        let calls = std::sync::Mutex::new(Vec::new());
        let cb = |p: f32| calls.lock().unwrap().push(p);
        let batch = scan_directories(&pool, dirs, Some(&cb), &Arc::new(AtomicBool::new(false)));

        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.total_size, 10);
        assert_eq!(batch.failed_directories, 1);
        let calls = calls.into_inner().unwrap();
        assert_eq!(calls, vec![50.0, 100.0]);
    }

    #[test]
    fn cancelled_batch_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("f.txt"), b"x").unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let cancel = Arc::new(AtomicBool::new(true));

        let batch = scan_directories(&pool, vec![tmp.path().to_path_buf()], None, &cancel);
        assert!(batch.files.is_empty());
        assert_eq!(batch.failed_directories, 0);
    }
}
