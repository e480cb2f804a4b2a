/// Scanner module — orchestrates filesystem scanning.
///
/// [`DirectoryScanner::scan`] is the plain synchronous entry point: it
/// blocks, reports directory-granularity progress through an optional
/// callback, and returns every file found. [`start_scan`] wraps the same call
/// on a background thread and turns progress into [`ScanProgress`] messages
/// on a bounded channel, so a frontend can drain them on its own schedule.
pub mod parallel;
pub mod progress;

use crate::cache::HashCache;
use crate::error::{Error, Result};
use crate::model::FileRecord;
use crate::pool::WorkerPool;
use crossbeam_channel::Receiver;
use progress::ScanProgress;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info};

/// Everything a finished scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<FileRecord>,
    /// Sum of `files[..].size`.
    pub total_size: u64,
    /// Directories visited, root included.
    pub directories: usize,
    /// Directories that could not be listed or entered.
    pub failed_directories: usize,
}

/// Scans directory trees on the shared worker pool and owns the digest
/// cache that the scan flushes on completion.
pub struct DirectoryScanner {
    pool: WorkerPool,
    cache: Arc<HashCache>,
}

impl DirectoryScanner {
    pub fn new(pool: WorkerPool, cache: Arc<HashCache>) -> Self {
        Self { pool, cache }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<HashCache> {
        &self.cache
    }

    /// Scan `root` and return every regular file beneath it.
    ///
    /// Only a missing or non-directory root fails the call. Unreadable
    /// subdirectories are logged and counted in
    /// [`ScanOutcome::failed_directories`].
    pub fn scan(&self, root: &Path, progress: Option<&dyn Fn(f32)>) -> Result<ScanOutcome> {
        self.scan_cancellable(root, progress, &Arc::new(AtomicBool::new(false)))
    }

    /// [`scan`](Self::scan) with a cancellation flag checked before every
    /// directory task. A cancelled scan returns [`Error::Cancelled`].
    pub fn scan_cancellable(
        &self,
        root: &Path,
        progress: Option<&dyn Fn(f32)>,
        cancel: &Arc<AtomicBool>,
    ) -> Result<ScanOutcome> {
        if !root.exists() {
            return Err(Error::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }

        let start = Instant::now();
        info!("Starting scan of {}", root.display());

        let listing = parallel::enumerate_directories(root, &self.pool, cancel);
        let directories = listing.dirs.len();
        let batch = parallel::scan_directories(&self.pool, listing.dirs, progress, cancel);

        // Digest writes are batched to the end of a scan rather than per insert.
        self.cache.flush_to_storage();

        if cancel.load(Ordering::Relaxed) {
            info!("Scan of {} cancelled", root.display());
            return Err(Error::Cancelled);
        }

        info!(
            "Scan of {} complete: {} files, {} bytes, {} directories ({} failed) in {:?}",
            root.display(),
            batch.files.len(),
            batch.total_size,
            directories,
            batch.failed_directories + listing.errors,
            start.elapsed()
        );

        Ok(ScanOutcome {
            files: batch.files,
            total_size: batch.total_size,
            directories,
            failed_directories: batch.failed_directories + listing.errors,
        })
    }
}

/// Maximum number of progress messages that may queue up in the channel.
///
/// Percent updates beyond this are dropped rather than blocking the scan;
/// terminal messages always get through.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Handle to a running or completed background scan. Allows cancellation and
/// receiving progress updates.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,
    /// Flag to request cancellation.
    cancel_flag: Arc<AtomicBool>,
    /// Join handle for the scan thread.
    _thread: Option<thread::JoinHandle<()>>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Start a scan of `root_path` on a background thread.
///
/// The thread sends [`ScanProgress::Update`] after every directory and
/// exactly one terminal message (`Complete`, `Failed` or `Cancelled`).
pub fn start_scan(scanner: Arc<DirectoryScanner>, root_path: PathBuf) -> Result<ScanHandle> {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel_flag);

    let thread = thread::Builder::new()
        .name("diskwarden-scanner".into())
        .spawn(move || {
            let start = Instant::now();
            let update_tx = progress_tx.clone();
            let on_progress = move |percent: f32| {
                let _ = update_tx.try_send(ScanProgress::Update { percent });
            };

            let message =
                match scanner.scan_cancellable(&root_path, Some(&on_progress), &cancel_clone) {
                    Ok(outcome) => ScanProgress::Complete {
                        outcome,
                        duration: start.elapsed(),
                    },
                    Err(Error::Cancelled) => ScanProgress::Cancelled,
                    Err(e) => {
                        error!("Scan of {} failed: {e}", root_path.display());
                        ScanProgress::Failed {
                            message: e.to_string(),
                        }
                    }
                };
            let _ = progress_tx.send(message);
        })?;

    Ok(ScanHandle {
        progress_rx,
        cancel_flag,
        _thread: Some(thread),
    })
}
