/// Criteria-based cleanup: pick files by age, extension, size and path
/// exclusions, then delete them best-effort.
///
/// Deletion is not transactional. Each path is attempted independently; a
/// failure is logged and recorded in [`DeletionOutcome::failures`] and the
/// batch carries on.
use crate::model::FileRecord;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Which side of the cutoff a file's mtime must fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeFilter {
    Before,
    After,
}

#[derive(Debug, Clone)]
pub struct CleanupCriteria {
    pub cutoff: SystemTime,
    pub direction: AgeFilter,
    /// Allowed extensions (`".log"` or `"log"`, any case). Empty = any.
    pub extensions: Vec<String>,
    /// Minimum size in bytes. `0` = no minimum.
    pub min_size: u64,
    /// Substrings that veto a path outright.
    pub exclude: Vec<String>,
}

impl CleanupCriteria {
    pub fn new(cutoff: SystemTime, direction: AgeFilter) -> Self {
        Self {
            cutoff,
            direction,
            extensions: Vec::new(),
            min_size: 0,
            exclude: Vec::new(),
        }
    }

    /// Files last modified more than `days` days before `now`.
    pub fn older_than(days: u64, now: SystemTime) -> Self {
        let cutoff = now
            .checked_sub(Duration::from_secs(days * 24 * 3600))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Self::new(cutoff, AgeFilter::Before)
    }

    pub fn with_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = exts
            .into_iter()
            .map(|e| normalise_extension(e.as_ref()))
            .filter(|e| e.len() > 1)
            .collect();
        self
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .collect();
        self
    }

    /// Whether a single file qualifies for cleanup.
    pub fn matches(&self, file: &FileRecord) -> bool {
        let path_str = file.path.to_string_lossy();
        if self.exclude.iter().any(|p| path_str.contains(p.as_str())) {
            return false;
        }
        if !self.extensions.is_empty() && !self.extensions.contains(&file.extension_key()) {
            return false;
        }
        if self.min_size > 0 && file.size < self.min_size {
            return false;
        }
        match self.direction {
            AgeFilter::Before => file.modified_at < self.cutoff,
            AgeFilter::After => file.modified_at > self.cutoff,
        }
    }
}

fn normalise_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Every file in `files` that satisfies `criteria`, in input order.
pub fn select_for_cleanup(files: &[FileRecord], criteria: &CleanupCriteria) -> Vec<FileRecord> {
    files
        .iter()
        .filter(|f| criteria.matches(f))
        .cloned()
        .collect()
}

/// What a best-effort deletion pass achieved.
#[derive(Debug, Default)]
pub struct DeletionOutcome {
    pub deleted: Vec<PathBuf>,
    pub freed_bytes: u64,
    pub failures: Vec<(PathBuf, String)>,
}

/// Delete each path independently. Files are unlinked, directories removed
/// recursively, and paths that no longer exist are skipped silently.
pub fn delete_files<P: AsRef<Path>>(paths: &[P]) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();

    for path in paths {
        let path = path.as_ref();
        let meta = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Already gone: {}", path.display());
                continue;
            }
            Err(e) => {
                warn!("Cannot stat {} for deletion: {e}", path.display());
                outcome.failures.push((path.to_path_buf(), e.to_string()));
                continue;
            }
        };

        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Ok(()) => {
                if !meta.is_dir() {
                    outcome.freed_bytes += meta.len();
                }
                outcome.deleted.push(path.to_path_buf());
            }
            Err(e) => {
                warn!("Could not delete {}: {e}", path.display());
                outcome.failures.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    info!(
        "Deleted {} paths ({} bytes), {} failures",
        outcome.deleted.len(),
        outcome.freed_bytes,
        outcome.failures.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;
    use tempfile::TempDir;

    const DAY: u64 = 24 * 3600;

    fn at_day(day: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(day * DAY)
    }

    fn rec(path: &str, size: u64, day: u64) -> FileRecord {
        FileRecord::new(path.into(), size, at_day(day))
    }

    #[test]
    fn before_and_after_are_strict() {
        let files = [rec("/a.log", 1, 9), rec("/b.log", 1, 10), rec("/c.log", 1, 11)];
        let before = select_for_cleanup(&files, &CleanupCriteria::new(at_day(10), AgeFilter::Before));
        let after = select_for_cleanup(&files, &CleanupCriteria::new(at_day(10), AgeFilter::After));
        assert_eq!(before.len(), 1);
        assert!(before[0].path.ends_with("a.log"));
        assert_eq!(after.len(), 1);
        assert!(after[0].path.ends_with("c.log"));
    }

    #[test]
    fn extension_filter_ignores_case_and_dot() {
        let files = [rec("/x/A.LOG", 1, 1), rec("/x/b.txt", 1, 1), rec("/x/c.tmp", 1, 1)];
        let criteria = CleanupCriteria::new(at_day(5), AgeFilter::Before)
            .with_extensions(["log", ".TMP", " "]);
        let picked = select_for_cleanup(&files, &criteria);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn min_size_and_exclusions_veto() {
        let files = [
            rec("/keep/big.bin", 500, 1),
            rec("/trash/big.bin", 500, 1),
            rec("/trash/small.bin", 5, 1),
        ];
        let criteria = CleanupCriteria::new(at_day(5), AgeFilter::Before)
            .with_min_size(100)
            .with_exclusions(["/keep/", ""]);
        let picked = select_for_cleanup(&files, &criteria);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].path, PathBuf::from("/trash/big.bin"));
    }

    #[test]
    fn older_than_uses_day_offset() {
        let criteria = CleanupCriteria::older_than(30, at_day(100));
        assert!(criteria.matches(&rec("/old", 1, 69)));
        assert!(!criteria.matches(&rec("/new", 1, 71)));
    }

    #[test]
    fn deletion_is_best_effort() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.bin");
        fs::write(&file, vec![1u8; 64]).unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("inner"), b"x").unwrap();
        let missing = tmp.path().join("missing");

        let outcome = delete_files(&[file.clone(), dir.clone(), missing]);
        assert_eq!(outcome.deleted.len(), 2);
        assert_eq!(outcome.freed_bytes, 64);
        assert!(outcome.failures.is_empty());
        assert!(!file.exists());
        assert!(!dir.exists());
    }
}
