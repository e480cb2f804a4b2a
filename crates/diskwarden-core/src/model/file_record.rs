/// A single regular file discovered by the scanner.
///
/// Records are immutable once produced. Consumers (duplicate detection,
/// extension statistics, cleanup selection) clone what they keep.
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Bucket name for files whose name has no extension.
pub const NO_EXTENSION: &str = "no extension";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Full path as produced by joining the scanned directory with the entry name.
    pub path: PathBuf,
    /// Logical file size in bytes.
    pub size: u64,
    /// Last-modified timestamp at scan time.
    pub modified_at: SystemTime,
}

impl FileRecord {
    pub fn new(path: PathBuf, size: u64, modified_at: SystemTime) -> Self {
        Self {
            path,
            size,
            modified_at,
        }
    }

    /// Lowercased extension with its leading dot (`".txt"`), or
    /// [`NO_EXTENSION`]. Dotfiles such as `.bashrc` have no extension.
    pub fn extension_key(&self) -> String {
        extension_key(&self.path)
    }
}

/// See [`FileRecord::extension_key`].
pub fn extension_key(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy().to_lowercase()),
        _ => NO_EXTENSION.to_string(),
    }
}
