/// Per-extension file statistics.
///
/// Reduces a scanned file set into one [`ExtensionStat`] per lowercased
/// extension, sorted by total size descending. Accumulation is commutative,
/// so the order files arrive in (scan completion order) does not matter.
use crate::model::file_record::NO_EXTENSION;
use crate::model::FileRecord;
use compact_str::CompactString;
use std::collections::HashMap;
use std::time::SystemTime;

/// Broad file type categories for grouping extensions in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Documents,
    Images,
    Video,
    Audio,
    Archives,
    Code,
    Executables,
    System,
    Other,
}

impl FileCategory {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Documents => "Documents",
            Self::Images => "Images",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Archives => "Archives",
            Self::Code => "Code",
            Self::Executables => "Executables",
            Self::System => "System",
            Self::Other => "Other",
        }
    }
}

/// Totals for one extension bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionStat {
    /// `".txt"`-style key, or `"no extension"`.
    pub extension: CompactString,
    pub count: u64,
    pub total_size: u64,
    pub category: FileCategory,
    /// Newest modification time seen in this bucket.
    pub last_modified: Option<SystemTime>,
}

impl ExtensionStat {
    /// Share of `total` bytes taken by this bucket, 0.0–100.0.
    pub fn percent_of(&self, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.total_size as f64 / total as f64 * 100.0
        }
    }
}

/// Categorise an extension (with or without its leading dot).
///
/// Extensions are lowercased into a 16-byte stack buffer; anything longer is
/// `Other`.
pub fn categorise_extension(ext: &str) -> FileCategory {
    let bytes = ext.strip_prefix('.').unwrap_or(ext).as_bytes();
    if bytes.len() > 16 {
        return FileCategory::Other;
    }

    let mut lower = [0u8; 16];
    for (dest, &src) in lower.iter_mut().zip(bytes.iter()) {
        *dest = src.to_ascii_lowercase();
    }
    let lower_str = match std::str::from_utf8(&lower[..bytes.len()]) {
        Ok(s) => s,
        Err(_) => return FileCategory::Other,
    };

    match lower_str {
        "doc" | "docx" | "pdf" | "txt" | "rtf" | "odt" | "xls" | "xlsx" | "ppt" | "pptx"
        | "csv" | "md" | "epub" => FileCategory::Documents,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico" | "tiff" | "tif"
        | "psd" | "raw" | "cr2" | "nef" | "heic" | "heif" => FileCategory::Images,
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" | "3gp" => {
            FileCategory::Video
        }
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" | "opus" => FileCategory::Audio,
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" | "zst" | "cab" | "iso" | "dmg" => {
            FileCategory::Archives
        }
        "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "c" | "cpp" | "h" | "hpp" | "cs" | "java"
        | "go" | "rb" | "php" | "swift" | "kt" | "scala" | "html" | "css" | "scss" | "json"
        | "xml" | "yaml" | "yml" | "toml" | "sql" | "sh" | "bat" | "ps1" => FileCategory::Code,
        "exe" | "msi" | "dll" | "so" | "dylib" | "app" | "com" | "scr" => FileCategory::Executables,
        "sys" | "drv" | "inf" | "cat" | "log" | "etl" | "dat" | "reg" | "tmp" | "bak" => {
            FileCategory::System
        }
        _ => FileCategory::Other,
    }
}

/// Aggregate `files` per extension, largest total size first.
///
/// Equal sizes are ordered by extension so output is deterministic.
pub fn aggregate(files: &[FileRecord]) -> Vec<ExtensionStat> {
    let mut map: HashMap<String, ExtensionStat> = HashMap::new();

    for file in files {
        let key = file.extension_key();
        let entry = map.entry(key).or_insert_with_key(|key| ExtensionStat {
            extension: CompactString::new(key),
            count: 0,
            total_size: 0,
            category: if key == NO_EXTENSION {
                FileCategory::Other
            } else {
                categorise_extension(key)
            },
            last_modified: None,
        });
        entry.count += 1;
        entry.total_size += file.size;
        if entry.last_modified.map_or(true, |t| file.modified_at > t) {
            entry.last_modified = Some(file.modified_at);
        }
    }

    let mut results: Vec<ExtensionStat> = map.into_values().collect();
    results.sort_by(|a, b| {
        b.total_size
            .cmp(&a.total_size)
            .then_with(|| a.extension.cmp(&b.extension))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    const MB: u64 = 1024 * 1024;

    fn file(path: &str, size: u64) -> FileRecord {
        FileRecord::new(path.into(), size, UNIX_EPOCH)
    }

    // ── categorise_extension ─────────────────────────────────────────────

    #[test]
    fn categorise_accepts_leading_dot() {
        assert_eq!(categorise_extension(".png"), FileCategory::Images);
        assert_eq!(categorise_extension("png"), FileCategory::Images);
    }

    #[test]
    fn categorise_case_insensitive() {
        assert_eq!(categorise_extension("JPG"), FileCategory::Images);
        assert_eq!(categorise_extension(".RS"), FileCategory::Code);
        assert_eq!(categorise_extension("ZIP"), FileCategory::Archives);
    }

    #[test]
    fn categorise_unknown_extension_returns_other() {
        assert_eq!(categorise_extension("xyz"), FileCategory::Other);
        assert_eq!(categorise_extension(""), FileCategory::Other);
        assert_eq!(
            categorise_extension("averyveryverylongextension"),
            FileCategory::Other
        );
    }

    // ── aggregate ────────────────────────────────────────────────────────

    /// Three .txt files totalling 10 MB outrank two .log files totalling 1 MB.
    #[test]
    fn aggregate_orders_by_total_size() {
        let files = vec![
            file("/d/a.txt", 4 * MB),
            file("/d/b.log", MB / 2),
            file("/d/c.txt", 3 * MB),
            file("/d/d.log", MB / 2),
            file("/d/e.txt", 3 * MB),
        ];

        let stats = aggregate(&files);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].extension, ".txt");
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[0].total_size, 10 * MB);
        assert_eq!(stats[1].extension, ".log");
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[1].total_size, MB);
        assert_eq!(stats[1].category, FileCategory::System);
    }

    #[test]
    fn extensions_merge_case_insensitively() {
        let stats = aggregate(&[file("/a.JPG", 1), file("/b.jpg", 2)]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].extension, ".jpg");
        assert_eq!(stats[0].count, 2);
    }

    #[test]
    fn files_without_extension_share_a_bucket() {
        let stats = aggregate(&[file("/Makefile", 5), file("/.bashrc", 6)]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].extension, NO_EXTENSION);
        assert_eq!(stats[0].total_size, 11);
        assert_eq!(stats[0].category, FileCategory::Other);
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let mut files = vec![file("/a.rs", 10), file("/b.png", 30), file("/c.rs", 25)];
        let forward = aggregate(&files);
        files.reverse();
        assert_eq!(forward, aggregate(&files));
    }

    #[test]
    fn last_modified_is_newest_in_bucket() {
        let older = FileRecord::new("/a.md".into(), 1, UNIX_EPOCH + Duration::from_secs(10));
        let newer = FileRecord::new("/b.md".into(), 1, UNIX_EPOCH + Duration::from_secs(99));
        let stats = aggregate(&[newer, older]);
        assert_eq!(
            stats[0].last_modified,
            Some(UNIX_EPOCH + Duration::from_secs(99))
        );
    }

    #[test]
    fn aggregate_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn percent_of_total() {
        let stats = aggregate(&[file("/a.txt", 25), file("/b.zip", 75)]);
        assert_eq!(stats[0].percent_of(100), 75.0);
        assert_eq!(stats[1].percent_of(0), 0.0);
    }
}
