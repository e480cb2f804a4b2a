/// Analysis modules — post-scan passes over the scanner's file records.

pub mod cleanup;
pub mod duplicates;
pub mod file_types;

pub use cleanup::{delete_files, select_for_cleanup, AgeFilter, CleanupCriteria, DeletionOutcome};
pub use duplicates::{digest_file, find_duplicates, wasted_bytes, DuplicateGroups};
pub use file_types::{aggregate, categorise_extension, ExtensionStat, FileCategory};
