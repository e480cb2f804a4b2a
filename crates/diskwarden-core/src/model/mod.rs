/// Data model shared by the scanner and the analysis passes.
pub mod file_record;
pub mod size;

pub use file_record::FileRecord;
