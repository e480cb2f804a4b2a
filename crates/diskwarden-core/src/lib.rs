/// DiskWarden Core — scanning, duplicate detection, file statistics and
/// disk health monitoring.
///
/// This crate contains all business logic with no terminal or UI
/// dependencies. Frontends drive it through callbacks and channels.
///
/// # Modules
///
/// - [`scanner`] — parallel directory scanning with progress reporting.
/// - [`cache`] — persistent content-digest cache keyed by path and mtime.
/// - [`analysis`] — duplicate detection, per-extension statistics, cleanup.
/// - [`monitor`] — disk health sampling, rolling histories and reports.
/// - [`tasks`] — the persisted scheduled-task list.
/// - [`platform`] — OS metric probes (capacity, I/O counters, sensors).
/// - [`model`] — file records and size formatting.
/// - [`config`] — layered configuration.
pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod platform;
pub mod pool;
pub mod scanner;
pub mod tasks;

pub use error::{Error, Result};
