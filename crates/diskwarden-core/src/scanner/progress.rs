/// Scan progress reporting — lightweight messages sent from the scan
/// thread to a single consumer via a crossbeam channel.
use super::ScanOutcome;
use std::time::Duration;

/// Progress updates sent from a background scan to its consumer.
#[derive(Debug)]
pub enum ScanProgress {
    /// A directory task finished. `percent` is directories done / total × 100.
    Update { percent: f32 },
    /// Scanning finished; the outcome carries every discovered file.
    Complete {
        outcome: ScanOutcome,
        duration: Duration,
    },
    /// The scan could not run at all (e.g. the root does not exist).
    Failed { message: String },
    /// Scan was cancelled by the user.
    Cancelled,
}
