/// Platform metrics: disk capacity, I/O counters and
/// temperature sensors behind the [`MetricsProbe`] trait.

pub mod probe;

pub use probe::{DiskUsage, IoCounters, MetricsProbe, SystemProbe};
