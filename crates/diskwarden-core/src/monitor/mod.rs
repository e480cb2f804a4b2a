/// Disk health monitoring: throttled sampling of capacity, I/O counters and
/// temperature into bounded histories, plus trend-based health reports.

pub mod history;
pub mod report;
pub mod sampler;

pub use history::{HealthHistory, HealthSample, IoPoint, UsagePoint};
pub use report::{classify, HealthReport, HealthReporter, HealthStatus};
pub use sampler::{DiskHealthSampler, SampleCallback, SamplerConfig};
