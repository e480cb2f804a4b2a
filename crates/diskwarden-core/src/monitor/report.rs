/// Health classification and trend analysis over the raw sample history.
///
/// Trends are computed on hourly buckets: samples are grouped by the UTC
/// hour they fall in, averaged, and differenced only between buckets for
/// consecutive hours. A gap in the history therefore contributes no slope.
use crate::monitor::history::HealthSample;
use crate::monitor::sampler::DiskHealthSampler;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const CRITICAL_USED_PERCENT: f64 = 90.0;
/// Percentage points of growth per hour.
pub const CRITICAL_TREND_PER_HOUR: f64 = 5.0;
pub const WARNING_USED_PERCENT: f64 = 80.0;
pub const WARNING_TREND_PER_HOUR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub used_percent: f64,
    pub free_bytes: u64,
    /// Mean hour-over-hour change in used percentage.
    pub usage_trend_per_hour: f64,
    /// Mean hour-over-hour change in cumulative bytes, averaged over read
    /// and write.
    pub io_trend_bytes_per_sample: f64,
    pub temperature_celsius: Option<f32>,
    pub generated_at: DateTime<Utc>,
}

/// First match wins: critical above 90 % used or 5 points/hour growth,
/// warning above 80 % or 2 points/hour, good otherwise.
pub fn classify(used_percent: f64, usage_trend_per_hour: f64) -> HealthStatus {
    if used_percent > CRITICAL_USED_PERCENT || usage_trend_per_hour > CRITICAL_TREND_PER_HOUR {
        HealthStatus::Critical
    } else if used_percent > WARNING_USED_PERCENT || usage_trend_per_hour > WARNING_TREND_PER_HOUR
    {
        HealthStatus::Warning
    } else {
        HealthStatus::Good
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyBucket {
    /// Whole hours since the Unix epoch.
    pub hour: i64,
    pub used_percent: f64,
    pub read_bytes: f64,
    pub write_bytes: f64,
}

/// Group samples by UTC hour and average each group, in hour order.
pub fn hourly_buckets(samples: &[HealthSample]) -> Vec<HourlyBucket> {
    // hour -> (count, used, read, write)
    let mut sums: BTreeMap<i64, (u32, f64, f64, f64)> = BTreeMap::new();
    for s in samples {
        let hour = s.timestamp.timestamp().div_euclid(3600);
        let entry = sums.entry(hour).or_default();
        entry.0 += 1;
        entry.1 += s.used_percent;
        entry.2 += s.read_bytes as f64;
        entry.3 += s.write_bytes as f64;
    }

    sums.into_iter()
        .map(|(hour, (n, used, read, write))| {
            let n = f64::from(n);
            HourlyBucket {
                hour,
                used_percent: used / n,
                read_bytes: read / n,
                write_bytes: write / n,
            }
        })
        .collect()
}

fn mean_hourly_diff(buckets: &[HourlyBucket], value: impl Fn(&HourlyBucket) -> f64) -> f64 {
    let diffs: Vec<f64> = buckets
        .windows(2)
        .filter(|w| w[1].hour == w[0].hour + 1)
        .map(|w| value(&w[1]) - value(&w[0]))
        .collect();
    if diffs.is_empty() {
        0.0
    } else {
        diffs.iter().sum::<f64>() / diffs.len() as f64
    }
}

/// Mean hour-over-hour change in used percentage; 0 without two adjacent hours.
pub fn usage_trend(samples: &[HealthSample]) -> f64 {
    mean_hourly_diff(&hourly_buckets(samples), |b| b.used_percent)
}

/// Mean of the read and write hour-over-hour byte deltas.
pub fn io_trend(samples: &[HealthSample]) -> f64 {
    let buckets = hourly_buckets(samples);
    let read = mean_hourly_diff(&buckets, |b| b.read_bytes);
    let write = mean_hourly_diff(&buckets, |b| b.write_bytes);
    (read + write) / 2.0
}

/// Build a report for `current` from the history it belongs to.
pub fn build_report(
    current: &HealthSample,
    history: &[HealthSample],
    generated_at: DateTime<Utc>,
) -> HealthReport {
    let usage_trend_per_hour = usage_trend(history);
    HealthReport {
        status: classify(current.used_percent, usage_trend_per_hour),
        used_percent: current.used_percent,
        free_bytes: current.free_bytes,
        usage_trend_per_hour,
        io_trend_bytes_per_sample: io_trend(history),
        temperature_celsius: current.temperature_celsius,
        generated_at,
    }
}

/// Produces health reports from a sampler's current reading and history.
pub struct HealthReporter<'a> {
    sampler: &'a DiskHealthSampler,
}

impl<'a> HealthReporter<'a> {
    pub fn new(sampler: &'a DiskHealthSampler) -> Self {
        Self { sampler }
    }

    /// Sample `path` (subject to the throttle) and report on it. `None` if
    /// the disk could not be measured.
    pub fn report(&self, path: &Path) -> Option<HealthReport> {
        let current = self.sampler.sample(path)?;
        let history = self.sampler.raw_history();
        Some(build_report(&current, &history, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::history::sample_at;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classify(95.0, 0.0), HealthStatus::Critical);
        assert_eq!(classify(85.0, 0.0), HealthStatus::Warning);
        assert_eq!(classify(50.0, 0.0), HealthStatus::Good);
        // Boundaries are exclusive.
        assert_eq!(classify(90.0, 0.0), HealthStatus::Warning);
        assert_eq!(classify(80.0, 0.0), HealthStatus::Good);
        assert_eq!(classify(50.0, 2.0), HealthStatus::Good);
        assert_eq!(classify(50.0, 2.5), HealthStatus::Warning);
        assert_eq!(classify(50.0, 5.1), HealthStatus::Critical);
    }

    #[test]
    fn samples_within_an_hour_share_a_bucket() {
        let samples = [
            sample_at(t0(), 10.0),
            sample_at(t0() + Duration::minutes(30), 20.0),
            sample_at(t0() + Duration::minutes(70), 40.0),
        ];
        let buckets = hourly_buckets(&samples);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].used_percent, 15.0);
        assert_eq!(buckets[1].used_percent, 40.0);
        assert_eq!(buckets[1].hour, buckets[0].hour + 1);
    }

    #[test]
    fn trend_is_mean_of_adjacent_hour_diffs() {
        let samples: Vec<_> = [10.0, 12.0, 18.0]
            .iter()
            .enumerate()
            .map(|(h, &p)| sample_at(t0() + Duration::hours(h as i64), p))
            .collect();
        // diffs 2 and 6
        assert_eq!(usage_trend(&samples), 4.0);
    }

    #[test]
    fn non_adjacent_hours_contribute_nothing() {
        let samples = [
            sample_at(t0(), 10.0),
            sample_at(t0() + Duration::hours(5), 90.0),
        ];
        assert_eq!(usage_trend(&samples), 0.0);
        assert_eq!(usage_trend(&[]), 0.0);
        assert_eq!(usage_trend(&samples[..1]), 0.0);
    }

    #[test]
    fn io_trend_averages_read_and_write() {
        let mut a = sample_at(t0(), 10.0);
        a.read_bytes = 1_000;
        a.write_bytes = 0;
        let mut b = sample_at(t0() + Duration::hours(1), 10.0);
        b.read_bytes = 3_000;
        b.write_bytes = 1_000;
        // read +2000, write +1000
        assert_eq!(io_trend(&[a, b]), 1_500.0);
    }

    #[test]
    fn rapid_growth_is_critical_below_the_usage_threshold() {
        let history: Vec<_> = (0..3)
            .map(|h| sample_at(t0() + Duration::hours(h), 40.0 + 10.0 * h as f64))
            .collect();
        let report = build_report(&history[2], &history, t0() + Duration::hours(2));
        assert_eq!(report.usage_trend_per_hour, 10.0);
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.used_percent, 60.0);
    }
}
