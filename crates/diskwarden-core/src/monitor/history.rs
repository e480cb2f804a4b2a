/// Sample types and the two retention policies that hold them.
///
/// - The **raw** history keeps full [`HealthSample`]s, capped by count and
///   evicted oldest-first. Trend computation reads it.
/// - The **rolling** history keeps one [`UsagePoint`] and one [`IoPoint`]
///   per monitoring tick, pruned to a fixed time window (24 h by default).
///   It is what a frontend plots.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// One point-in-time reading of a disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
    /// System-wide bytes read since boot (0 when unavailable).
    pub read_bytes: u64,
    /// System-wide bytes written since boot (0 when unavailable).
    pub write_bytes: u64,
    pub temperature_celsius: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    pub time: DateTime<Utc>,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IoPoint {
    pub time: DateTime<Utc>,
    /// Cumulative read + write volume, in MiB.
    pub total_mib: f64,
}

#[derive(Debug)]
pub struct HealthHistory {
    raw: VecDeque<HealthSample>,
    capacity: usize,
    usage: VecDeque<UsagePoint>,
    io: VecDeque<IoPoint>,
    window: Duration,
}

impl HealthHistory {
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            raw: VecDeque::with_capacity(capacity.min(4_096)),
            capacity,
            usage: VecDeque::new(),
            io: VecDeque::new(),
            window,
        }
    }

    /// Append to the raw history, evicting the oldest sample past capacity.
    ///
    /// A sample older than the newest one already held is rejected so
    /// timestamps stay non-decreasing. Returns whether it was kept.
    pub fn push_raw(&mut self, sample: HealthSample) -> bool {
        if let Some(last) = self.raw.back() {
            if sample.timestamp < last.timestamp {
                warn!(
                    "Discarding out-of-order sample at {} (latest is {})",
                    sample.timestamp, last.timestamp
                );
                return false;
            }
        }
        self.raw.push_back(sample);
        while self.raw.len() > self.capacity {
            self.raw.pop_front();
        }
        true
    }

    /// Record a monitoring tick at `now` and drop rolling entries that are
    /// not strictly newer than `now - window`.
    pub fn record_rolling(&mut self, sample: &HealthSample, now: DateTime<Utc>) {
        self.usage.push_back(UsagePoint {
            time: now,
            used_percent: sample.used_percent,
        });
        let mib = (sample.read_bytes + sample.write_bytes) as f64 / 1024.0 / 1024.0;
        self.io.push_back(IoPoint {
            time: now,
            total_mib: mib,
        });

        let cutoff = now - self.window;
        while self.usage.front().is_some_and(|p| p.time <= cutoff) {
            self.usage.pop_front();
        }
        while self.io.front().is_some_and(|p| p.time <= cutoff) {
            self.io.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&HealthSample> {
        self.raw.back()
    }

    pub fn raw(&self) -> &VecDeque<HealthSample> {
        &self.raw
    }

    pub fn usage(&self) -> &VecDeque<UsagePoint> {
        &self.usage
    }

    pub fn io(&self) -> &VecDeque<IoPoint> {
        &self.io
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
pub(crate) fn sample_at(timestamp: DateTime<Utc>, used_percent: f64) -> HealthSample {
    HealthSample {
        timestamp,
        total_bytes: 1_000,
        used_bytes: (used_percent * 10.0) as u64,
        free_bytes: 1_000 - (used_percent * 10.0) as u64,
        used_percent,
        read_bytes: 0,
        write_bytes: 0,
        temperature_celsius: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    /// 30 hourly ticks leave exactly the last 24 in the rolling history.
    #[test]
    fn rolling_window_keeps_last_24_hours() {
        let mut history = HealthHistory::new(1_000, Duration::hours(24));
        for h in 0..30 {
            let now = t0() + Duration::hours(h);
            history.record_rolling(&sample_at(now, 50.0), now);
        }
        assert_eq!(history.usage().len(), 24);
        assert_eq!(history.io().len(), 24);
        assert_eq!(history.usage().front().unwrap().time, t0() + Duration::hours(6));
        assert_eq!(history.usage().back().unwrap().time, t0() + Duration::hours(29));
    }

    #[test]
    fn raw_history_never_exceeds_capacity() {
        let mut history = HealthHistory::new(5, Duration::hours(24));
        for i in 0..50 {
            history.push_raw(sample_at(t0() + Duration::minutes(i), i as f64));
            assert!(history.raw().len() <= 5);
        }
        assert_eq!(history.raw().len(), 5);
        // FIFO: the five newest survive.
        assert_eq!(history.raw().front().unwrap().used_percent, 45.0);
        assert_eq!(history.latest().unwrap().used_percent, 49.0);
    }

    #[test]
    fn out_of_order_samples_are_rejected() {
        let mut history = HealthHistory::new(10, Duration::hours(24));
        assert!(history.push_raw(sample_at(t0() + Duration::hours(1), 1.0)));
        assert!(!history.push_raw(sample_at(t0(), 2.0)));
        // Equal timestamps are allowed.
        assert!(history.push_raw(sample_at(t0() + Duration::hours(1), 3.0)));
        assert_eq!(history.raw().len(), 2);
    }

    #[test]
    fn io_point_is_cumulative_mib() {
        let mut history = HealthHistory::new(10, Duration::hours(24));
        let mut s = sample_at(t0(), 10.0);
        s.read_bytes = 3 * 1024 * 1024;
        s.write_bytes = 1024 * 1024;
        history.record_rolling(&s, t0());
        assert_eq!(history.io()[0].total_mib, 4.0);
    }
}
