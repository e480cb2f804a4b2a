/// OS metric sources for the disk health sampler.
///
/// Everything here is opportunistic. Disk usage is the only metric a sample
/// cannot do without; cumulative I/O counters fall back to zero and
/// temperature to `None` when the platform does not expose them.
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use sysinfo::{Components, Disks};
use tracing::debug;

/// Capacity figures for the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    /// `used / total × 100`, rounded to one decimal place.
    pub used_percent: f64,
}

impl DiskUsage {
    /// `free_bytes` is the space available to unprivileged users, so blocks
    /// reserved for root (about 5 % on a default ext4) count as used.
    /// `used_percent` therefore reads higher than `df`'s `Use%` on such
    /// filesystems, and the 80/90 % health thresholds trip correspondingly
    /// earlier.
    pub fn from_totals(total_bytes: u64, free_bytes: u64) -> Self {
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let used_percent = if total_bytes > 0 {
            (used_bytes as f64 / total_bytes as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            total_bytes,
            used_bytes,
            free_bytes,
            used_percent,
        }
    }
}

/// System-wide cumulative disk I/O since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// A source of point-in-time disk metrics.
///
/// The sampler only talks to this trait, so tests can substitute fixed or
/// scripted values for the real OS.
pub trait MetricsProbe: Send + Sync {
    /// Capacity of the filesystem containing `path`.
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage>;

    /// Cumulative I/O counters, if the platform exposes them.
    fn io_counters(&self) -> Option<IoCounters>;

    /// Best-effort drive temperature in °C.
    fn temperature(&self) -> Option<f32>;
}

/// The real OS, via `sysinfo` and (on Linux) `/proc/diskstats`.
#[derive(Debug, Default)]
pub struct SystemProbe;

impl MetricsProbe for SystemProbe {
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage> {
        let target = path
            .canonicalize()
            .map_err(|_| Error::PathNotFound(path.to_path_buf()))?;
        let disks = Disks::new_with_refreshed_list();

        // The mount point that is the longest prefix of the path owns it.
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                Error::Sensor(format!("no mounted disk contains {}", target.display()))
            })?;

        Ok(DiskUsage::from_totals(
            disk.total_space(),
            disk.available_space(),
        ))
    }

    fn io_counters(&self) -> Option<IoCounters> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        let content = std::fs::read_to_string("/proc/diskstats").ok()?;
        Some(parse_diskstats(&content, |name| {
            PathBuf::from("/sys/block").join(name).exists()
        }))
    }

    fn temperature(&self) -> Option<f32> {
        let components = Components::new_with_refreshed_list();
        let readings: Vec<(String, f32)> = components
            .list()
            .iter()
            .map(|c| (c.label().to_string(), c.temperature()))
            .collect();
        let temp = pick_temperature(&readings);
        if temp.is_none() {
            debug!("No drive or core temperature sensor available");
        }
        temp
    }
}

/// Sensor families tried in order: NVMe drives first, then CPU core sensors.
const SENSOR_PRIORITY: [&str; 2] = ["nvme", "coretemp"];

/// Pick the first plausible reading from the highest-priority sensor family.
pub fn pick_temperature(readings: &[(String, f32)]) -> Option<f32> {
    SENSOR_PRIORITY.iter().find_map(|family| {
        readings
            .iter()
            .find(|(label, temp)| {
                label.to_ascii_lowercase().contains(family) && temp.is_finite() && *temp > 0.0
            })
            .map(|(_, temp)| *temp)
    })
}

/// Sum sectors read/written (×512 bytes) over whole block devices.
///
/// `is_whole_device` filters out partitions so their I/O is not counted
/// twice; loop and ram devices are always skipped.
pub fn parse_diskstats(content: &str, is_whole_device: impl Fn(&str) -> bool) -> IoCounters {
    let mut counters = IoCounters::default();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }
        let name = parts[2];
        if name.starts_with("loop") || name.starts_with("ram") || !is_whole_device(name) {
            continue;
        }
        let (Ok(read_sectors), Ok(write_sectors)) = (parts[5].parse::<u64>(), parts[9].parse::<u64>())
        else {
            continue;
        };
        counters.read_bytes += read_sectors * 512;
        counters.write_bytes += write_sectors * 512;
    }
    counters
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "\
   7       0 loop0 100 0 800 0 0 0 0 0 0 0 0
 259       0 nvme0n1 1000 0 2000 50 300 0 4000 60 0 100 110
 259       1 nvme0n1p1 900 0 1800 40 200 0 3000 50 0 90 90
   8       0 sda 10 0 20 1 5 0 40 2 0 3 3
   8       1 sda1 garbage
";

    #[test]
    fn diskstats_sums_whole_devices_only() {
        let counters = parse_diskstats(DISKSTATS, |name| name == "nvme0n1" || name == "sda");
        assert_eq!(counters.read_bytes, (2000 + 20) * 512);
        assert_eq!(counters.write_bytes, (4000 + 40) * 512);
    }

    #[test]
    fn nvme_sensor_wins_over_coretemp() {
        let readings = vec![
            ("coretemp Package id 0".to_string(), 55.0),
            ("nvme Composite".to_string(), 41.0),
        ];
        assert_eq!(pick_temperature(&readings), Some(41.0));
    }

    #[test]
    fn coretemp_used_when_no_nvme() {
        let readings = vec![
            ("acpitz temp1".to_string(), 30.0),
            ("coretemp Core 0".to_string(), 48.5),
        ];
        assert_eq!(pick_temperature(&readings), Some(48.5));
    }

    #[test]
    fn no_known_sensor_is_none() {
        let readings = vec![("acpitz temp1".to_string(), 30.0)];
        assert_eq!(pick_temperature(&readings), None);
        assert_eq!(pick_temperature(&[]), None);
    }

    #[test]
    fn usage_percent_is_rounded() {
        let usage = DiskUsage::from_totals(3_000, 1_000);
        assert_eq!(usage.used_bytes, 2_000);
        assert_eq!(usage.used_percent, 66.7);
        assert_eq!(DiskUsage::from_totals(0, 0).used_percent, 0.0);
    }
}
