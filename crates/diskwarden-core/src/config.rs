/// Layered configuration: built-in defaults, then an optional TOML file,
/// then `DISKWARDEN_*` environment variables (nested keys use `__`, e.g.
/// `DISKWARDEN_MONITOR__INTERVAL_SECS=30`).
use crate::error::Result;
use config::{Config as ConfigBuilder, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "diskwarden";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the content-digest cache is persisted.
    pub cache_path: PathBuf,
    /// Where the scheduled-task list is persisted.
    pub tasks_path: PathBuf,
    /// Worker pool size. `0` means one worker per logical CPU.
    pub workers: usize,
    pub monitor: MonitorConfig,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Loop cadence and minimum re-sampling interval, in seconds.
    pub interval_secs: u64,
    /// Cap on the raw sample history.
    pub history_size: usize,
    /// Span of the rolling usage/IO history, in hours.
    pub window_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(".diskwarden_cache.json"),
            tasks_path: PathBuf::from("tasks.json"),
            workers: 0,
            monitor: MonitorConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            history_size: 1_000,
            window_hours: 24,
        }
    }
}

impl Config {
    /// Effective worker count (never zero).
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours.max(1))
    }
}

/// Load configuration. An explicit `path` must exist; without one, a
/// `diskwarden.toml` in the working directory is used if present.
pub fn load_configuration(path: Option<&Path>) -> Result<Config> {
    let file_source = match path {
        Some(p) => ConfigFile::from(p).required(true),
        None => ConfigFile::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let config = ConfigBuilder::builder()
        .add_source(file_source)
        .add_source(
            Environment::with_prefix("DISKWARDEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize::<Config>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.monitor.interval_secs, 60);
        assert_eq!(cfg.monitor.history_size, 1_000);
        assert_eq!(cfg.monitor.window_hours, 24);
        assert!(cfg.worker_count() >= 1);
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "workers = 3\n[monitor]\ninterval_secs = 5").unwrap();

        let cfg = load_configuration(Some(&path)).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.monitor.interval_secs, 5);
        // Unspecified keys keep their defaults.
        assert_eq!(cfg.monitor.history_size, 1_000);
        assert_eq!(cfg.tasks_path, PathBuf::from("tasks.json"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_configuration(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = MonitorConfig {
            interval_secs: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(cfg.interval(), Duration::from_secs(1));
    }
}
