/// Throttled disk-health sampling with an optional background loop.
///
/// [`DiskHealthSampler::sample`] reuses the most recent sample if the last
/// successful one is younger than the minimum interval. The background loop
/// started by [`DiskHealthSampler::start_monitoring`] samples once per tick,
/// appends to the rolling history and hands the sample to a callback.
///
/// The loop waits on a stop channel rather than sleeping, so
/// [`DiskHealthSampler::stop_monitoring`] wakes it immediately and waits at
/// most one second for it to exit.
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::monitor::history::{HealthHistory, HealthSample, IoPoint, UsagePoint};
use crate::platform::{MetricsProbe, SystemProbe};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long `stop_monitoring` waits for the loop thread before detaching it.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Invoked on the monitor thread with every fresh tick's sample.
pub type SampleCallback = Box<dyn Fn(HealthSample) + Send + 'static>;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Samples younger than this are reused instead of re-querying the OS.
    pub min_interval: Duration,
    pub history_size: usize,
    pub window: chrono::Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for SamplerConfig {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            min_interval: cfg.interval(),
            history_size: cfg.history_size,
            window: cfg.window(),
        }
    }
}

struct SamplerState {
    history: HealthHistory,
    last_update: Option<DateTime<Utc>>,
}

/// State shared between the sampler handle and its monitor thread.
struct Shared {
    probe: Arc<dyn MetricsProbe>,
    min_interval: Duration,
    state: Mutex<SamplerState>,
}

struct MonitorThread {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    stopped: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct DiskHealthSampler {
    shared: Arc<Shared>,
    monitor: Mutex<Option<MonitorThread>>,
}

impl DiskHealthSampler {
    /// A sampler backed by the real OS.
    pub fn new(config: SamplerConfig) -> Self {
        Self::with_probe(Arc::new(SystemProbe), config)
    }

    pub fn with_probe(probe: Arc<dyn MetricsProbe>, config: SamplerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                probe,
                min_interval: config.min_interval,
                state: Mutex::new(SamplerState {
                    history: HealthHistory::new(config.history_size, config.window),
                    last_update: None,
                }),
            }),
            monitor: Mutex::new(None),
        }
    }

    /// Current health of the disk holding `path`, or `None` if it could not
    /// be measured. Failures are logged.
    pub fn sample(&self, path: &Path) -> Option<HealthSample> {
        match self.try_sample(path) {
            Ok(sample) => Some(sample),
            Err(e) => {
                error!("Disk health sampling failed for {}: {e}", path.display());
                None
            }
        }
    }

    pub fn try_sample(&self, path: &Path) -> Result<HealthSample> {
        self.shared.sample_at(path, Utc::now())
    }

    /// [`try_sample`](Self::try_sample) against an explicit clock.
    pub fn sample_at(&self, path: &Path, now: DateTime<Utc>) -> Result<HealthSample> {
        self.shared.sample_at(path, now)
    }

    /// Start the background loop on `path`, stopping any loop already
    /// running first.
    pub fn start_monitoring(
        &self,
        path: PathBuf,
        interval: Duration,
        on_sample: Option<SampleCallback>,
    ) -> Result<()> {
        if self.is_monitoring() {
            debug!("Restarting monitor loop");
        }
        self.stop_monitoring();
        let mut slot = self.monitor.lock();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let stopped = Arc::new(AtomicBool::new(false));

        let shared = Arc::clone(&self.shared);
        let thread_stopped = Arc::clone(&stopped);
        let interval = interval.max(Duration::from_millis(10));

        let handle = thread::Builder::new()
            .name("diskwarden-monitor".into())
            .spawn(move || {
                run_monitor(&shared, &path, interval, on_sample, &stop_rx, &thread_stopped);
                let _ = done_tx.send(());
            })?;

        info!("Disk health monitoring started ({interval:?} interval)");
        *slot = Some(MonitorThread {
            stop_tx,
            done_rx,
            stopped,
            handle,
        });
        Ok(())
    }

    /// Signal the loop to stop and wait up to one second for it to exit.
    ///
    /// Once this returns `true` no further callback will fire. Returns
    /// `false` if the thread did not finish in time; it is detached and
    /// will exit after its current tick.
    pub fn stop_monitoring(&self) -> bool {
        let Some(thread) = self.monitor.lock().take() else {
            return true;
        };

        thread.stopped.store(true, Ordering::Release);
        let _ = thread.stop_tx.try_send(());

        match thread.done_rx.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.handle.join().is_err() {
                    warn!("Monitor thread panicked");
                }
                info!("Disk health monitoring stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Monitor thread did not stop within {STOP_TIMEOUT:?}; detaching");
                false
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    pub fn latest(&self) -> Option<HealthSample> {
        self.shared.state.lock().history.latest().cloned()
    }

    /// Snapshot of the raw sample history, oldest first.
    pub fn raw_history(&self) -> Vec<HealthSample> {
        self.shared.state.lock().history.raw().iter().cloned().collect()
    }

    pub fn usage_history(&self) -> Vec<UsagePoint> {
        self.shared.state.lock().history.usage().iter().copied().collect()
    }

    pub fn io_history(&self) -> Vec<IoPoint> {
        self.shared.state.lock().history.io().iter().copied().collect()
    }
}

impl Drop for DiskHealthSampler {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

impl Shared {
    fn sample_at(&self, path: &Path, now: DateTime<Utc>) -> Result<HealthSample> {
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }

        // Held across the probe so concurrent callers cannot both miss the
        // throttle and query the OS twice.
        let mut state = self.state.lock();

        if let Some(last) = state.last_update {
            let fresh = (now - last)
                .to_std()
                .is_ok_and(|elapsed| elapsed < self.min_interval);
            if fresh {
                if let Some(latest) = state.history.latest() {
                    return Ok(latest.clone());
                }
            }
        }

        let usage = self.probe.disk_usage(path)?;
        let io = self.probe.io_counters().unwrap_or_default();
        let temperature_celsius = self.probe.temperature();

        let sample = HealthSample {
            timestamp: now,
            total_bytes: usage.total_bytes,
            used_bytes: usage.used_bytes,
            free_bytes: usage.free_bytes,
            used_percent: usage.used_percent,
            read_bytes: io.read_bytes,
            write_bytes: io.write_bytes,
            temperature_celsius,
        };

        if state.history.push_raw(sample.clone()) {
            state.last_update = Some(now);
        }
        Ok(sample)
    }
}

fn run_monitor(
    shared: &Shared,
    path: &Path,
    interval: Duration,
    on_sample: Option<SampleCallback>,
    stop_rx: &Receiver<()>,
    stopped: &AtomicBool,
) {
    debug!("Monitor loop running on {}", path.display());

    loop {
        if stopped.load(Ordering::Acquire) {
            break;
        }

        let now = Utc::now();
        match shared.sample_at(path, now) {
            Ok(sample) => {
                shared.state.lock().history.record_rolling(&sample, now);
                if let Some(callback) = on_sample.as_ref() {
                    if !stopped.load(Ordering::Acquire) {
                        callback(sample);
                    }
                }
            }
            Err(e) => error!("Monitor tick failed for {}: {e}", path.display()),
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Monitor loop exited");
}
