use anyhow::{bail, Result};
use diskwarden_core::scanner::progress::ScanProgress;
use diskwarden_core::scanner::{ScanHandle, ScanOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A 0–100 % bar fed by the core's percent callbacks.
///
/// Hidden bars accept updates and draw nothing, so callers never branch on
/// `--no-progress`.
pub struct PercentBar {
    bar: ProgressBar,
}

impl PercentBar {
    pub fn new(message: &str, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(100)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.cyan} {msg:<12} [{bar:40.cyan/blue}] {pos:>3}% ({elapsed})")
        {
            bar.set_style(style.progress_chars("━╸─"));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn set(&self, percent: f32) {
        self.bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Drain a background scan's channel into `bar` until the terminal message.
pub fn follow_scan(handle: ScanHandle, bar: &PercentBar) -> Result<ScanOutcome> {
    let result = loop {
        match handle.progress_rx.recv() {
            Ok(ScanProgress::Update { percent }) => bar.set(percent),
            Ok(ScanProgress::Complete { outcome, .. }) => break Ok(outcome),
            Ok(ScanProgress::Failed { message }) => break Err(anyhow::anyhow!(message)),
            Ok(ScanProgress::Cancelled) => break Err(anyhow::anyhow!("scan cancelled")),
            Err(_) => {
                bar.finish();
                bail!("scanner stopped without reporting a result");
            }
        }
    };
    bar.finish();
    result
}
