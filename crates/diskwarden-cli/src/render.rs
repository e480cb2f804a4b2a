/// Plain-text report formatting. Every function returns the text so the
/// caller decides where it goes.

use chrono::{DateTime, Local, NaiveDateTime};
use diskwarden_core::analysis::cleanup::DeletionOutcome;
use diskwarden_core::analysis::duplicates::largest_first;
use diskwarden_core::analysis::{wasted_bytes, DuplicateGroups, ExtensionStat};
use diskwarden_core::model::size::{format_count, format_size};
use diskwarden_core::model::FileRecord;
use diskwarden_core::monitor::{HealthReport, HealthSample};
use diskwarden_core::scanner::ScanOutcome;
use diskwarden_core::tasks::ScheduledTask;
use std::fmt::Write as _;
use std::time::{Duration, SystemTime};

pub fn scan_summary(outcome: &ScanOutcome, elapsed: Duration) -> String {
    let mut out = format!(
        "{} files, {} in {} directories ({:.2}s)\n",
        format_count(outcome.files.len() as u64),
        format_size(outcome.total_size),
        format_count(outcome.directories as u64),
        elapsed.as_secs_f64()
    );
    if outcome.failed_directories > 0 {
        let _ = writeln!(
            out,
            "{} directories could not be read",
            format_count(outcome.failed_directories as u64)
        );
    }
    out
}

pub fn duplicates(groups: &DuplicateGroups, limit: usize) -> String {
    if groups.is_empty() {
        return "No duplicates found.\n".to_string();
    }

    let files: usize = groups.values().map(Vec::len).sum();
    let mut out = format!(
        "{} groups, {} files, {} reclaimable\n",
        format_count(groups.len() as u64),
        format_count(files as u64),
        format_size(wasted_bytes(groups))
    );

    for (digest, members) in largest_first(groups).into_iter().take(limit) {
        let size = members.first().map(|f| f.size).unwrap_or(0);
        let _ = writeln!(
            out,
            "\n{} × {} [{}]",
            members.len(),
            format_size(size),
            &digest[..digest.len().min(12)]
        );
        for member in members {
            let _ = writeln!(out, "  {}", member.path.display());
        }
    }
    if groups.len() > limit {
        let _ = writeln!(out, "\n… {} more groups", groups.len() - limit);
    }
    out
}

pub fn extension_stats(stats: &[ExtensionStat], total_size: u64, top: usize) -> String {
    let mut out = format!(
        "{:<16} {:<12} {:>10} {:>12} {:>7}  {}\n",
        "EXTENSION", "CATEGORY", "FILES", "SIZE", "SHARE", "LAST MODIFIED"
    );
    for stat in stats.iter().take(top) {
        let _ = writeln!(
            out,
            "{:<16} {:<12} {:>10} {:>12} {:>6.1}%  {}",
            stat.extension,
            stat.category.label(),
            format_count(stat.count),
            format_size(stat.total_size),
            stat.percent_of(total_size),
            stat.last_modified.map(local_date).unwrap_or_default()
        );
    }
    if stats.len() > top {
        let _ = writeln!(out, "… {} more extensions", stats.len() - top);
    }
    out
}

pub fn cleanup_preview(files: &[FileRecord]) -> String {
    let total: u64 = files.iter().map(|f| f.size).sum();
    let mut out = String::new();
    for file in files {
        let _ = writeln!(
            out,
            "{:>10}  {}  {}",
            format_size(file.size),
            local_date(file.modified_at),
            file.path.display()
        );
    }
    let _ = writeln!(
        out,
        "{} files selected, {}",
        format_count(files.len() as u64),
        format_size(total)
    );
    out
}

pub fn deletion(outcome: &DeletionOutcome) -> String {
    let mut out = format!(
        "Deleted {} items, freed {}\n",
        format_count(outcome.deleted.len() as u64),
        format_size(outcome.freed_bytes)
    );
    for (path, reason) in &outcome.failures {
        let _ = writeln!(out, "  failed: {}: {reason}", path.display());
    }
    out
}

pub fn health(report: &HealthReport) -> String {
    let mut out = format!(
        "Status:      {}\nUsed:        {:.1}%\nFree:        {}\nUsage trend: {:+.2} %/h\nI/O trend:   {}/h\n",
        report.status.label().to_uppercase(),
        report.used_percent,
        format_size(report.free_bytes),
        report.usage_trend_per_hour,
        signed_size(report.io_trend_bytes_per_sample)
    );
    match report.temperature_celsius {
        Some(t) => {
            let _ = writeln!(out, "Temperature: {t:.1} °C");
        }
        None => out.push_str("Temperature: n/a\n"),
    }
    out
}

/// One line per monitoring tick.
pub fn sample_line(sample: &HealthSample) -> String {
    let temp = sample
        .temperature_celsius
        .map(|t| format!("{t:.1} °C"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{}  used {:>5.1}%  free {:>10}  read {:>10}  written {:>10}  temp {}",
        sample.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        sample.used_percent,
        format_size(sample.free_bytes),
        format_size(sample.read_bytes),
        format_size(sample.write_bytes),
        temp
    )
}

/// Tasks numbered from 1 with their next due time.
pub fn tasks(tasks: &[(ScheduledTask, Option<NaiveDateTime>)]) -> String {
    if tasks.is_empty() {
        return "No scheduled tasks.\n".to_string();
    }
    let mut out = format!(
        "{:>3}  {:<11} {:<8} {:<6} {:<17} {}\n",
        "#", "TASK", "EVERY", "AT", "NEXT RUN", "DIRECTORY"
    );
    for (i, (task, next)) in tasks.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<11} {:<8} {:<6} {:<17} {}",
            i + 1,
            task.kind.label(),
            task.frequency.label(),
            task.time,
            next.map(|n| n.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "invalid time".to_string()),
            task.directory.display()
        );
    }
    out
}

fn local_date(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format("%Y-%m-%d").to_string()
}

fn signed_size(bytes: f64) -> String {
    let sign = if bytes < 0.0 { "-" } else { "+" };
    format!("{sign}{}", format_size(bytes.abs().round() as u64))
}
