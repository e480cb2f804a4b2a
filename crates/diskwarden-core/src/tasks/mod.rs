/// Persisted scheduled-task list and one-shot task execution.
///
/// Tasks are stored as a JSON array whose field names and enum values are
/// kept compatible with existing `tasks.json` files (French labels
/// included). Nothing here fires tasks on a timer; [`next_run`] only
/// computes when a task would next be due, and [`run_task`] runs one now.
use crate::analysis::{
    aggregate, delete_files, find_duplicates, select_for_cleanup, CleanupCriteria,
    DeletionOutcome, DuplicateGroups, ExtensionStat,
};
use crate::error::{Error, Result};
use crate::scanner::{DirectoryScanner, ScanOutcome};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "quotidien")]
    Daily,
    #[serde(rename = "hebdomadaire")]
    Weekly,
    /// Every 30 days, not calendar months.
    #[serde(rename = "mensuel")]
    Monthly,
}

impl Frequency {
    pub fn period(&self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "Nettoyage automatique")]
    Cleanup,
    #[serde(rename = "Recherche de doublons")]
    Duplicates,
    #[serde(rename = "Analyse d'espace")]
    Analysis,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Duplicates => "duplicates",
            Self::Analysis => "analysis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub directory: PathBuf,
    pub frequency: Frequency,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    /// Retention period in days, stored as typed by the user.
    #[serde(default)]
    pub retention: String,
    #[serde(default)]
    pub notify: bool,
}

impl ScheduledTask {
    pub fn retention_days(&self) -> Option<u64> {
        self.retention.trim().parse().ok()
    }
}

/// Parse `H:MM`/`HH:MM` into a time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let invalid = || Error::InvalidTask(format!("time must be HH:MM, got {s:?}"));
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || m.is_empty() || h.len() > 2 || m.len() > 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// When a task at `time` with `frequency` is next due after `now`: today at
/// `time` if that is still ahead, otherwise one period later.
pub fn next_run(frequency: Frequency, time: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(time);
    if today > now {
        today
    } else {
        today + frequency.period()
    }
}

#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    tasks: Vec<ScheduledTask>,
}

impl TaskStore {
    /// Read the task list at `path`. A missing or unreadable file gives an
    /// empty list.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tasks = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!("Ignoring corrupt task list {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Cannot read task list {}: {e}", path.display());
                Vec::new()
            }
        };
        Self { path, tasks }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Validate and append a task, then rewrite the file.
    pub fn add(&mut self, mut task: ScheduledTask) -> Result<()> {
        if !task.directory.is_dir() {
            return Err(Error::InvalidTask(format!(
                "directory does not exist: {}",
                task.directory.display()
            )));
        }
        let time = parse_time_of_day(&task.time)?;
        task.time = time.format("%H:%M").to_string();

        info!(
            "Scheduling {} task on {} ({} at {})",
            task.kind.label(),
            task.directory.display(),
            task.frequency.label(),
            task.time
        );
        self.tasks.push(task);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.tasks)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// What running a task once produced.
#[derive(Debug)]
pub enum TaskOutcome {
    Analysis {
        scan: ScanOutcome,
        stats: Vec<ExtensionStat>,
    },
    Duplicates {
        scan: ScanOutcome,
        groups: DuplicateGroups,
    },
    Cleanup {
        scan: ScanOutcome,
        deletion: DeletionOutcome,
    },
}

/// Run `task` once against its directory.
///
/// Cleanup deletes only files last modified more than the retention period
/// before `now`; a task without a parsable retention is rejected rather
/// than emptying the directory.
pub fn run_task(
    task: &ScheduledTask,
    scanner: &DirectoryScanner,
    now: SystemTime,
    progress: Option<&dyn Fn(f32)>,
) -> Result<TaskOutcome> {
    info!(
        "Running {} task on {}",
        task.kind.label(),
        task.directory.display()
    );

    match task.kind {
        TaskKind::Analysis => {
            let scan = scanner.scan(&task.directory, progress)?;
            let stats = aggregate(&scan.files);
            Ok(TaskOutcome::Analysis { scan, stats })
        }
        TaskKind::Duplicates => {
            let scan = scanner.scan(&task.directory, progress)?;
            let groups = find_duplicates(scanner.pool(), scanner.cache(), &scan.files, progress);
            Ok(TaskOutcome::Duplicates { scan, groups })
        }
        TaskKind::Cleanup => {
            let days = task.retention_days().ok_or_else(|| {
                Error::InvalidTask(format!("retention is not a number of days: {:?}", task.retention))
            })?;
            let scan = scanner.scan(&task.directory, progress)?;
            let criteria = CleanupCriteria::older_than(days, now);
            let doomed: Vec<PathBuf> = select_for_cleanup(&scan.files, &criteria)
                .into_iter()
                .map(|f| f.path)
                .collect();
            let deletion = delete_files(&doomed);
            Ok(TaskOutcome::Cleanup { scan, deletion })
        }
    }
}
