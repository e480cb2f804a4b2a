/// DiskWarden CLI — argument parsing, progress display and report output on
/// top of `diskwarden-core`.
pub mod commands;
pub mod logging;
pub mod progress;
pub mod render;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use clap::{CommandFactory, Parser};
use commands::{CacheAction, Cli, Commands, TaskAction};
use diskwarden_core::analysis::{
    aggregate, delete_files, find_duplicates, select_for_cleanup, AgeFilter, CleanupCriteria,
};
use diskwarden_core::cache::HashCache;
use diskwarden_core::config::{load_configuration, Config};
use diskwarden_core::monitor::{DiskHealthSampler, HealthReporter, SamplerConfig};
use diskwarden_core::pool::build_pool;
use diskwarden_core::scanner::{start_scan, DirectoryScanner, ScanOutcome};
use diskwarden_core::tasks::{
    next_run, parse_time_of_day, run_task, ScheduledTask, TaskOutcome, TaskStore,
};
use progress::{follow_scan, PercentBar};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// Parse the process arguments and run the selected command.
pub fn run() -> Result<()> {
    run_with(Cli::parse())
}

pub fn run_with(cli: Cli) -> Result<()> {
    let config = load_configuration(cli.config.as_deref()).context("loading configuration")?;
    logging::init_logger(&config.log_level, cli.verbose);
    debug!("Effective configuration: {config:?}");

    let Some(command) = cli.command else {
        let _ = Cli::command().print_long_help();
        return Ok(());
    };

    let app = App {
        config,
        show_progress: !cli.no_progress,
    };

    match command {
        Commands::Scan { path } => app.scan(&path),
        Commands::Dupes {
            path,
            limit,
            delete_extra,
            yes,
        } => app.dupes(&path, limit, delete_extra, yes),
        Commands::Stats { path, top } => app.stats(&path, top),
        Commands::Clean {
            path,
            before,
            after,
            older_than,
            extensions,
            min_size,
            exclude,
            dry_run,
            yes,
        } => {
            let mut criteria = match (before, after, older_than) {
                (Some(date), _, _) => CleanupCriteria::new(local_midnight(date)?, AgeFilter::Before),
                (_, Some(date), _) => CleanupCriteria::new(local_midnight(date)?, AgeFilter::After),
                (_, _, Some(days)) => CleanupCriteria::older_than(days, SystemTime::now()),
                (None, None, None) => bail!("one of --before, --after or --older-than is required"),
            };
            criteria = criteria
                .with_extensions(extensions)
                .with_min_size(min_size.unwrap_or(0))
                .with_exclusions(exclude);
            app.clean(&path, &criteria, dry_run, yes)
        }
        Commands::Health { path } => app.health(&path),
        Commands::Monitor {
            path,
            interval,
            duration,
        } => app.monitor(path, interval, duration),
        Commands::Cache { action } => app.cache(action),
        Commands::Tasks { action } => app.tasks(action),
        Commands::Config => {
            println!("{:#?}", app.config);
            Ok(())
        }
    }
}

struct App {
    config: Config,
    show_progress: bool,
}

impl App {
    fn scanner(&self) -> Result<Arc<DirectoryScanner>> {
        let pool = build_pool(self.config.worker_count())?;
        let cache = Arc::new(HashCache::open(&self.config.cache_path));
        Ok(Arc::new(DirectoryScanner::new(pool, cache)))
    }

    fn run_scan(&self, scanner: &Arc<DirectoryScanner>, path: &Path) -> Result<ScanOutcome> {
        let started = Instant::now();
        let handle = start_scan(Arc::clone(scanner), path.to_path_buf())?;
        let outcome = follow_scan(handle, &PercentBar::new("Scanning", self.show_progress))?;
        eprint!("{}", render::scan_summary(&outcome, started.elapsed()));
        Ok(outcome)
    }

    fn scan(&self, path: &Path) -> Result<()> {
        let scanner = self.scanner()?;
        let outcome = self.run_scan(&scanner, path)?;
        let stats = aggregate(&outcome.files);
        print!("{}", render::extension_stats(&stats, outcome.total_size, 10));
        Ok(())
    }

    fn dupes(&self, path: &Path, limit: usize, delete_extra: bool, yes: bool) -> Result<()> {
        let scanner = self.scanner()?;
        let outcome = self.run_scan(&scanner, path)?;

        let bar = PercentBar::new("Hashing", self.show_progress);
        let on_progress = |pct: f32| bar.set(pct);
        let groups = find_duplicates(
            scanner.pool(),
            scanner.cache(),
            &outcome.files,
            Some(&on_progress),
        );
        bar.finish();
        print!("{}", render::duplicates(&groups, limit));

        if !delete_extra || groups.is_empty() {
            return Ok(());
        }
        // Members are path-ordered; the first of each group is kept.
        let extras: Vec<PathBuf> = groups
            .values()
            .flat_map(|g| g.iter().skip(1).map(|f| f.path.clone()))
            .collect();
        if !yes && !prompt_confirm(&format!("Delete {} duplicate copies?", extras.len()), Some(false))? {
            return Ok(());
        }
        print!("{}", render::deletion(&delete_files(&extras)));
        Ok(())
    }

    fn stats(&self, path: &Path, top: usize) -> Result<()> {
        let scanner = self.scanner()?;
        let outcome = self.run_scan(&scanner, path)?;
        let stats = aggregate(&outcome.files);
        print!("{}", render::extension_stats(&stats, outcome.total_size, top));
        Ok(())
    }

    fn clean(&self, path: &Path, criteria: &CleanupCriteria, dry_run: bool, yes: bool) -> Result<()> {
        let scanner = self.scanner()?;
        let outcome = self.run_scan(&scanner, path)?;
        let selected = select_for_cleanup(&outcome.files, criteria);
        print!("{}", render::cleanup_preview(&selected));

        if dry_run || selected.is_empty() {
            return Ok(());
        }
        if !yes && !prompt_confirm(&format!("Delete {} files?", selected.len()), Some(false))? {
            return Ok(());
        }
        let paths: Vec<PathBuf> = selected.into_iter().map(|f| f.path).collect();
        print!("{}", render::deletion(&delete_files(&paths)));
        Ok(())
    }

    fn sampler(&self) -> DiskHealthSampler {
        DiskHealthSampler::new(SamplerConfig::from(&self.config.monitor))
    }

    fn health(&self, path: &Path) -> Result<()> {
        let sampler = self.sampler();
        let report = HealthReporter::new(&sampler)
            .report(path)
            .with_context(|| format!("could not measure the disk holding {}", path.display()))?;
        print!("{}", render::health(&report));
        Ok(())
    }

    fn monitor(&self, path: PathBuf, interval: Option<u64>, duration: Option<u64>) -> Result<()> {
        let mut monitor_config = self.config.monitor.clone();
        if let Some(secs) = interval {
            monitor_config.interval_secs = secs;
        }
        let interval = monitor_config.interval();
        let sampler = DiskHealthSampler::new(SamplerConfig::from(&monitor_config));

        let (tx, rx) = crossbeam_channel::unbounded();
        sampler.start_monitoring(
            path.clone(),
            interval,
            Some(Box::new(move |sample| {
                let _ = tx.send(sample);
            })),
        )?;

        let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
        loop {
            let sample = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    match rx.recv_timeout(remaining) {
                        Ok(sample) => sample,
                        Err(_) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(sample) => sample,
                    Err(_) => break,
                },
            };
            println!("{}", render::sample_line(&sample));
        }

        sampler.stop_monitoring();
        info!(
            "Collected {} samples, {} rolling points",
            sampler.raw_history().len(),
            sampler.usage_history().len()
        );
        if let Some(report) = HealthReporter::new(&sampler).report(&path) {
            println!();
            print!("{}", render::health(&report));
        }
        Ok(())
    }

    fn cache(&self, action: CacheAction) -> Result<()> {
        let cache = HashCache::open(&self.config.cache_path);
        match action {
            CacheAction::Stats => {
                println!("Cache file: {}", cache.storage_path().display());
                println!("Entries:    {}", cache.len());
            }
            CacheAction::Prune => {
                let removed = cache.prune_missing();
                cache.try_flush()?;
                println!("Removed {removed} stale entries, {} remain", cache.len());
            }
            CacheAction::Clear => {
                let count = cache.len();
                cache.clear();
                cache.try_flush()?;
                println!("Removed {count} entries");
            }
        }
        Ok(())
    }

    fn tasks(&self, action: TaskAction) -> Result<()> {
        let mut store = TaskStore::load(&self.config.tasks_path);
        match action {
            TaskAction::List => {
                let now = Local::now().naive_local();
                let rows: Vec<_> = store
                    .tasks()
                    .iter()
                    .map(|t| {
                        let next = parse_time_of_day(&t.time)
                            .ok()
                            .map(|time| next_run(t.frequency, time, now));
                        (t.clone(), next)
                    })
                    .collect();
                print!("{}", render::tasks(&rows));
            }
            TaskAction::Add {
                directory,
                kind,
                frequency,
                time,
                retention,
                notify,
            } => {
                let task = ScheduledTask {
                    directory,
                    frequency: frequency.into(),
                    kind: kind.into(),
                    time,
                    retention: retention.to_string(),
                    notify,
                };
                store.add(task)?;
                if let Some(task) = store.tasks().last() {
                    let time = parse_time_of_day(&task.time)?;
                    let next = next_run(task.frequency, time, Local::now().naive_local());
                    println!(
                        "Scheduled {} task #{}; next run {}",
                        task.kind.label(),
                        store.tasks().len(),
                        next.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            TaskAction::Run { number } => {
                let task = number
                    .checked_sub(1)
                    .and_then(|i| store.tasks().get(i))
                    .with_context(|| format!("no task #{number}"))?
                    .clone();
                self.run_stored_task(&task)?;
            }
        }
        Ok(())
    }

    fn run_stored_task(&self, task: &ScheduledTask) -> Result<()> {
        let scanner = self.scanner()?;
        let bar = PercentBar::new(task.kind.label(), self.show_progress);
        let on_progress = |pct: f32| bar.set(pct);
        let outcome = run_task(task, &scanner, SystemTime::now(), Some(&on_progress));
        bar.finish();

        match outcome? {
            TaskOutcome::Analysis { scan, stats } => {
                print!("{}", render::extension_stats(&stats, scan.total_size, 20));
            }
            TaskOutcome::Duplicates { groups, .. } => {
                print!("{}", render::duplicates(&groups, 20));
            }
            TaskOutcome::Cleanup { deletion, .. } => {
                print!("{}", render::deletion(&deletion));
            }
        }
        if task.notify {
            println!("Task {} on {} completed", task.kind.label(), task.directory.display());
        }
        Ok(())
    }
}

fn local_midnight(date: NaiveDate) -> Result<SystemTime> {
    let midnight = date.and_hms_opt(0, 0, 0).context("invalid date")?;
    let local = Local
        .from_local_datetime(&midnight)
        .earliest()
        .with_context(|| format!("{date} has no local midnight"))?;
    Ok(SystemTime::from(local))
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{prompt} (Y/n): "),
            Some(false) | None => print!("{prompt} (y/N): "),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
