use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use diskwarden_core::model::size::parse_size;
use diskwarden_core::tasks::{Frequency, TaskKind};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "diskwarden", version)]
#[command(about = "Disk cleanup and analysis: duplicates, file statistics and disk health", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./diskwarden.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory and summarise what it holds
    Scan { path: PathBuf },

    /// Find files with identical content
    Dupes {
        path: PathBuf,
        /// Groups to list, largest waste first
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Delete every copy but the first of each group
        #[arg(long)]
        delete_extra: bool,
        /// Do not ask before deleting
        #[arg(short, long)]
        yes: bool,
    },

    /// Per-extension file statistics
    Stats {
        path: PathBuf,
        /// Extensions to list
        #[arg(long, default_value_t = 20)]
        top: usize,
    },

    /// Select files by age, extension and size, then delete them
    #[command(group(ArgGroup::new("age").required(true).args(["before", "after", "older_than"])))]
    Clean {
        path: PathBuf,
        /// Modified before this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        before: Option<NaiveDate>,
        /// Modified after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        after: Option<NaiveDate>,
        /// Modified more than this many days ago
        #[arg(long, value_name = "DAYS")]
        older_than: Option<u64>,
        /// Only these extensions (comma separated, e.g. log,tmp)
        #[arg(long = "ext", value_delimiter = ',')]
        extensions: Vec<String>,
        /// Minimum size, e.g. 10M or 512KiB
        #[arg(long, value_parser = parse_size_arg)]
        min_size: Option<u64>,
        /// Skip paths containing this text (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// List what would be deleted and stop
        #[arg(long)]
        dry_run: bool,
        /// Do not ask before deleting
        #[arg(short, long)]
        yes: bool,
    },

    /// One-shot health report for the disk holding a path
    Health {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Sample disk health repeatedly and report at the end
    Monitor {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Seconds between samples (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many seconds (runs until interrupted otherwise)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Inspect or maintain the digest cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the scheduled-task list
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Entry count and location
    Stats,
    /// Drop entries for files that no longer exist
    Prune,
    /// Remove every entry
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// List stored tasks and when each is next due
    List,
    /// Store a new task
    Add {
        directory: PathBuf,
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long, value_enum, default_value_t = FrequencyArg::Daily)]
        frequency: FrequencyArg,
        /// Local time of day, HH:MM
        #[arg(long, default_value = "00:00")]
        time: String,
        /// Cleanup tasks delete files older than this many days
        #[arg(long, default_value_t = 30)]
        retention: u64,
        #[arg(long)]
        notify: bool,
    },
    /// Run a stored task now (numbered as in `tasks list`)
    Run { number: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Cleanup,
    Duplicates,
    Analysis,
}

impl From<KindArg> for TaskKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Cleanup => TaskKind::Cleanup,
            KindArg::Duplicates => TaskKind::Duplicates,
            KindArg::Analysis => TaskKind::Analysis,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    parse_size(s).ok_or_else(|| format!("not a size: {s:?} (try 10M, 512KiB, 2G)"))
}
