/// The fixed-size worker pool shared by directory scanning and digest
/// computation.
///
/// Both passes are fan-out/fan-in: every task is spawned independently and
/// reports back over a channel in completion order, so callers must treat
/// aggregation as commutative.
use crate::error::Result;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

pub type WorkerPool = Arc<ThreadPool>;

/// Build a pool with `workers` threads (`0` = one per logical CPU).
pub fn build_pool(workers: usize) -> Result<WorkerPool> {
    let threads = if workers == 0 { num_cpus::get() } else { workers };
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("diskwarden-worker-{i}"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Percentage of `done` over `total`, as reported to progress callbacks.
pub(crate) fn percent(done: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        (done as f64 / total as f64 * 100.0) as f32
    }
}
