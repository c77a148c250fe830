//! Process-wide scheduling runtime: worker pool, timer thread, options.
//!
//! [`global_init`] wires the singletons up once; repeated calls are no-ops.
//! Without it the scheduler still works, degraded the way the engine's
//! defaults degrade: phases run inline on the caller, statistics are off, and
//! redo retries (which need the pool and timer) are disabled.
//!
//! [`global_destroy`] stops the worker pool cooperatively. The timer thread
//! keeps ticking, but its fires land on a drained pool and are dropped.

pub mod pool;
pub mod queue;
pub mod timer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once, OnceLock};

pub use pool::{WorkerPool, WorkerPoolOptions};
pub use queue::JobQueue;
pub use timer::{TimeoutQueue, TimerService};

/// A unit of work for the pool and timer.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Global scheduling configuration.
#[derive(Clone, Debug)]
pub struct SchedulerOptions {
    /// Record per-phase outcomes/time costs and emit the statistics record.
    pub enable_stats: bool,
    /// Dispatch phase bodies onto the worker pool instead of inline.
    pub enable_worker_pool: bool,
    /// Run the timer thread (required for redo retries).
    pub enable_timer: bool,
    /// Log the graph's topology levels after a successful build.
    pub verbose: bool,
    pub pool: WorkerPoolOptions,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            enable_stats: true,
            enable_worker_pool: true,
            enable_timer: true,
            verbose: false,
            pool: WorkerPoolOptions::default(),
        }
    }
}

impl SchedulerOptions {
    /// Options resolved from the environment (after a best-effort `.env`
    /// load): `PHASEFLOW_STATS`, `PHASEFLOW_WORKER_POOL`, `PHASEFLOW_TIMER`,
    /// `PHASEFLOW_VERBOSE`, `PHASEFLOW_WORKERS`, `PHASEFLOW_QUEUE_CAPACITY`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut options = Self::default();
        if let Some(v) = env_bool("PHASEFLOW_STATS") {
            options.enable_stats = v;
        }
        if let Some(v) = env_bool("PHASEFLOW_WORKER_POOL") {
            options.enable_worker_pool = v;
        }
        if let Some(v) = env_bool("PHASEFLOW_TIMER") {
            options.enable_timer = v;
        }
        if let Some(v) = env_bool("PHASEFLOW_VERBOSE") {
            options.verbose = v;
        }
        if let Some(v) = env_usize("PHASEFLOW_WORKERS") {
            options.pool.workers = v;
        }
        if let Some(v) = env_usize("PHASEFLOW_QUEUE_CAPACITY") {
            options.pool.queue_capacity = v;
        }
        options
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "unrecognized boolean in environment");
            None
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "unrecognized number in environment");
            None
        }
    }
}

/// The started singletons behind the scheduler.
pub struct Runtime {
    options: SchedulerOptions,
    pool: Arc<WorkerPool>,
    timer: TimerService,
}

impl Runtime {
    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn timer(&self) -> &TimerService {
        &self.timer
    }

    /// Runs `job` on the pool, inline when the pool is disabled or rejected
    /// the submission.
    pub(crate) fn execute(&self, job: Job) {
        if !self.options.enable_worker_pool {
            return job();
        }
        if let Err(job) = self.pool.submit(job) {
            tracing::warn!("worker queue rejected job; running inline");
            job();
        }
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static RUNTIME_INIT: Once = Once::new();
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Initializes the process-wide runtime once; later calls are ignored.
pub fn global_init(options: SchedulerOptions) {
    RUNTIME_INIT.call_once(|| {
        let pool = Arc::new(WorkerPool::new(&options.pool));
        if options.enable_worker_pool {
            pool.start();
        }
        let timer = TimerService::new();
        if options.enable_timer && options.enable_worker_pool {
            timer.start(pool.clone());
        }
        tracing::info!(
            stats = options.enable_stats,
            worker_pool = options.enable_worker_pool,
            timer = options.enable_timer,
            "scheduler runtime initialized"
        );
        let _ = RUNTIME.set(Runtime {
            options,
            pool,
            timer,
        });
    });
}

/// Stops the worker pool. Outstanding timer fires are dropped.
pub fn global_destroy() {
    if let Some(runtime) = RUNTIME.get() {
        runtime.pool.stop();
    }
}

/// The initialized runtime, if [`global_init`] ran.
pub fn current() -> Option<&'static Runtime> {
    RUNTIME.get()
}

pub(crate) fn stats_enabled() -> bool {
    current().map(|rt| rt.options.enable_stats).unwrap_or(false)
}

pub(crate) fn pool_enabled() -> bool {
    current()
        .map(|rt| rt.options.enable_worker_pool)
        .unwrap_or(false)
}

pub(crate) fn verbose() -> bool {
    current().map(|rt| rt.options.verbose).unwrap_or(false)
}

/// Runs `job` through the runtime, inline when none was initialized.
pub(crate) fn execute(job: Job) {
    match current() {
        Some(runtime) => runtime.execute(job),
        None => job(),
    }
}

/// Monotonic per-process run id, used to key timers and delayed jobs.
pub(crate) fn next_run_id() -> u64 {
    RUN_SEQ.fetch_add(1, Ordering::Relaxed) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique_and_nonzero() {
        let a = next_run_id();
        let b = next_run_id();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn default_options_match_engine_defaults() {
        let options = SchedulerOptions::default();
        assert!(options.enable_stats);
        assert!(options.enable_worker_pool);
        assert!(options.enable_timer);
        assert!(!options.verbose);
        assert_eq!(options.pool.workers, pool::MIN_WORKERS);
    }
}
