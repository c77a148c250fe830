//! Fixed-size worker pool draining the shared job queue.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use super::Job;
use super::queue::JobQueue;

/// Smallest worker count the pool will run with.
pub const MIN_WORKERS: usize = 4;
const DEQUEUE_WAIT: Duration = Duration::from_millis(50);

/// Worker pool sizing.
#[derive(Clone, Debug)]
pub struct WorkerPoolOptions {
    /// Number of worker threads; values below [`MIN_WORKERS`] are raised.
    pub workers: usize,
    /// Job queue capacity; zero means unbounded.
    pub queue_capacity: usize,
}

impl Default for WorkerPoolOptions {
    fn default() -> Self {
        Self {
            workers: MIN_WORKERS,
            queue_capacity: 0,
        }
    }
}

/// Fixed set of worker threads executing submitted closures.
///
/// Workers dequeue with a bounded wait and check the stop flag on every
/// iteration, so shutdown is cooperative: in-flight jobs finish, queued jobs
/// left behind after [`stop`](Self::stop) are dropped with the queue.
pub struct WorkerPool {
    queue: JobQueue<Job>,
    stop: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(options: &WorkerPoolOptions) -> Self {
        Self {
            queue: JobQueue::new(options.queue_capacity),
            stop: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            workers: options.workers.max(MIN_WORKERS),
        }
    }

    /// Spawns the workers; idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for index in 0..self.workers {
            let queue = self.queue.clone();
            let stop = self.stop.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("phase-worker-{index}"))
                .spawn(move || worker_loop(index, queue, stop));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => tracing::error!(index, error = %err, "cannot spawn worker"),
            }
        }
        tracing::debug!(workers = handles.len(), "worker pool started");
    }

    /// Enqueues a job; hands it back when the queue rejected it.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        self.queue.push(job)
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Cooperative shutdown: signals the stop flag and joins the workers.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(index: usize, queue: JobQueue<Job>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        let Some(job) = queue.pop_timeout(DEQUEUE_WAIT) else {
            continue;
        };
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(worker = index, "job panicked; worker continues");
        }
    }
}
