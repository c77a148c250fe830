//! Keyed one-shot timers.
//!
//! [`TimeoutQueue`] is the passive data structure: an ordered deadline map
//! plus an id-indexed handle map, so insertion, cancellation, and due-drain
//! are all O(log n). [`TimerService`] wraps it with one dedicated thread that
//! wakes at least every 100 ms and emplaces due callbacks onto the worker
//! pool, so callbacks never run on the timer thread itself.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use super::Job;
use super::pool::WorkerPool;
use crate::utils::clock::now_ms;

const SCAN_WAIT: Duration = Duration::from_millis(100);

/// Deadline-ordered queue of keyed entries. Not thread-safe on its own.
pub struct TimeoutQueue<T> {
    by_deadline: BTreeMap<(i64, u64), (u64, T)>,
    by_id: FxHashMap<u64, (i64, u64)>,
    seq: u64,
}

impl<T> Default for TimeoutQueue<T> {
    fn default() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            by_id: FxHashMap::default(),
            seq: 0,
        }
    }
}

impl<T> TimeoutQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `data` under `id`, due `timeout_ms` from now. An existing
    /// entry with the same id is replaced.
    pub fn push(&mut self, id: u64, data: T, timeout_ms: i64) {
        if self.by_id.contains_key(&id) {
            self.erase(id);
        }
        let key = (now_ms() + timeout_ms, self.seq);
        self.seq += 1;
        self.by_deadline.insert(key, (id, data));
        self.by_id.insert(id, key);
    }

    /// Cancels the entry under `id`; false when absent.
    pub fn erase(&mut self, id: u64) -> bool {
        let Some(key) = self.by_id.remove(&id) else {
            return false;
        };
        self.by_deadline.remove(&key);
        true
    }

    /// Removes and returns the entry under `id`.
    pub fn pop(&mut self, id: u64) -> Option<T> {
        let key = self.by_id.remove(&id)?;
        self.by_deadline.remove(&key).map(|(_, data)| data)
    }

    /// Moves every entry whose deadline passed into `due`.
    pub fn drain_due(&mut self, now_ms: i64, due: &mut Vec<T>) {
        while let Some((&key, _)) = self.by_deadline.first_key_value() {
            if key.0 > now_ms {
                break;
            }
            if let Some((id, data)) = self.by_deadline.remove(&key) {
                self.by_id.remove(&id);
                due.push(data);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_deadline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_deadline.is_empty()
    }
}

struct TimerShared {
    queue: Mutex<TimeoutQueue<Job>>,
    cond: Condvar,
    stop: AtomicBool,
}

/// One-shot timer thread firing callbacks on the worker pool.
pub struct TimerService {
    shared: Arc<TimerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TimerShared {
                queue: Mutex::new(TimeoutQueue::new()),
                cond: Condvar::new(),
                stop: AtomicBool::new(false),
            }),
            handle: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Starts the timer thread; idempotent. Due callbacks are submitted to
    /// `pool`; fires that the pool rejects are dropped.
    pub fn start(&self, pool: Arc<WorkerPool>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = self.shared.clone();
        let spawned = std::thread::Builder::new()
            .name("phase-timer".to_string())
            .spawn(move || timer_loop(shared, pool));
        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot spawn timer thread");
                self.started.store(false, Ordering::Release);
            }
        }
    }

    /// Schedules `cb` to fire `timeout_ms` from now under `id`.
    pub fn push(&self, id: u64, cb: impl FnOnce() + Send + 'static, timeout_ms: i64) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id, Box::new(cb), timeout_ms);
        self.shared.cond.notify_all();
    }

    /// Whether the timer thread was started.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Cancels the timer under `id`; false when it already fired or never
    /// existed.
    pub fn erase(&self, id: u64) -> bool {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .erase(id)
    }

    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.cond.notify_all();
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn timer_loop(shared: Arc<TimerShared>, pool: Arc<WorkerPool>) {
    let mut due: Vec<Job> = Vec::new();
    while !shared.stop.load(Ordering::Acquire) {
        {
            let queue = shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let (mut queue, _) = shared
                .cond
                .wait_timeout(queue, SCAN_WAIT)
                .unwrap_or_else(PoisonError::into_inner);
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            queue.drain_due(now_ms(), &mut due);
        }
        for job in due.drain(..) {
            if pool.submit(job).is_err() {
                tracing::debug!("timer fire dropped; worker pool rejected it");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::pool::WorkerPoolOptions;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn timeout_queue_drains_in_deadline_order() {
        let mut queue = TimeoutQueue::new();
        queue.push(1, "late", 500);
        queue.push(2, "early", 0);
        let mut due = Vec::new();
        queue.drain_due(now_ms() + 1, &mut due);
        assert_eq!(due, vec!["early"]);
        assert_eq!(queue.len(), 1);
        queue.drain_due(now_ms() + 1000, &mut due);
        assert_eq!(due, vec!["early", "late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn timeout_queue_erase_and_pop() {
        let mut queue = TimeoutQueue::new();
        queue.push(1, "a", 1000);
        queue.push(2, "b", 1000);
        assert!(queue.erase(1));
        assert!(!queue.erase(1));
        assert_eq!(queue.pop(2), Some("b"));
        assert!(queue.is_empty());
    }

    #[test]
    fn timeout_queue_replaces_duplicate_ids() {
        let mut queue = TimeoutQueue::new();
        queue.push(1, "first", 1000);
        queue.push(1, "second", 0);
        assert_eq!(queue.len(), 1);
        let mut due = Vec::new();
        queue.drain_due(now_ms() + 1, &mut due);
        assert_eq!(due, vec!["second"]);
    }

    #[test]
    fn timer_fires_on_the_pool() {
        let pool = Arc::new(WorkerPool::new(&WorkerPoolOptions::default()));
        pool.start();
        let timer = TimerService::new();
        timer.start(pool.clone());

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        timer.push(
            1,
            move || {
                hits2.fetch_add(1, Ordering::SeqCst);
            },
            50,
        );
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while hits.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        timer.stop();
        pool.stop();
    }

    #[test]
    fn erased_timer_does_not_fire() {
        let pool = Arc::new(WorkerPool::new(&WorkerPoolOptions::default()));
        pool.start();
        let timer = TimerService::new();
        timer.start(pool.clone());

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        timer.push(
            9,
            move || {
                hits2.fetch_add(1, Ordering::SeqCst);
            },
            150,
        );
        assert!(timer.erase(9));
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        timer.stop();
        pool.stop();
    }
}
