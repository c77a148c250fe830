//! Per-key flow controller: window admission plus delayed resubmission.

use rand::RngExt;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use super::window::{FlowDecision, SlidingWindow};
use crate::utils::clock::now_ms;

const BASE_SLEEP_MS: u64 = 1;
const MAX_SLEEP_MS: u64 = 20;
const IDLE_WAIT: Duration = Duration::from_secs(3);

struct DelayedJob {
    id: u64,
    timeout_ms: i64,
    entered_ms: i64,
    on_drop: Box<dyn FnOnce(u64, i64) + Send>,
    job: Box<dyn FnOnce() + Send>,
}

struct ControllerInner {
    name: String,
    window: Mutex<SlidingWindow>,
    queue: Mutex<VecDeque<DelayedJob>>,
    cond: Condvar,
    stop: AtomicBool,
}

/// Admission gate for one rate-limited key.
///
/// [`try_acquire`](Self::try_acquire) is the synchronous fast path;
/// [`delay`](Self::delay) parks a rejected start on the resubmit queue, whose
/// background worker is started lazily on the first delayed item.
pub struct FlowController {
    inner: Arc<ControllerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_started: AtomicBool,
}

impl FlowController {
    pub fn new(name: impl Into<String>, window_ms: i64, max_count: u64) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                name: name.into(),
                window: Mutex::new(SlidingWindow::new(window_ms, max_count)),
                queue: Mutex::new(VecDeque::new()),
                cond: Condvar::new(),
                stop: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
            worker_started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// One admission attempt against the sliding window.
    pub fn try_acquire(&self) -> FlowDecision {
        self.inner.try_acquire()
    }

    /// Parks `job` until the window admits it or `timeout_ms` elapses since
    /// now, in which case `on_drop(id, timeout_ms)` fires instead.
    pub fn delay(
        &self,
        id: u64,
        timeout_ms: i64,
        on_drop: impl FnOnce(u64, i64) + Send + 'static,
        job: impl FnOnce() + Send + 'static,
    ) {
        {
            let mut queue = self
                .inner
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            queue.push_back(DelayedJob {
                id,
                timeout_ms,
                entered_ms: now_ms(),
                on_drop: Box::new(on_drop),
                job: Box::new(job),
            });
        }
        self.ensure_worker();
        self.inner.cond.notify_all();
    }

    fn ensure_worker(&self) {
        if self.worker_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name(format!("flow-delay-{}", self.inner.name))
            .spawn(move || inner.resubmit_loop());
        match handle {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(err) => {
                tracing::error!(name = %self.inner.name, error = %err, "cannot spawn delay worker");
                self.worker_started.store(false, Ordering::Release);
            }
        }
    }
}

impl Drop for FlowController {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::Release);
        self.inner.cond.notify_all();
        if let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl ControllerInner {
    fn try_acquire(&self) -> FlowDecision {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inc(now_ms())
    }

    /// Retries parked jobs until admitted or expired.
    ///
    /// While the window keeps rejecting, sleeps with exponential backoff and
    /// jitter: base 1 ms, x3 growth, capped at 20 ms, uniformly drawn from
    /// [base, current].
    fn resubmit_loop(&self) {
        let mut limited = false;
        let mut sleep_ms = BASE_SLEEP_MS;
        let mut resubmitted = 0usize;
        while !self.stop.load(Ordering::Acquire) {
            {
                let queue = self
                    .queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if queue.is_empty() {
                    let _ = self
                        .cond
                        .wait_timeout(queue, IDLE_WAIT)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            if limited {
                sleep_ms = (sleep_ms * 3).min(MAX_SLEEP_MS);
                sleep_ms = rand::rng().random_range(BASE_SLEEP_MS..=sleep_ms);
                std::thread::sleep(Duration::from_millis(sleep_ms));
            }
            let item = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(item) = item else {
                continue;
            };
            let elapsed = now_ms() - item.entered_ms;
            if elapsed > item.timeout_ms {
                limited = false;
                sleep_ms = BASE_SLEEP_MS;
                tracing::warn!(
                    name = %self.name,
                    id = item.id,
                    timeout_ms = item.timeout_ms,
                    elapsed,
                    "delayed job expired, dropping"
                );
                let DelayedJob {
                    id,
                    timeout_ms,
                    on_drop,
                    ..
                } = item;
                if catch_unwind(AssertUnwindSafe(move || on_drop(id, timeout_ms))).is_err() {
                    tracing::debug!(name = %self.name, "drop callback panicked; absorbed");
                }
                continue;
            }
            limited = self.try_acquire() == FlowDecision::Limited;
            if limited {
                self.queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(item);
                continue;
            }
            sleep_ms = BASE_SLEEP_MS;
            resubmitted += 1;
            tracing::debug!(name = %self.name, id = item.id, elapsed, "delayed job admitted");
            let job = item.job;
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::debug!(name = %self.name, "delayed job panicked; absorbed");
            }
        }
        tracing::debug!(name = %self.name, resubmitted, "delay resubmit worker exiting");
    }
}
