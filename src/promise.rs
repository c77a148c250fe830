//! One-shot promise/future with a single continuation.
//!
//! The scheduler composes phase completions through this primitive rather
//! than through an async runtime: a phase body stores its outcome with
//! [`Promise::set_value`], and the scheduler chains the next step with
//! [`SharedFuture::then`]. The continuation fires exactly once, on whichever
//! thread closes the race between `set_value` and `then`, and never while the
//! cell's lock is held.
//!
//! Callers that genuinely need to block (tests, shutdown paths) can use
//! [`SharedFuture::wait_timeout`]; `set_value` skips the condvar wakeup
//! entirely when nobody is waiting, so the common continuation-only path
//! touches no OS synchronization beyond the cell mutex.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

type Continuation<T> = Box<dyn FnOnce(T) + Send>;

struct CellState<T> {
    value: Option<T>,
    continuation: Option<Continuation<T>>,
}

struct Cell<T> {
    state: Mutex<CellState<T>>,
    done: AtomicBool,
    fired: AtomicBool,
    waiters: AtomicUsize,
    cond: Condvar,
}

/// Write side of the one-shot cell.
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
}

/// Read side of the one-shot cell; cheap to clone and share.
pub struct SharedFuture<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Cell {
                state: Mutex::new(CellState {
                    value: None,
                    continuation: None,
                }),
                done: AtomicBool::new(false),
                fired: AtomicBool::new(false),
                waiters: AtomicUsize::new(0),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn future(&self) -> SharedFuture<T> {
        SharedFuture {
            cell: self.cell.clone(),
        }
    }

    /// Stores the value, wakes blocked waiters, and fires the continuation.
    ///
    /// One-shot: calls after the first are no-ops.
    pub fn set_value(&self, value: T) {
        let continuation = {
            let mut state = self
                .cell
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if state.value.is_some() {
                return;
            }
            state.value = Some(value.clone());
            self.cell.done.store(true, Ordering::Release);
            state.continuation.take()
        };
        if self.cell.waiters.load(Ordering::Acquire) > 0 {
            self.cell.cond.notify_all();
        }
        if let Some(cb) = continuation
            && self
                .cell
                .fired
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            run_absorbing_panic(cb, value);
        }
    }
}

impl<T: Clone + Send + 'static> SharedFuture<T> {
    /// A future that is already completed with `value`.
    pub fn ready(value: T) -> Self {
        let promise = Promise::new();
        promise.set_value(value);
        promise.future()
    }

    pub fn is_done(&self) -> bool {
        self.cell.done.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Option<T> {
        self.cell
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    /// Registers the continuation; runs it inline when the value is already
    /// present. Only one continuation is honored per cell.
    pub fn then(&self, cb: impl FnOnce(T) + Send + 'static) {
        let existing = {
            let mut state = self
                .cell
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match state.value.clone() {
                Some(v) => Some(v),
                None => {
                    state.continuation = Some(Box::new(cb));
                    return;
                }
            }
        };
        if let Some(value) = existing
            && self
                .cell
                .fired
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            run_absorbing_panic(Box::new(cb), value);
        }
    }

    /// Blocks up to `timeout` for the value.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        self.cell.waiters.fetch_add(1, Ordering::AcqRel);
        let mut state = self
            .cell
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let value = loop {
            if let Some(v) = state.value.clone() {
                break Some(v);
            }
            let now = Instant::now();
            if now >= deadline {
                break None;
            }
            let (guard, _) = self
                .cell
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        };
        drop(state);
        self.cell.waiters.fetch_sub(1, Ordering::AcqRel);
        value
    }
}

fn run_absorbing_panic<T>(cb: Continuation<T>, value: T) {
    if catch_unwind(AssertUnwindSafe(move || cb(value))).is_err() {
        tracing::debug!("future continuation panicked; absorbed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn then_after_set_runs_inline() {
        let promise = Promise::new();
        promise.set_value(7);
        let seen = Arc::new(AtomicI32::new(0));
        let seen2 = seen.clone();
        promise.future().then(move |v| {
            seen2.store(v, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn set_after_then_fires_once() {
        let promise = Promise::new();
        let hits = Arc::new(AtomicI32::new(0));
        let hits2 = hits.clone();
        promise.future().then(move |v: i32| {
            hits2.fetch_add(v, Ordering::SeqCst);
        });
        promise.set_value(3);
        promise.set_value(9);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(promise.future().get(), Some(3));
    }

    #[test]
    fn set_from_another_thread_wakes_waiter() {
        let promise = Promise::new();
        let future = promise.future();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            promise.set_value(11);
        });
        assert_eq!(future.wait_timeout(Duration::from_secs(2)), Some(11));
        handle.join().expect("setter thread");
    }

    #[test]
    fn wait_times_out_without_value() {
        let promise: Promise<i32> = Promise::new();
        let future = promise.future();
        assert_eq!(future.wait_timeout(Duration::from_millis(30)), None);
        assert!(!future.is_done());
    }

    #[test]
    fn continuation_panic_is_absorbed() {
        let promise = Promise::new();
        promise.future().then(|_v: i32| panic!("boom"));
        promise.set_value(1);
        // The panic must not reach us and the value must stick.
        assert_eq!(promise.future().get(), Some(1));
    }
}
