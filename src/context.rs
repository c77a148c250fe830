//! Per-session context threaded through every phase.
//!
//! A [`PhaseContext`] is created by the caller before a run, shared as an
//! `Arc` with every phase invocation, and owns the session's scheduler once
//! [`start_scheduler`](crate::scheduler::start_scheduler) attaches it. After
//! the end node completes, [`is_interrupted`](PhaseContext::is_interrupted)
//! and [`ir_reason`](PhaseContext::ir_reason) are the definitive run status
//! and [`run_stats`](PhaseContext::run_stats) holds the structured record.
//!
//! Application state rides in the typed extension map:
//!
//! ```
//! use phaseflow::context::PhaseContext;
//! use std::sync::{Arc, Mutex};
//!
//! struct Journal(Mutex<Vec<String>>);
//!
//! let ctx = Arc::new(PhaseContext::new());
//! ctx.insert_ext(Arc::new(Journal(Mutex::new(Vec::new()))));
//! let journal = ctx.ext::<Journal>().expect("registered above");
//! journal.0.lock().unwrap().push("hello".into());
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use uuid::Uuid;

use crate::scheduler::{PhaseScheduler, RunStats};

type LogHandler = Box<dyn Fn(&str) + Send + Sync>;
type LogHeadFn = Box<dyn Fn() -> String + Send + Sync>;

/// Session-scoped state shared with every phase of one run.
pub struct PhaseContext {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    create_time_ms: AtomicI64,
    log_switch: AtomicBool,
    is_interrupted: AtomicBool,
    ir_reason: AtomicI32,
    log_head: RwLock<Option<LogHeadFn>>,
    log_handlers: Mutex<Vec<LogHandler>>,
    extensions: RwLock<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    run_stats: OnceLock<RunStats>,
    scheduler: OnceLock<Arc<PhaseScheduler>>,
}

impl Default for PhaseContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            create_time_ms: AtomicI64::new(0),
            log_switch: AtomicBool::new(true),
            is_interrupted: AtomicBool::new(false),
            ir_reason: AtomicI32::new(0),
            log_head: RwLock::new(None),
            log_handlers: Mutex::new(Vec::new()),
            extensions: RwLock::new(FxHashMap::default()),
            run_stats: OnceLock::new(),
            scheduler: OnceLock::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Toggles the per-session statistics log emission.
    pub fn set_log_switch(&self, enabled: bool) {
        self.log_switch.store(enabled, Ordering::Relaxed);
    }

    pub fn log_switch(&self) -> bool {
        self.log_switch.load(Ordering::Relaxed)
    }

    /// Installs the provider for the statistics record's leading segment.
    ///
    /// Evaluated at report time, so it may reflect state the run produced.
    pub fn set_log_head(&self, provider: impl Fn() -> String + Send + Sync + 'static) {
        *self
            .log_head
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(provider));
    }

    pub fn log_head(&self) -> String {
        self.log_head
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|provider| provider())
            .unwrap_or_default()
    }

    /// Adds a sink for the end-of-session statistics record.
    pub fn add_log_handler(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.log_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    pub(crate) fn emit_log(&self, line: &str) {
        let handlers = self
            .log_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(line);
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.is_interrupted.load(Ordering::Acquire)
    }

    /// The outcome code that latched the interrupt, zero when none did.
    pub fn ir_reason(&self) -> i32 {
        self.ir_reason.load(Ordering::Relaxed)
    }

    pub(crate) fn set_interrupt_state(&self, interrupted: bool, reason: i32) {
        self.ir_reason.store(reason, Ordering::Relaxed);
        self.is_interrupted.store(interrupted, Ordering::Release);
    }

    /// Monotonic start stamp of the session, for total time cost.
    pub fn create_time_ms(&self) -> i64 {
        self.create_time_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn stamp_create_time(&self, now_ms: i64) {
        let _ = self
            .create_time_ms
            .compare_exchange(0, now_ms, Ordering::Relaxed, Ordering::Relaxed);
    }

    /// Attaches application state keyed by its type.
    pub fn insert_ext<T: Send + Sync + 'static>(&self, value: Arc<T>) {
        self.extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), value);
    }

    /// Fetches application state previously attached with
    /// [`insert_ext`](Self::insert_ext).
    pub fn ext<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// The structured statistics snapshot, available after the end node ran.
    pub fn run_stats(&self) -> Option<&RunStats> {
        self.run_stats.get()
    }

    pub(crate) fn store_run_stats(&self, stats: RunStats) {
        let _ = self.run_stats.set(stats);
    }

    /// The session's scheduler, once a run was started on this context.
    pub fn scheduler(&self) -> Option<&Arc<PhaseScheduler>> {
        self.scheduler.get()
    }

    pub(crate) fn attach_scheduler(&self, scheduler: Arc<PhaseScheduler>) -> bool {
        self.scheduler.set(scheduler).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_head_is_dynamic() {
        let ctx = PhaseContext::new();
        assert_eq!(ctx.log_head(), "");
        let counter = Arc::new(AtomicI32::new(0));
        let provider_counter = counter.clone();
        ctx.set_log_head(move || {
            format!("head-{}", provider_counter.load(Ordering::SeqCst))
        });
        assert_eq!(ctx.log_head(), "head-0");
        counter.store(3, Ordering::SeqCst);
        assert_eq!(ctx.log_head(), "head-3");
    }

    #[test]
    fn extensions_round_trip_by_type() {
        struct Marker(u32);
        let ctx = PhaseContext::new();
        assert!(ctx.ext::<Marker>().is_none());
        ctx.insert_ext(Arc::new(Marker(9)));
        assert_eq!(ctx.ext::<Marker>().expect("inserted").0, 9);
    }

    #[test]
    fn create_time_stamps_once() {
        let ctx = PhaseContext::new();
        ctx.stamp_create_time(100);
        ctx.stamp_create_time(200);
        assert_eq!(ctx.create_time_ms(), 100);
    }
}
