//! Phase abstraction: the unit of work the scheduler drives.
//!
//! A [`Phase`] implementation begins its work inside
//! [`do_process`](Phase::do_process) and reports completion through the
//! [`PhaseSignal`] it receives, possibly from another thread, by calling
//! exactly one of the `notify_*` methods. Later notifications on the same
//! invocation are no-ops.
//!
//! ```
//! use phaseflow::phase::{Phase, PhaseSignal};
//! use phaseflow::context::PhaseContext;
//! use phaseflow::params::PhaseParamDetail;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct EchoPhase;
//!
//! impl Phase for EchoPhase {
//!     fn do_process(
//!         &self,
//!         _ctx: &Arc<PhaseContext>,
//!         _detail: &PhaseParamDetail,
//!         signal: &PhaseSignal,
//!     ) -> i32 {
//!         // Synchronous completion; real phases may hand the signal to
//!         // another thread and notify later.
//!         signal.notify_done(0)
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::PhaseContext;
use crate::outcome::PhaseOutcome;
use crate::params::PhaseParamDetail;
use crate::promise::{Promise, SharedFuture};

/// User-implemented unit of work.
pub trait Phase: Send + Sync {
    /// Begins the phase's work and returns promptly.
    ///
    /// Completion is reported through `signal`, not through the return value;
    /// the returned integer is a convenience for implementations that want to
    /// end with `signal.notify_done(code)`.
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32;
}

/// Completion surface handed to a running phase.
///
/// Cloneable and sendable, so a phase may stash it and notify from a worker
/// it spawned itself.
#[derive(Clone)]
pub struct PhaseSignal {
    shared: Arc<SignalShared>,
}

struct SignalShared {
    promise: Mutex<Promise<i32>>,
    redo_retries: AtomicI32,
}

impl PhaseSignal {
    fn new() -> Self {
        Self {
            shared: Arc::new(SignalShared {
                promise: Mutex::new(Promise::new()),
                redo_retries: AtomicI32::new(0),
            }),
        }
    }

    /// Reports normal completion with an application-defined code.
    pub fn notify_done(&self, ret: i32) -> i32 {
        let promise = self
            .shared
            .promise
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        promise.set_value(ret);
        ret
    }

    /// Skips this phase.
    pub fn notify_skip(&self) -> i32 {
        self.notify_done(PhaseOutcome::Skip.code())
    }

    /// Requests a retry of this phase; honored only when the phase was
    /// configured with `redo:true`.
    pub fn notify_redo(&self) -> i32 {
        self.shared.redo_retries.fetch_add(1, Ordering::Relaxed);
        self.notify_done(PhaseOutcome::Redo.code())
    }

    /// Interrupts the session: every later non-end phase is skipped.
    pub fn sig_interrupt(&self) -> i32 {
        self.notify_done(PhaseOutcome::Interrupt.code())
    }

    /// Reports that the phase exceeded its deadline.
    pub fn notify_timeout(&self) -> i32 {
        self.notify_done(PhaseOutcome::Timeout.code())
    }

    /// How many redo attempts this phase has requested so far.
    pub fn redo_retries(&self) -> i32 {
        self.shared.redo_retries.load(Ordering::Relaxed)
    }

    fn future(&self) -> SharedFuture<i32> {
        self.shared
            .promise
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .future()
    }

    /// Arms a fresh completion cell when the previous invocation ended in a
    /// redo request; other terminal outcomes stay latched.
    fn redo_reset(&self) {
        let mut promise = self
            .shared
            .promise
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if promise.future().get() == Some(PhaseOutcome::Redo.code()) {
            *promise = Promise::new();
        }
    }
}

/// Engine-side wrapper pairing a phase implementation with its completion
/// signal and scheduling metadata.
pub struct PhaseBody {
    name: Mutex<String>,
    signal: PhaseSignal,
    inner: Box<dyn Phase>,
}

impl PhaseBody {
    pub fn new(inner: Box<dyn Phase>) -> Self {
        Self {
            name: Mutex::new(String::new()),
            signal: PhaseSignal::new(),
            inner,
        }
    }

    pub fn set_name(&self, name: &str) {
        let mut guard = self.name.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.push_str(name);
    }

    pub fn name(&self) -> String {
        self.name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn redo_retries(&self) -> i32 {
        self.signal.redo_retries()
    }

    /// Runs one invocation of the phase and returns its completion future.
    pub fn run(&self, ctx: &Arc<PhaseContext>, detail: &PhaseParamDetail) -> SharedFuture<i32> {
        self.signal.redo_reset();
        self.inner.do_process(ctx, detail, &self.signal);
        self.signal.future()
    }
}
