//! Shared test phases and session helpers.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use phaseflow::context::PhaseContext;
use phaseflow::params::PhaseParamDetail;
use phaseflow::phase::{Phase, PhaseSignal};
use phaseflow::promise::Promise;
use phaseflow::registry::global_registry;
use phaseflow::runtime::{SchedulerOptions, global_init};

/// Per-session journal the test phases write into, attached as a context
/// extension.
pub struct TestRun {
    pub executed: Mutex<Vec<String>>,
    pub redo_seen: AtomicI32,
    done: Promise<i32>,
}

impl TestRun {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            executed: Mutex::new(Vec::new()),
            redo_seen: AtomicI32::new(0),
            done: Promise::new(),
        })
    }

    pub fn record(&self, name: &str) {
        self.executed.lock().unwrap().push(name.to_string());
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn finish(&self, code: i32) {
        self.done.set_value(code);
    }

    pub fn wait_done(&self, timeout: Duration) -> Option<i32> {
        self.done.future().wait_timeout(timeout)
    }
}

fn journal(ctx: &Arc<PhaseContext>) -> Arc<TestRun> {
    ctx.ext::<TestRun>().expect("TestRun attached to context")
}

/// Records its class name and completes with 0.
#[derive(Default)]
pub struct RecordPhase;

impl Phase for RecordPhase {
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32 {
        journal(ctx).record(&detail.class_name);
        signal.notify_done(0)
    }
}

/// Records and asks to be skipped.
#[derive(Default)]
pub struct SkipPhase;

impl Phase for SkipPhase {
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32 {
        journal(ctx).record(&detail.class_name);
        signal.notify_skip()
    }
}

/// Records and interrupts the session.
#[derive(Default)]
pub struct InterruptPhase;

impl Phase for InterruptPhase {
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32 {
        journal(ctx).record(&detail.class_name);
        signal.sig_interrupt()
    }
}

/// Requests one redo, then completes; stores the observed retry counter.
#[derive(Default)]
pub struct RedoOncePhase {
    redone: AtomicBool,
}

impl Phase for RedoOncePhase {
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32 {
        let run = journal(ctx);
        if self.redone.swap(true, Ordering::SeqCst) {
            run.redo_seen
                .store(signal.redo_retries(), Ordering::SeqCst);
            signal.notify_done(0)
        } else {
            run.record(&detail.class_name);
            signal.notify_redo()
        }
    }
}

/// Requests a redo on every invocation, to exhaust the retry limit.
#[derive(Default)]
pub struct RedoForeverPhase;

impl Phase for RedoForeverPhase {
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32 {
        journal(ctx).record(&detail.class_name);
        signal.notify_redo()
    }
}

/// Completes from a thread of its own after a short delay.
#[derive(Default)]
pub struct ThreadedPhase;

impl Phase for ThreadedPhase {
    fn do_process(
        &self,
        ctx: &Arc<PhaseContext>,
        detail: &PhaseParamDetail,
        signal: &PhaseSignal,
    ) -> i32 {
        journal(ctx).record(&detail.class_name);
        let signal = signal.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            signal.notify_done(0);
        });
        0
    }
}

/// Panics instead of notifying; the scheduler demotes this to Skip.
#[derive(Default)]
pub struct PanicPhase;

impl Phase for PanicPhase {
    fn do_process(
        &self,
        _ctx: &Arc<PhaseContext>,
        _detail: &PhaseParamDetail,
        _signal: &PhaseSignal,
    ) -> i32 {
        panic!("phase body failure");
    }
}

/// Initializes the runtime and registers every test phase class, once per
/// test binary.
pub fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        global_init(SchedulerOptions::default());
        let registry = global_registry();
        registry.register_default::<RecordPhase>("StartPhase");
        registry.register_default::<RecordPhase>("EndPhase");
        registry.register_default::<RecordPhase>("APhase");
        registry.register_default::<RecordPhase>("BPhase");
        registry.register_default::<RecordPhase>("CPhase");
        registry.register_default::<SkipPhase>("DPhase");
        registry.register_default::<RedoOncePhase>("EPhase");
        registry.register_default::<RedoForeverPhase>("RedoForeverPhase");
        registry.register_default::<InterruptPhase>("InterruptPhase");
        registry.register_default::<ThreadedPhase>("ThreadedPhase");
        registry.register_default::<PanicPhase>("PanicPhase");
        registry.register_default::<RecordPhase>("FlowPhase");
    });
}

/// Builds a context carrying a fresh journal; the returned record cell fills
/// with the statistics line, which doubles as the session-complete signal.
pub fn session() -> (Arc<PhaseContext>, Arc<TestRun>, Arc<Mutex<String>>) {
    let ctx = Arc::new(PhaseContext::new());
    let run = TestRun::new();
    ctx.insert_ext(run.clone());
    let record = Arc::new(Mutex::new(String::new()));
    let record_cell = record.clone();
    let run_cell = run.clone();
    ctx.add_log_handler(move |line| {
        *record_cell.lock().unwrap() = line.to_string();
        run_cell.finish(0);
    });
    (ctx, run, record)
}
