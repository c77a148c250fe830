//! The phase scheduler: per-session state machine driving the DAG.
//!
//! A scheduler is built once into a validated *template* with
//! [`PhaseScheduler::build_dag`] (usually through [`init_scheduler`]), then
//! each session clones it with [`PhaseScheduler::copy_from`] and runs it with
//! [`PhaseScheduler::start`] (usually through [`start_scheduler`], which also
//! hands ownership of the clone to the session's [`PhaseContext`]).
//!
//! Execution is callback-driven and wait-free: `schedule` dispatches ready
//! phases onto the worker pool, each completion future's continuation lands
//! in `schedule_cb`, and `schedule_cb` pops newly ready children until the
//! end node closes the session and emits the statistics record.
//!
//! Lifecycle per session: Fresh -> built (`build_dag`) -> cloned
//! (`copy_from`) -> running (`start`) -> terminal (end node's callback).
//! `clear` returns a scheduler to Fresh. Starting a running or terminal
//! scheduler is an error.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use uuid::Uuid;

use crate::context::PhaseContext;
use crate::dag::{Dag, DagError};
use crate::expr::parse_exprs;
use crate::flow::{FlowDecision, global_flow_factory};
use crate::outcome::PhaseOutcome;
use crate::params::{PhaseParamDetail, keys};
use crate::phase::PhaseBody;
use crate::promise::SharedFuture;
use crate::registry::global_registry;
use crate::runtime;
use crate::utils::clock::now_ms;

const DEFAULT_DELAY_TIMEOUT_MS: i64 = 5000;
const DEFAULT_REDO_RETRY_TIMES: i64 = 3;
const DEFAULT_REDO_RETRY_INTERVAL_MS: i64 = 1000;

/// Scheduler-level failures.
///
/// The numeric codes are part of the public contract.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The invocation arguments are unusable (empty expression list, context
    /// already bound to another session).
    #[error("invalid scheduler parameters")]
    #[diagnostic(code(phaseflow::scheduler::param_invalid))]
    ParamInvalid,

    /// Graph construction or validation failed.
    #[error("invalid phase graph: {0}")]
    #[diagnostic(code(phaseflow::scheduler::invalid_dag))]
    InvalidDag(#[from] DagError),

    /// `start` was called before `build_dag`.
    #[error("phase graph has not been built")]
    #[diagnostic(code(phaseflow::scheduler::dag_not_built))]
    DagNotBuilt,

    /// The copy source is not a built, unstarted template.
    #[error("scheduler is not a reusable template")]
    #[diagnostic(code(phaseflow::scheduler::invalid_copy))]
    InvalidCopy,

    /// The scheduler was already started.
    #[error("scheduler already started")]
    #[diagnostic(code(phaseflow::scheduler::already_started))]
    AlreadyStarted,

    /// No phase was ready to schedule.
    #[error("no phase is ready to schedule")]
    #[diagnostic(code(phaseflow::scheduler::no_ready_phase))]
    NoReadyPhase,

    /// The phase factory has no constructor for a node's class.
    #[error("cannot create phase instance for class {class_name}")]
    #[diagnostic(
        code(phaseflow::scheduler::create_phase_failed),
        help("Register the class with the phase registry before starting.")
    )]
    CreatePhaseFailed { class_name: String },
}

impl SchedulerError {
    /// The numeric code logged and exposed to callers.
    pub fn code(&self) -> u32 {
        match self {
            Self::ParamInvalid => 80100,
            Self::InvalidDag(_) => 80101,
            Self::DagNotBuilt => 80102,
            Self::InvalidCopy => 80103,
            Self::AlreadyStarted => 80104,
            Self::NoReadyPhase => 80105,
            Self::CreatePhaseFailed { .. } => 80106,
        }
    }
}

/// One phase's entry in the structured run statistics.
#[derive(Clone, Debug, Serialize)]
pub struct PhaseStat {
    pub name: String,
    /// Recorded outcome code; `None` when the completion never settled.
    pub ret: Option<i32>,
    pub timecost_ms: i64,
}

/// Structured snapshot of a finished session, stored on the context.
#[derive(Clone, Debug, Serialize)]
pub struct RunStats {
    pub session_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Phases in the order their completion callbacks ran.
    pub phases: Vec<PhaseStat>,
    pub total_timecost_ms: i64,
    pub interrupted: bool,
    pub ir_reason: i32,
}

struct RedoContext {
    run_id: u64,
    node_id: u32,
    max_retry_times: i32,
    retry_interval_ms: i64,
}

/// DAG-driven scheduler for one template or one session.
pub struct PhaseScheduler {
    dag: Dag,
    built: bool,
    started: AtomicBool,
    params: Arc<Vec<PhaseParamDetail>>,
    phases: Vec<OnceLock<Arc<PhaseBody>>>,
    outcomes: Vec<OnceLock<i32>>,
    timecosts: Vec<AtomicI64>,
    topology: Vec<OnceLock<u32>>,
    cursor: AtomicUsize,
    interrupted: AtomicBool,
    ir_reason: AtomicI32,
}

impl Default for PhaseScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PhaseScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseScheduler")
            .field("built", &self.built)
            .finish_non_exhaustive()
    }
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self {
            dag: Dag::new(),
            built: false,
            started: AtomicBool::new(false),
            params: Arc::new(Vec::new()),
            phases: Vec::new(),
            outcomes: Vec::new(),
            timecosts: Vec::new(),
            topology: Vec::new(),
            cursor: AtomicUsize::new(0),
            interrupted: AtomicBool::new(false),
            ir_reason: AtomicI32::new(0),
        }
    }

    /// Builds and validates the graph, then parses every node's parameters.
    ///
    /// The registry's `has_registered` is the validity predicate, so every
    /// full name must resolve to a registered phase class, including the
    /// synthetic `StartPhase`/`EndPhase` endpoints.
    pub fn build_dag(
        &mut self,
        edges: &[(String, String)],
        single_nodes: &[String],
        alias_map: &FxHashMap<String, String>,
    ) -> Result<(), SchedulerError> {
        self.dag.add_node_links(edges, single_nodes, alias_map)?;
        self.dag
            .init(|full_name| global_registry().has_registered(full_name))?;
        if runtime::verbose() {
            for (depth, ids) in self.dag.topology_levels().into_iter().enumerate() {
                let names: Vec<&str> = ids.iter().map(|&id| self.dag.node(id).name()).collect();
                tracing::debug!(depth, nodes = ?names, "graph topology level");
            }
        }
        self.built = true;
        self.prealloc_storage();
        Ok(())
    }

    fn prealloc_storage(&mut self) {
        let n = self.dag.len();
        let mut params = Vec::with_capacity(n);
        for node in self.dag.nodes() {
            params.push(PhaseParamDetail::parse(node.full_name()));
        }
        self.params = Arc::new(params);
        self.phases = (0..n).map(|_| OnceLock::new()).collect();
        self.outcomes = (0..n).map(|_| OnceLock::new()).collect();
        self.timecosts = (0..n).map(|_| AtomicI64::new(0)).collect();
        self.topology = (0..n).map(|_| OnceLock::new()).collect();
        self.cursor.store(0, Ordering::Relaxed);
    }

    /// Clones a built, unstarted template into a fresh session scheduler.
    ///
    /// The graph nodes are value-copied so the session consumes its own
    /// indegrees; the parsed parameter details are shared.
    pub fn copy_from(source: &PhaseScheduler) -> Result<PhaseScheduler, SchedulerError> {
        if !source.built || source.started.load(Ordering::Acquire) {
            tracing::error!(
                built = source.built,
                started = source.started.load(Ordering::Acquire),
                "scheduler is not a reusable template"
            );
            return Err(SchedulerError::InvalidCopy);
        }
        let dag = Dag::copy_from(&source.dag)?;
        let n = dag.len();
        Ok(PhaseScheduler {
            dag,
            built: true,
            started: AtomicBool::new(false),
            params: source.params.clone(),
            phases: (0..n).map(|_| OnceLock::new()).collect(),
            outcomes: (0..n).map(|_| OnceLock::new()).collect(),
            timecosts: (0..n).map(|_| AtomicI64::new(0)).collect(),
            topology: (0..n).map(|_| OnceLock::new()).collect(),
            cursor: AtomicUsize::new(0),
            interrupted: AtomicBool::new(false),
            ir_reason: AtomicI32::new(0),
        })
    }

    /// Preallocates every phase body and schedules the start node.
    ///
    /// Consumes the session's `Arc` handle; the scheduler lives on inside the
    /// completion callbacks (and in the owning context when started through
    /// [`start_scheduler`]). Returns as soon as the initial frontier is
    /// dispatched; completion is observed through the context.
    pub fn start(self: Arc<Self>, ctx: &Arc<PhaseContext>) -> Result<(), SchedulerError> {
        if !self.built {
            return Err(SchedulerError::DagNotBuilt);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyStarted);
        }
        ctx.stamp_create_time(now_ms());
        for node in self.dag.nodes() {
            let class_name = &self.params[node.id() as usize].class_name;
            let Some(phase) = global_registry().create(class_name) else {
                tracing::error!(
                    class_name = %class_name,
                    full_name = %node.full_name(),
                    "cannot create phase instance"
                );
                return Err(SchedulerError::CreatePhaseFailed {
                    class_name: class_name.clone(),
                });
            };
            let _ = self.phases[node.id() as usize].set(Arc::new(PhaseBody::new(phase)));
        }
        tracing::info!(
            session_id = %ctx.session_id(),
            nodes = self.dag.len(),
            "phase session starting"
        );
        Self::schedule(&self, &[self.dag.start_id()], ctx);
        Ok(())
    }

    /// Dispatches every node of a ready frontier.
    fn schedule(this: &Arc<Self>, nodes: &[u32], ctx: &Arc<PhaseContext>) {
        for &id in nodes {
            let node = this.dag.node(id);
            let Some(body) = this.phases[id as usize].get() else {
                tracing::error!(phase = %node.name(), "phase body missing; skipping dispatch");
                continue;
            };
            body.set_name(node.name());
            tracing::debug!(phase = %node.name(), "dispatching phase");
            if runtime::stats_enabled() {
                this.timecosts[id as usize].store(now_ms(), Ordering::Relaxed);
            }
            if this.interrupted.load(Ordering::Acquire) && id != this.dag.end_id() {
                // Fast-drain: the latch is set, so everything short of the
                // end node resolves to Skip without touching the phase body.
                let sched = this.clone();
                let cb_ctx = ctx.clone();
                SharedFuture::ready(PhaseOutcome::Skip.code())
                    .then(move |value| Self::schedule_cb(&sched, &cb_ctx, id, value));
            } else {
                let sched = this.clone();
                let job_ctx = ctx.clone();
                runtime::execute(Box::new(move || {
                    Self::run_phase_job(&sched, &job_ctx, id);
                }));
            }
        }
    }

    /// Flow-control gate in front of the phase body.
    fn run_phase_job(this: &Arc<Self>, ctx: &Arc<PhaseContext>, id: u32) {
        let detail = &this.params[id as usize];
        if !detail.params.bool_of(keys::FLOW_CONTROL) {
            return Self::run_phase_job_thin(this, ctx, id);
        }
        let node = this.dag.node(id);
        let window_ms = detail.params.i64_of(keys::FLOW_WIN_SIZE);
        let max_count = detail.params.i64_of(keys::FLOW_LIMIT).max(0) as u64;
        let controller = global_flow_factory().controller(node.full_name(), window_ms, max_count);
        if controller.try_acquire() == FlowDecision::Admitted {
            return Self::run_phase_job_thin(this, ctx, id);
        }
        if !detail.params.bool_of(keys::FLOW_LIMIT_DELAY) {
            tracing::debug!(phase = %node.name(), "flow limited");
            let sched = this.clone();
            let cb_ctx = ctx.clone();
            SharedFuture::ready(PhaseOutcome::FlowLimited.code())
                .then(move |value| Self::schedule_cb(&sched, &cb_ctx, id, value));
            return;
        }
        let delay_timeout = detail
            .params
            .i64_or(keys::DELAY_TIMEOUT, DEFAULT_DELAY_TIMEOUT_MS);
        tracing::debug!(phase = %node.name(), delay_timeout, "flow limited; queueing delayed start");
        let run_id = runtime::next_run_id();
        let drop_sched = this.clone();
        let drop_ctx = ctx.clone();
        let job_sched = this.clone();
        let job_ctx = ctx.clone();
        controller.delay(
            run_id,
            delay_timeout,
            move |_run_id, _timeout_ms| {
                runtime::execute(Box::new(move || {
                    SharedFuture::ready(PhaseOutcome::DelayTimeout.code())
                        .then(move |value| Self::schedule_cb(&drop_sched, &drop_ctx, id, value));
                }));
            },
            move || Self::run_phase_job_thin(&job_sched, &job_ctx, id),
        );
    }

    /// Runs the phase body and wires its completion back into the scheduler.
    fn run_phase_job_thin(this: &Arc<Self>, ctx: &Arc<PhaseContext>, id: u32) {
        let detail = &this.params[id as usize];
        let Some(body) = this.phases[id as usize].get() else {
            tracing::error!(node = id, "phase body missing; skipping run");
            return;
        };
        let future = match catch_unwind(AssertUnwindSafe(|| body.run(ctx, detail))) {
            Ok(future) => future,
            Err(_) => {
                // A panicking body is demoted to Skip so the session keeps
                // draining toward the end node.
                tracing::error!(phase = %body.name(), "phase body panicked; demoting to skip");
                SharedFuture::ready(PhaseOutcome::Skip.code())
            }
        };
        if detail.params.bool_of(keys::REDO) && runtime::pool_enabled() {
            let settled_without_redo =
                future.is_done() && future.get() != Some(PhaseOutcome::Redo.code());
            if !settled_without_redo {
                let redo = Arc::new(RedoContext {
                    run_id: runtime::next_run_id(),
                    node_id: id,
                    max_retry_times: detail
                        .params
                        .i64_or(keys::REDO_RETRY_TIMES, DEFAULT_REDO_RETRY_TIMES)
                        as i32,
                    retry_interval_ms: detail
                        .params
                        .i64_or(keys::REDO_RETRY_INTERVAL, DEFAULT_REDO_RETRY_INTERVAL_MS),
                });
                let sched = this.clone();
                let cb_ctx = ctx.clone();
                future.then(move |value| Self::schedule_redo_cb(&sched, &cb_ctx, &redo, value));
                return;
            }
        }
        let sched = this.clone();
        let cb_ctx = ctx.clone();
        future.then(move |value| Self::schedule_cb(&sched, &cb_ctx, id, value));
    }

    /// Completion callback for redo-enabled phases.
    fn schedule_redo_cb(
        this: &Arc<Self>,
        ctx: &Arc<PhaseContext>,
        redo: &Arc<RedoContext>,
        last_value: i32,
    ) {
        let id = redo.node_id;
        if id != this.dag.end_id() && last_value == PhaseOutcome::Redo.code() {
            let retries = this.phases[id as usize]
                .get()
                .map(|body| body.redo_retries())
                .unwrap_or(0);
            tracing::debug!(
                phase = %this.dag.node(id).name(),
                retries,
                max_retries = redo.max_retry_times,
                "phase requested redo"
            );
            if retries > redo.max_retry_times {
                Self::schedule_cb(this, ctx, id, PhaseOutcome::MaxRetry.code());
                return;
            }
            let Some(rt) = runtime::current() else {
                Self::schedule_cb(this, ctx, id, last_value);
                return;
            };
            if !rt.timer().is_running() {
                tracing::warn!(
                    phase = %this.dag.node(id).name(),
                    "timer disabled; redo retry will never fire"
                );
            }
            let sched = this.clone();
            let retry_ctx = ctx.clone();
            rt.timer().push(
                redo.run_id,
                move || Self::run_phase_job_thin(&sched, &retry_ctx, id),
                redo.retry_interval_ms,
            );
            return;
        }
        Self::schedule_cb(this, ctx, id, last_value);
    }

    /// Completion callback: records the outcome and advances the frontier.
    fn schedule_cb(this: &Arc<Self>, ctx: &Arc<PhaseContext>, id: u32, value: i32) {
        tracing::debug!(phase = %this.dag.node(id).name(), value, "phase completed");
        let _ = this.outcomes[id as usize].set(value);
        this.update_stats(id);
        let end_id = this.dag.end_id();
        if id != end_id
            && (value == PhaseOutcome::Interrupt.code()
                || value == PhaseOutcome::FlowLimited.code())
            && !this.interrupted.load(Ordering::Acquire)
        {
            // First failing phase wins the latch; the release store pairs
            // with the acquire test in `schedule`.
            if this
                .ir_reason
                .compare_exchange(0, value, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                this.interrupted.store(true, Ordering::Release);
            }
        }
        if id == end_id {
            ctx.set_interrupt_state(
                this.interrupted.load(Ordering::Acquire),
                this.ir_reason.load(Ordering::Relaxed),
            );
            this.report_stats(ctx);
            return;
        }
        Self::schedule_children(this, id, ctx);
    }

    /// Pops and dispatches the children `parent` made ready.
    ///
    /// An empty pop means every child still has an outstanding parent; the
    /// call is idempotent in that case.
    fn schedule_children(this: &Arc<Self>, parent: u32, ctx: &Arc<PhaseContext>) {
        let mut ready = Vec::new();
        if this.dag.pop(parent, &mut ready).is_err() {
            tracing::debug!(
                phase = %this.dag.node(parent).name(),
                "no child became ready"
            );
            return;
        }
        Self::schedule(this, &ready, ctx);
    }

    fn update_stats(&self, id: u32) {
        if !runtime::stats_enabled() {
            return;
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = self.topology.get(slot) {
            let _ = entry.set(id);
        }
        let started = self.timecosts[id as usize].load(Ordering::Relaxed);
        self.timecosts[id as usize].store(now_ms() - started, Ordering::Relaxed);
    }

    /// Builds and emits the end-of-session statistics record.
    ///
    /// Format, bit-exact:
    /// `<loghead>|<name>(phase_ret[ret:<code>],timecost[<ms>])|...|total_timecost:<ms>`
    /// with no leading `|` when the log head is empty.
    fn report_stats(&self, ctx: &Arc<PhaseContext>) {
        if !runtime::stats_enabled() {
            return;
        }
        let head = ctx.log_head();
        let total_timecost = now_ms() - ctx.create_time_ms();
        let visited = self.cursor.load(Ordering::Relaxed).min(self.topology.len());
        let mut phases = Vec::with_capacity(visited);
        let mut record = String::new();
        for slot in 0..visited {
            let Some(&id) = self.topology[slot].get() else {
                continue;
            };
            let name = self.dag.node(id).name();
            let ret = self.outcomes[id as usize].get().copied();
            let timecost = self.timecosts[id as usize].load(Ordering::Relaxed);
            if !head.is_empty() || slot > 0 {
                record.push('|');
            }
            record.push_str(name);
            record.push_str("(phase_ret[");
            match ret {
                Some(code) => {
                    record.push_str("ret:");
                    record.push_str(&code.to_string());
                }
                None => record.push_str("ret: None."),
            }
            record.push_str("],timecost[");
            record.push_str(&timecost.to_string());
            record.push_str("])");
            phases.push(PhaseStat {
                name: name.to_string(),
                ret,
                timecost_ms: timecost,
            });
        }
        record.push_str("|total_timecost:");
        record.push_str(&total_timecost.to_string());
        let content = format!("{head}{record}");
        ctx.store_run_stats(RunStats {
            session_id: ctx.session_id(),
            started_at: ctx.created_at(),
            phases,
            total_timecost_ms: total_timecost,
            interrupted: ctx.is_interrupted(),
            ir_reason: ctx.ir_reason(),
        });
        if !ctx.log_switch() {
            return;
        }
        tracing::debug!(record = %content, "phase_statis");
        ctx.emit_log(&content);
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Returns the scheduler to its freshly constructed state.
    pub fn clear(&mut self) {
        self.dag.clear();
        self.built = false;
        self.started.store(false, Ordering::Release);
        self.params = Arc::new(Vec::new());
        self.phases.clear();
        self.outcomes.clear();
        self.timecosts.clear();
        self.topology.clear();
        self.cursor.store(0, Ordering::Relaxed);
        self.interrupted.store(false, Ordering::Relaxed);
        self.ir_reason.store(0, Ordering::Relaxed);
    }
}

/// Clones the template into `ctx`, which takes ownership, and starts the run.
///
/// The template stays reusable: every session gets its own value copy.
pub fn start_scheduler(
    template: &PhaseScheduler,
    ctx: &Arc<PhaseContext>,
) -> Result<(), SchedulerError> {
    let session = Arc::new(PhaseScheduler::copy_from(template)?);
    if !ctx.attach_scheduler(session.clone()) {
        tracing::error!(session_id = %ctx.session_id(), "context already owns a scheduler");
        return Err(SchedulerError::ParamInvalid);
    }
    ctx.stamp_create_time(now_ms());
    session.start(ctx)
}

/// Parses the expression list and builds `scheduler` into a reusable template.
pub fn init_scheduler<S: AsRef<str>>(
    exprs: &[S],
    alias_map: &FxHashMap<String, String>,
    scheduler: &mut PhaseScheduler,
) -> Result<(), SchedulerError> {
    let parsed = parse_exprs(exprs).map_err(|err| {
        tracing::error!(error = %err, "cannot parse graph expressions");
        SchedulerError::ParamInvalid
    })?;
    scheduler.build_dag(&parsed.edges, &parsed.standalone, alias_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{Phase, PhaseSignal};

    #[derive(Default)]
    struct UnitPhase;

    impl Phase for UnitPhase {
        fn do_process(
            &self,
            _ctx: &Arc<PhaseContext>,
            _detail: &PhaseParamDetail,
            signal: &PhaseSignal,
        ) -> i32 {
            signal.notify_done(0)
        }
    }

    #[test]
    fn error_codes_are_contractual() {
        assert_eq!(SchedulerError::ParamInvalid.code(), 80100);
        assert_eq!(SchedulerError::InvalidDag(DagError::HasCircle).code(), 80101);
        assert_eq!(SchedulerError::DagNotBuilt.code(), 80102);
        assert_eq!(SchedulerError::InvalidCopy.code(), 80103);
        assert_eq!(SchedulerError::AlreadyStarted.code(), 80104);
        assert_eq!(SchedulerError::NoReadyPhase.code(), 80105);
        assert_eq!(
            SchedulerError::CreatePhaseFailed {
                class_name: "X".into()
            }
            .code(),
            80106
        );
    }

    #[test]
    fn start_requires_a_built_graph() {
        let scheduler = Arc::new(PhaseScheduler::new());
        let ctx = Arc::new(PhaseContext::new());
        assert_eq!(
            scheduler.start(&ctx).unwrap_err(),
            SchedulerError::DagNotBuilt
        );
    }

    #[test]
    fn copy_requires_a_built_template() {
        let scheduler = PhaseScheduler::new();
        assert_eq!(
            PhaseScheduler::copy_from(&scheduler).unwrap_err(),
            SchedulerError::InvalidCopy
        );
    }

    #[test]
    fn empty_expressions_are_param_invalid() {
        let mut scheduler = PhaseScheduler::new();
        let err = init_scheduler::<&str>(&[], &FxHashMap::default(), &mut scheduler).unwrap_err();
        assert_eq!(err, SchedulerError::ParamInvalid);
    }

    #[test]
    fn build_rejects_unregistered_classes() {
        global_registry().register_default::<UnitPhase>("SchedulerUnitPhase");
        let mut scheduler = PhaseScheduler::new();
        let mut alias = FxHashMap::default();
        alias.insert("a".to_string(), "SchedulerUnitPhase".to_string());
        alias.insert("b".to_string(), "NeverRegisteredPhase".to_string());
        let err = init_scheduler(&["a->b"], &alias, &mut scheduler).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidDag(DagError::InvalidName));
        assert_eq!(err.code(), 80101);
    }

    #[test]
    fn clear_returns_to_fresh() {
        global_registry().register_default::<UnitPhase>("SchedulerUnitPhase");
        global_registry().register_default::<UnitPhase>("StartPhase");
        global_registry().register_default::<UnitPhase>("EndPhase");
        let mut scheduler = PhaseScheduler::new();
        let mut alias = FxHashMap::default();
        alias.insert("a".to_string(), "SchedulerUnitPhase".to_string());
        alias.insert("b".to_string(), "SchedulerUnitPhase".to_string());
        init_scheduler(&["a->b"], &alias, &mut scheduler).expect("build");
        assert!(scheduler.is_built());
        scheduler.clear();
        assert!(!scheduler.is_built());
        assert!(scheduler.dag().is_empty());
    }
}
