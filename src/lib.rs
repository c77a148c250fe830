//! # Phaseflow: DAG-driven phase orchestration
//!
//! Phaseflow executes a declared set of user-defined *phases* along their
//! dependency graph, concurrently where the graph allows, with per-phase
//! policies for rate limiting, redo retries, skip, and interrupt.
//!
//! ## Core concepts
//!
//! - **Phase**: a unit of work with an async-style entry point; it begins its
//!   work in [`Phase::do_process`](phase::Phase::do_process) and reports
//!   completion through a one-shot [`PhaseSignal`](phase::PhaseSignal),
//!   possibly from another thread.
//! - **Graph**: edge expressions (`"a->b"`, `"c"`) plus an alias map from
//!   short node names to full class names with embedded parameters
//!   (`"FetchPhase(redo:true,redo_retry_times:2)"`). The builder synthesizes
//!   unique `StartPhase`/`EndPhase` endpoints and validates connectivity and
//!   acyclicity.
//! - **Template and session**: a built [`PhaseScheduler`](scheduler::PhaseScheduler)
//!   is an immutable template; every run clones it, binds a
//!   [`PhaseContext`](context::PhaseContext), and walks the graph through
//!   completion callbacks until the end node emits the statistics record.
//! - **Flow control**: phases marked `flow_control:true` are admitted through
//!   a per-name sliding-window limiter, with optional delayed resubmission.
//!
//! ## Quick start
//!
//! ```
//! use phaseflow::context::PhaseContext;
//! use phaseflow::params::PhaseParamDetail;
//! use phaseflow::phase::{Phase, PhaseSignal};
//! use phaseflow::registry::global_registry;
//! use phaseflow::scheduler::{PhaseScheduler, init_scheduler, start_scheduler};
//! use rustc_hash::FxHashMap;
//! use std::sync::{Arc, Mutex};
//!
//! // Shared session state travels in the context's extension map.
//! struct Journal(Mutex<Vec<String>>);
//!
//! #[derive(Default)]
//! struct RecordPhase;
//!
//! impl Phase for RecordPhase {
//!     fn do_process(
//!         &self,
//!         ctx: &Arc<PhaseContext>,
//!         _detail: &PhaseParamDetail,
//!         signal: &PhaseSignal,
//!     ) -> i32 {
//!         if let Some(journal) = ctx.ext::<Journal>() {
//!             journal.0.lock().unwrap().push("ran".to_string());
//!         }
//!         signal.notify_done(0)
//!     }
//! }
//!
//! // Every class the graph names must be registered, the synthetic
//! // StartPhase/EndPhase endpoints included.
//! let registry = global_registry();
//! registry.register_default::<RecordPhase>("RecordPhase");
//! registry.register_default::<RecordPhase>("StartPhase");
//! registry.register_default::<RecordPhase>("EndPhase");
//!
//! let mut alias = FxHashMap::default();
//! alias.insert("fetch".to_string(), "RecordPhase".to_string());
//! alias.insert("render".to_string(), "RecordPhase".to_string());
//!
//! let mut template = PhaseScheduler::new();
//! init_scheduler(&["fetch->render"], &alias, &mut template).expect("valid graph");
//!
//! let ctx = Arc::new(PhaseContext::new());
//! ctx.insert_ext(Arc::new(Journal(Mutex::new(Vec::new()))));
//! start_scheduler(&template, &ctx).expect("session starts");
//!
//! // Without a worker-pool runtime the session ran inline: StartPhase,
//! // fetch, render, EndPhase.
//! let journal = ctx.ext::<Journal>().expect("attached above");
//! assert_eq!(journal.0.lock().unwrap().len(), 4);
//! ```
//!
//! Concurrent execution needs the process-wide runtime:
//!
//! ```no_run
//! phaseflow::runtime::global_init(phaseflow::runtime::SchedulerOptions::default());
//! ```
//!
//! With the pool enabled, `start_scheduler` returns as soon as the initial
//! frontier is dispatched; observe completion through the context's log
//! handlers, an end-phase signal of your own, or
//! [`PhaseContext::run_stats`](context::PhaseContext::run_stats).
//!
//! ## Module guide
//!
//! - [`expr`] - edge-expression parsing
//! - [`params`] - full-name and parameter parsing
//! - [`dag`] - graph construction, validation, frontier tracking
//! - [`phase`] / [`registry`] - the phase contract and its factory
//! - [`promise`] - the one-shot completion primitive
//! - [`scheduler`] - the per-session state machine and statistics record
//! - [`context`] - the per-session context
//! - [`flow`] - sliding-window rate limiting with delayed resubmission
//! - [`runtime`] - worker pool, timer service, global options
//! - [`telemetry`] - tracing setup

pub mod context;
pub mod dag;
pub mod expr;
pub mod flow;
pub mod outcome;
pub mod params;
pub mod phase;
pub mod promise;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod telemetry;
pub mod utils;

pub use context::PhaseContext;
pub use dag::{Dag, DagError};
pub use outcome::PhaseOutcome;
pub use params::{ParamValue, PhaseParamDetail};
pub use phase::{Phase, PhaseSignal};
pub use registry::{PhaseRegistry, global_registry};
pub use scheduler::{PhaseScheduler, RunStats, SchedulerError, init_scheduler, start_scheduler};
