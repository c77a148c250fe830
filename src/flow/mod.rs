//! Sliding-window flow control with delayed resubmission.
//!
//! Phase starts gated with `flow_control:true` are admitted through a
//! per-full-name [`FlowController`]. An admission either passes the
//! millisecond-granularity [`SlidingWindow`] or is rejected; rejected starts
//! may be parked on the controller's delay queue, which keeps retrying the
//! admission until it succeeds or the per-item deadline expires.

pub mod controller;
pub mod factory;
pub mod window;

pub use controller::FlowController;
pub use factory::{FlowControllerFactory, global_flow_factory};
pub use window::{FlowDecision, SlidingWindow};
