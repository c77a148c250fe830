//! Phase completion outcomes.
//!
//! The numeric values are part of the external contract: they are recorded in
//! the per-session statistics record and must not be reused. Codes 80000-85000
//! are reserved for the engine; user phases report success with `0` or any
//! application-defined code outside the reserved range via
//! [`PhaseSignal::notify_done`](crate::phase::PhaseSignal::notify_done).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed enumeration of engine-level phase outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PhaseOutcome {
    /// Phase finished normally.
    Ok = 0,
    /// Phase requested a fast-path to the end node; the rest of the graph is
    /// drained with [`Skip`](Self::Skip).
    Interrupt = 84000,
    /// Phase was skipped, either by its own request or by the interrupt drain.
    Skip = 84001,
    /// Phase exceeded its deadline.
    Timeout = 84002,
    /// Phase start was rejected by the sliding-window rate limiter.
    FlowLimited = 84003,
    /// A delayed, rate-limited start did not get admitted before its deadline.
    DelayTimeout = 84004,
    /// Some of the phase's dependencies failed.
    DepPartialFailed = 84005,
    /// All of the phase's dependencies failed.
    DepAllFailed = 84006,
    /// Reserved for surfacing phase body panics as a distinct outcome.
    Exception = 84007,
    /// Phase requested to be re-run.
    Redo = 84008,
    /// Redo retries exceeded the configured limit.
    MaxRetry = 84009,
}

impl PhaseOutcome {
    /// The wire/log representation of this outcome.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps a recorded code back to the enumeration, if it is engine-defined.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            84000 => Some(Self::Interrupt),
            84001 => Some(Self::Skip),
            84002 => Some(Self::Timeout),
            84003 => Some(Self::FlowLimited),
            84004 => Some(Self::DelayTimeout),
            84005 => Some(Self::DepPartialFailed),
            84006 => Some(Self::DepAllFailed),
            84007 => Some(Self::Exception),
            84008 => Some(Self::Redo),
            84009 => Some(Self::MaxRetry),
            _ => None,
        }
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "Ok",
            Self::Interrupt => "Interrupt",
            Self::Skip => "Skip",
            Self::Timeout => "Timeout",
            Self::FlowLimited => "FlowLimited",
            Self::DelayTimeout => "DelayTimeout",
            Self::DepPartialFailed => "DepPartialFailed",
            Self::DepAllFailed => "DepAllFailed",
            Self::Exception => "Exception",
            Self::Redo => "Redo",
            Self::MaxRetry => "MaxRetry",
        };
        write!(f, "{name}")
    }
}
