//! Full node names and per-phase parameters.
//!
//! A full node name has the form `ClassName` or `ClassName(k1:v1,k2:v2,...)`.
//! The parameter list rides inside one matched pair of parentheses; keys and
//! values are separated by `:`, pairs by `,`, and whitespace around keys and
//! values is trimmed. A value is parsed, in order of precedence, as a 64-bit
//! integer, a double, one of the literals `true`/`false`, or kept as a string.
//!
//! The typed accessors intentionally do not coerce: a key read as a bool is
//! only true when the value parsed as the literal `true`, and a key read as an
//! integer yields zero unless the value parsed as an integer.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::expr::trim_token;

/// Parameter keys recognized by the scheduler.
pub mod keys {
    /// Subject this phase start to the rate limiter.
    pub const FLOW_CONTROL: &str = "flow_control";
    /// Sliding-window width in milliseconds.
    pub const FLOW_WIN_SIZE: &str = "flow_win_size";
    /// Maximum admissions per window.
    pub const FLOW_LIMIT: &str = "flow_limit";
    /// When limited, queue for delayed admission instead of failing.
    pub const FLOW_LIMIT_DELAY: &str = "flow_limit_delay";
    /// Deadline in milliseconds for a delayed admission.
    pub const DELAY_TIMEOUT: &str = "delay_timeout";
    /// Honor a phase-requested redo.
    pub const REDO: &str = "redo";
    /// Maximum redo retries.
    pub const REDO_RETRY_TIMES: &str = "redo_retry_times";
    /// Delay between redo attempts in milliseconds.
    pub const REDO_RETRY_INTERVAL: &str = "redo_retry_interval";
}

/// A single parsed parameter value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl ParamValue {
    /// Parses a raw text value with the documented precedence.
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return Self::Float(v);
        }
        match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Str(raw.to_string()),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Int(v) => *v,
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => *v,
            _ => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Key/value parameter table attached to a phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PhaseParams {
    values: FxHashMap<String, ParamValue>,
}

impl PhaseParams {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// True only when the key is present and parsed as the literal `true`.
    pub fn bool_of(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(ParamValue::as_bool)
    }

    /// The integer value of the key, or zero when absent or non-integer.
    pub fn i64_of(&self, key: &str) -> i64 {
        self.values.get(key).map_or(0, ParamValue::as_i64)
    }

    /// Like [`i64_of`](Self::i64_of), but zero falls back to `default`.
    ///
    /// The scheduler treats an explicit zero the same as an absent key for
    /// every duration/count parameter that carries a default.
    pub fn i64_or(&self, key: &str, default: i64) -> i64 {
        match self.i64_of(key) {
            0 => default,
            v => v,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, key: String, value: ParamValue) {
        self.values.insert(key, value);
    }
}

/// A full node name resolved into its class name and parameter table.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PhaseParamDetail {
    /// Class name the phase factory resolves.
    pub class_name: String,
    /// Parsed parameter table; empty when the full name carried none.
    pub params: PhaseParams,
}

impl PhaseParamDetail {
    /// Parses `ClassName` or `ClassName(k:v,...)`.
    ///
    /// Malformed pairs (missing `:`, extra `:`) are dropped rather than
    /// rejected; a full name without a parenthesized list is all class name.
    pub fn parse(full_name: &str) -> Self {
        let (open, close) = (full_name.find('('), full_name.find(')'));
        let (Some(open), Some(close)) = (open, close) else {
            return Self {
                class_name: full_name.to_string(),
                params: PhaseParams::default(),
            };
        };
        let mut detail = Self {
            class_name: full_name[..open].to_string(),
            params: PhaseParams::default(),
        };
        let inner = &full_name[open + 1..close.max(open + 1)];
        for pair in inner.split(',') {
            let kv: Vec<&str> = pair.split(':').collect();
            let [key, value] = kv.as_slice() else {
                continue;
            };
            let key = trim_token(key);
            let value = trim_token(value);
            if key.is_empty() {
                continue;
            }
            detail
                .params
                .insert(key.to_string(), ParamValue::parse(value));
        }
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_class_name() {
        let detail = PhaseParamDetail::parse("EchoPhase");
        assert_eq!(detail.class_name, "EchoPhase");
        assert!(detail.params.is_empty());
    }

    #[test]
    fn parses_typed_values() {
        let detail =
            PhaseParamDetail::parse("EchoPhase(redo:true, redo_retry_times:2, ratio:0.5, tag:blue)");
        assert_eq!(detail.class_name, "EchoPhase");
        assert!(detail.params.bool_of(keys::REDO));
        assert_eq!(detail.params.i64_of(keys::REDO_RETRY_TIMES), 2);
        assert_eq!(detail.params.get("ratio"), Some(&ParamValue::Float(0.5)));
        assert_eq!(
            detail.params.get("tag").and_then(ParamValue::as_str),
            Some("blue")
        );
    }

    #[test]
    fn integer_takes_precedence_over_float() {
        assert_eq!(ParamValue::parse("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse("-7"), ParamValue::Int(-7));
        assert_eq!(ParamValue::parse("42.0"), ParamValue::Float(42.0));
    }

    #[test]
    fn bool_requires_literal() {
        assert_eq!(ParamValue::parse("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("false"), ParamValue::Bool(false));
        // `1` is an integer and must not read as true.
        assert!(!ParamValue::parse("1").as_bool());
        assert_eq!(ParamValue::parse("True"), ParamValue::Str("True".into()));
    }

    #[test]
    fn zero_falls_back_to_default() {
        let detail = PhaseParamDetail::parse("P(delay_timeout:0)");
        assert_eq!(detail.params.i64_or(keys::DELAY_TIMEOUT, 5000), 5000);
        let detail = PhaseParamDetail::parse("P(delay_timeout:250)");
        assert_eq!(detail.params.i64_or(keys::DELAY_TIMEOUT, 5000), 250);
    }

    #[test]
    fn malformed_pairs_are_dropped() {
        let detail = PhaseParamDetail::parse("P(a:1,borked,b:2,:3,c:1:2)");
        assert_eq!(detail.params.i64_of("a"), 1);
        assert_eq!(detail.params.i64_of("b"), 2);
        assert_eq!(detail.params.len(), 2);
    }
}
