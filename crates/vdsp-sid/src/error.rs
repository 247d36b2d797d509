//! Errors for SID table lookups and leaf validation.

use thiserror::Error;

/// Errors raised by [`crate::SidTable`] lookups and value validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SidError {
    /// No table entry for the given numeric SID.
    #[error("unknown SID: {0}")]
    UnknownSid(u32),

    /// No table entry for the given YANG instance path.
    #[error("unknown path: {0}")]
    UnknownPath(String),

    /// The search pattern was not a valid regular expression.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    /// A leaf's value fell outside its declared range.
    #[error("value {value} out of range [{min}, {max}] for SID {sid}")]
    OutOfRange {
        /// SID of the leaf being validated.
        sid: u32,
        /// Value that was rejected.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// A leaf's value did not match its declared datatype.
    #[error("type mismatch for SID {sid}: expected {expected}")]
    TypeMismatch {
        /// SID of the leaf being validated.
        sid: u32,
        /// Human-readable name of the expected datatype.
        expected: &'static str,
    },

    /// Validation was requested for a SID that has no declared datatype
    /// (containers, lists).
    #[error("SID {0} has no leaf datatype to validate against")]
    NotALeaf(u32),
}
