//! Pipeline error types.
//!
//! The command surface has exactly two failure classes, both raised before
//! any state is mutated so a rejected call leaves the pipeline untouched:
//!
//! - **Invalid enumeration**: a raw parameter code or component count is
//!   outside the legal set for the call.
//! - **Invalid operation**: the call is not legal in the current pipeline
//!   state (e.g. `begin` while a primitive is already open).
//!
//! Degenerate geometry produced by clipping is *not* an error anywhere in
//! this crate; it is silently dropped from the output stream.

use thiserror::Error;

/// Error raised by a rejected pipeline command.
///
/// Every variant names the offending call so a caller can log or map the
/// failure without string matching.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError {
    /// A parameter value is outside the legal set for the call.
    #[error("{call}: invalid enum value {value}")]
    InvalidEnum { call: &'static str, value: u32 },

    /// The call is not legal in the current pipeline state.
    #[error("{call}: invalid operation ({reason})")]
    InvalidOperation {
        call: &'static str,
        reason: &'static str,
    },
}

impl PipelineError {
    pub fn invalid_enum(call: &'static str, value: u32) -> Self {
        Self::InvalidEnum { call, value }
    }

    pub fn invalid_operation(call: &'static str, reason: &'static str) -> Self {
        Self::InvalidOperation { call, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_call() {
        let e = PipelineError::invalid_enum("set_parameter", 42);
        assert_eq!(e.to_string(), "set_parameter: invalid enum value 42");

        let e = PipelineError::invalid_operation("end", "no begin is active");
        assert_eq!(e.to_string(), "end: invalid operation (no begin is active)");
    }
}
