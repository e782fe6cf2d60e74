//! Error types for the coroutine runtime

use crate::runtime::Loc;
use crate::value::Value;
use thiserror::Error;

/// Main error type for the runtime
///
/// `Thrown` is the only variant routed through catch/finally handling. Every
/// other variant reports a programming error in the driver's caller or in the
/// lowered step function, and is surfaced to the caller as soon as it happens.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Resume on a running or finished coroutine
    #[error("InvalidState: {message}")]
    InvalidState { message: String },

    /// A value sent to a coroutine that has not started yet
    #[error("InvalidArgument: {message}")]
    InvalidArgument { message: String },

    /// Exception dispatch reached a region with neither catch nor finally
    #[error("MalformedRegion: try statement at {try_loc} has no catch or finally")]
    MalformedRegion { try_loc: Loc },

    /// `catch` requested for a region that holds no pending throw
    #[error("IllegalCatch: no pending exception for try statement at {try_loc}")]
    IllegalCatch { try_loc: Loc },

    /// `finish` requested for a finally block that no region owns
    #[error("IllegalFinish: no enclosing finally block at {finally_loc}")]
    IllegalFinish { finally_loc: Loc },

    /// A region layout that does not describe a try statement
    #[error("InvalidRegionSpec: {message}")]
    InvalidRegionSpec { message: String },

    /// The step function kept ceding control without producing a value
    #[error("StepBudgetExceeded: no value produced after {limit} step turns")]
    StepBudgetExceeded { limit: u64 },

    /// A user-level exception carrying an opaque payload
    #[error("Uncaught {0}")]
    Thrown(Value),
}

impl RuntimeError {
    /// Wrap a payload as a user-level exception
    pub fn thrown(value: impl Into<Value>) -> Self {
        RuntimeError::Thrown(value.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        RuntimeError::InvalidState {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_region_spec(message: impl Into<String>) -> Self {
        RuntimeError::InvalidRegionSpec {
            message: message.into(),
        }
    }

    /// Whether this is a user-level exception
    pub fn is_thrown(&self) -> bool {
        matches!(self, RuntimeError::Thrown(_))
    }

    /// The payload of a user-level exception, if this is one
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            RuntimeError::Thrown(value) => Some(value),
            _ => None,
        }
    }

    /// Consume the error, returning the payload of a user-level exception
    pub fn into_thrown(self) -> Option<Value> {
        match self {
            RuntimeError::Thrown(value) => Some(value),
            _ => None,
        }
    }
}
