//! Error types for the engine and for status listeners

use crate::{ExecutableId, Status};
use thiserror::Error;

/// Errors raised by the engine.
///
/// Most variants are contract violations detected at construction or
/// registration time. `Failed` and `Destroyed` are the outcomes of
/// [`Executable::wait_ready`](crate::Executable::wait_ready).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Another live executable is registered under this id
    #[error("executable id `{0}` is already registered")]
    DuplicateId(ExecutableId),

    /// Nothing registered under this id
    #[error("no executable registered under id `{0}`")]
    NotFound(ExecutableId),

    /// The process declared the null sentinel as its ready status
    #[error("process `{process}` declares the null status as its ready status")]
    NullReadyStatus {
        /// Process name
        process: &'static str,
    },

    /// The process declared the null sentinel as a failed status
    #[error("process `{process}` declares the null status as a failed status")]
    NullFailedStatus {
        /// Process name
        process: &'static str,
    },

    /// Ready and failed statuses must never coincide
    #[error("process `{process}` declares `{status}` as both ready and failed")]
    ReadyStatusIsFailure {
        /// Process name
        process: &'static str,
        /// The offending status
        status: Status,
    },

    /// A status event must carry a real status
    #[error("status event from `{source_id}` cannot carry the null status")]
    NullEventStatus {
        /// Id of the would-be source
        source_id: ExecutableId,
    },

    /// The executable reached one of its failed statuses
    #[error("executable `{id}` failed with status `{status}`")]
    Failed {
        /// Executable id
        id: ExecutableId,
        /// Failed status reached
        status: Status,
    },

    /// The executable was destroyed while being waited on
    #[error("executable `{0}` was destroyed")]
    Destroyed(ExecutableId),
}

impl EngineError {
    /// Short stable label (snake_case) for logs/metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::DuplicateId(_) => "engine_duplicate_id",
            EngineError::NotFound(_) => "engine_not_found",
            EngineError::NullReadyStatus { .. } => "engine_null_ready_status",
            EngineError::NullFailedStatus { .. } => "engine_null_failed_status",
            EngineError::ReadyStatusIsFailure { .. } => "engine_ready_status_is_failure",
            EngineError::NullEventStatus { .. } => "engine_null_event_status",
            EngineError::Failed { .. } => "engine_failed",
            EngineError::Destroyed(_) => "engine_destroyed",
        }
    }

    /// Check if this is a contract violation (a programming error)
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::Destroyed(_) | Self::NotFound(_))
    }
}

/// Error returned (or panic caught) from a status listener.
///
/// Listener errors are isolated: they are logged and counted, never
/// propagated into the executable's state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// Listener reported a failure
    #[error("listener failed: {reason}")]
    Failed {
        /// Error description
        reason: Box<str>,
    },

    /// Listener panicked
    #[error("listener panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string
        message: Box<str>,
    },
}

impl ListenerError {
    /// Build a `Failed` error from anything printable
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string().into(),
        }
    }

    /// Short stable label (snake_case) for logs/metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Failed { .. } => "listener_failed",
            ListenerError::Panicked { .. } => "listener_panicked",
        }
    }

    /// Check if the listener panicked
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let err = EngineError::NotFound(ExecutableId::from("x"));
        assert_eq!(err.as_label(), "engine_not_found");
        assert!(!err.is_contract_violation());
        assert_eq!(err.to_string(), "no executable registered under id `x`");

        let err = EngineError::DuplicateId(ExecutableId::from("x"));
        assert!(err.is_contract_violation());

        let err = ListenerError::failed("boom");
        assert_eq!(err.as_label(), "listener_failed");
        assert!(!err.is_panic());
        assert_eq!(err.to_string(), "listener failed: boom");
    }
}
