//! Status events

use crate::{EngineError, Executable, Status};
use std::fmt;

/// Notification of a status transition.
///
/// One instance is built per transition and shared (by reference) with every
/// listener of the batch.
#[derive(Clone)]
pub struct StatusEvent {
    status: Status,
    previous_status: Status,
    source: Executable,
}

impl StatusEvent {
    /// Build an event; the null sentinel is never a valid destination.
    pub fn new(
        source: Executable,
        status: Status,
        previous_status: Status,
    ) -> Result<Self, EngineError> {
        if status.is_null() {
            return Err(EngineError::NullEventStatus {
                source_id: source.id().clone(),
            });
        }
        Ok(Self {
            status,
            previous_status,
            source,
        })
    }

    pub(crate) fn transition(source: Executable, status: Status, previous_status: Status) -> Self {
        Self {
            status,
            previous_status,
            source,
        }
    }

    /// The status that was reached
    pub fn status(&self) -> Status {
        self.status
    }

    /// The status left by this transition
    pub fn previous_status(&self) -> Status {
        self.previous_status
    }

    /// The executable that transitioned
    pub fn source(&self) -> &Executable {
        &self.source
    }
}

impl fmt::Debug for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusEvent")
            .field("source", self.source.id())
            .field("previous_status", &self.previous_status)
            .field("status", &self.status)
            .finish()
    }
}

/// Result of [`Executable::set_status`].
///
/// Both fields are equal when the call was a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Status before the call
    pub old_status: Status,
    /// Status after the call
    pub new_status: Status,
}

impl Transition {
    /// Check whether the status actually changed
    pub fn changed(&self) -> bool {
        self.old_status != self.new_status
    }
}
