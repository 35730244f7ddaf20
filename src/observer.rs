//! Engine observer trait

use crate::{ExecutableId, ListenerError, Status};

/// Observer trait for external observability
pub trait EngineObserver: 'static {
    /// Called when an executable starts its process
    fn on_execute(&self, id: &ExecutableId, status: Status);
    /// Called after every status transition
    fn on_transition(&self, id: &ExecutableId, old_status: Status, new_status: Status);
    /// Called when a listener returns an error or panics
    fn on_listener_failed(&self, id: &ExecutableId, status: Status, error: &ListenerError);
    /// Called when an executable is destroyed
    fn on_destroyed(&self, id: &ExecutableId);
}

/// No-op observer
pub struct NoOpObserver;

impl EngineObserver for NoOpObserver {
    fn on_execute(&self, _id: &ExecutableId, _status: Status) {}
    fn on_transition(&self, _id: &ExecutableId, _old_status: Status, _new_status: Status) {}
    fn on_listener_failed(&self, _id: &ExecutableId, _status: Status, _error: &ListenerError) {}
    fn on_destroyed(&self, _id: &ExecutableId) {}
}

/// Tracing-based observer
pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn on_execute(&self, id: &ExecutableId, status: Status) {
        tracing::info!(executable = %id, status = %status, "Execute");
    }

    fn on_transition(&self, id: &ExecutableId, old_status: Status, new_status: Status) {
        tracing::info!(executable = %id, from = %old_status, to = %new_status, "Status changed");
    }

    fn on_listener_failed(&self, id: &ExecutableId, status: Status, error: &ListenerError) {
        tracing::warn!(executable = %id, status = %status, error = %error, "Listener failed");
    }

    fn on_destroyed(&self, id: &ExecutableId) {
        tracing::info!(executable = %id, "Destroyed");
    }
}
