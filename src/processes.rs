//! Concrete processes
//!
//! | Process              | Reaches ready when                           |
//! |----------------------|----------------------------------------------|
//! | [`ConstantProcess`]  | immediately, at construction                 |
//! | [`CallbackProcess`]  | the callback calls [`Completion::complete`]  |
//! | [`CompositeProcess`] | all dependencies are ready                   |

use crate::{
    EngineError, Executable, FailedStatus, InitializedStatus, ListenerHandle, Process,
    ProcessingStatus, ReadyStatus, Runtime, Status, StatusEvent, WaitingForDependenciesStatus,
    WeakExecutable,
};

/// Always ready.
pub struct ConstantProcess;

impl ConstantProcess {
    /// Build an executable that is ready on return
    pub fn build(runtime: &Runtime) -> Result<Executable, EngineError> {
        let executable = Executable::new(runtime, ConstantProcess)?;
        executable.set_status(Status::of::<InitializedStatus>());
        executable.set_status(Status::of::<ReadyStatus>());
        Ok(executable)
    }
}

impl Process for ConstantProcess {
    fn execute(&self, executable: &Executable) {
        executable.set_status(Status::of::<ReadyStatus>());
    }

    fn ready_status(&self) -> Status {
        Status::of::<ReadyStatus>()
    }
}

/// Handle given to a [`CallbackProcess`] callback to report the outcome.
///
/// Cheap to clone and safe to keep past the callback; calls after the
/// executable was dropped are ignored.
#[derive(Clone)]
pub struct Completion {
    executable: WeakExecutable,
}

impl Completion {
    /// Move to `ReadyStatus`
    pub fn complete(&self) {
        if let Some(executable) = self.executable.upgrade() {
            executable.set_status(Status::of::<ReadyStatus>());
        }
    }

    /// Move to `FailedStatus`, logging `reason`
    pub fn fail(&self, reason: impl std::fmt::Display) {
        if let Some(executable) = self.executable.upgrade() {
            tracing::warn!(executable = %executable.id(), reason = %reason, "process failed");
            executable.set_status(Status::of::<FailedStatus>());
        }
    }

    /// Report an intermediate status
    pub fn set_status(&self, status: Status) {
        if let Some(executable) = self.executable.upgrade() {
            executable.set_status(status);
        }
    }

    /// The executable being completed, if still alive
    pub fn executable(&self) -> Option<Executable> {
        self.executable.upgrade()
    }
}

/// Runs a user callback on every execution.
///
/// The executable moves to `ProcessingStatus` before the callback runs. The
/// callback may finish inline or keep the [`Completion`] and finish later.
pub struct CallbackProcess<F> {
    callback: F,
}

impl<F> CallbackProcess<F>
where
    F: Fn(Completion) + 'static,
{
    /// Wrap `callback`
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Process for CallbackProcess<F>
where
    F: Fn(Completion) + 'static,
{
    fn execute(&self, executable: &Executable) {
        executable.set_status(Status::of::<ProcessingStatus>());
        (self.callback)(Completion {
            executable: executable.downgrade(),
        });
    }

    fn ready_status(&self) -> Status {
        Status::of::<ReadyStatus>()
    }

    fn failed_statuses(&self) -> Vec<Status> {
        vec![Status::of::<FailedStatus>()]
    }

    fn name(&self) -> &'static str {
        "callback"
    }
}

/// Ready once all of its dependencies are ready; failed as soon as one fails.
pub struct CompositeProcess {
    dependencies: Vec<Executable>,
}

impl CompositeProcess {
    /// Wait on `dependencies`, in this order
    pub fn new(dependencies: Vec<Executable>) -> Self {
        Self { dependencies }
    }

    /// The dependency snapshot
    pub fn dependencies(&self) -> &[Executable] {
        &self.dependencies
    }
}

impl Process for CompositeProcess {
    fn execute(&self, executable: &Executable) {
        executable.set_status(Status::of::<WaitingForDependenciesStatus>());

        let composite = executable.downgrade();
        let on_failure = ListenerHandle::new(move |event: &StatusEvent| {
            if let Some(composite) = composite.upgrade() {
                tracing::warn!(
                    executable = %composite.id(),
                    dependency = %event.source().id(),
                    status = %event.status(),
                    "dependency failed"
                );
                composite.set_status(Status::of::<FailedStatus>());
            }
        });
        executable.synchronized_status_transition(
            Status::of::<ReadyStatus>(),
            &self.dependencies,
            Some(on_failure),
        );

        // Failures reached inline, before a listener could be attached
        if let Some(failed) = self.dependencies.iter().find(|dependency| dependency.has_failed()) {
            tracing::warn!(
                executable = %executable.id(),
                dependency = %failed.id(),
                status = %failed.status(),
                "dependency failed"
            );
            executable.set_status(Status::of::<FailedStatus>());
        }
    }

    fn ready_status(&self) -> Status {
        Status::of::<ReadyStatus>()
    }

    fn failed_statuses(&self) -> Vec<Status> {
        vec![Status::of::<FailedStatus>()]
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_constant_is_ready_on_build() {
        let runtime = Runtime::default();
        let constant = ConstantProcess::build(&runtime).unwrap();

        assert!(constant.is_ready());
        assert!(constant.has_been_executed_before());
        constant.execute();
        assert!(constant.is_ready());
    }

    #[test]
    fn test_callback_completes_later() {
        let runtime = Runtime::default();
        let pending: Rc<RefCell<Option<Completion>>> = Rc::new(RefCell::new(None));
        let slot = pending.clone();
        let exe = Executable::new(
            &runtime,
            CallbackProcess::new(move |done| *slot.borrow_mut() = Some(done)),
        )
        .unwrap();

        exe.execute();
        assert!(exe.status().is::<ProcessingStatus>());

        let done = pending.borrow_mut().take().unwrap();
        done.complete();
        assert!(exe.is_ready());
    }

    #[test]
    fn test_callback_failure() {
        let runtime = Runtime::default();
        let exe = Executable::new(
            &runtime,
            CallbackProcess::new(|done: Completion| done.fail("connection refused")),
        )
        .unwrap();

        exe.execute();
        assert!(exe.has_failed());
        assert_eq!(exe.process_name(), "callback");
    }

    #[test]
    fn test_composite_waits_for_all() {
        let runtime = Runtime::default();
        let pending: Rc<RefCell<Vec<Completion>>> = Rc::new(RefCell::new(Vec::new()));
        let slot = pending.clone();
        let slow = Executable::new(
            &runtime,
            CallbackProcess::new(move |done| slot.borrow_mut().push(done)),
        )
        .unwrap();
        let constant = ConstantProcess::build(&runtime).unwrap();
        let composite =
            Executable::new(&runtime, CompositeProcess::new(vec![constant, slow.clone()])).unwrap();

        composite.execute();
        assert!(composite.status().is::<WaitingForDependenciesStatus>());
        assert!(slow.status().is::<ProcessingStatus>());

        pending.borrow()[0].complete();
        runtime.run_until_idle();
        assert!(composite.is_ready());
    }

    #[test]
    fn test_composite_fails_with_dependency() {
        let runtime = Runtime::default();
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let flaky = Executable::new(
            &runtime,
            CallbackProcess::new(move |done: Completion| {
                counter.set(counter.get() + 1);
                done.fail("timeout");
            }),
        )
        .unwrap();
        let composite =
            Executable::new(&runtime, CompositeProcess::new(vec![flaky.clone()])).unwrap();

        composite.execute();
        assert_eq!(attempts.get(), 1);
        assert!(flaky.has_failed());
        assert!(composite.has_failed());

        flaky.set_status(Status::of::<ReadyStatus>());
        runtime.run_until_idle();
        assert!(composite.has_failed());
    }
}
