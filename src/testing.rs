//! Test helpers
//!
//! Available to downstream crates through the `test-support` feature.

use crate::{
    Executable, FailedStatus, ListenerHandle, Process, ProcessingStatus, ReadyStatus, Status,
    StatusEvent,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Process driven by hand from the test body.
///
/// [`ManualProcess::new`] only counts executions; the test moves the
/// executable with `set_status`. [`ManualProcess::completing`] goes through
/// processing to ready within `execute`.
pub struct ManualProcess {
    executions: Rc<Cell<usize>>,
    completes: bool,
}

impl ManualProcess {
    /// Process that only counts executions
    pub fn new() -> Self {
        Self {
            executions: Rc::new(Cell::new(0)),
            completes: false,
        }
    }

    /// Process that reaches ready within `execute`
    pub fn completing() -> Self {
        Self {
            completes: true,
            ..Self::new()
        }
    }

    /// Shared execution counter, readable after the process was moved
    pub fn executions(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.executions)
    }
}

impl Default for ManualProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl Process for ManualProcess {
    fn execute(&self, executable: &Executable) {
        self.executions.set(self.executions.get() + 1);
        if self.completes {
            executable.set_status(Status::of::<ProcessingStatus>());
            executable.set_status(Status::of::<ReadyStatus>());
        }
    }

    fn ready_status(&self) -> Status {
        Status::of::<ReadyStatus>()
    }

    fn failed_statuses(&self) -> Vec<Status> {
        vec![Status::of::<FailedStatus>()]
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Listener that records every status it is notified of
pub fn recorder() -> (ListenerHandle, Rc<RefCell<Vec<Status>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let listener = ListenerHandle::new(move |event: &StatusEvent| {
        log.borrow_mut().push(event.status());
    });
    (listener, seen)
}

/// Install a test-writer subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
#[cfg(feature = "test-support")]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
