//! The executable state machine
//!
//! An [`Executable`] wraps a [`Process`] (the concrete asynchronous work) with
//! the status contract: current status, listener registry, transition timing
//! and registration in the runtime.
//!
//! ```text
//! execute() ──► Process::execute ──► ... later turn ... ──► set_status(next)
//!                                                              │
//!                         listeners ◄── dispatch / defer ◄─────┘
//! ```

use crate::listener::ListenerRegistry;
use crate::runtime::Job;
use crate::{
    EngineError, ExecutableId, InitializedStatus, Listener, ListenerError, ListenerHandle,
    ReadyOptions, Runtime, Status, StatusEvent, Transition,
};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Instant;
use tokio::sync::oneshot;

/// The concrete asynchronous work behind an executable.
///
/// `execute` begins the work and returns; the process reports progress by
/// calling [`Executable::set_status`], ultimately reaching the ready status or
/// one of the failed statuses. Re-execution while work is in flight is
/// allowed, and implementations are expected to keep it idempotent.
///
/// # Example
///
/// ```rust
/// use executable_engine::{Executable, Process, ReadyStatus, Runtime, Status};
///
/// struct Immediate;
///
/// impl Process for Immediate {
///     fn execute(&self, executable: &Executable) {
///         executable.set_status(Status::of::<ReadyStatus>());
///     }
///
///     fn ready_status(&self) -> Status {
///         Status::of::<ReadyStatus>()
///     }
/// }
///
/// let runtime = Runtime::default();
/// let exe = Executable::new(&runtime, Immediate).unwrap();
/// exe.execute();
/// assert!(exe.is_ready());
/// ```
pub trait Process: 'static {
    /// Begin the process
    fn execute(&self, executable: &Executable);

    /// The status meaning the value is available
    fn ready_status(&self) -> Status;

    /// Statuses meaning the process terminated unsuccessfully
    fn failed_statuses(&self) -> Vec<Status> {
        Vec::new()
    }

    /// Name used in logs and contract errors
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Whether [`Executable::execute_with`] re-runs an already ready executable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// Run the process again even when ready
    Always,
    /// Skip when already ready
    IfNotReady,
}

/// One entry of the transition timing log
#[derive(Clone, Copy, Debug)]
pub struct TimingSample {
    /// Status reached
    pub status: Status,
    /// When it was reached
    pub at: Instant,
}

struct ExecutableInner {
    id: ExecutableId,
    registered: bool,
    runtime: Runtime,
    process: Box<dyn Process>,
    ready_status: Status,
    failed_statuses: Vec<Status>,
    state: RefCell<ExecutableState>,
}

struct ExecutableState {
    status: Status,
    listeners: ListenerRegistry,
    timing: Vec<TimingSample>,
    execution_started: Option<Instant>,
    has_been_executed_before: bool,
    destroyed: bool,
}

/// Shared handle to a status-driven state machine.
#[derive(Clone)]
pub struct Executable {
    inner: Rc<ExecutableInner>,
}

/// Non-owning handle, used by listeners that point back at an executable.
#[derive(Clone)]
pub struct WeakExecutable {
    inner: Weak<ExecutableInner>,
}

impl WeakExecutable {
    /// Get a strong handle if the executable is still alive
    pub fn upgrade(&self) -> Option<Executable> {
        self.inner.upgrade().map(|inner| Executable { inner })
    }
}

/// Builder for registered executables
pub struct ExecutableBuilder<'a> {
    runtime: &'a Runtime,
    id: Option<ExecutableId>,
}

impl<'a> ExecutableBuilder<'a> {
    /// Register the executable under `id`
    pub fn id(mut self, id: impl Into<ExecutableId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Validate the process contract, build and register.
    pub fn build(self, process: impl Process) -> Result<Executable, EngineError> {
        let name = process.name();
        let ready_status = process.ready_status();
        let failed_statuses = process.failed_statuses();

        if ready_status.is_null() {
            return Err(EngineError::NullReadyStatus { process: name });
        }
        if failed_statuses.iter().any(Status::is_null) {
            return Err(EngineError::NullFailedStatus { process: name });
        }
        if failed_statuses.contains(&ready_status) {
            return Err(EngineError::ReadyStatusIsFailure {
                process: name,
                status: ready_status,
            });
        }

        let registered = self.id.is_some();
        let id = self.id.unwrap_or_else(|| self.runtime.next_temp_id());
        let executable = Executable {
            inner: Rc::new(ExecutableInner {
                id,
                registered,
                runtime: self.runtime.clone(),
                process: Box::new(process),
                ready_status,
                failed_statuses,
                state: RefCell::new(ExecutableState {
                    status: Status::null(),
                    listeners: ListenerRegistry::default(),
                    timing: Vec::new(),
                    execution_started: None,
                    has_been_executed_before: false,
                    destroyed: false,
                }),
            }),
        };
        if registered {
            self.runtime.registry().register(&executable)?;
        }
        Ok(executable)
    }
}

impl Executable {
    /// Build an unregistered executable with a temporary id
    pub fn new(runtime: &Runtime, process: impl Process) -> Result<Self, EngineError> {
        Self::builder(runtime).build(process)
    }

    /// Start building an executable, optionally registered under an id
    pub fn builder(runtime: &Runtime) -> ExecutableBuilder<'_> {
        ExecutableBuilder { runtime, id: None }
    }

    // === Identity ===

    /// Registered or temporary id
    pub fn id(&self) -> &ExecutableId {
        &self.inner.id
    }

    /// The runtime this executable was built with
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Name of the underlying process
    pub fn process_name(&self) -> &'static str {
        self.inner.process.name()
    }

    /// Check whether the executable is resolvable by id in its runtime
    pub fn is_registered(&self) -> bool {
        self.inner.registered
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> WeakExecutable {
        WeakExecutable {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check whether both handles point at the same executable
    pub fn ptr_eq(&self, other: &Executable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // === Status queries ===

    /// Current status, `NullStatus` before the first transition
    pub fn status(&self) -> Status {
        self.inner.state.borrow().status
    }

    /// Status meaning the value is available
    pub fn ready_status(&self) -> Status {
        self.inner.ready_status
    }

    /// Statuses meaning the process failed
    pub fn failed_statuses(&self) -> &[Status] {
        &self.inner.failed_statuses
    }

    /// Check whether the current status is the ready status
    pub fn is_ready(&self) -> bool {
        self.status() == self.inner.ready_status
    }

    /// Check whether the current status is one of the failed statuses
    pub fn has_failed(&self) -> bool {
        self.inner.failed_statuses.contains(&self.status())
    }

    /// Check whether the ready or a failed status was ever reached
    pub fn has_been_executed_before(&self) -> bool {
        self.inner.state.borrow().has_been_executed_before
    }

    /// Check whether [`destroy`](Self::destroy) was called
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    /// Transitions since the last `execute`
    pub fn status_transition_timing(&self) -> Vec<TimingSample> {
        self.inner.state.borrow().timing.clone()
    }

    /// Number of registered listener entries
    pub fn listener_count(&self) -> usize {
        self.inner.state.borrow().listeners.len()
    }

    // === Execution ===

    /// Start (or restart) the process
    pub fn execute(&self) {
        self.execute_with(Refresh::Always);
    }

    /// Start the process, or skip when ready and `refresh` is `IfNotReady`
    pub fn execute_with(&self, refresh: Refresh) {
        if refresh == Refresh::IfNotReady && self.is_ready() {
            return;
        }
        let status = {
            let mut state = self.inner.state.borrow_mut();
            state.timing.clear();
            state.execution_started = Some(Instant::now());
            state.status
        };

        let runtime = &self.inner.runtime;
        runtime.stats().record_execution();
        runtime.observer().on_execute(self.id(), status);
        tracing::debug!(executable = %self.id(), process = self.process_name(), status = %status, "execute");

        self.inner.process.execute(self);
    }

    /// Move to `status` and notify listeners.
    ///
    /// No-op when `status` is the null sentinel or the current status.
    pub fn set_status(&self, status: Status) -> Transition {
        let runtime = &self.inner.runtime;
        let (old_status, time_in_old, batch) = {
            let mut state = self.inner.state.borrow_mut();
            let old_status = state.status;
            if status.is_null() || status == old_status {
                return Transition {
                    old_status,
                    new_status: old_status,
                };
            }
            state.status = status;

            let time_in_old = if runtime.config().record_timing {
                let now = Instant::now();
                let since = state
                    .timing
                    .last()
                    .map(|sample| sample.at)
                    .or(state.execution_started);
                state.timing.push(TimingSample { status, at: now });
                since.map(|at| now.duration_since(at))
            } else {
                None
            };

            if status == self.inner.ready_status || self.inner.failed_statuses.contains(&status) {
                state.has_been_executed_before = true;
            }
            (old_status, time_in_old, state.listeners.take_batch(status))
        };

        let id = self.id();
        tracing::trace!(executable = %id, from = %old_status, to = %status, "status transition");
        let stats = runtime.stats();
        stats.record_transition(old_status, status, time_in_old);
        if status == self.inner.ready_status {
            stats.clear_executing(id);
        } else if !status.is::<InitializedStatus>() {
            stats.mark_executing(id);
        }
        runtime.observer().on_transition(id, old_status, status);

        if !batch.is_empty() {
            let event = StatusEvent::transition(self.clone(), status, old_status);
            self.fire_status_event(event, batch);
        }

        Transition {
            old_status,
            new_status: status,
        }
    }

    fn fire_status_event(&self, event: StatusEvent, mut batch: Vec<ListenerHandle>) {
        let runtime = &self.inner.runtime;
        let policy = runtime.config().dispatch;
        let multiple = batch.len() > 1;
        let reached_ready = event.status() == self.inner.ready_status;

        // First registered runs last
        if policy.first_registered_last && multiple {
            let first = batch.remove(0);
            batch.push(first);
        }

        let job: Job = Box::new(move || {
            for listener in &batch {
                if event.source().is_destroyed() {
                    return;
                }
                invoke_listener(listener, &event);
            }
        });

        if policy.defer_ready_batches && multiple && reached_ready {
            runtime.defer(job);
        } else {
            runtime.dispatch(job);
        }
    }

    // === Listeners ===

    /// Register `listener` for `status`, or for every transition when `None`.
    pub fn add_status_listener(
        &self,
        listener: &ListenerHandle,
        status: Option<Status>,
        only_once: bool,
    ) {
        self.inner
            .state
            .borrow_mut()
            .listeners
            .add(listener.clone(), status, only_once);
    }

    /// Remove `listener` from `status`, or from every status when `None`.
    pub fn remove_status_listener(&self, listener: &ListenerHandle, status: Option<Status>) -> bool {
        self.inner
            .state
            .borrow_mut()
            .listeners
            .remove(listener, status)
    }

    /// Shorthand: listen on `status`, returning the handle for removal
    pub fn on_status(&self, status: Status, listener: impl Listener) -> ListenerHandle {
        let handle = ListenerHandle::new(listener);
        self.add_status_listener(&handle, Some(status), false);
        handle
    }

    /// Shorthand: listen on every transition
    pub fn on_any_status(&self, listener: impl Listener) -> ListenerHandle {
        let handle = ListenerHandle::new(listener);
        self.add_status_listener(&handle, None, false);
        handle
    }

    /// Listen for readiness.
    ///
    /// When already ready (and `only_future` is not set) the success listener
    /// is also called on a later turn. With `only_once` the success and
    /// failure listeners settle together: whichever fires first removes the
    /// other, and nothing stays registered when the immediate call already
    /// settles it.
    pub fn on_ready(&self, options: impl Into<ReadyOptions>) {
        let options = options.into();
        let ready = self.inner.ready_status;
        let fire_now = self.is_ready() && !options.only_future;

        if fire_now {
            let listener = options.on_success.clone();
            let event = StatusEvent::transition(self.clone(), ready, ready);
            self.inner.runtime.defer(Box::new(move || {
                if !event.source().is_destroyed() {
                    invoke_listener(&listener, &event);
                }
            }));
        }

        if options.only_once {
            if !fire_now {
                let failures = options.on_failure.iter().flat_map(|on_failure| {
                    self.inner
                        .failed_statuses
                        .iter()
                        .map(move |failed| (on_failure.clone(), *failed))
                });
                let entries: Vec<(ListenerHandle, Status)> =
                    std::iter::once((options.on_success.clone(), ready))
                        .chain(failures)
                        .collect();
                self.inner.state.borrow_mut().listeners.add_linked(entries);
            }
        } else {
            self.add_status_listener(&options.on_success, Some(ready), false);
            if let Some(on_failure) = &options.on_failure {
                for failed in &self.inner.failed_statuses {
                    self.add_status_listener(on_failure, Some(*failed), false);
                }
            }
        }

        if options.execute_if_not_ready && !self.is_ready() {
            self.execute_with(Refresh::IfNotReady);
        }
    }

    /// [`on_ready`](Self::on_ready) with `only_once` and without `only_future`
    pub fn once_ready(&self, options: impl Into<ReadyOptions>) {
        let mut options = options.into();
        options.only_once = true;
        options.only_future = false;
        self.on_ready(options);
    }

    /// Future resolving once the executable is ready.
    ///
    /// Resolves to `EngineError::Failed` on a failed status (immediately if
    /// already failed) and `EngineError::Destroyed` if the executable is
    /// destroyed first. Deferred dispatch must be driven, e.g. with
    /// [`Runtime::run_until`].
    pub fn wait_ready(&self) -> impl Future<Output = Result<(), EngineError>> + 'static {
        let id = self.id().clone();
        let (tx, rx) = oneshot::channel();

        let early = if self.has_failed() {
            Some(Err(EngineError::Failed {
                id: id.clone(),
                status: self.status(),
            }))
        } else {
            let tx = Rc::new(RefCell::new(Some(tx)));
            let success_tx = Rc::clone(&tx);
            let on_success = ListenerHandle::new(move |_: &StatusEvent| {
                if let Some(tx) = success_tx.borrow_mut().take() {
                    let _ = tx.send(Ok(()));
                }
            });
            let on_failure = ListenerHandle::new(move |event: &StatusEvent| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Err(EngineError::Failed {
                        id: event.source().id().clone(),
                        status: event.status(),
                    }));
                }
            });
            self.once_ready(ReadyOptions::new(on_success).on_failure(on_failure));
            None
        };

        async move {
            if let Some(result) = early {
                return result;
            }
            rx.await.unwrap_or(Err(EngineError::Destroyed(id)))
        }
    }

    // === Lifecycle ===

    /// Deregister and drop all listeners. The status is left as is.
    pub fn destroy(&self) {
        let listeners = {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            std::mem::take(&mut state.listeners)
        };
        drop(listeners);

        let runtime = &self.inner.runtime;
        if self.inner.registered {
            runtime.registry().deregister(self.id().as_str());
        }
        runtime.stats().clear_executing(self.id());
        runtime.observer().on_destroyed(self.id());
        tracing::debug!(executable = %self.id(), "destroyed");
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("id", self.id())
            .field("process", &self.process_name())
            .field("status", &self.status())
            .finish()
    }
}

/// Invoke one listener, isolating errors and panics.
pub(crate) fn invoke_listener(listener: &ListenerHandle, event: &StatusEvent) {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(event))) {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::Panicked {
            message: panic_message(payload.as_ref()).into(),
        }),
    };

    let source = event.source();
    let runtime = source.runtime();
    runtime.stats().record_listener(result.is_ok());
    if let Err(error) = result {
        tracing::error!(
            executable = %source.id(),
            status = %event.status(),
            error = %error,
            "status listener failed"
        );
        runtime
            .observer()
            .on_listener_failed(source.id(), event.status(), &error);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
