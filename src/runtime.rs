//! Process-scoped services and the cooperative dispatch loop
//!
//! The engine is single-threaded. Listener batches are queued: the outermost
//! `set_status` on the stack drains the queue, while nested transitions
//! triggered by listeners enqueue their batch behind the running one.
//! Deferred batches wait in a second queue until the runtime is pumped with
//! [`Runtime::run_until_idle`] or [`Runtime::run_until`].
//!
//! ```text
//! set_status ──► batch ──► dispatch queue ──► listeners (now, in order)
//!                  └─────► deferred queue ──► run_until_idle / run_until
//! ```

use crate::{
    EngineConfig, EngineError, EngineObserver, EngineStats, Executable, ExecutableId, NoOpObserver,
    ObjectRegistry,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use tokio::sync::Notify;

pub(crate) type Job = Box<dyn FnOnce()>;

/// Handle to the engine's process-scoped services.
///
/// Cheap to clone. Every executable keeps the runtime it was built with.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    config: EngineConfig,
    registry: ObjectRegistry,
    stats: EngineStats,
    observer: Rc<dyn EngineObserver>,
    dispatch_queue: RefCell<VecDeque<Job>>,
    dispatching: Cell<bool>,
    deferred: RefCell<VecDeque<Job>>,
    wakeup: Notify,
    next_temp_id: Cell<u64>,
}

impl Runtime {
    /// Create a runtime with the no-op observer
    pub fn new(config: EngineConfig) -> Self {
        Self::with_observer(config, Rc::new(NoOpObserver))
    }

    /// Create a runtime reporting to `observer`
    pub fn with_observer(config: EngineConfig, observer: Rc<dyn EngineObserver>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                registry: ObjectRegistry::new(),
                stats: EngineStats::new(),
                observer,
                dispatch_queue: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                deferred: RefCell::new(VecDeque::new()),
                wakeup: Notify::new(),
                next_temp_id: Cell::new(1),
            }),
        }
    }

    /// Runtime-wide settings
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Executables registered by id
    pub fn registry(&self) -> &ObjectRegistry {
        &self.inner.registry
    }

    /// Runtime-wide statistics
    pub fn stats(&self) -> &EngineStats {
        &self.inner.stats
    }

    /// The installed observer
    pub fn observer(&self) -> &dyn EngineObserver {
        self.inner.observer.as_ref()
    }

    /// Resolve a registered executable by id
    pub fn resolve(&self, id: &str) -> Result<Executable, EngineError> {
        self.inner.registry.resolve(id)
    }

    pub(crate) fn next_temp_id(&self) -> ExecutableId {
        let n = self.inner.next_temp_id.get();
        self.inner.next_temp_id.set(n + 1);
        format!("{}{}", self.inner.config.temp_id_prefix, n).into()
    }

    /// Run `job` now, or right after the batch currently being dispatched.
    pub(crate) fn dispatch(&self, job: Job) {
        self.inner.dispatch_queue.borrow_mut().push_back(job);
        if self.inner.dispatching.replace(true) {
            return;
        }
        let _guard = DispatchGuard(&self.inner.dispatching);
        loop {
            let next = self.inner.dispatch_queue.borrow_mut().pop_front();
            match next {
                Some(job) => job(),
                None => break,
            }
        }
    }

    /// Run `job` on a later turn.
    pub(crate) fn defer(&self, job: Job) {
        self.inner.deferred.borrow_mut().push_back(job);
        self.inner.wakeup.notify_one();
    }

    /// Check whether deferred work is waiting
    pub fn has_pending(&self) -> bool {
        !self.inner.deferred.borrow().is_empty()
    }

    /// Run deferred work, including work scheduled meanwhile, until none is
    /// left. Returns the number of jobs run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.deferred.borrow_mut().pop_front();
            match next {
                Some(job) => {
                    self.dispatch(job);
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Drive deferred work while awaiting `future`.
    ///
    /// Must run on the thread owning the runtime (e.g. inside a
    /// `tokio::task::LocalSet` or a current-thread runtime).
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        tokio::pin!(future);
        loop {
            self.run_until_idle();
            tokio::select! {
                biased;
                output = &mut future => return output,
                _ = self.inner.wakeup.notified() => {}
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
