//! Dependency synchronization
//!
//! Drives an executable to a target status once a fixed set of other
//! executables are all ready.
//!
//! ```text
//! all ready already ──────────────► set_status(target)
//! otherwise, per dependency:
//!   not ready ──► execute() ──► ready now? ── yes ──► countdown
//!                                  └─ no ──► once-listener(ready) ──► countdown
//! countdown hits zero ──► set_status(target)   (async path: skipped if failed)
//! ```

use crate::{Executable, ListenerHandle, Status, StatusEvent};
use std::cell::Cell;
use std::rc::Rc;

impl Executable {
    /// Move to `new_status` once every dependency is ready.
    ///
    /// - With no dependencies, or all of them already ready, the transition
    ///   happens within this call and no dependency is executed.
    /// - Dependencies that are not ready are executed in list order; those
    ///   that complete synchronously count down immediately, and the
    ///   transition happens as soon as the count reaches zero.
    /// - The others count down from a one-shot ready listener. When that
    ///   brings the count to zero while this executable is in a failed
    ///   status, the transition is skipped.
    /// - `on_failure`, if given, is registered once on every failed status of
    ///   each pending dependency.
    ///
    /// The dependency set is a snapshot taken at call time.
    pub fn synchronized_status_transition(
        &self,
        new_status: Status,
        dependencies: &[Executable],
        on_failure: Option<ListenerHandle>,
    ) {
        if dependencies.iter().all(Executable::is_ready) {
            self.set_status(new_status);
            return;
        }

        let remaining = Rc::new(Cell::new(dependencies.len()));
        for dependency in dependencies {
            if !dependency.is_ready() {
                dependency.execute();
            }

            if dependency.is_ready() {
                if count_down(&remaining) {
                    self.set_status(new_status);
                }
                continue;
            }

            let dependent = self.downgrade();
            let countdown = Rc::clone(&remaining);
            let on_ready = ListenerHandle::new(move |event: &StatusEvent| {
                let Some(dependent) = dependent.upgrade() else {
                    return;
                };
                if !count_down(&countdown) || dependent.is_destroyed() {
                    return;
                }
                if dependent.has_failed() {
                    tracing::debug!(
                        executable = %dependent.id(),
                        dependency = %event.source().id(),
                        target = %new_status,
                        status = %dependent.status(),
                        "dependencies ready but executable failed meanwhile; transition skipped"
                    );
                    return;
                }
                dependent.set_status(new_status);
            });
            dependency.add_status_listener(&on_ready, Some(dependency.ready_status()), true);

            if let Some(on_failure) = &on_failure {
                for failed in dependency.failed_statuses() {
                    dependency.add_status_listener(on_failure, Some(*failed), true);
                }
            }
        }
    }
}

/// Decrement; true when this call reached zero.
fn count_down(remaining: &Cell<usize>) -> bool {
    match remaining.get() {
        0 => false,
        n => {
            remaining.set(n - 1);
            n == 1
        }
    }
}
