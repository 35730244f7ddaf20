//! Engine statistics

use crate::{ExecutableId, Status};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Cumulative timing for one status kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusTiming {
    /// Number of transitions into this status
    pub reached: u64,
    /// Total time executables spent in this status before leaving it
    pub total_time: Duration,
}

/// Runtime-wide statistics.
///
/// Purely observational; nothing in the state machine reads these.
pub struct EngineStats {
    /// `execute` calls that ran the process
    pub executions: Cell<u64>,
    /// Status transitions
    pub transitions: Cell<u64>,
    /// Listener calls
    pub listener_invocations: Cell<u64>,
    /// Listener calls that returned an error or panicked
    pub listener_failures: Cell<u64>,
    executing: RefCell<BTreeSet<ExecutableId>>,
    status_timings: RefCell<HashMap<Status, StatusTiming>>,
}

impl EngineStats {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self {
            executions: Cell::new(0),
            transitions: Cell::new(0),
            listener_invocations: Cell::new(0),
            listener_failures: Cell::new(0),
            executing: RefCell::new(BTreeSet::new()),
            status_timings: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn record_execution(&self) {
        bump(&self.executions);
    }

    pub(crate) fn record_listener(&self, ok: bool) {
        bump(&self.listener_invocations);
        if !ok {
            bump(&self.listener_failures);
        }
    }

    /// Count a transition; `time_in_old` is how long the old status was held.
    pub(crate) fn record_transition(
        &self,
        old_status: Status,
        new_status: Status,
        time_in_old: Option<Duration>,
    ) {
        bump(&self.transitions);
        let mut timings = self.status_timings.borrow_mut();
        timings.entry(new_status).or_default().reached += 1;
        if let Some(elapsed) = time_in_old {
            timings.entry(old_status).or_default().total_time += elapsed;
        }
    }

    pub(crate) fn mark_executing(&self, id: &ExecutableId) {
        self.executing.borrow_mut().insert(id.clone());
    }

    pub(crate) fn clear_executing(&self, id: &ExecutableId) {
        self.executing.borrow_mut().remove(id);
    }

    /// Check whether `id` is between initialization and ready
    pub fn is_executing(&self, id: &str) -> bool {
        self.executing.borrow().contains(id)
    }

    /// Number of executables between initialization and ready
    pub fn executing_count(&self) -> usize {
        self.executing.borrow().len()
    }

    /// Cumulative timing for `status`
    pub fn status_timing(&self, status: Status) -> StatusTiming {
        self.status_timings
            .borrow()
            .get(&status)
            .copied()
            .unwrap_or_default()
    }

    /// Copy out the current values
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        let mut status_timings: Vec<(&'static str, StatusTiming)> = self
            .status_timings
            .borrow()
            .iter()
            .map(|(status, timing)| (status.code(), *timing))
            .collect();
        status_timings.sort_unstable_by_key(|(code, _)| *code);

        EngineStatsSnapshot {
            executions: self.executions.get(),
            transitions: self.transitions.get(),
            listener_invocations: self.listener_invocations.get(),
            listener_failures: self.listener_failures.get(),
            executing: self.executing.borrow().iter().cloned().collect(),
            status_timings,
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Clone, Debug)]
pub struct EngineStatsSnapshot {
    /// `execute` calls that ran the process
    pub executions: u64,
    /// Status transitions
    pub transitions: u64,
    /// Listener calls
    pub listener_invocations: u64,
    /// Listener calls that returned an error or panicked
    pub listener_failures: u64,
    /// Ids currently between initialization and ready, sorted
    pub executing: Vec<ExecutableId>,
    /// Per-status timing, sorted by status code
    pub status_timings: Vec<(&'static str, StatusTiming)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProcessingStatus, ReadyStatus};

    #[test]
    fn test_timing_accumulates_on_leaving() {
        let stats = EngineStats::new();
        let processing = Status::of::<ProcessingStatus>();
        let ready = Status::of::<ReadyStatus>();

        stats.record_transition(Status::null(), processing, None);
        stats.record_transition(processing, ready, Some(Duration::from_millis(30)));
        stats.record_transition(ready, processing, Some(Duration::from_millis(5)));
        stats.record_transition(processing, ready, Some(Duration::from_millis(10)));

        assert_eq!(
            stats.status_timing(processing),
            StatusTiming {
                reached: 2,
                total_time: Duration::from_millis(40)
            }
        );
        assert_eq!(stats.status_timing(ready).reached, 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.transitions, 4);
        assert_eq!(
            snapshot
                .status_timings
                .iter()
                .map(|(code, _)| *code)
                .collect::<Vec<_>>(),
            vec!["processing", "ready"]
        );
    }

    #[test]
    fn test_executing_set() {
        let stats = EngineStats::new();
        let id = ExecutableId::from("a");
        stats.mark_executing(&id);
        stats.mark_executing(&id);
        assert_eq!(stats.executing_count(), 1);
        assert!(stats.is_executing("a"));

        stats.clear_executing(&id);
        assert!(!stats.is_executing("a"));
        assert!(stats.snapshot().executing.is_empty());
    }
}
