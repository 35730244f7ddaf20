//! Status listeners and the per-executable listener registry

use crate::{ListenerError, Status, StatusEvent};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Callback invoked on status transitions.
///
/// Closures taking `&StatusEvent` and returning `()` or
/// `Result<(), ListenerError>` implement this trait.
pub trait Listener: 'static {
    /// Handle one status event
    fn invoke(&self, event: &StatusEvent) -> Result<(), ListenerError>;
}

/// Adapts closures returning `()` or `Result<(), ListenerError>`.
pub trait ListenerOutput {
    /// Normalize into a listener result
    fn into_result(self) -> Result<(), ListenerError>;
}

impl ListenerOutput for () {
    fn into_result(self) -> Result<(), ListenerError> {
        Ok(())
    }
}

impl ListenerOutput for Result<(), ListenerError> {
    fn into_result(self) -> Result<(), ListenerError> {
        self
    }
}

impl<F, R> Listener for F
where
    F: Fn(&StatusEvent) -> R + 'static,
    R: ListenerOutput,
{
    fn invoke(&self, event: &StatusEvent) -> Result<(), ListenerError> {
        self(event).into_result()
    }
}

/// Shared handle to a listener.
///
/// Identity is pointer identity: clones of a handle are the same listener,
/// so a handle registered under several statuses can be removed from all of
/// them at once.
#[derive(Clone)]
pub struct ListenerHandle(Rc<dyn Listener>);

impl ListenerHandle {
    /// Wrap a listener
    pub fn new(listener: impl Listener) -> Self {
        Self(Rc::new(listener))
    }

    /// Call the listener directly
    pub fn invoke(&self, event: &StatusEvent) -> Result<(), ListenerError> {
        self.0.invoke(event)
    }

    /// Check whether both handles are the same listener
    pub fn ptr_eq(&self, other: &ListenerHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerHandle({:p})", Rc::as_ptr(&self.0))
    }
}

/// Options for [`Executable::on_ready`](crate::Executable::on_ready).
#[derive(Clone, Debug)]
pub struct ReadyOptions {
    pub(crate) on_success: ListenerHandle,
    pub(crate) on_failure: Option<ListenerHandle>,
    pub(crate) only_once: bool,
    pub(crate) only_future: bool,
    pub(crate) execute_if_not_ready: bool,
}

impl ReadyOptions {
    /// Listen for readiness with `on_success` only
    pub fn new(on_success: ListenerHandle) -> Self {
        Self {
            on_success,
            on_failure: None,
            only_once: false,
            only_future: false,
            execute_if_not_ready: false,
        }
    }

    /// Also listen on every failed status
    pub fn on_failure(mut self, listener: ListenerHandle) -> Self {
        self.on_failure = Some(listener);
        self
    }

    /// Remove the listeners after their first invocation
    pub fn only_once(mut self) -> Self {
        self.only_once = true;
        self
    }

    /// Skip the immediate call when already ready
    pub fn only_future(mut self) -> Self {
        self.only_future = true;
        self
    }

    /// Call `execute` after registration when not ready
    pub fn execute_if_not_ready(mut self) -> Self {
        self.execute_if_not_ready = true;
        self
    }
}

impl From<ListenerHandle> for ReadyOptions {
    fn from(on_success: ListenerHandle) -> Self {
        Self::new(on_success)
    }
}

struct ListenerRecord {
    listener: ListenerHandle,
    only_once: bool,
    sequence: u64,
    group: Option<u64>,
}

/// Listener buckets keyed by status.
///
/// The null-status bucket holds wildcard listeners, invoked on every
/// transition.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    buckets: HashMap<Status, Vec<ListenerRecord>>,
    next_sequence: u64,
    next_group: u64,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, listener: ListenerHandle, status: Option<Status>, only_once: bool) {
        self.push(listener, status.unwrap_or_else(Status::null), only_once, None);
    }

    /// Register one-shot listeners that settle together: once any of them is
    /// taken into a batch, the others are dropped.
    pub(crate) fn add_linked(&mut self, entries: impl IntoIterator<Item = (ListenerHandle, Status)>) {
        let group = self.next_group;
        self.next_group += 1;
        for (listener, status) in entries {
            self.push(listener, status, true, Some(group));
        }
    }

    fn push(&mut self, listener: ListenerHandle, key: Status, only_once: bool, group: Option<u64>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.buckets.entry(key).or_default().push(ListenerRecord {
            listener,
            only_once,
            sequence,
            group,
        });
    }

    /// Remove `listener` from the bucket for `status`, or from every bucket.
    pub(crate) fn remove(&mut self, listener: &ListenerHandle, status: Option<Status>) -> bool {
        let before = self.len();
        match status {
            Some(status) => {
                if let Some(records) = self.buckets.get_mut(&status) {
                    records.retain(|record| !record.listener.ptr_eq(listener));
                }
            }
            None => {
                for records in self.buckets.values_mut() {
                    records.retain(|record| !record.listener.ptr_eq(listener));
                }
            }
        }
        self.buckets.retain(|_, records| !records.is_empty());
        self.len() != before
    }

    /// Collect the batch for a transition to `status`, in registration order.
    ///
    /// One-shot records are removed in the same pass, together with the
    /// other members of any linked group that fired.
    pub(crate) fn take_batch(&mut self, status: Status) -> Vec<ListenerHandle> {
        let mut batch: Vec<(u64, ListenerHandle)> = Vec::new();
        let mut settled: Vec<u64> = Vec::new();
        let mut keys = vec![Status::null()];
        if !status.is_null() {
            keys.push(status);
        }
        for key in keys {
            let Some(records) = self.buckets.get_mut(&key) else {
                continue;
            };
            batch.extend(
                records
                    .iter()
                    .map(|record| (record.sequence, record.listener.clone())),
            );
            settled.extend(records.iter().filter_map(|record| record.group));
            records.retain(|record| !record.only_once);
            if records.is_empty() {
                self.buckets.remove(&key);
            }
        }
        if !settled.is_empty() {
            for records in self.buckets.values_mut() {
                records.retain(|record| record.group.map_or(true, |group| !settled.contains(&group)));
            }
            self.buckets.retain(|_, records| !records.is_empty());
        }
        batch.sort_by_key(|(sequence, _)| *sequence);
        batch.into_iter().map(|(_, listener)| listener).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}
