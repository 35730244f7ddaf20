//! Object registry: resolve executables by string id

use crate::{EngineError, Executable, WeakExecutable};
use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Identity of an executable.
///
/// Globally unique within a [`Runtime`](crate::Runtime) when the executable
/// was registered, otherwise a locally generated temporary id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutableId(Box<str>);

impl ExecutableId {
    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExecutableId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<String> for ExecutableId {
    fn from(id: String) -> Self {
        Self(id.into_boxed_str())
    }
}

impl Borrow<str> for ExecutableId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutableId({})", self.0)
    }
}

impl fmt::Display for ExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of executables by id.
///
/// Holds weak references only; an entry whose executable was dropped
/// without `destroy()` counts as vacant and may be re-registered.
pub struct ObjectRegistry {
    entries: RefCell<HashMap<ExecutableId, WeakExecutable>>,
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self, executable: &Executable) -> Result<(), EngineError> {
        let id = executable.id().clone();
        let mut entries = self.entries.borrow_mut();
        if entries.get(&id).is_some_and(|existing| existing.upgrade().is_some()) {
            return Err(EngineError::DuplicateId(id));
        }
        tracing::debug!(executable = %id, "registered");
        entries.insert(id, executable.downgrade());
        Ok(())
    }

    pub(crate) fn deregister(&self, id: &str) -> bool {
        let removed = self.entries.borrow_mut().remove(id).is_some();
        if removed {
            tracing::debug!(executable = %id, "deregistered");
        }
        removed
    }

    /// Resolve a live executable by id
    pub fn resolve(&self, id: &str) -> Result<Executable, EngineError> {
        self.entries
            .borrow()
            .get(id)
            .and_then(WeakExecutable::upgrade)
            .ok_or_else(|| EngineError::NotFound(id.into()))
    }

    /// Check whether a live executable is registered under `id`
    pub fn contains(&self, id: &str) -> bool {
        self.resolve(id).is_ok()
    }

    /// Sorted ids of live registered executables
    pub fn ids(&self) -> Vec<ExecutableId> {
        let entries = self.entries.borrow();
        let mut ids: Vec<ExecutableId> = entries
            .iter()
            .filter(|(_, weak)| weak.upgrade().is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live registered executables
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// Check whether no live executable is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::ManualProcess;
    use crate::{EngineError, Executable, ExecutableId, Runtime};

    #[test]
    fn test_register_and_resolve() {
        let runtime = Runtime::default();
        let exe = Executable::builder(&runtime)
            .id("orders")
            .build(ManualProcess::new())
            .unwrap();

        assert!(exe.is_registered());
        let resolved = runtime.resolve("orders").unwrap();
        assert!(resolved.ptr_eq(&exe));
        assert_eq!(runtime.registry().ids(), vec![ExecutableId::from("orders")]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let runtime = Runtime::default();
        let _first = Executable::builder(&runtime)
            .id("orders")
            .build(ManualProcess::new())
            .unwrap();

        let second = Executable::builder(&runtime)
            .id("orders")
            .build(ManualProcess::new());
        assert_eq!(
            second.err(),
            Some(EngineError::DuplicateId("orders".into()))
        );
    }

    #[test]
    fn test_dropped_entry_is_vacant() {
        let runtime = Runtime::default();
        let first = Executable::builder(&runtime)
            .id("orders")
            .build(ManualProcess::new())
            .unwrap();
        drop(first);

        assert!(!runtime.registry().contains("orders"));
        assert!(Executable::builder(&runtime)
            .id("orders")
            .build(ManualProcess::new())
            .is_ok());
    }

    #[test]
    fn test_temporary_ids_are_not_registered() {
        let runtime = Runtime::default();
        let exe = Executable::new(&runtime, ManualProcess::new()).unwrap();

        assert!(!exe.is_registered());
        assert!(exe.id().as_str().starts_with("__exe_"));
        assert!(runtime.registry().is_empty());
        assert_eq!(
            runtime.resolve(exe.id().as_str()).err(),
            Some(EngineError::NotFound(exe.id().clone()))
        );
    }
}
