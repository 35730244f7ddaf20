//! Status tags for executables
//!
//! A status is identified by its *kind*: a zero-sized type implementing
//! [`StatusKind`]. Equality and hashing go through the kind's `TypeId`, so two
//! libraries picking the same display code never compare equal.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker trait for status kinds.
///
/// Prefer the [`status_kind!`](crate::status_kind) macro over implementing
/// this by hand.
pub trait StatusKind: 'static {
    /// Short stable code, used in logs and stats
    const CODE: &'static str;
    /// Debug description
    const DESCRIPTION: &'static str;
}

/// Declares a status kind.
///
/// ```
/// use executable_engine::{status_kind, Status};
///
/// status_kind!(
///     /// Data is being fetched
///     pub LoadingStatus => "loading", "Loading data"
/// );
///
/// let loading = Status::of::<LoadingStatus>();
/// assert_eq!(loading.code(), "loading");
/// ```
#[macro_export]
macro_rules! status_kind {
    ($(#[$meta:meta])* $vis:vis $name:ident => $code:literal, $description:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name;

        impl $crate::StatusKind for $name {
            const CODE: &'static str = $code;
            const DESCRIPTION: &'static str = $description;
        }
    };
}

status_kind!(
    /// Sentinel: the executable has not been initialized yet
    pub NullStatus => "null", "Not initialized"
);
status_kind!(
    /// Constructed, process not yet started
    pub InitializedStatus => "initialized", "Initialized"
);
status_kind!(
    /// Waiting for other executables to become ready
    pub WaitingForDependenciesStatus => "waiting", "Waiting for dependencies"
);
status_kind!(
    /// Own process is running
    pub ProcessingStatus => "processing", "Processing"
);
status_kind!(
    /// Value is available
    pub ReadyStatus => "ready", "Ready"
);
status_kind!(
    /// Process terminated unsuccessfully
    pub FailedStatus => "failed", "Failed"
);

/// A point in an executable's lifecycle.
#[derive(Clone, Copy)]
pub struct Status {
    kind: TypeId,
    code: &'static str,
    description: &'static str,
}

impl Status {
    /// Status for kind `K`
    pub fn of<K: StatusKind>() -> Self {
        Self {
            kind: TypeId::of::<K>(),
            code: K::CODE,
            description: K::DESCRIPTION,
        }
    }

    /// The null sentinel
    pub fn null() -> Self {
        Self::of::<NullStatus>()
    }

    /// Short stable code
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Debug description
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Check whether this status is of kind `K`
    pub fn is<K: StatusKind>(&self) -> bool {
        self.kind == TypeId::of::<K>()
    }

    /// Check whether this is the null sentinel
    pub fn is_null(&self) -> bool {
        self.is::<NullStatus>()
    }
}

impl PartialEq for Status {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Status {}

impl Hash for Status {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({})", self.code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    status_kind!(OtherReady => "ready", "Ready, from another library");

    #[test]
    fn test_equality_is_by_kind() {
        let ours = Status::of::<ReadyStatus>();
        let theirs = Status::of::<OtherReady>();

        assert_eq!(ours.code(), theirs.code());
        assert_ne!(ours, theirs);
        assert_eq!(ours, Status::of::<ReadyStatus>());
    }

    #[test]
    fn test_kind_queries() {
        let status = Status::null();
        assert!(status.is_null());
        assert!(status.is::<NullStatus>());
        assert!(!Status::of::<FailedStatus>().is_null());
        assert_eq!(Status::of::<FailedStatus>().to_string(), "failed");
        assert_eq!(Status::of::<ProcessingStatus>().description(), "Processing");
    }

    #[test]
    fn test_hash_follows_kind() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Status::of::<ReadyStatus>());
        set.insert(Status::of::<ReadyStatus>());
        set.insert(Status::of::<OtherReady>());
        assert_eq!(set.len(), 2);
    }
}
