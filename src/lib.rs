//! Executable Status Engine
//!
//! Objects that reach a target status by running a process, publish every
//! status change to listeners, and coordinate with each other through
//! dependency synchronization.
//!
//! The engine is single-threaded and cooperative. Listener batches run
//! queued (never recursively), and batches for ready transitions with more
//! than one listener are deferred to a later turn of the [`Runtime`].
//!
//! # Quick Start
//!
//! ```rust
//! use executable_engine::{CompositeProcess, ConstantProcess, Executable, Runtime};
//!
//! let runtime = Runtime::default();
//! let config = ConstantProcess::build(&runtime)?;
//! let cache = ConstantProcess::build(&runtime)?;
//!
//! // 1. Build an executable that waits on both
//! let app = Executable::builder(&runtime)
//!     .id("app")
//!     .build(CompositeProcess::new(vec![config, cache]))?;
//!
//! // 2. React when it becomes ready
//! app.on_ready(executable_engine::ListenerHandle::new(|_: &executable_engine::StatusEvent| {
//!     println!("app ready");
//! }));
//!
//! // 3. Run it and drain deferred batches
//! app.execute();
//! runtime.run_until_idle();
//! assert!(app.is_ready());
//! # Ok::<(), executable_engine::EngineError>(())
//! ```
//!
//! Custom statuses are declared with [`status_kind!`]:
//!
//! ```rust
//! use executable_engine::{status_kind, Status};
//!
//! status_kind!(pub IndexedStatus => "indexed", "Search index built");
//!
//! assert_eq!(Status::of::<IndexedStatus>().code(), "indexed");
//! ```

#![warn(missing_docs)]

// === Core Types ===
mod errors;
mod event;
mod status;

// === Listeners ===
mod listener;

// === Executables ===
mod executable;
mod processes;
mod sync;

// === Runtime ===
mod config;
mod registry;
mod runtime;

// === Observability ===
mod observer;
mod stats;

// === Test Support ===
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// === Re-exports ===

// Statuses
pub use status::{
    FailedStatus, InitializedStatus, NullStatus, ProcessingStatus, ReadyStatus, Status,
    StatusKind, WaitingForDependenciesStatus,
};

// Events
pub use event::{StatusEvent, Transition};

// Errors
pub use errors::{EngineError, ListenerError};

// Listeners
pub use listener::{Listener, ListenerHandle, ListenerOutput, ReadyOptions};

// Executables
pub use executable::{
    Executable, ExecutableBuilder, Process, Refresh, TimingSample, WeakExecutable,
};
pub use processes::{CallbackProcess, Completion, CompositeProcess, ConstantProcess};

// Runtime
pub use config::{DispatchPolicy, EngineConfig};
pub use registry::{ExecutableId, ObjectRegistry};
pub use runtime::Runtime;

// Observability
pub use observer::{EngineObserver, NoOpObserver, TracingObserver};
pub use stats::{EngineStats, EngineStatsSnapshot, StatusTiming};
