//! Engine configuration

use serde::{Deserialize, Serialize};

/// How listener batches are dispatched.
///
/// The defaults keep the historical ordering: a ready batch with more than
/// one listener is deferred to the next turn, and the first registered
/// listener of a multi-listener batch runs last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    /// Defer ready batches with more than one listener
    pub defer_ready_batches: bool,
    /// Move the earliest registered listener to the end of the batch
    pub first_registered_last: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            defer_ready_batches: true,
            first_registered_last: true,
        }
    }
}

impl DispatchPolicy {
    /// Plain registration order, always synchronous
    pub fn in_order() -> Self {
        Self {
            defer_ready_batches: false,
            first_registered_last: false,
        }
    }
}

/// Runtime-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener dispatch policy
    pub dispatch: DispatchPolicy,
    /// Prefix for ids of unregistered executables
    pub temp_id_prefix: Box<str>,
    /// Record per-executable transition timing and per-status totals
    pub record_timing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchPolicy::default(),
            temp_id_prefix: "__exe_".into(),
            record_timing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.dispatch.defer_ready_batches);
        assert!(config.dispatch.first_registered_last);
        assert!(config.record_timing);
        assert_eq!(&*config.temp_id_prefix, "__exe_");
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "dispatch": { "first_registered_last": false }, "record_timing": false }"#,
        )
        .unwrap();

        assert!(config.dispatch.defer_ready_batches);
        assert!(!config.dispatch.first_registered_last);
        assert!(!config.record_timing);
        assert_eq!(&*config.temp_id_prefix, "__exe_");
    }
}
