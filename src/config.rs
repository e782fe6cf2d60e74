//! Per-instance tunables

use crate::error::RuntimeError;
use crate::runtime::DEFAULT_TEMP_SLOTS;
use serde::{Deserialize, Serialize};

/// Options applied when a coroutine is built
///
/// ```
/// use stepgen::CoroutineOptions;
///
/// let options = CoroutineOptions::from_json(r#"{ "name": "walk", "step_budget": 1000 }"#).unwrap();
/// assert_eq!(options.temp_slots, 20);
/// assert_eq!(options.step_budget, Some(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoroutineOptions {
    /// Label for tracing spans
    pub name: Option<String>,
    /// Number of `t0..tN` temporaries created on reset
    pub temp_slots: usize,
    /// Maximum step-function turns per resume
    pub step_budget: Option<u64>,
}

impl Default for CoroutineOptions {
    fn default() -> Self {
        CoroutineOptions {
            name: None,
            temp_slots: DEFAULT_TEMP_SLOTS,
            step_budget: None,
        }
    }
}

impl CoroutineOptions {
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json)
            .map_err(|e| RuntimeError::invalid_argument(format!("coroutine options: {}", e)))
    }
}
