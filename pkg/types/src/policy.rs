//! Failure policy table and watch reconnect policy.
//!
//! Every operation the controller performs maps to one [`FailureAction`];
//! the call sites only ask the table what to do.

use pkg_constants::backoff::{
    DEFAULT_DECODE_BACKOFF_MS, DEFAULT_RECONNECT_INITIAL_MS, DEFAULT_RECONNECT_MAX_ATTEMPTS,
    DEFAULT_RECONNECT_MAX_MS, DEFAULT_STATUS_BACKOFF_MS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The operations whose failures the policy table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    WatchDecode,
    StatusQuery,
    AddBackend,
    RemoveBackend,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::WatchDecode => write!(f, "watch-decode"),
            Operation::StatusQuery => write!(f, "status-query"),
            Operation::AddBackend => write!(f, "add-backend"),
            Operation::RemoveBackend => write!(f, "remove-backend"),
        }
    }
}

/// What to do when an operation fails.
///
/// - `Abort`: stop the controller with a fatal error.
/// - `Skip`: log and move on to the next item (or the next cycle) immediately.
/// - `Backoff`: log, wait `delay_ms`, then abandon the rest of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum FailureAction {
    Abort,
    Skip,
    Backoff {
        #[serde(rename = "delay-ms", alias = "delay_ms")]
        delay_ms: u64,
    },
}

impl FailureAction {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureAction::Abort)
    }
}

impl fmt::Display for FailureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureAction::Abort => write!(f, "abort"),
            FailureAction::Skip => write!(f, "skip"),
            FailureAction::Backoff { delay_ms } => write!(f, "backoff {}ms", delay_ms),
        }
    }
}

/// Operation → action table.
///
/// Example `policy` section of `config.yaml`:
/// ```yaml
/// policy:
///   watch-decode: { action: backoff, delay-ms: 2000 }
///   status-query: { action: backoff, delay-ms: 2000 }
///   add-backend: { action: abort }
///   remove-backend: { action: skip }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FailurePolicy {
    pub watch_decode: FailureAction,
    pub status_query: FailureAction,
    pub add_backend: FailureAction,
    pub remove_backend: FailureAction,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            watch_decode: FailureAction::Backoff {
                delay_ms: DEFAULT_DECODE_BACKOFF_MS,
            },
            status_query: FailureAction::Backoff {
                delay_ms: DEFAULT_STATUS_BACKOFF_MS,
            },
            add_backend: FailureAction::Abort,
            remove_backend: FailureAction::Skip,
        }
    }
}

impl FailurePolicy {
    pub fn action(&self, op: Operation) -> FailureAction {
        match op {
            Operation::WatchDecode => self.watch_decode,
            Operation::StatusQuery => self.status_query,
            Operation::AddBackend => self.add_backend,
            Operation::RemoveBackend => self.remove_backend,
        }
    }
}

/// Bounded exponential backoff for re-dialing the watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Zero means unlimited.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_RECONNECT_INITIAL_MS,
            max_delay_ms: DEFAULT_RECONNECT_MAX_MS,
            max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Whether `attempts` consecutive failures exhaust the budget.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }
}
