//! Backoff and reconnect timing defaults (milliseconds).

/// Delay after an undecodable watch event before the next receive.
pub const DEFAULT_DECODE_BACKOFF_MS: u64 = 2_000;

/// Delay after a failed status query before the next cycle.
pub const DEFAULT_STATUS_BACKOFF_MS: u64 = 2_000;

/// First delay before re-dialing a lost watch connection.
pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 500;

/// Upper bound for the exponential reconnect delay.
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;

/// Consecutive failed reconnects before the loss is treated as fatal.
/// Zero means retry forever.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 10;
