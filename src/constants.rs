//! Limits and defaults shared by input validation, the pool and the
//! configuration layer.

/// Minimum length of a research query, in characters.
pub const MIN_QUERY_CHARS: usize = 3;

/// Maximum length of a research query, in characters.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Lowest accepted `max_iterations`.
pub const MIN_ITERATIONS: u32 = 1;

/// Highest accepted `max_iterations`.
pub const MAX_ITERATIONS: u32 = 20;

/// `max_iterations` applied when a request omits it.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Default number of concurrent execution slots.
pub const DEFAULT_SLOTS: usize = 4;

/// Default bound on tasks waiting for a slot.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default interval between retention sweeps, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default time granted to running tasks during shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// How many fresh identifiers `create` tries before giving up.
pub const MAX_ID_ATTEMPTS: usize = 8;

/// Queries in list summaries are cut to this many characters.
pub const SUMMARY_QUERY_CHARS: usize = 100;

/// Upper bound of the progress percentage.
pub const PROGRESS_COMPLETE: u8 = 100;
