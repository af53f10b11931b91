//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Number of background generation workers shared by all sessions.
/// Bounds concurrent completion calls across the whole process.
pub const GENERATION_WORKERS: usize = 2;

/// Capacity of the pending-job queue in front of the worker pool.
/// Submissions beyond this wait for a slot instead of being rejected.
pub const JOB_QUEUE_CAPACITY: usize = 16;

/// Capacity of the per-task stream update channel.
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Consumer poll timeout in milliseconds.
/// An empty poll means "still processing", never a block.
pub const POLL_TIMEOUT_MS: u64 = 100;

/// Maximum accepted upload size in megabytes.
pub const MAX_UPLOAD_MB: u64 = 10;

/// Approximate characters per token when truncating email context.
pub const CHARS_PER_TOKEN: usize = 4;

/// Line width for plain-text renderings of rich message bodies.
pub const PLAIN_WRAP_WIDTH: usize = 80;

/// Separator line above the quoted original in plain-text renderings.
pub const QUOTE_SEPARATOR: &str = "________________________________";
