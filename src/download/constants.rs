//! Constants for the download module (timeouts, retry backoff).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-attempt request timeout (10 seconds).
///
/// Covers the whole attempt, body included, since images are read fully into memory.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default fixed delay between fetch attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bytes per mebibyte, used for throughput reporting.
pub(crate) const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
