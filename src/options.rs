use std::time::Duration;

/// Configures HTTP timeout and retry behavior of [`crate::AthenaClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 0,
            retry_backoff_ms: 250,
        }
    }
}

/// Controls how [`crate::ExecutionWaiter`] polls for a terminal status.
///
/// The defaults wait without bound, checking every three seconds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaitOptions {
    /// Flat delay between two status checks.
    pub poll_interval: Duration,
    /// Give up after this many status checks.
    pub max_polls: Option<u32>,
    /// Give up once this much time has passed since submission, or since
    /// the wait began for an already submitted query. Cuts short both the
    /// interval sleep and a status check still in flight.
    pub deadline: Option<Duration>,
    /// Ask the service to stop the query when the local wait is cancelled.
    pub stop_on_cancel: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_polls: None,
            deadline: None,
            stop_on_cancel: false,
        }
    }
}

/// Controls result page fetching.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageOptions {
    /// Requested rows per page. Advisory: pages may hold fewer or more.
    pub max_rows: i32,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self { max_rows: 1000 }
    }
}
