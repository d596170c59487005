//! Submission and status polling.

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    ExecutionState, ExecutionStatus, OwlError, QueryHandle, QueryRequest, QueryService, Result,
    WaitOptions,
};

/// Where a wait stands after one status check.
#[derive(Debug, PartialEq, Eq)]
enum WaitState {
    Pending(ExecutionState),
    Succeeded,
    Failed {
        state: ExecutionState,
        reason: String,
    },
}

impl WaitState {
    fn after(status: ExecutionStatus) -> Self {
        match status.state {
            ExecutionState::Queued | ExecutionState::Running => Self::Pending(status.state),
            ExecutionState::Succeeded => Self::Succeeded,
            ExecutionState::Failed | ExecutionState::Cancelled => Self::Failed {
                state: status.state,
                reason: status.reason.unwrap_or_default(),
            },
        }
    }
}

/// Submits statements and blocks (cooperatively) until they reach a
/// terminal state.
///
/// Status checks are strictly sequential: the next one is issued only after
/// the previous response arrived and the poll interval elapsed. No check is
/// issued after a terminal state has been observed.
#[derive(Clone, Debug)]
pub struct ExecutionWaiter<S> {
    service: S,
    output_location: String,
    options: WaitOptions,
}

impl<S: QueryService> ExecutionWaiter<S> {
    pub fn new(service: S, output_location: impl Into<String>) -> Self {
        Self {
            service,
            output_location: output_location.into(),
            options: WaitOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &WaitOptions {
        &self.options
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn output_location(&self) -> &str {
        &self.output_location
    }

    /// Submits `sql` and waits for it to succeed.
    pub async fn submit(&self, sql: &str) -> Result<QueryHandle> {
        self.submit_with_cancel(sql, &CancellationToken::new()).await
    }

    /// Like [`ExecutionWaiter::submit`], abandoning the wait once `cancel` fires.
    pub async fn submit_with_cancel(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryHandle> {
        let request = QueryRequest::new(sql, self.output_location.as_str());
        let started = Instant::now();

        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OwlError::Cancelled),
            started = self.service.start_execution(&request) => {
                started.map_err(OwlError::Submission)?
            }
        };

        #[cfg(feature = "tracing")]
        tracing::info!("submitted query {}", handle);

        self.poll(handle, cancel, started).await
    }

    /// Waits for an execution that was submitted elsewhere.
    pub async fn wait(&self, handle: QueryHandle) -> Result<QueryHandle> {
        self.wait_with_cancel(handle, &CancellationToken::new())
            .await
    }

    pub async fn wait_with_cancel(
        &self,
        handle: QueryHandle,
        cancel: &CancellationToken,
    ) -> Result<QueryHandle> {
        self.poll(handle, cancel, Instant::now()).await
    }

    /// Polls until a terminal status. A deadline counts from `started`, and
    /// neither the interval sleep nor an in-flight status check outlives it.
    async fn poll(
        &self,
        handle: QueryHandle,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<QueryHandle> {
        let limit = self.options.deadline.map(|deadline| started + deadline);
        let mut polls = 0u32;

        loop {
            if self.options.max_polls.is_some_and(|max| polls >= max) {
                return Err(limit_exceeded(handle, polls, started));
            }

            if polls > 0 {
                let wake = Instant::now() + self.options.poll_interval;
                let wake = limit.map_or(wake, |limit| wake.min(limit));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.abandon(handle).await,
                    _ = sleep_until(wake) => {}
                }
            }

            if limit.is_some_and(|limit| Instant::now() >= limit) {
                return Err(limit_exceeded(handle, polls, started));
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abandon(handle).await,
                status = self.service.get_execution_status(&handle) => {
                    status.map_err(OwlError::Polling)?
                }
                _ = expire(limit) => return Err(limit_exceeded(handle, polls, started)),
            };
            polls += 1;

            match WaitState::after(status) {
                WaitState::Pending(state) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("query {} is {} after {} checks", handle, state, polls);
                    #[cfg(not(feature = "tracing"))]
                    let _ = state;
                }
                WaitState::Succeeded => {
                    #[cfg(feature = "tracing")]
                    tracing::info!("query {} succeeded after {} checks", handle, polls);
                    return Ok(handle);
                }
                WaitState::Failed { state, reason } => {
                    return Err(OwlError::QueryFailed {
                        handle,
                        state,
                        reason,
                    });
                }
            }
        }
    }

    /// Stops local polling. The remote query keeps running unless
    /// `stop_on_cancel` is set, in which case one best-effort stop is sent.
    async fn abandon(&self, handle: QueryHandle) -> Result<QueryHandle> {
        if self.options.stop_on_cancel {
            if let Err(err) = self.service.stop_execution(&handle).await {
                #[cfg(feature = "tracing")]
                tracing::warn!("failed to stop query {}: {}", handle, err);
                #[cfg(not(feature = "tracing"))]
                let _ = err;
            }
        }
        Err(OwlError::Cancelled)
    }
}

async fn expire(limit: Option<Instant>) {
    match limit {
        Some(limit) => sleep_until(limit).await,
        None => std::future::pending().await,
    }
}

fn limit_exceeded(handle: QueryHandle, polls: u32, started: Instant) -> OwlError {
    OwlError::WaitLimitExceeded {
        handle,
        polls,
        elapsed: started.elapsed(),
    }
}
