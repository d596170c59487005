use std::time::Duration;

use crate::{ExecutionState, QueryHandle};

/// Failure of a single call to the remote query service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code whose body is not a service error document.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Error document returned by the service (`__type` + message).
    #[error("{code} (http {status}): {message}")]
    Api {
        status: u16,
        /// Exception name with any namespace prefix removed.
        code: String,
        message: String,
    },
    /// The request could not be signed.
    #[error("signing error: {0}")]
    Signing(String),
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Error type returned by this crate.
///
/// Each stage of a query run fails with its own variant, so callers can
/// branch on where the run stopped without inspecting messages.
#[derive(Debug, thiserror::Error)]
pub enum OwlError {
    /// The service rejected or failed the initial submission. Nothing was polled.
    #[error("query submission failed: {0}")]
    Submission(#[source] ServiceError),
    /// A status check failed while waiting for the query.
    #[error("status polling failed: {0}")]
    Polling(#[source] ServiceError),
    /// The query reached `FAILED` or `CANCELLED` on the service.
    #[error("query {handle} {state}: {reason}")]
    QueryFailed {
        handle: QueryHandle,
        state: ExecutionState,
        /// Service-supplied reason, empty when none was given.
        reason: String,
    },
    /// Fetching a result page failed. Pages delivered before it stand.
    #[error("fetching result page {page} failed: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: ServiceError,
    },
    /// The caller cancelled the run locally.
    #[error("query run cancelled")]
    Cancelled,
    /// A configured poll ceiling or deadline was hit before a terminal status.
    #[error("gave up waiting for query {handle} after {polls} status checks ({elapsed:?})")]
    WaitLimitExceeded {
        handle: QueryHandle,
        polls: u32,
        elapsed: Duration,
    },
    /// A row sink refused output (for example an I/O failure while writing).
    #[error("result sink failed: {0}")]
    Sink(String),
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl OwlError {
    /// Returns the service-supplied reason for a failed or cancelled query.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::QueryFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Returns the underlying service error, if the run stopped on one.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Submission(err) | Self::Polling(err) => Some(err),
            Self::PageFetch { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OwlError, ServiceError};
    use crate::{ExecutionState, QueryHandle};

    #[test]
    fn query_failed_exposes_reason() {
        let err = OwlError::QueryFailed {
            handle: QueryHandle::new("q-1"),
            state: ExecutionState::Failed,
            reason: "SYNTAX_ERROR: line 1:8".to_owned(),
        };
        assert_eq!(err.reason(), Some("SYNTAX_ERROR: line 1:8"));
        assert_eq!(err.to_string(), "query q-1 FAILED: SYNTAX_ERROR: line 1:8");
        assert!(err.service_error().is_none());
    }

    #[test]
    fn page_fetch_exposes_service_error() {
        let err = OwlError::PageFetch {
            page: 2,
            source: ServiceError::Http {
                status: 500,
                body: "boom".to_owned(),
            },
        };
        assert!(matches!(
            err.service_error(),
            Some(ServiceError::Http { status: 500, .. })
        ));
        assert_eq!(
            err.to_string(),
            "fetching result page 2 failed: http error 500: boom"
        );
    }
}
