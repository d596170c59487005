//! `little-owl` runs SQL on Amazon Athena and streams the results back.
//!
//! A run has two sequential stages:
//! - [`ExecutionWaiter`] submits a statement and polls its status on a flat
//!   interval until it succeeds, fails, or is cancelled;
//! - [`ResultPaginator`] follows the continuation cursor across result pages.
//!
//! [`QueryRunner`] composes both, either buffering everything
//! ([`QueryRunner::run_query`]) or feeding a [`RowSink`] page by page
//! ([`QueryRunner::stream_query`]). The remote service sits behind the
//! [`QueryService`] trait; [`AthenaClient`] is the HTTP implementation and
//! [`mock::MockQueryService`] a scripted in-process one.

mod client;
mod config;
mod decode;
mod error;
mod options;
mod paginator;
mod runner;
mod service;
mod signing;
mod types;
mod waiter;
mod wire;

pub mod mock;

pub use client::{AthenaClient, MAX_RESULTS_LIMIT};
pub use config::{Credentials, OwlConfig, DEFAULT_OUTPUT_LOCATION, DEFAULT_REGION};
pub use error::{OwlError, ServiceError};
pub use options::{ClientOptions, PageOptions, WaitOptions};
pub use paginator::ResultPaginator;
pub use runner::{BufferSink, QueryRunner, RowSink};
pub use service::QueryService;
pub use types::{
    Cursor, ExecutionState, ExecutionStatus, PageData, QueryHandle, QueryRequest, QuerySummary,
    ResultPage, Row,
};
pub use waiter::ExecutionWaiter;

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, OwlError>;
