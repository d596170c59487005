use async_trait::async_trait;

use crate::{Cursor, ExecutionStatus, PageData, QueryHandle, QueryRequest, ServiceError};

/// The remote query service as seen by the waiter and the paginator.
///
/// Every method is a single network call. Implementations take `&self` and
/// must tolerate concurrent use by independent query runs.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a statement and returns the execution id assigned to it.
    async fn start_execution(&self, request: &QueryRequest) -> Result<QueryHandle, ServiceError>;

    /// Fetches the current status of an execution.
    async fn get_execution_status(
        &self,
        handle: &QueryHandle,
    ) -> Result<ExecutionStatus, ServiceError>;

    /// Fetches one page of results. `cursor` is `None` for the first page.
    async fn get_result_page(
        &self,
        handle: &QueryHandle,
        max_rows: i32,
        cursor: Option<&Cursor>,
    ) -> Result<PageData, ServiceError>;

    /// Asks the service to stop a running execution.
    async fn stop_execution(&self, handle: &QueryHandle) -> Result<(), ServiceError>;
}
