//! In-process [`QueryService`] driven by a script, for tests and demos.
//!
//! Two modes can be mixed:
//! - scripted queues of statuses and pages, consumed one per call;
//! - a fixed table served deterministically to every submitted query.
//!
//! Every call is recorded with the (tokio) instant it was made, so tests can
//! assert on call order and polling cadence.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    Cursor, ExecutionState, ExecutionStatus, PageData, QueryHandle, QueryRequest, QueryService,
    Row, ServiceError,
};

/// A call received by [`MockQueryService`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    Start {
        sql: String,
        output_location: String,
    },
    Status {
        handle: QueryHandle,
    },
    Page {
        handle: QueryHandle,
        max_rows: i32,
        cursor: Option<String>,
    },
    Stop {
        handle: QueryHandle,
    },
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub call: MockCall,
    pub at: Instant,
}

struct MockState {
    submit_failure: Option<ServiceError>,
    statuses: VecDeque<Result<ExecutionStatus, ServiceError>>,
    idle_state: ExecutionState,
    pages: VecDeque<Result<PageData, ServiceError>>,
    table: Option<Vec<Row>>,
    next_id: u32,
    calls: Vec<RecordedCall>,
}

/// Scripted query service. Clones share the same script and call log.
#[derive(Clone)]
pub struct MockQueryService {
    state: Arc<Mutex<MockState>>,
}

impl MockQueryService {
    /// Empty script. Once statuses run out every check reports `RUNNING`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                submit_failure: None,
                statuses: VecDeque::new(),
                idle_state: ExecutionState::Running,
                pages: VecDeque::new(),
                table: None,
                next_id: 0,
                calls: Vec::new(),
            })),
        }
    }

    /// Serves `header` followed by `rows` to every query, split into pages of
    /// `max_rows` rows, and reports `SUCCEEDED` once scripted statuses run out.
    pub fn serving_table(header: Row, rows: Vec<Row>) -> Self {
        let mock = Self::new();
        {
            let mut state = mock.lock();
            let mut table = Vec::with_capacity(rows.len() + 1);
            table.push(header);
            table.extend(rows);
            state.table = Some(table);
            state.idle_state = ExecutionState::Succeeded;
        }
        mock
    }

    pub fn fail_submission(self, err: ServiceError) -> Self {
        self.lock().submit_failure = Some(err);
        self
    }

    pub fn with_statuses<I>(self, statuses: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ExecutionStatus>,
    {
        self.lock()
            .statuses
            .extend(statuses.into_iter().map(|status| Ok(status.into())));
        self
    }

    pub fn push_status_error(self, err: ServiceError) -> Self {
        self.lock().statuses.push_back(Err(err));
        self
    }

    pub fn with_pages<I>(self, pages: I) -> Self
    where
        I: IntoIterator<Item = PageData>,
    {
        self.lock().pages.extend(pages.into_iter().map(Ok));
        self
    }

    pub fn push_page_error(self, err: ServiceError) -> Self {
        self.lock().pages.push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.iter().map(|r| r.call.clone()).collect()
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Status { .. }))
    }

    pub fn page_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Page { .. }))
    }

    /// Instants at which status checks arrived.
    pub fn status_instants(&self) -> Vec<Instant> {
        self.lock()
            .calls
            .iter()
            .filter(|r| matches!(r.call, MockCall::Status { .. }))
            .map(|r| r.at)
            .collect()
    }

    /// Cursors sent with each page request, in order.
    pub fn page_cursors(&self) -> Vec<Option<String>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|r| match &r.call {
                MockCall::Page { cursor, .. } => Some(cursor.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|r| pred(&r.call)).count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(state: &mut MockState, call: MockCall) {
        state.calls.push(RecordedCall {
            call,
            at: Instant::now(),
        });
    }
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self::new()
    }
}

fn table_page(
    table: &[Row],
    max_rows: i32,
    cursor: Option<&Cursor>,
) -> Result<PageData, ServiceError> {
    let offset = match cursor {
        Some(cursor) => cursor.as_str().parse::<usize>().map_err(|err| {
            ServiceError::Decode(format!("invalid cursor '{}': {err}", cursor.as_str()))
        })?,
        None => 0,
    };
    let len = usize::try_from(max_rows.max(1)).unwrap_or(1);
    let end = offset.saturating_add(len).min(table.len());
    let rows = table.get(offset..end).unwrap_or_default().to_vec();
    let next_cursor = (end < table.len()).then(|| Cursor::new(end.to_string()));
    Ok(PageData { rows, next_cursor })
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn start_execution(&self, request: &QueryRequest) -> Result<QueryHandle, ServiceError> {
        let mut state = self.lock();
        Self::record(
            &mut state,
            MockCall::Start {
                sql: request.sql.clone(),
                output_location: request.output_location.clone(),
            },
        );
        if let Some(err) = state.submit_failure.take() {
            return Err(err);
        }
        state.next_id += 1;
        Ok(QueryHandle::new(format!("query-{}", state.next_id)))
    }

    async fn get_execution_status(
        &self,
        handle: &QueryHandle,
    ) -> Result<ExecutionStatus, ServiceError> {
        let mut state = self.lock();
        Self::record(
            &mut state,
            MockCall::Status {
                handle: handle.clone(),
            },
        );
        match state.statuses.pop_front() {
            Some(status) => status,
            None => Ok(ExecutionStatus::new(state.idle_state)),
        }
    }

    async fn get_result_page(
        &self,
        handle: &QueryHandle,
        max_rows: i32,
        cursor: Option<&Cursor>,
    ) -> Result<PageData, ServiceError> {
        let mut state = self.lock();
        Self::record(
            &mut state,
            MockCall::Page {
                handle: handle.clone(),
                max_rows,
                cursor: cursor.map(|c| c.as_str().to_owned()),
            },
        );
        if let Some(page) = state.pages.pop_front() {
            return page;
        }
        match &state.table {
            Some(table) => table_page(table, max_rows, cursor),
            None => Err(ServiceError::Decode("no scripted result page left".to_owned())),
        }
    }

    async fn stop_execution(&self, handle: &QueryHandle) -> Result<(), ServiceError> {
        let mut state = self.lock();
        Self::record(
            &mut state,
            MockCall::Stop {
                handle: handle.clone(),
            },
        );
        Ok(())
    }
}
