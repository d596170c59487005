use std::fmt;

/// One result row: cells in column order, SQL `NULL` as an empty string.
pub type Row = Vec<String>;

/// A statement ready for submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRequest {
    pub sql: String,
    /// Storage location where the service writes its raw result artifact.
    pub output_location: String,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, output_location: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            output_location: output_location.into(),
        }
    }
}

/// Service-assigned id of a submitted query execution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryHandle(String);

impl QueryHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueryHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for QueryHandle {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Lifecycle state of a query execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Wire name used by the service.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single status check. Never cached across polls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub state: ExecutionState,
    /// Only populated for `FAILED` and `CANCELLED`.
    pub reason: Option<String>,
}

impl ExecutionStatus {
    pub fn new(state: ExecutionState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl From<ExecutionState> for ExecutionStatus {
    fn from(state: ExecutionState) -> Self {
        Self::new(state)
    }
}

/// Opaque continuation token for the next result page.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page as returned by the service, before it is numbered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageData {
    pub rows: Vec<Row>,
    pub next_cursor: Option<Cursor>,
}

/// A numbered page of results. Page 1 starts with the column header row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultPage {
    /// 1-based position in cursor order.
    pub number: u32,
    pub rows: Vec<Row>,
    pub next_cursor: Option<Cursor>,
}

impl ResultPage {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn is_first(&self) -> bool {
        self.number == 1
    }

    /// Splits off the header row, which is row 0 of page 1 and nowhere else.
    ///
    /// Rows on later pages are returned untouched, even if they happen to
    /// look like the header.
    pub fn split_header(self) -> (Option<Row>, Vec<Row>) {
        if !self.is_first() {
            return (None, self.rows);
        }
        let mut rows = self.rows.into_iter();
        let header = rows.next();
        (header, rows.collect())
    }
}

/// Totals reported once a result stream has been drained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySummary {
    pub handle: QueryHandle,
    /// Number of pages fetched.
    pub pages: u32,
    /// Number of data rows delivered, header excluded.
    pub rows: u64,
}
