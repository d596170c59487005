//! Submit, wait, and drain results in one call.

use tokio_util::sync::CancellationToken;

use crate::{
    AthenaClient, ExecutionWaiter, OwlConfig, OwlError, PageOptions, QueryHandle, QueryService,
    QuerySummary, Result, ResultPaginator, Row, WaitOptions,
};

/// Receives a result set incrementally.
///
/// `on_header` is called at most once, before any row. `on_page` fires after
/// the rows of each fetched page were delivered, so it doubles as a progress
/// and flush hook. Returning an error from any method stops the run; output
/// delivered before that point is left as is.
pub trait RowSink {
    fn on_header(&mut self, header: &[String]) -> Result<()>;

    fn on_row(&mut self, row: Row) -> Result<()>;

    fn on_page(&mut self, _number: u32, _has_more: bool) -> Result<()> {
        Ok(())
    }

    fn on_complete(&mut self, _summary: &QuerySummary) -> Result<()> {
        Ok(())
    }
}

/// Collects a whole result set in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferSink {
    header: Option<Row>,
    rows: Vec<Row>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Option<&Row> {
        self.header.as_ref()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// All rows with the header row first.
    pub fn into_rows(self) -> Vec<Row> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.extend(self.header);
        out.extend(self.rows);
        out
    }
}

impl RowSink for BufferSink {
    fn on_header(&mut self, header: &[String]) -> Result<()> {
        self.header = Some(header.to_vec());
        Ok(())
    }

    fn on_row(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }
}

/// Runs statements end to end: submission, waiting, then pagination.
#[derive(Clone, Debug)]
pub struct QueryRunner<S> {
    waiter: ExecutionWaiter<S>,
    page_options: PageOptions,
}

impl QueryRunner<AthenaClient> {
    /// Builds a runner talking to Athena with the given settings.
    pub fn from_config(config: &OwlConfig) -> Result<Self> {
        let client = AthenaClient::new(config)?;
        Ok(Self::new(client, config.output_location.as_str()))
    }
}

impl<S: QueryService> QueryRunner<S> {
    pub fn new(service: S, output_location: impl Into<String>) -> Self {
        Self::from_waiter(ExecutionWaiter::new(service, output_location))
    }

    pub fn from_waiter(waiter: ExecutionWaiter<S>) -> Self {
        Self {
            waiter,
            page_options: PageOptions::default(),
        }
    }

    pub fn with_wait_options(mut self, options: WaitOptions) -> Self {
        self.waiter = self.waiter.with_options(options);
        self
    }

    pub fn with_page_options(mut self, options: PageOptions) -> Self {
        self.page_options = options;
        self
    }

    pub fn waiter(&self) -> &ExecutionWaiter<S> {
        &self.waiter
    }

    pub fn service(&self) -> &S {
        self.waiter.service()
    }

    /// Starts a page walk over a succeeded query.
    pub fn paginate(&self, handle: QueryHandle) -> ResultPaginator<'_, S> {
        ResultPaginator::new(self.service(), handle, &self.page_options)
    }

    /// Runs `sql` and buffers every row, header row first.
    pub async fn run_query(&self, sql: &str) -> Result<Vec<Row>> {
        self.run_query_with_cancel(sql, &CancellationToken::new())
            .await
    }

    pub async fn run_query_with_cancel(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let mut sink = BufferSink::new();
        self.stream_query_with_cancel(sql, &mut sink, cancel).await?;
        Ok(sink.into_rows())
    }

    /// Runs `sql` and feeds rows to `sink` as pages arrive.
    pub async fn stream_query<K>(&self, sql: &str, sink: &mut K) -> Result<QuerySummary>
    where
        K: RowSink + ?Sized,
    {
        self.stream_query_with_cancel(sql, sink, &CancellationToken::new())
            .await
    }

    pub async fn stream_query_with_cancel<K>(
        &self,
        sql: &str,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<QuerySummary>
    where
        K: RowSink + ?Sized,
    {
        let handle = self.waiter.submit_with_cancel(sql, cancel).await?;
        self.stream_results(handle, sink, cancel).await
    }

    /// Drains the results of a succeeded query into `sink`.
    ///
    /// The header is split off page 1 by position; no later row is ever
    /// treated as a header.
    pub async fn stream_results<K>(
        &self,
        handle: QueryHandle,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<QuerySummary>
    where
        K: RowSink + ?Sized,
    {
        let mut paginator = self.paginate(handle.clone());
        let mut summary = QuerySummary {
            handle,
            pages: 0,
            rows: 0,
        };

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OwlError::Cancelled),
                page = paginator.next_page() => page?,
            };
            let Some(page) = page else {
                break;
            };

            let (number, has_more) = (page.number, page.has_more());
            let (header, rows) = page.split_header();
            if let Some(header) = header {
                sink.on_header(&header)?;
            }
            for row in rows {
                sink.on_row(row)?;
                summary.rows += 1;
            }
            summary.pages = number;
            sink.on_page(number, has_more)?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "query {} drained: {} pages, {} rows",
            summary.handle,
            summary.pages,
            summary.rows
        );

        sink.on_complete(&summary)?;
        Ok(summary)
    }
}
