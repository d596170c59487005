//! Cursor-following page fetcher.

use futures::Stream;

use crate::{Cursor, OwlError, PageOptions, QueryHandle, QueryService, Result, ResultPage};

#[derive(Debug)]
enum PageState {
    Start,
    Next { number: u32, cursor: Cursor },
    Exhausted,
}

/// Forward-only walk over the result pages of one succeeded query.
///
/// Each fetch depends on the cursor of the previous page, so pages are
/// fetched one at a time and in order. Once a page arrives without a cursor,
/// or a fetch fails, the paginator is exhausted and never calls the service
/// again. Rows are passed through untouched, including the header row at the
/// start of page 1.
pub struct ResultPaginator<'a, S: ?Sized> {
    service: &'a S,
    handle: QueryHandle,
    max_rows: i32,
    state: PageState,
    fetched: u32,
}

impl<'a, S: QueryService + ?Sized> ResultPaginator<'a, S> {
    pub fn new(service: &'a S, handle: QueryHandle, options: &PageOptions) -> Self {
        Self {
            service,
            handle,
            max_rows: options.max_rows,
            state: PageState::Start,
            fetched: 0,
        }
    }

    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    /// Number of pages successfully fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.fetched
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, PageState::Exhausted)
    }

    /// Fetches the next page, or returns `None` once the last page was seen.
    pub async fn next_page(&mut self) -> Result<Option<ResultPage>> {
        let (number, cursor) = match std::mem::replace(&mut self.state, PageState::Exhausted) {
            PageState::Start => (1, None),
            PageState::Next { number, cursor } => (number, Some(cursor)),
            PageState::Exhausted => return Ok(None),
        };

        let data = self
            .service
            .get_result_page(&self.handle, self.max_rows, cursor.as_ref())
            .await
            .map_err(|source| OwlError::PageFetch {
                page: number,
                source,
            })?;
        self.fetched = number;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "query {} page {}: {} rows, more: {}",
            self.handle,
            number,
            data.rows.len(),
            data.next_cursor.is_some()
        );

        if let Some(next) = &data.next_cursor {
            self.state = PageState::Next {
                number: number + 1,
                cursor: next.clone(),
            };
        }

        Ok(Some(ResultPage {
            number,
            rows: data.rows,
            next_cursor: data.next_cursor,
        }))
    }

    /// Fetches every remaining page, handing each to `on_page` as it arrives.
    ///
    /// Stops at the first fetch or callback error. Pages already handed over
    /// are not revisited. Returns the number of pages fetched.
    pub async fn fetch_all<F>(&mut self, mut on_page: F) -> Result<u32>
    where
        F: FnMut(ResultPage) -> Result<()>,
    {
        while let Some(page) = self.next_page().await? {
            on_page(page)?;
        }
        Ok(self.fetched)
    }

    /// Turns the paginator into a stream of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<ResultPage>> + 'a {
        futures::stream::try_unfold(self, |mut paginator| async move {
            let page = paginator.next_page().await?;
            Ok::<_, OwlError>(page.map(|page| (page, paginator)))
        })
    }
}
