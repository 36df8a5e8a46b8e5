//! Paginated record retrieval
//!
//! Pages through the service 500 records at a time by appending
//! `limit`/`offset` clauses to the caller's query. A query that already
//! carries its own `limit` clause is trusted: it is issued exactly once,
//! unmodified, and treated as the final page whatever it returns.

use crate::client::{EXPORT_PAGE_SIZE, RecordService};
use crate::error::Result;
use crate::types::Record;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Matches a caller-supplied `limit` clause (case-sensitive)
#[allow(clippy::unwrap_used)]
static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"limit\s+\d+").unwrap());

/// Fetches successive pages of records for one query
pub(crate) struct PageFetcher<'a, S: RecordService + ?Sized> {
    service: &'a S,
    fields: Option<&'a [String]>,
    query: &'a str,
}

impl<'a, S: RecordService + ?Sized> PageFetcher<'a, S> {
    pub(crate) fn new(service: &'a S, fields: Option<&'a [String]>, query: &'a str) -> Self {
        Self {
            service,
            fields,
            query,
        }
    }

    /// Fetch the page starting at `offset`
    ///
    /// Returns the page's records and whether it is the last page. The
    /// driving loop advances `offset` by [`EXPORT_PAGE_SIZE`] and stops when
    /// the flag is set. Errors abort the run; there is no retry.
    pub(crate) async fn fetch(&self, offset: u64) -> Result<(Vec<Record>, bool)> {
        if LIMIT_CLAUSE.is_match(self.query) {
            // the caller controls paging; one request, taken as final
            let records = self.service.fetch_page(self.fields, self.query).await?;
            debug!(count = records.len(), "fetched single limited page");
            return Ok((records, true));
        }

        let paged = format!(
            "{} limit {} offset {}",
            self.query, EXPORT_PAGE_SIZE, offset
        );
        let records = self.service.fetch_page(self.fields, &paged).await?;
        let is_last = records.len() < EXPORT_PAGE_SIZE;
        debug!(offset, count = records.len(), is_last, "fetched page");
        Ok((records, is_last))
    }
}
