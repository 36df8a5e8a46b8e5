//! Remote record-service client
//!
//! The export pipeline talks to the service exclusively through the
//! [`RecordService`] trait: one call fetches form metadata, one fetches a
//! page of records for a query, one opens an attachment byte stream. The
//! [`HttpRecordService`] implementation speaks the service's JSON-over-HTTP
//! protocol; tests substitute in-memory implementations.

use crate::error::Result;
use crate::types::{Record, Schema};
use async_trait::async_trait;
use tokio::io::AsyncRead;

pub mod http;
pub(crate) mod wire;

pub use http::HttpRecordService;

/// Maximum number of records the service returns per export-direction page
/// request; the paginated fetcher sizes its `limit`/`offset` clauses to this
pub const EXPORT_PAGE_SIZE: usize = 500;

/// Maximum number of records the service accepts per import-direction
/// request. Documented here as part of the service interface; the export
/// pipeline never issues import requests.
pub const IMPORT_PAGE_SIZE: usize = 100;

/// An attachment body as an async byte stream
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Interface to the remote tabular-record service
///
/// Implementations own authentication and transport. Every method is fallible
/// and every failure is fatal to the export run in progress: the pipeline
/// performs no retries and no partial-success accounting.
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Fetch the app's form metadata, in form order
    async fn field_metadata(&self) -> Result<Schema>;

    /// Fetch one page of records matching `query`
    ///
    /// `fields` restricts the per-record payload to the given codes; `None`
    /// returns every field. Paging is expressed inside `query` (`limit` /
    /// `offset` clauses), not as a separate parameter.
    async fn fetch_page(&self, fields: Option<&[String]>, query: &str) -> Result<Vec<Record>>;

    /// Open a byte stream for the attachment stored under `file_key`
    async fn download(&self, file_key: &str) -> Result<ByteStream>;
}
