//! # record-export
//!
//! Streaming export library for remote tabular-record services.
//!
//! ## Design Philosophy
//!
//! record-export is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Sink-agnostic** - Exports write to any `std::io::Write`; what
//!   happens to the bytes afterwards (file, object storage, stdout) is the
//!   caller's business
//! - **Faithful** - The flattened CSV shape, pagination contract and
//!   per-type formatting match the service's established export format
//!   exactly, quirks included
//! - **Sequential** - One request in flight at a time; the first error
//!   aborts the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use record_export::{
//!     AuthMethod, ConnectionConfig, ExportConfig, Exporter, HttpRecordService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = ConnectionConfig {
//!         base_url: "https://example.service.com".to_string(),
//!         app: 42,
//!         guest_space: None,
//!         auth: AuthMethod::Token {
//!             token: "api-token".to_string(),
//!         },
//!         basic_auth: None,
//!         timeout_secs: 30,
//!     };
//!
//!     let service = HttpRecordService::new(connection)?;
//!     let exporter = Exporter::new(service, ExportConfig::default());
//!
//!     let mut out = Vec::new();
//!     let stats = exporter.export(&mut out).await?;
//!     println!("exported {} records", stats.records);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote record-service client (trait and HTTP implementation)
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// The export pipeline (pagination, flattening, writers, transcoding)
pub mod export;
/// Core data model (field values, records, form metadata)
pub mod types;

// Re-export commonly used types
pub use client::{
    ByteStream, EXPORT_PAGE_SIZE, HttpRecordService, IMPORT_PAGE_SIZE, RecordService,
};
pub use config::{
    AuthMethod, BasicAuth, ConnectionConfig, ExportConfig, ExportFormat, OutputEncoding,
};
pub use error::{AttachmentError, Error, Result};
pub use export::schema::{Column, Columns};
pub use export::{ExportStats, Exporter};
pub use types::{
    Entity, FIELD_ID, FIELD_REVISION, FieldInfo, FieldKind, FieldValue, FileInfo, Record, Schema,
    SubRecord,
};
