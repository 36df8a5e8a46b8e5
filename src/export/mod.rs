//! The export pipeline
//!
//! Fetch a page, expand each record into physical rows, render and write,
//! repeat until the last page. Strictly sequential: one request in flight
//! at a time, attachment downloads inline with flattening, first error
//! aborts the run. The resolved column list is fixed before the first
//! record is written and shared read-only by the flattener and the CSV
//! header.

pub(crate) mod attachments;
pub(crate) mod fetch;
pub(crate) mod flatten;
pub mod schema;
pub(crate) mod transcode;
pub(crate) mod writer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::client::{EXPORT_PAGE_SIZE, RecordService};
use crate::config::{ExportConfig, ExportFormat};
use crate::error::Result;
use crate::export::attachments::{AttachmentSink, FsAttachmentSink, NoopSink};
use crate::export::fetch::PageFetcher;
use crate::export::schema::{Columns, has_sub_table, resolve_all, resolve_partial};
use crate::export::transcode::TranscodingWriter;
use crate::export::writer::{CsvWriter, JsonWriter};
use std::io::Write;
use tracing::info;

/// Counters for one completed export run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Logical records written
    pub records: u64,
    /// Physical rows written (equals `records` for JSON exports)
    pub rows: u64,
    /// Pages fetched from the service
    pub pages: u64,
}

/// Drives one export run against a record service
pub struct Exporter<S: RecordService> {
    service: S,
    config: ExportConfig,
}

impl<S: RecordService> Exporter<S> {
    /// Create an exporter over `service` with the given settings
    pub fn new(service: S, config: ExportConfig) -> Self {
        Self { service, config }
    }

    /// Borrow the underlying service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Run the export in the configured format, writing to `sink`
    ///
    /// The run either completes and produces a full export or aborts on the
    /// first error with no guaranteed-consistent partial output.
    pub async fn export<W: Write>(&self, sink: W) -> Result<ExportStats> {
        match self.config.format {
            ExportFormat::Csv => self.export_csv(sink).await,
            ExportFormat::Json => self.export_json(sink).await,
        }
    }

    /// Export flattened CSV to `sink`
    pub async fn export_csv<W: Write>(&self, sink: W) -> Result<ExportStats> {
        let schema = self.service.field_metadata().await?;
        let columns: Columns = match &self.config.fields {
            None => resolve_all(&schema),
            Some(requested) => resolve_partial(&schema, requested),
        };

        let attachment_sink: Box<dyn AttachmentSink + '_> = match &self.config.attachment_dir {
            Some(dir) => Box::new(FsAttachmentSink::new(&self.service, dir.clone())),
            None => Box::new(NoopSink),
        };

        let mut csv = CsvWriter::new(
            TranscodingWriter::new(sink, self.config.encoding),
            has_sub_table(&columns),
        );
        let fetcher = PageFetcher::new(
            &self.service,
            self.config.fields.as_deref(),
            &self.config.query,
        );

        let mut stats = ExportStats::default();
        let mut emitted: u64 = 0;
        let mut offset: u64 = 0;
        loop {
            let (records, is_last) = fetcher.fetch(offset).await?;
            stats.pages += 1;

            for mut record in records {
                if emitted == 0 {
                    // header only when at least one record exists
                    csv.write_header(&columns)?;
                }
                let ident = if record.id == 0 { emitted } else { record.id };

                for job in flatten::attachment_jobs(&record, &columns, ident) {
                    attachment_sink.store(&mut record, &job).await?;
                }
                for row in flatten::flatten(&record, &columns, flatten::CELL_DELIMITER) {
                    csv.write_row(&row)?;
                    stats.rows += 1;
                }
                emitted += 1;
            }

            if is_last {
                break;
            }
            offset += EXPORT_PAGE_SIZE as u64;
        }
        stats.records = emitted;

        csv.finish()?.finish()?;
        info!(
            records = stats.records,
            rows = stats.rows,
            pages = stats.pages,
            "csv export complete"
        );
        Ok(stats)
    }

    /// Export the streaming JSON document to `sink`
    ///
    /// Records are written in their native wire representation; flattening
    /// and the column model do not apply.
    pub async fn export_json<W: Write>(&self, sink: W) -> Result<ExportStats> {
        let mut json = JsonWriter::new(TranscodingWriter::new(sink, self.config.encoding))?;
        let fetcher = PageFetcher::new(
            &self.service,
            self.config.fields.as_deref(),
            &self.config.query,
        );

        let mut stats = ExportStats::default();
        let mut offset: u64 = 0;
        loop {
            let (records, is_last) = fetcher.fetch(offset).await?;
            stats.pages += 1;

            for record in &records {
                json.write_record(&record.source)?;
                stats.records += 1;
            }

            if is_last {
                break;
            }
            offset += EXPORT_PAGE_SIZE as u64;
        }
        stats.rows = stats.records;

        json.finish()?.finish()?;
        info!(
            records = stats.records,
            pages = stats.pages,
            "json export complete"
        );
        Ok(stats)
    }
}
