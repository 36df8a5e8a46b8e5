//! Attachment download sink
//!
//! Flattening computes attachment jobs; a sink evaluates them. With no
//! attachment directory configured the no-op sink leaves file names
//! untouched and nothing is downloaded. The filesystem sink stores each
//! attached file under `<root>/<job dir>/<file name>` and rewrites the
//! in-memory file name to that relative path, so the rendered cell points
//! at the downloaded copy.

use crate::client::RecordService;
use crate::error::{AttachmentError, Result};
use crate::export::flatten::AttachmentJob;
use crate::types::{FieldValue, Record};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Copy buffer size for attachment transfers
const COPY_CHUNK_SIZE: usize = 256 * 1024;

/// Evaluates attachment jobs for one record
#[async_trait]
pub(crate) trait AttachmentSink: Send + Sync {
    /// Evaluate one job against the record, rewriting stored file names
    /// when the sink downloads them
    async fn store(&self, record: &mut Record, job: &AttachmentJob) -> Result<()>;
}

/// Sink used when no attachment directory is configured
pub(crate) struct NoopSink;

#[async_trait]
impl AttachmentSink for NoopSink {
    async fn store(&self, _record: &mut Record, _job: &AttachmentJob) -> Result<()> {
        Ok(())
    }
}

/// Downloads attachments to a local directory tree
pub(crate) struct FsAttachmentSink<'a, S: RecordService + ?Sized> {
    service: &'a S,
    root: PathBuf,
}

impl<'a, S: RecordService + ?Sized> FsAttachmentSink<'a, S> {
    pub(crate) fn new(service: &'a S, root: PathBuf) -> Self {
        Self { service, root }
    }
}

#[async_trait]
impl<S: RecordService + ?Sized> AttachmentSink for FsAttachmentSink<'_, S> {
    async fn store(&self, record: &mut Record, job: &AttachmentJob) -> Result<()> {
        // a job may point at an unset or non-file cell; nothing to do then
        let Some(FieldValue::File(files)) = job_field(record, job) else {
            return Ok(());
        };
        if files.is_empty() {
            return Ok(());
        }

        let dir = self.root.join(&job.dir);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| AttachmentError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        for file in files.iter_mut() {
            let path = dir.join(&file.name);
            debug!(file_key = %file.file_key, path = %path.display(), "storing attachment");

            let mut stream = self.service.download(&file.file_key).await?;
            let mut out = fs::File::create(&path)
                .await
                .map_err(|source| AttachmentError::WriteFile {
                    path: path.clone(),
                    source,
                })?;

            let mut buf = vec![0u8; COPY_CHUNK_SIZE];
            loop {
                let n = stream
                    .read(&mut buf)
                    .await
                    .map_err(|source| AttachmentError::ReadStream {
                        file_key: file.file_key.clone(),
                        source,
                    })?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])
                    .await
                    .map_err(|source| AttachmentError::WriteFile {
                        path: path.clone(),
                        source,
                    })?;
            }
            out.flush()
                .await
                .map_err(|source| AttachmentError::WriteFile {
                    path: path.clone(),
                    source,
                })?;

            // cells display the relative path of the downloaded copy
            file.name = format!(
                "{}{}{}",
                job.dir,
                std::path::MAIN_SEPARATOR,
                file.name
            );
        }

        Ok(())
    }
}

/// Locate the field value a job targets
fn job_field<'r>(record: &'r mut Record, job: &AttachmentJob) -> Option<&'r mut FieldValue> {
    match &job.table {
        Some((table, row)) => match record.fields.get_mut(table) {
            Some(FieldValue::SubTable(rows)) => rows.get_mut(*row)?.fields.get_mut(&job.code),
            _ => None,
        },
        None => record.fields.get_mut(&job.code),
    }
}
