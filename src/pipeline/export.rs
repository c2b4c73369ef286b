//! Writing rendered documents to disk.
//!
//! Every document of one export shares a single timestamp so the files sort
//! together: `kanban-cards-<ts>.pdf` and `kanban-labels-<ts>.pdf`, where
//! `<ts>` is milliseconds since the Unix epoch. Files are written one after
//! another with `download_delay_ms` between them, each through a temp file
//! and a rename so a reader never sees a partial document.

use crate::cancel::CancelToken;
use crate::config::KanbanConfig;
use crate::error::KanbanError;
use crate::model::DocumentType;
use crate::pipeline::pdf::RenderedDocument;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// MIME type of exported documents.
pub const PDF_MIME: &str = "application/pdf";

/// MIME type of the self-printing HTML.
pub const HTML_MIME: &str = "text/html";

/// Milliseconds since the Unix epoch, shared by every file of one export.
pub fn export_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// File name for one document of an export.
pub fn file_name(document: DocumentType, timestamp: i64, extension: &str) -> String {
    format!("kanban-{}-{}.{}", document.as_str(), timestamp, extension)
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), KanbanError> {
    let fail = |source: std::io::Error| KanbanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let written = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(fail(e));
    }
    Ok(())
}

/// One document's bytes and the file extension to save it under.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub document: DocumentType,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl From<RenderedDocument> for Artifact {
    fn from(rendered: RenderedDocument) -> Self {
        Self {
            document: rendered.document,
            extension: "pdf",
            bytes: rendered.bytes,
        }
    }
}

/// Write `artifacts` into `dir` in order, returning the written paths.
///
/// Cancellation is checked before each file; files already written stay on
/// disk and the call returns [`KanbanError::Cancelled`].
pub async fn write_all(
    artifacts: Vec<Artifact>,
    dir: &Path,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<Vec<PathBuf>, KanbanError> {
    let timestamp = export_timestamp();
    let delay = Duration::from_millis(config.download_delay_ms);
    let mut written = Vec::with_capacity(artifacts.len());

    for (i, artifact) in artifacts.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            debug!("Waiting {}ms before next document", delay.as_millis());
            tokio::select! {
                _ = cancel.cancelled() => return Err(KanbanError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(KanbanError::Cancelled);
        }
        let path = dir.join(file_name(artifact.document, timestamp, artifact.extension));
        write_atomic(&path, &artifact.bytes).await?;
        info!("Wrote {} ({} bytes)", path.display(), artifact.bytes.len());
        if let Some(cb) = &config.progress_callback {
            cb.on_document_written(&path);
        }
        written.push(path);
    }
    Ok(written)
}
