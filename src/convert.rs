//! Top-level entry points: import a spreadsheet, generate documents, write
//! them out.
//!
//! Each function is one user action. Any `Err` aborts that action only;
//! rows with errors and images that fail to load are reported inside the
//! result rather than as errors.

use crate::cancel::CancelToken;
use crate::config::KanbanConfig;
use crate::error::KanbanError;
use crate::model::{CanonicalRow, DocumentType, ExportTarget, ValidationOutcome};
use crate::palette::DepartmentPalette;
use crate::pipeline::export::{self, Artifact};
use crate::pipeline::pdf::{self, RenderedDocument};
use crate::pipeline::print;
use crate::pipeline::render::{CardContent, LabelContent};
use crate::pipeline::resolve::Resolver;
use crate::pipeline::{input, normalize, validate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Outcome of [`import_and_export`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub outcome: ValidationOutcome,
    pub files: Vec<PathBuf>,
}

/// Read, normalise and validate the spreadsheet at `path`.
///
/// # Errors
/// Only fatal conditions are returned as `Err`:
/// - file not found / permission denied
/// - not a readable workbook, or no header row
/// - cancelled
///
/// Rows with problems are listed in [`ValidationOutcome::errors`].
pub async fn import_spreadsheet(
    path: impl AsRef<Path>,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<ValidationOutcome, KanbanError> {
    let resolver = Resolver::new(config)?;
    import_with(path.as_ref(), &resolver, config, cancel).await
}

/// Like [`import_spreadsheet`], for a workbook already in memory.
pub async fn import_from_bytes(
    bytes: Vec<u8>,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<ValidationOutcome, KanbanError> {
    let sheet = input::read_bytes(bytes).await?;
    let resolver = Resolver::new(config)?;
    let rows = normalize::normalize_sheet(&sheet);
    validate::validate_rows(rows, &resolver, config, cancel).await
}

async fn import_with(
    path: &Path,
    resolver: &Resolver,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<ValidationOutcome, KanbanError> {
    let start = Instant::now();
    let sheet = input::read_path(path).await?;
    let rows = normalize::normalize_sheet(&sheet);
    info!("{} data row(s) in {}", rows.len(), path.display());
    let outcome = validate::validate_rows(rows, resolver, config, cancel).await?;
    info!(
        "Imported {} in {}ms",
        path.display(),
        start.elapsed().as_millis()
    );
    Ok(outcome)
}

/// Render PDFs for `target` from validated rows, in document order.
pub async fn generate_documents(
    rows: &[CanonicalRow],
    target: ExportTarget,
    palette: &DepartmentPalette,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<Vec<RenderedDocument>, KanbanError> {
    let resolver = Resolver::new(config)?;
    render_all(rows, target, palette, &resolver, config, cancel).await
}

async fn render_all(
    rows: &[CanonicalRow],
    target: ExportTarget,
    palette: &DepartmentPalette,
    resolver: &Resolver,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<Vec<RenderedDocument>, KanbanError> {
    let mut rendered = Vec::with_capacity(target.documents().len());
    for &document in target.documents() {
        if cancel.is_cancelled() {
            return Err(KanbanError::Cancelled);
        }
        rendered.push(pdf::render_document(document, rows, palette, resolver, config, cancel).await?);
    }
    Ok(rendered)
}

/// Render PDFs for `target` and write them into `dir`.
///
/// Returns the written paths. Files share one timestamp and are written
/// `download_delay_ms` apart.
pub async fn export_documents(
    rows: &[CanonicalRow],
    target: ExportTarget,
    palette: &DepartmentPalette,
    dir: impl AsRef<Path>,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<Vec<PathBuf>, KanbanError> {
    let rendered = generate_documents(rows, target, palette, config, cancel).await?;
    let artifacts = rendered.into_iter().map(Artifact::from).collect();
    export::write_all(artifacts, dir.as_ref(), config, cancel).await
}

/// Build the self-printing HTML for one document type.
pub fn print_html(
    rows: &[CanonicalRow],
    document: DocumentType,
    palette: &DepartmentPalette,
    config: &KanbanConfig,
) -> Result<String, KanbanError> {
    if rows.is_empty() {
        return Err(KanbanError::NoValidRows { invalid: 0 });
    }
    let resolver = Resolver::new(config)?;
    let html = match document {
        DocumentType::Cards => {
            let today = chrono::Local::now().date_naive();
            let cards: Vec<CardContent> = rows
                .iter()
                .map(|row| CardContent::from_row(row, palette, &resolver, today))
                .collect();
            print::cards_html(&cards, config.qr_source)
        }
        DocumentType::Labels => {
            let labels: Vec<LabelContent> = rows
                .iter()
                .map(|row| LabelContent::from_row(row, palette, &resolver))
                .collect();
            print::labels_html(&labels)
        }
    };
    info!("Built print HTML for {} {}", rows.len(), document);
    Ok(html)
}

/// Write self-printing HTML for `target` into `dir`.
pub async fn export_print(
    rows: &[CanonicalRow],
    target: ExportTarget,
    palette: &DepartmentPalette,
    dir: impl AsRef<Path>,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<Vec<PathBuf>, KanbanError> {
    let artifacts = target
        .documents()
        .iter()
        .map(|&document| {
            print_html(rows, document, palette, config).map(|html| Artifact {
                document,
                extension: "html",
                bytes: html.into_bytes(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    export::write_all(artifacts, dir.as_ref(), config, cancel).await
}

/// Import a spreadsheet and write PDFs for its valid rows.
///
/// Returns [`KanbanError::NoValidRows`] when no row passed validation.
pub async fn import_and_export(
    path: impl AsRef<Path>,
    target: ExportTarget,
    palette: &DepartmentPalette,
    dir: impl AsRef<Path>,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<ExportSummary, KanbanError> {
    let resolver = Resolver::new(config)?;
    let outcome = import_with(path.as_ref(), &resolver, config, cancel).await?;
    if outcome.valid_rows.is_empty() {
        return Err(KanbanError::NoValidRows {
            invalid: outcome.errors.len(),
        });
    }
    let rendered = render_all(&outcome.valid_rows, target, palette, &resolver, config, cancel).await?;
    let artifacts = rendered.into_iter().map(Artifact::from).collect();
    let files = export::write_all(artifacts, dir.as_ref(), config, cancel).await?;
    Ok(ExportSummary { outcome, files })
}

/// Synchronous wrapper around [`import_spreadsheet`].
///
/// Creates a temporary tokio runtime internally.
pub fn import_spreadsheet_sync(
    path: impl AsRef<Path>,
    config: &KanbanConfig,
) -> Result<ValidationOutcome, KanbanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| KanbanError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(import_spreadsheet(path, config, &CancelToken::new()))
}
