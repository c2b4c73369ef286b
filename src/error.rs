//! Error types for the kanban-cards library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`KanbanError`] is **fatal for one user action**. The spreadsheet cannot
//!   be read, no row survived validation, a document could not be generated
//!   or written. Returned as `Err(KanbanError)` from the top-level functions
//!   in [`crate::convert`]. Nothing is fatal to the process.
//!
//! * [`ResolveError`] is **never surfaced**. An image or QR resource could not
//!   be loaded. The resolver logs it, reports it through
//!   [`crate::progress::KanbanProgressCallback::on_image_failed`], and substitutes a
//!   placeholder. Row validation only turns it into a row error when the
//!   reachability check is switched on.
//!
//! * [`PaletteError`] is a refused department palette operation.
//!
//! Row-level validation problems are plain messages collected into
//! [`crate::model::RowError`]; they are data, not errors.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the kanban-cards library.
#[derive(Debug, Error)]
pub enum KanbanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input spreadsheet was not found at the given path.
    #[error("Spreadsheet not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but is not a spreadsheet calamine understands.
    #[error("Error processing spreadsheet: {detail}")]
    UnreadableSpreadsheet { detail: String },

    /// The workbook has no sheets, or its first sheet has no header row.
    #[error("Spreadsheet has no header row")]
    EmptySpreadsheet,

    /// Every row failed validation; there is nothing to render.
    #[error("No valid rows to generate documents from ({invalid} rows had errors)")]
    NoValidRows { invalid: usize },

    // ── Layout / document errors ──────────────────────────────────────────
    /// The item is larger than the usable page area, so zero items fit.
    #[error(
        "A {item_width}×{item_height}pt item does not fit on a {page_width}×{page_height}pt page \
         with {margin}pt margins"
    )]
    ItemDoesNotFit {
        item_width: f32,
        item_height: f32,
        page_width: f32,
        page_height: f32,
        margin: f32,
    },

    /// printpdf failed while assembling or serialising a document.
    #[error("Failed to generate {document} PDF: {detail}")]
    PdfGeneration { document: String, detail: String },

    /// rust_xlsxwriter failed while building the template workbook.
    #[error("Failed to generate template: {0}")]
    Template(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The operation was cancelled through its [`crate::cancel::CancelToken`].
    #[error("Operation cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single image or QR resource could not be loaded.
///
/// Recovered locally by substituting a placeholder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("request failed: {0}")]
    Http(String),

    #[error("server answered HTTP {0}")]
    Status(u16),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("content type {0:?} is not an image")]
    NotAnImage(Option<String>),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("could not encode QR code: {0}")]
    QrEncode(String),

    #[error("cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Whether another attempt at the same URL could succeed.
    ///
    /// Timeouts, connection failures, 5xx, 408 and 429 are retried. Client
    /// errors and content that is missing or not an image fail the same way
    /// every time, so the retry loop goes straight to the placeholder.
    pub fn is_transient(&self) -> bool {
        match self {
            ResolveError::Timeout { .. } | ResolveError::Http(_) => true,
            ResolveError::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            ResolveError::NotFound(_)
            | ResolveError::NotAnImage(_)
            | ResolveError::Decode(_)
            | ResolveError::UnsupportedScheme(_)
            | ResolveError::Malformed(_)
            | ResolveError::QrEncode(_)
            | ResolveError::Cancelled => false,
        }
    }
}

/// A refused department palette operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("'{0}' is not a hex colour (#rgb or #rrggbb)")]
    InvalidColor(String),

    #[error("department name must not be blank")]
    EmptyName,

    #[error("department '{0}' already exists")]
    DuplicateDepartment(String),

    #[error("department '{0}' does not exist")]
    UnknownDepartment(String),

    #[error("department '{0}' is a default department and cannot be removed")]
    DefaultDepartment(String),
}
