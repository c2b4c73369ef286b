//! # kanban-cards
//!
//! Turn spreadsheet part data into printable kanban cards and bin labels.
//!
//! Each spreadsheet row becomes one 3×5 in card (product, part number,
//! description, reorder point and quantity, location, department colour,
//! QR code, product image) and one 3×1 in bin label (product, part number,
//! image, department colour). Documents are written as PDF or as
//! self-printing HTML.
//!
//! ## Pipeline Overview
//!
//! ```text
//! spreadsheet
//!  │
//!  ├─ 1. Input      first sheet via calamine (spawn_blocking)
//!  ├─ 2. Normalize  header spellings → canonical fields
//!  ├─ 3. Validate   required / numeric / URL checks, per row, order kept
//!  ├─ 4. Resolve    image + QR URLs, placeholders, bounded retries
//!  ├─ 5. Paginate   items per page, page slices
//!  ├─ 6. Render     printpdf PDF or print HTML
//!  └─ 7. Export     kanban-<type>-<epoch-ms>.pdf, atomic writes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kanban_cards::{import_and_export, CancelToken, DepartmentPalette, ExportTarget, KanbanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KanbanConfig::default();
//!     let palette = DepartmentPalette::new();
//!     let summary = import_and_export(
//!         "parts.xlsx",
//!         ExportTarget::Both,
//!         &palette,
//!         "out",
//!         &config,
//!         &CancelToken::new(),
//!     )
//!     .await?;
//!     for error in &summary.outcome.errors {
//!         eprintln!("row {}: {}", error.row, error.errors.join("; "));
//!     }
//!     println!("wrote {:?}", summary.files);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `kanban` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! kanban-cards = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod palette;
pub mod pipeline;
pub mod progress;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancelToken;
pub use config::{KanbanConfig, KanbanConfigBuilder, QrSource};
pub use convert::{
    export_documents, export_print, generate_documents, import_and_export, import_from_bytes,
    import_spreadsheet, import_spreadsheet_sync, print_html, ExportSummary,
};
pub use error::{KanbanError, PaletteError, ResolveError};
pub use model::{
    CanonicalRow, DocumentType, ExportTarget, Field, ImageKind, ImageReference, RowError,
    SheetRow, ValidationOutcome,
};
pub use palette::{Department, DepartmentPalette, HexColor, Shades};
pub use pipeline::paginate::{Size, CARD_SIZE, LABEL_SIZE, LETTER, PAGE_MARGIN};
pub use pipeline::pdf::RenderedDocument;
pub use progress::{KanbanProgressCallback, NoopProgressCallback, ProgressCallback};
pub use template::{generate_template, TEMPLATE_FILENAME};
