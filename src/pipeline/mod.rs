//! Pipeline stages from spreadsheet to printable document.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ validate ──▶ render ──▶ pdf / print ──▶ export
//! (calamine)  (headers)    (rows)      (layout)   (printpdf/HTML)  (files)
//!                             │            │
//!                             └─ resolve ──┘   paginate
//! ```
//!
//! 1. [`input`]     read the first sheet of an xlsx/xls/ods workbook;
//!    runs in `spawn_blocking` because calamine is synchronous
//! 2. [`normalize`] map header spellings to canonical field names
//! 3. [`validate`]  required, numeric and URL checks, collected per row
//! 4. [`resolve`]   image and QR URLs, placeholders, retrying loads
//! 5. [`paginate`]  items-per-page arithmetic
//! 6. [`render`]    per-item content and page placement
//! 7. [`pdf`]       draw the layout with printpdf
//! 8. [`print`]     the same content as self-printing HTML
//! 9. [`export`]    timestamped, atomic file writes

pub mod export;
pub mod input;
pub mod normalize;
pub mod paginate;
pub mod pdf;
pub mod print;
pub mod render;
pub mod resolve;
pub mod validate;
