//! Field normalisation: raw spreadsheet cells → [`CanonicalRow`]s.
//!
//! The first grid row is the header. Each header is normalised
//! (lower-cased, parentheses stripped, whitespace/underscore runs collapsed
//! to `_`) and matched by name against the recognised [`Field`] set, so
//! column order and header spelling variations do not matter. Columns whose
//! header matches nothing are dropped.
//!
//! Blank data rows are skipped, but row numbers keep counting so a reported
//! row always points at the real spreadsheet line.

use crate::model::{CanonicalRow, Field, SheetRow};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One scalar cell as read from a spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawCell {
    /// The cell as display text, or `None` for an empty cell.
    ///
    /// Whole numbers print without a fractional part, so a part number typed
    /// as `1001` stays `1001` rather than `1001.0`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(s) if s.is_empty() => None,
            RawCell::Text(s) => Some(s.clone()),
            RawCell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            RawCell::Number(n) => Some(n.to_string()),
            RawCell::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::Text(s.to_string())
    }
}

impl From<f64> for RawCell {
    fn from(n: f64) -> Self {
        RawCell::Number(n)
    }
}

/// A sheet as a grid of cells plus the spreadsheet row number of its first
/// grid row (1 unless the used range starts lower down).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSheet {
    pub first_row: usize,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawSheet {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { first_row: 1, rows }
    }
}

static RE_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()]").unwrap());
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());

/// Normalise a free-text header to the canonical `snake_case` form.
///
/// `"Image URL (Optional)"` is special-cased to `image_url`.
pub fn normalize_header(header: &str) -> String {
    let lowered = header.to_lowercase();
    let stripped = RE_PARENS.replace_all(&lowered, " ");
    let collapsed = RE_SEPARATORS.replace_all(stripped.trim(), "_");
    let name = collapsed.trim_matches('_');
    match name {
        "image_url_optional" => Field::ImageUrl.as_str().to_string(),
        other => other.to_string(),
    }
}

/// Map each column index to the field its header names, if any.
pub fn map_headers(header_row: &[RawCell]) -> Vec<Option<Field>> {
    header_row
        .iter()
        .map(|cell| {
            let text = cell.to_text()?;
            let normalized = normalize_header(&text);
            let field = Field::from_header(&normalized);
            if field.is_none() {
                debug!("Ignoring unrecognised column '{}'", text);
            }
            field
        })
        .collect()
}

/// Convert every non-blank data row of `sheet` into a numbered canonical row.
///
/// Returns an empty vector for a sheet with no rows at all; a sheet with a
/// header but no data also yields nothing.
pub fn normalize_sheet(sheet: &RawSheet) -> Vec<SheetRow> {
    let Some((header, data)) = sheet.rows.split_first() else {
        return Vec::new();
    };
    let columns = map_headers(header);

    data.iter()
        .enumerate()
        .filter_map(|(i, cells)| {
            let row_number = sheet.first_row + i + 1;
            let mut fields = CanonicalRow::default();
            let mut any = false;
            for (cell, field) in cells.iter().zip(columns.iter()) {
                let Some(value) = cell.to_text() else {
                    continue;
                };
                any = true;
                if let Some(field) = field {
                    fields.set(*field, value);
                }
            }
            // Cells beyond the header width still make the row non-blank.
            any |= cells
                .iter()
                .skip(columns.len())
                .any(|c| c.to_text().is_some());
            if !any {
                debug!("Skipping blank row {}", row_number);
                return None;
            }
            Some(SheetRow { row_number, fields })
        })
        .collect()
}
