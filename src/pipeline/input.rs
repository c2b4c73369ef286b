//! Spreadsheet input: read the first sheet of a workbook into a [`RawSheet`].
//!
//! calamine detects the format (xlsx, xlsm, xlsb, xls, ods) from the
//! extension for paths and from the content for in-memory bytes. Parsing is
//! CPU-bound and synchronous, so it runs inside `spawn_blocking`.
//!
//! Any failure here is fatal for the import: no row is processed from a
//! workbook that could not be read in full.

use crate::error::KanbanError;
use crate::pipeline::normalize::{RawCell, RawSheet};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check the path exists and is readable before handing it to calamine, so
/// the caller gets a specific error instead of a parse failure.
fn check_readable(path: &Path) -> Result<(), KanbanError> {
    if !path.exists() {
        return Err(KanbanError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(KanbanError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(KanbanError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Read the first sheet of the workbook at `path`.
pub async fn read_path(path: &Path) -> Result<RawSheet, KanbanError> {
    check_readable(path)?;
    let path: PathBuf = path.to_path_buf();
    info!("Reading spreadsheet: {}", path.display());

    tokio::task::spawn_blocking(move || {
        let workbook = open_workbook_auto(&path).map_err(|e| KanbanError::UnreadableSpreadsheet {
            detail: e.to_string(),
        })?;
        first_sheet(workbook)
    })
    .await
    .map_err(|e| KanbanError::Internal(format!("spreadsheet reader panicked: {e}")))?
}

/// Read the first sheet of a workbook held in memory (an upload).
pub async fn read_bytes(bytes: Vec<u8>) -> Result<RawSheet, KanbanError> {
    debug!("Reading spreadsheet from {} bytes", bytes.len());
    tokio::task::spawn_blocking(move || {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
            KanbanError::UnreadableSpreadsheet {
                detail: e.to_string(),
            }
        })?;
        first_sheet(workbook)
    })
    .await
    .map_err(|e| KanbanError::Internal(format!("spreadsheet reader panicked: {e}")))?
}

fn first_sheet<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<RawSheet, KanbanError> {
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(KanbanError::EmptySpreadsheet)?;
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| KanbanError::UnreadableSpreadsheet {
            detail: format!("sheet '{name}': {e}"),
        })?;
    let sheet = range_to_sheet(&range);
    if sheet.rows.is_empty() {
        return Err(KanbanError::EmptySpreadsheet);
    }
    debug!(
        "Sheet '{}': {} grid rows starting at row {}",
        name,
        sheet.rows.len(),
        sheet.first_row
    );
    Ok(sheet)
}

fn range_to_sheet(range: &Range<Data>) -> RawSheet {
    let first_row = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let rows = range
        .rows()
        .map(|cells| cells.iter().map(to_raw_cell).collect())
        .collect();
    RawSheet { first_row, rows }
}

fn to_raw_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        // Dates are kept as their serial value, the same as a number cell.
        Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
    }
}
