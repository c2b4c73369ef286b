//! The reference spreadsheet users fill in.

use crate::error::KanbanError;
use rust_xlsxwriter::{Format, Workbook};

/// Download name of the template workbook.
pub const TEMPLATE_FILENAME: &str = "kanban-card-template.xlsx";

/// MIME type of the template workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Header row, in column order.
pub const TEMPLATE_HEADERS: [&str; 9] = [
    "Product Name",
    "Part Number",
    "Description",
    "QR Code URL",
    "Reorder Point",
    "Reorder Quantity",
    "Location",
    "Department",
    "Image URL (Optional)",
];

/// The sample row under the headers.
pub const TEMPLATE_SAMPLE: [&str; 9] = [
    "Example Product",
    "PART-001",
    "Product description here",
    "https://example.com/qr/PART-001",
    "10",
    "50",
    "Shelf A-1",
    "Hardware",
    "https://example.com/images/PART-001.jpg",
];

const SHEET_NAME: &str = "Template";
const COLUMN_WIDTH: f64 = 20.0;

/// Build the template workbook in memory.
pub fn generate_template() -> Result<Vec<u8>, KanbanError> {
    let fail = |e: rust_xlsxwriter::XlsxError| KanbanError::Template(e.to_string());
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet().set_name(SHEET_NAME).map_err(fail)?;
    for (col, (header, sample)) in TEMPLATE_HEADERS.iter().zip(TEMPLATE_SAMPLE).enumerate() {
        let col = col as u16;
        sheet
            .write_string_with_format(0, col, *header, &bold)
            .map_err(fail)?;
        sheet.write_string(1, col, sample).map_err(fail)?;
        sheet.set_column_width(col, COLUMN_WIDTH).map_err(fail)?;
    }

    workbook.save_to_buffer().map_err(fail)
}
