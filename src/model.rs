//! Row and document types shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the recognised canonical field names.
///
/// Spreadsheet headers are normalised and matched against
/// [`Field::as_str`]; any other column is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ProductName,
    PartNumber,
    Description,
    QrCodeUrl,
    ReorderPoint,
    ReorderQuantity,
    Location,
    Department,
    ImageUrl,
    DepartmentColor,
    RevisionDate,
    RevisionNumber,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::ProductName,
        Field::PartNumber,
        Field::Description,
        Field::QrCodeUrl,
        Field::ReorderPoint,
        Field::ReorderQuantity,
        Field::Location,
        Field::Department,
        Field::ImageUrl,
        Field::DepartmentColor,
        Field::RevisionDate,
        Field::RevisionNumber,
    ];

    /// Fields that must be present and non-blank for a row to be valid.
    pub const REQUIRED: [Field; 7] = [
        Field::ProductName,
        Field::PartNumber,
        Field::Description,
        Field::ReorderPoint,
        Field::ReorderQuantity,
        Field::Location,
        Field::Department,
    ];

    pub const NUMERIC: [Field; 2] = [Field::ReorderPoint, Field::ReorderQuantity];

    pub const URL: [Field; 2] = [Field::QrCodeUrl, Field::ImageUrl];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::ProductName => "product_name",
            Field::PartNumber => "part_number",
            Field::Description => "description",
            Field::QrCodeUrl => "qr_code_url",
            Field::ReorderPoint => "reorder_point",
            Field::ReorderQuantity => "reorder_quantity",
            Field::Location => "location",
            Field::Department => "department",
            Field::ImageUrl => "image_url",
            Field::DepartmentColor => "department_color",
            Field::RevisionDate => "revision_date",
            Field::RevisionNumber => "revision_number",
        }
    }

    /// Match an already-normalised header against the recognised names.
    pub fn from_header(normalized: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.as_str() == normalized)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spreadsheet row normalised to the fixed recognised field set.
///
/// Quantities stay strings: they are printed verbatim and only checked for
/// being numeric by the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reorder_quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_number: Option<String>,
}

impl CanonicalRow {
    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::ProductName => &self.product_name,
            Field::PartNumber => &self.part_number,
            Field::Description => &self.description,
            Field::QrCodeUrl => &self.qr_code_url,
            Field::ReorderPoint => &self.reorder_point,
            Field::ReorderQuantity => &self.reorder_quantity,
            Field::Location => &self.location,
            Field::Department => &self.department,
            Field::ImageUrl => &self.image_url,
            Field::DepartmentColor => &self.department_color,
            Field::RevisionDate => &self.revision_date,
            Field::RevisionNumber => &self.revision_number,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::ProductName => &mut self.product_name,
            Field::PartNumber => &mut self.part_number,
            Field::Description => &mut self.description,
            Field::QrCodeUrl => &mut self.qr_code_url,
            Field::ReorderPoint => &mut self.reorder_point,
            Field::ReorderQuantity => &mut self.reorder_quantity,
            Field::Location => &mut self.location,
            Field::Department => &mut self.department,
            Field::ImageUrl => &mut self.image_url,
            Field::DepartmentColor => &mut self.department_color,
            Field::RevisionDate => &mut self.revision_date,
            Field::RevisionNumber => &mut self.revision_number,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// The field's value with surrounding whitespace removed, or `None` when
    /// it is absent or blank.
    pub fn non_blank(&self, field: Field) -> Option<&str> {
        self.get(field).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }
}

/// A canonical row tagged with the spreadsheet line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based spreadsheet row number (the header is row 1).
    pub row_number: usize,
    pub fields: CanonicalRow,
}

impl SheetRow {
    /// Number rows that did not come from a spreadsheet: data row `i`
    /// (0-based) is reported as row `i + 2`, after the header line.
    pub fn number(rows: impl IntoIterator<Item = CanonicalRow>) -> Vec<SheetRow> {
        rows.into_iter()
            .enumerate()
            .map(|(i, fields)| SheetRow {
                row_number: i + 2,
                fields,
            })
            .collect()
    }
}

/// Every validation message for one rejected row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub errors: Vec<String>,
}

/// The result of validating a batch of rows.
///
/// Every input row lands in exactly one of the two sequences, and each
/// sequence keeps input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid_rows: Vec<CanonicalRow>,
    pub errors: Vec<RowError>,
}

impl ValidationOutcome {
    pub fn total(&self) -> usize {
        self.valid_rows.len() + self.errors.len()
    }
}

/// What an image reference points at; selects the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Product,
    Qr,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageKind::Product => "product",
            ImageKind::Qr => "qr",
        })
    }
}

/// A URL to load plus the kind of resource it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub url: String,
    pub kind: ImageKind,
}

impl ImageReference {
    pub fn new(url: impl Into<String>, kind: ImageKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// One printable document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Cards,
    Labels,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Cards => "cards",
            DocumentType::Labels => "labels",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which documents an export should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    Cards,
    Labels,
    #[default]
    Both,
}

impl ExportTarget {
    /// Documents in the order they are produced.
    pub fn documents(self) -> &'static [DocumentType] {
        match self {
            ExportTarget::Cards => &[DocumentType::Cards],
            ExportTarget::Labels => &[DocumentType::Labels],
            ExportTarget::Both => &[DocumentType::Cards, DocumentType::Labels],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_header(field.as_str()), Some(field));
        }
        assert_eq!(Field::from_header("supplier"), None);
    }

    #[test]
    fn non_blank_trims() {
        let row = CanonicalRow::default()
            .with(Field::Location, "  Shelf A-1 ")
            .with(Field::Description, "   ");
        assert_eq!(row.non_blank(Field::Location), Some("Shelf A-1"));
        assert_eq!(row.non_blank(Field::Description), None);
        assert_eq!(row.non_blank(Field::Department), None);
    }

    #[test]
    fn number_offsets_past_header() {
        let rows = SheetRow::number(vec![CanonicalRow::default(), CanonicalRow::default()]);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[1].row_number, 3);
    }

    #[test]
    fn outcome_serialises_camel_case() {
        let outcome = ValidationOutcome {
            valid_rows: vec![],
            errors: vec![RowError {
                row: 2,
                errors: vec!["Missing required field: part_number".into()],
            }],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"validRows\""), "got: {json}");
        assert!(json.contains("\"row\":2"), "got: {json}");
    }

    #[test]
    fn export_target_documents() {
        assert_eq!(
            ExportTarget::Both.documents(),
            &[DocumentType::Cards, DocumentType::Labels]
        );
        assert_eq!(ExportTarget::Labels.documents(), &[DocumentType::Labels]);
    }
}
