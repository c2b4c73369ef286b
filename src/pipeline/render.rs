//! Document content and layout, independent of the output format.
//!
//! [`CardContent`] and [`LabelContent`] are the display strings and
//! resolved URLs for one unit; [`DocumentLayout`] is where each unit sits on
//! each page. Both PDF export and print HTML are driven from these, so the
//! two outputs agree, and generating the same rows twice yields an identical
//! layout.

use crate::error::KanbanError;
use crate::model::{CanonicalRow, DocumentType, Field, ImageKind};
use crate::palette::{DepartmentPalette, HexColor, Shades};
use crate::pipeline::paginate::{self, Size};
use crate::pipeline::resolve::Resolver;
use chrono::NaiveDate;
use serde::Serialize;

/// Everything printed on one kanban card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardContent {
    pub product_name: String,
    /// Upper-cased for display.
    pub part_number: String,
    pub description: String,
    pub reorder_point: String,
    pub reorder_quantity: String,
    pub location: String,
    pub department: String,
    pub shades: Shades,
    pub qr_url: String,
    pub image_url: String,
    pub revision_date: String,
    pub revision_number: String,
}

/// The reduced content of one bin label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelContent {
    pub product_name: String,
    pub part_number: String,
    pub accent: HexColor,
    pub image_url: String,
}

fn text_or(row: &CanonicalRow, field: Field, default: &str) -> String {
    row.non_blank(field).unwrap_or(default).to_string()
}

fn accent_for(row: &CanonicalRow, palette: &DepartmentPalette) -> HexColor {
    palette.resolve(
        row.non_blank(Field::Department).unwrap_or(""),
        row.non_blank(Field::DepartmentColor),
    )
}

impl CardContent {
    /// Build card content from a (validated) row.
    ///
    /// Missing values fall back to display defaults: `Untitled Product`,
    /// `0` for quantities, `Default` department, today's date and
    /// revision `1`.
    pub fn from_row(
        row: &CanonicalRow,
        palette: &DepartmentPalette,
        resolver: &Resolver,
        today: NaiveDate,
    ) -> Self {
        Self {
            product_name: text_or(row, Field::ProductName, "Untitled Product"),
            part_number: text_or(row, Field::PartNumber, "").to_uppercase(),
            description: text_or(row, Field::Description, ""),
            reorder_point: text_or(row, Field::ReorderPoint, "0"),
            reorder_quantity: text_or(row, Field::ReorderQuantity, "0"),
            location: text_or(row, Field::Location, ""),
            department: text_or(row, Field::Department, "Default"),
            shades: Shades::from_base(accent_for(row, palette)),
            qr_url: resolver.resolve_qr(row),
            image_url: resolver.resolve(
                row.non_blank(Field::ImageUrl).unwrap_or(""),
                ImageKind::Product,
            ),
            revision_date: row
                .non_blank(Field::RevisionDate)
                .map(str::to_string)
                .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
            revision_number: text_or(row, Field::RevisionNumber, "1"),
        }
    }
}

impl LabelContent {
    pub fn from_row(row: &CanonicalRow, palette: &DepartmentPalette, resolver: &Resolver) -> Self {
        Self {
            product_name: text_or(row, Field::ProductName, "Untitled Product"),
            part_number: text_or(row, Field::PartNumber, "").to_uppercase(),
            accent: accent_for(row, palette),
            image_url: resolver.resolve(
                row.non_blank(Field::ImageUrl).unwrap_or(""),
                ImageKind::Product,
            ),
        }
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// One item's slot on a page, in points from the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacedItem {
    /// Index into the row list the layout was built for.
    pub row_index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub index: usize,
    pub items: Vec<PlacedItem>,
}

/// Page-by-page placement of every item of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentLayout {
    pub document: DocumentType,
    pub page_size: Size,
    pub item_size: Size,
    pub items_per_page: usize,
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    /// Lay out `count` items of `document` on pages of `page_size`.
    ///
    /// Items fill a grid from the top-left of the usable area, row by row.
    pub fn build(
        document: DocumentType,
        count: usize,
        page_size: Size,
        margin: f32,
    ) -> Result<Self, KanbanError> {
        let item_size = document.item_size();
        let grid = paginate::grid(page_size, item_size, margin)?;
        let indices: Vec<usize> = (0..count).collect();
        let pages = paginate::paginate(&indices, page_size, item_size, margin)?
            .into_iter()
            .map(|page| PageLayout {
                index: page.index,
                items: page
                    .items
                    .iter()
                    .enumerate()
                    .map(|(slot, &row_index)| PlacedItem {
                        row_index,
                        x: margin + (slot % grid.columns) as f32 * item_size.width,
                        y: margin + (slot / grid.columns) as f32 * item_size.height,
                        width: item_size.width,
                        height: item_size.height,
                    })
                    .collect(),
            })
            .collect();
        Ok(Self {
            document,
            page_size,
            item_size,
            items_per_page: grid.capacity(),
            pages,
        })
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KanbanConfig;
    use crate::pipeline::paginate::{LETTER, PAGE_MARGIN};
    use crate::pipeline::resolve::{is_placeholder, QR_ENDPOINT};

    fn resolver() -> Resolver {
        Resolver::new(&KanbanConfig::default()).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn card_defaults() {
        let row = CanonicalRow::default().with(Field::PartNumber, " part-9 ");
        let card = CardContent::from_row(&row, &DepartmentPalette::new(), &resolver(), today());
        assert_eq!(card.product_name, "Untitled Product");
        assert_eq!(card.part_number, "PART-9");
        assert_eq!(card.reorder_point, "0");
        assert_eq!(card.reorder_quantity, "0");
        assert_eq!(card.department, "Default");
        assert_eq!(card.revision_date, "2026-03-14");
        assert_eq!(card.revision_number, "1");
        assert_eq!(card.shades.base, crate::palette::FALLBACK_COLOR);
        assert!(card.qr_url.starts_with(QR_ENDPOINT));
        assert!(is_placeholder(&card.image_url));
    }

    #[test]
    fn department_colour_precedence() {
        let palette = DepartmentPalette::new();
        let row = CanonicalRow::default().with(Field::Department, "Software");
        let label = LabelContent::from_row(&row, &palette, &resolver());
        assert_eq!(label.accent.to_string(), "#10B981");

        let row = row.with(Field::DepartmentColor, "#123456");
        let label = LabelContent::from_row(&row, &palette, &resolver());
        assert_eq!(label.accent.to_string(), "#123456");
    }

    #[test]
    fn label_layout_grid() {
        let layout = DocumentLayout::build(DocumentType::Labels, 45, LETTER, PAGE_MARGIN).unwrap();
        assert_eq!(layout.items_per_page, 20);
        assert_eq!(layout.pages.len(), 3);
        assert_eq!(layout.item_count(), 45);

        let first = &layout.pages[0].items;
        assert_eq!((first[0].x, first[0].y), (36.0, 36.0));
        assert_eq!((first[1].x, first[1].y), (252.0, 36.0));
        assert_eq!((first[2].x, first[2].y), (36.0, 108.0));
        assert_eq!(layout.pages[2].items[0].row_index, 40);
    }

    #[test]
    fn layout_is_deterministic() {
        let a = DocumentLayout::build(DocumentType::Cards, 9, LETTER, PAGE_MARGIN).unwrap();
        let b = DocumentLayout::build(DocumentType::Cards, 9, LETTER, PAGE_MARGIN).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.pages.len(), 3);
    }
}
