//! Page layout: how many fixed-size items fit on a page, and which rows go
//! on which page.
//!
//! Pure arithmetic over points (1/72 in). Items are laid out in a grid
//! anchored at the top-left of the usable area, left to right and then top
//! to bottom; rows are never reordered, grouped or balanced across pages.

use crate::error::KanbanError;
use crate::model::DocumentType;
use serde::{Deserialize, Serialize};

/// A width/height pair in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// The area left after removing `margin` from every side.
    pub fn inset(self, margin: f32) -> Size {
        Size {
            width: self.width - 2.0 * margin,
            height: self.height - 2.0 * margin,
        }
    }
}

/// US Letter, portrait.
pub const LETTER: Size = Size::new(612.0, 792.0);

/// Half an inch.
pub const PAGE_MARGIN: f32 = 36.0;

/// Kanban card: 3 × 5 in.
pub const CARD_SIZE: Size = Size::new(216.0, 360.0);

/// Bin label: 3 × 1 in.
pub const LABEL_SIZE: Size = Size::new(216.0, 72.0);

impl DocumentType {
    /// Physical size of one item of this document type.
    pub fn item_size(self) -> Size {
        match self {
            DocumentType::Cards => CARD_SIZE,
            DocumentType::Labels => LABEL_SIZE,
        }
    }
}

/// Grid dimensions of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub columns: usize,
    pub rows: usize,
}

impl Grid {
    pub fn capacity(self) -> usize {
        self.columns * self.rows
    }
}

/// Compute the item grid for a page, failing when not even one item fits.
pub fn grid(page: Size, item: Size, margin: f32) -> Result<Grid, KanbanError> {
    let usable = page.inset(margin);
    let fit = |avail: f32, len: f32| -> usize {
        if len <= 0.0 || avail < len {
            0
        } else {
            (avail / len).floor() as usize
        }
    };
    let grid = Grid {
        columns: fit(usable.width, item.width),
        rows: fit(usable.height, item.height),
    };
    if grid.capacity() == 0 {
        return Err(KanbanError::ItemDoesNotFit {
            item_width: item.width,
            item_height: item.height,
            page_width: page.width,
            page_height: page.height,
            margin,
        });
    }
    Ok(grid)
}

/// `floor(usableWidth / itemWidth) * floor(usableHeight / itemHeight)`.
pub fn items_per_page(page: Size, item: Size, margin: f32) -> Result<usize, KanbanError> {
    grid(page, item, margin).map(Grid::capacity)
}

/// One physical page: its 0-based index and the slice of items on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub index: usize,
    pub items: &'a [T],
}

/// Slice `items` into consecutive pages of `items_per_page` each.
///
/// Page `k` holds `items[k * n .. (k + 1) * n]`; the last page may be short.
/// An empty input yields no pages.
pub fn paginate<T>(
    items: &[T],
    page: Size,
    item: Size,
    margin: f32,
) -> Result<Vec<Page<'_, T>>, KanbanError> {
    let per_page = items_per_page(page, item, margin)?;
    Ok(items
        .chunks(per_page)
        .enumerate()
        .map(|(index, items)| Page { index, items })
        .collect())
}

/// `ceil(n / items_per_page)`.
pub fn page_count(n: usize, items_per_page: usize) -> usize {
    n.div_ceil(items_per_page.max(1))
}
