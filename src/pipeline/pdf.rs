//! PDF export of cards and labels with printpdf.
//!
//! Coordinates in this module are points measured from the top-left of the
//! page, like [`DocumentLayout`]; [`Canvas`] flips them into PDF space
//! (millimetres from the bottom-left) at the last moment.
//!
//! Images are fetched first (concurrently, deduplicated by URL), then the
//! whole document is drawn inside `spawn_blocking`: printpdf's document
//! handle is not `Send`, and drawing is CPU-bound.

use crate::cancel::CancelToken;
use crate::config::KanbanConfig;
use crate::error::KanbanError;
use crate::model::{CanonicalRow, DocumentType, ImageKind, ImageReference};
use crate::palette::{DepartmentPalette, HexColor};
use crate::pipeline::render::{CardContent, DocumentLayout, LabelContent, PlacedItem};
use crate::pipeline::resolve::{LoadedImage, Resolver};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject,
    IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Polygon, Px, Rgb,
};
use std::collections::HashMap;
use tracing::{debug, info};

const PT_TO_MM: f32 = 25.4 / 72.0;

// ── Palette and type scale ───────────────────────────────────────────────

const PRIMARY: HexColor = HexColor::new(0x1A, 0x19, 0x1C);
const SECONDARY: HexColor = HexColor::new(0x4B, 0x55, 0x63);
const WHITE: HexColor = HexColor::new(0xFF, 0xFF, 0xFF);
const BG_LIGHT: HexColor = HexColor::new(0xF9, 0xFA, 0xFB);
const BORDER: HexColor = HexColor::new(0xE5, 0xE7, 0xEB);
const POINT_BG: HexColor = HexColor::new(0xFE, 0xE2, 0xE2);
const POINT_TEXT: HexColor = HexColor::new(0xDC, 0x26, 0x26);
const QTY_BG: HexColor = HexColor::new(0xDB, 0xEA, 0xFE);
const QTY_TEXT: HexColor = HexColor::new(0x25, 0x63, 0xEB);

const TITLE_SIZE: f32 = 12.0;
const PART_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 9.0;
const SMALL_SIZE: f32 = 8.0;
const VALUE_SIZE: f32 = 12.0;

/// Space between an item's slot and its drawn outline.
const GUTTER: f32 = 4.0;
const ACCENT_WIDTH: f32 = 4.0;
const PADDING: f32 = 8.0;

/// A finished PDF and the layout it was drawn from.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub document: DocumentType,
    pub layout: DocumentLayout,
    pub bytes: Vec<u8>,
}

// ── Text fitting ─────────────────────────────────────────────────────────

/// Rough Helvetica advance width as a fraction of the font size.
fn char_width(size: f32, bold: bool) -> f32 {
    size * if bold { 0.56 } else { 0.5 }
}

fn max_chars(width: f32, size: f32, bold: bool) -> usize {
    (width / char_width(size, bold)).floor().max(1.0) as usize
}

/// Cut `text` to fit `width`, ending with `...` when shortened.
fn truncate(text: &str, width: f32, size: f32, bold: bool) -> String {
    let limit = max_chars(width, size, bold);
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Greedy word wrap into at most `max_lines` lines.
fn wrap(text: &str, width: f32, size: f32, max_lines: usize) -> Vec<String> {
    let limit = max_chars(width, size, false);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > limit && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let shortened = truncate(&format!("{last} ..."), width, size, false);
            *last = if shortened.ends_with("...") {
                shortened
            } else {
                format!("{last}...")
            };
        }
    }
    lines
        .into_iter()
        .map(|l| truncate(&l, width, size, false))
        .collect()
}

// ── Canvas ───────────────────────────────────────────────────────────────

fn pdf_color(c: HexColor) -> Color {
    let (r, g, b) = c.unit();
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn mm(pt: f32) -> Mm {
    Mm(pt * PT_TO_MM)
}

/// Drawing surface for one page, in top-left point coordinates.
struct Canvas<'a> {
    layer: PdfLayerReference,
    page_height: f32,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
}

impl Canvas<'_> {
    fn point(&self, x: f32, y: f32) -> (Point, bool) {
        (Point::new(mm(x), mm(self.page_height - y)), false)
    }

    fn rect(&self, x: f32, y: f32, w: f32, h: f32, fill: Option<HexColor>, stroke: Option<HexColor>) {
        let points = vec![
            self.point(x, y),
            self.point(x + w, y),
            self.point(x + w, y + h),
            self.point(x, y + h),
        ];
        if let Some(fill) = fill {
            self.layer.set_fill_color(pdf_color(fill));
            self.layer.add_polygon(Polygon {
                rings: vec![points.clone()],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
        }
        if let Some(stroke) = stroke {
            self.layer.set_outline_color(pdf_color(stroke));
            self.layer.set_outline_thickness(0.75);
            self.layer.add_line(Line {
                points,
                is_closed: true,
            });
        }
    }

    fn hline(&self, x1: f32, x2: f32, y: f32, color: HexColor) {
        self.layer.set_outline_color(pdf_color(color));
        self.layer.set_outline_thickness(0.75);
        self.layer.add_line(Line {
            points: vec![self.point(x1, y), self.point(x2, y)],
            is_closed: false,
        });
    }

    /// Draw one line of text whose top edge is at `top`.
    fn text(&self, text: &str, size: f32, x: f32, top: f32, bold: bool, color: HexColor) {
        if text.is_empty() {
            return;
        }
        self.layer.set_fill_color(pdf_color(color));
        let baseline = top + size * 0.8;
        let font = if bold { self.bold } else { self.regular };
        self.layer
            .use_text(text, size, mm(x), mm(self.page_height - baseline), font);
    }

    /// Fit `img` inside the box, centred, keeping its aspect ratio.
    fn image(&self, img: &DynamicImage, x: f32, y: f32, w: f32, h: f32) {
        let rgba = img.to_rgba8();
        let (width_px, height_px) = rgba.dimensions();
        if width_px == 0 || height_px == 0 {
            return;
        }

        // Composite against white; the PDF image has no alpha channel.
        let mut raw = Vec::with_capacity((width_px * height_px * 3) as usize);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as f32 / 255.0;
            for c in [r, g, b] {
                raw.push((c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8);
            }
        }

        let aspect = width_px as f32 / height_px as f32;
        let (fw, fh) = if w / h > aspect {
            (h * aspect, h)
        } else {
            (w, w / aspect)
        };
        let left = x + (w - fw) / 2.0;
        let bottom = y + (h + fh) / 2.0;

        let image = Image::from(ImageXObject {
            width: Px(width_px as usize),
            height: Px(height_px as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: false,
            image_data: raw,
            image_filter: None,
            clipping_bbox: None,
            smask: None,
        });
        // DPI that makes `width_px` pixels span `fw` points.
        let dpi = width_px as f32 * 72.0 / fw;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(left)),
                translate_y: Some(mm(self.page_height - bottom)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }
}

// ── Cards and labels ─────────────────────────────────────────────────────

fn draw_card(
    canvas: &Canvas<'_>,
    slot: &PlacedItem,
    card: &CardContent,
    qr: &DynamicImage,
    product: &DynamicImage,
) {
    let x = slot.x + GUTTER;
    let y = slot.y + GUTTER;
    let w = slot.width - 2.0 * GUTTER;
    let h = slot.height - 2.0 * GUTTER;

    canvas.rect(x, y, w, h, Some(WHITE), Some(BORDER));
    canvas.rect(x, y, ACCENT_WIDTH, h, Some(card.shades.base), None);

    let cx = x + ACCENT_WIDTH + PADDING;
    let cw = w - ACCENT_WIDTH - 2.0 * PADDING;

    // Header: title and part number left, QR right.
    let header_h = 62.0;
    let qr_size = 48.0;
    canvas.rect(x + ACCENT_WIDTH, y, w - ACCENT_WIDTH, header_h, Some(BG_LIGHT), None);
    canvas.hline(x + ACCENT_WIDTH, x + w, y + header_h, card.shades.border);
    canvas.rect(cx + cw - qr_size, y + 7.0, qr_size, qr_size, Some(WHITE), None);
    canvas.image(qr, cx + cw - qr_size, y + 7.0, qr_size, qr_size);

    let title_w = cw - qr_size - PADDING;
    canvas.text(
        &truncate(&card.product_name, title_w, TITLE_SIZE, true),
        TITLE_SIZE,
        cx,
        y + 12.0,
        true,
        PRIMARY,
    );
    canvas.text(
        &truncate(&card.part_number, title_w, PART_SIZE, false),
        PART_SIZE,
        cx,
        y + 30.0,
        false,
        SECONDARY,
    );

    let mut top = y + header_h + 8.0;
    for line in wrap(&card.description, cw, BODY_SIZE, 3) {
        canvas.text(&line, BODY_SIZE, cx, top, false, SECONDARY);
        top += BODY_SIZE + 2.0;
    }
    top = y + header_h + 8.0 + 3.0 * (BODY_SIZE + 2.0) + 6.0;

    // Reorder boxes.
    let box_w = (cw - 6.0) / 2.0;
    let box_h = 40.0;
    for (i, (label, value, bg, fg)) in [
        ("Reorder Point", &card.reorder_point, POINT_BG, POINT_TEXT),
        ("Reorder QTY", &card.reorder_quantity, QTY_BG, QTY_TEXT),
    ]
    .into_iter()
    .enumerate()
    {
        let bx = cx + i as f32 * (box_w + 6.0);
        canvas.rect(bx, top, box_w, box_h, Some(bg), None);
        canvas.text(label, SMALL_SIZE, bx + 6.0, top + 6.0, false, SECONDARY);
        canvas.text(
            &truncate(value, box_w - 12.0, VALUE_SIZE, true),
            VALUE_SIZE,
            bx + 6.0,
            top + 20.0,
            true,
            fg,
        );
    }
    top += box_h + 6.0;

    // Location and department.
    for (label, value) in [("Location: ", &card.location), ("Department: ", &card.department)] {
        canvas.rect(cx, top, cw, 18.0, Some(BG_LIGHT), None);
        canvas.text(label, BODY_SIZE, cx + 5.0, top + 5.0, true, PRIMARY);
        let label_w = label.len() as f32 * char_width(BODY_SIZE, true);
        canvas.text(
            &truncate(value, cw - 10.0 - label_w, BODY_SIZE, false),
            BODY_SIZE,
            cx + 5.0 + label_w,
            top + 5.0,
            false,
            PRIMARY,
        );
        top += 22.0;
    }

    // Product image.
    let footer_h = 16.0;
    let image_h = (y + h - footer_h - top - 4.0).clamp(24.0, 96.0);
    canvas.rect(cx, top, cw, image_h, Some(BG_LIGHT), Some(BORDER));
    canvas.image(product, cx + 4.0, top + 4.0, cw - 8.0, image_h - 8.0);

    let footer = format!("Rev {}  |  {}", card.revision_number, card.revision_date);
    canvas.text(
        &truncate(&footer, cw, SMALL_SIZE, false),
        SMALL_SIZE,
        cx,
        y + h - footer_h + 4.0,
        false,
        SECONDARY,
    );
}

fn draw_label(canvas: &Canvas<'_>, slot: &PlacedItem, label: &LabelContent, product: &DynamicImage) {
    let x = slot.x + GUTTER;
    let y = slot.y + GUTTER;
    let w = slot.width - 2.0 * GUTTER;
    let h = slot.height - 2.0 * GUTTER;

    canvas.rect(x, y, w, h, Some(WHITE), Some(BORDER));
    canvas.rect(x, y, ACCENT_WIDTH, h, Some(label.accent), None);

    let image_size = h - 8.0;
    let image_x = x + w - 4.0 - image_size;
    canvas.image(product, image_x, y + 4.0, image_size, image_size);

    let tx = x + ACCENT_WIDTH + PADDING;
    let tw = image_x - tx - 4.0;
    canvas.text(
        &truncate(&label.product_name, tw, PART_SIZE, true),
        PART_SIZE,
        tx,
        y + h / 2.0 - PART_SIZE - 1.0,
        true,
        PRIMARY,
    );
    canvas.text(
        &truncate(&label.part_number, tw, BODY_SIZE, false),
        BODY_SIZE,
        tx,
        y + h / 2.0 + 2.0,
        false,
        SECONDARY,
    );
}

// ── Document assembly ────────────────────────────────────────────────────

enum Units {
    Cards(Vec<CardContent>),
    Labels(Vec<LabelContent>),
}

type ImageMap = HashMap<(ImageKind, String), DynamicImage>;

fn lookup<'a>(
    images: &'a ImageMap,
    fallback: &'a DynamicImage,
    kind: ImageKind,
    url: &str,
) -> &'a DynamicImage {
    images.get(&(kind, url.to_string())).unwrap_or(fallback)
}

fn draw_document(
    layout: &DocumentLayout,
    units: &Units,
    images: &ImageMap,
) -> Result<Vec<u8>, KanbanError> {
    let document = layout.document;
    let fail = |detail: String| KanbanError::PdfGeneration {
        document: document.to_string(),
        detail,
    };
    let title = match document {
        DocumentType::Cards => "Kanban Cards",
        DocumentType::Labels => "Bin Labels",
    };
    let page_w = mm(layout.page_size.width);
    let page_h = mm(layout.page_size.height);

    let (doc, first_page, first_layer) = PdfDocument::new(title, page_w, page_h, "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| fail(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| fail(e.to_string()))?;

    let product_placeholder = LoadedImage::placeholder(ImageKind::Product).image;
    let qr_placeholder = LoadedImage::placeholder(ImageKind::Qr).image;

    for page in &layout.pages {
        let layer = if page.index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(page_w, page_h, "Layer 1");
            doc.get_page(p).get_layer(l)
        };
        let canvas = Canvas {
            layer,
            page_height: layout.page_size.height,
            regular: &regular,
            bold: &bold,
        };
        for slot in &page.items {
            match units {
                Units::Cards(cards) => {
                    let card = &cards[slot.row_index];
                    draw_card(
                        &canvas,
                        slot,
                        card,
                        lookup(images, &qr_placeholder, ImageKind::Qr, &card.qr_url),
                        lookup(images, &product_placeholder, ImageKind::Product, &card.image_url),
                    );
                }
                Units::Labels(labels) => {
                    let label = &labels[slot.row_index];
                    let product =
                        lookup(images, &product_placeholder, ImageKind::Product, &label.image_url);
                    draw_label(&canvas, slot, label, product);
                }
            }
        }
    }

    doc.save_to_bytes().map_err(|e| fail(e.to_string()))
}

/// Render `rows` as one PDF document of `document` type.
pub async fn render_document(
    document: DocumentType,
    rows: &[CanonicalRow],
    palette: &DepartmentPalette,
    resolver: &Resolver,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<RenderedDocument, KanbanError> {
    if rows.is_empty() {
        return Err(KanbanError::NoValidRows { invalid: 0 });
    }
    let layout = DocumentLayout::build(document, rows.len(), config.page_size, config.page_margin)?;
    info!(
        "Rendering {} {} on {} page(s)",
        rows.len(),
        document,
        layout.pages.len()
    );

    let today = chrono::Local::now().date_naive();
    let (units, references) = collect_units(document, rows, palette, resolver, today);

    let loaded: Vec<((ImageKind, String), LoadedImage)> = stream::iter(references)
        .map(|reference| async move {
            let image = match reference.kind {
                ImageKind::Qr => resolver.load_qr(&reference.url, cancel).await,
                ImageKind::Product => resolver.load(&reference, cancel).await,
            };
            ((reference.kind, reference.url), image)
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    if cancel.is_cancelled() {
        return Err(KanbanError::Cancelled);
    }
    let placeholders = loaded.iter().filter(|(_, l)| l.is_placeholder).count();
    debug!(
        "{} image(s) loaded for {}, {} placeholder(s)",
        loaded.len(),
        document,
        placeholders
    );
    let images: ImageMap = loaded
        .into_iter()
        .map(|(key, l)| (key, l.image))
        .collect();

    let draw_layout = layout.clone();
    let bytes = tokio::task::spawn_blocking(move || draw_document(&draw_layout, &units, &images))
        .await
        .map_err(|e| KanbanError::Internal(format!("PDF renderer panicked: {e}")))??;

    info!("Rendered {} PDF: {} bytes", document, bytes.len());
    Ok(RenderedDocument {
        document,
        layout,
        bytes,
    })
}

/// Build the per-row content and the distinct images it needs.
fn collect_units(
    document: DocumentType,
    rows: &[CanonicalRow],
    palette: &DepartmentPalette,
    resolver: &Resolver,
    today: NaiveDate,
) -> (Units, Vec<ImageReference>) {
    let mut seen = std::collections::HashSet::new();
    let mut references = Vec::new();
    let mut want = |kind: ImageKind, url: &str| {
        if seen.insert((kind, url.to_string())) {
            references.push(ImageReference::new(url, kind));
        }
    };
    let units = match document {
        DocumentType::Cards => {
            let cards: Vec<CardContent> = rows
                .iter()
                .map(|row| CardContent::from_row(row, palette, resolver, today))
                .collect();
            for card in &cards {
                want(ImageKind::Qr, &card.qr_url);
                want(ImageKind::Product, &card.image_url);
            }
            Units::Cards(cards)
        }
        DocumentType::Labels => {
            let labels: Vec<LabelContent> = rows
                .iter()
                .map(|row| LabelContent::from_row(row, palette, resolver))
                .collect();
            for label in &labels {
                want(ImageKind::Product, &label.image_url);
            }
            Units::Labels(labels)
        }
    };
    (units, references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    fn row(n: usize) -> CanonicalRow {
        CanonicalRow::default()
            .with(Field::ProductName, format!("Widget {n}"))
            .with(Field::PartNumber, format!("w-{n}"))
            .with(Field::Description, "A widget used in tests to exercise wrapping of longer text")
            .with(Field::ReorderPoint, "5")
            .with(Field::ReorderQuantity, "20")
            .with(Field::Location, "Bin 3")
            .with(Field::Department, "Quality")
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 100.0, 10.0, false), "short");
        let t = truncate(&"x".repeat(100), 50.0, 10.0, false);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), 10);
    }

    #[test]
    fn wrap_limits_lines() {
        let lines = wrap(&"word ".repeat(60), 100.0, 10.0, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with("..."));
        for line in &lines {
            assert!(line.chars().count() <= 20, "too long: {line}");
        }
        assert!(wrap("", 100.0, 10.0, 3).is_empty());
    }

    #[tokio::test]
    async fn renders_cards_and_labels() {
        let config = KanbanConfig::default();
        let resolver = Resolver::new(&config).unwrap();
        let palette = DepartmentPalette::new();
        let rows: Vec<CanonicalRow> = (0..5).map(row).collect();

        for document in [DocumentType::Cards, DocumentType::Labels] {
            let rendered = render_document(
                document,
                &rows,
                &palette,
                &resolver,
                &config,
                &CancelToken::new(),
            )
            .await
            .unwrap();
            assert!(rendered.bytes.starts_with(b"%PDF"));
            assert_eq!(rendered.layout.item_count(), 5);
        }
    }

    #[tokio::test]
    async fn empty_rows_are_refused() {
        let config = KanbanConfig::default();
        let resolver = Resolver::new(&config).unwrap();
        let err = render_document(
            DocumentType::Labels,
            &[],
            &DepartmentPalette::new(),
            &resolver,
            &config,
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, KanbanError::NoValidRows { .. }));
    }
}
