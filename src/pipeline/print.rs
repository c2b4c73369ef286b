//! Self-printing HTML.
//!
//! The same card and label content as the PDF export, rendered as one HTML
//! page per item with print-only CSS: the `@page` size equals the item's
//! physical size, colours are reproduced exactly, every item is followed by
//! a page break, and an inline script opens the print dialog on load and
//! closes the window afterwards.

use crate::config::QrSource;
use crate::error::ResolveError;
use crate::model::{DocumentType, ImageKind};
use crate::pipeline::resolve::{encode_qr, is_placeholder, placeholder_url, qr_payload};
use crate::pipeline::render::{CardContent, LabelContent};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Write as _;
use std::io::Cursor;
use tracing::warn;

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Page size in CSS units for one item of `document`.
fn page_css(document: DocumentType) -> &'static str {
    match document {
        DocumentType::Cards => "3in 5in",
        DocumentType::Labels => "3in 1in",
    }
}

fn img_tag(src: &str, kind: ImageKind, class: &str, alt: &str) -> String {
    format!(
        r#"<img class="{class}" src="{src}" alt="{alt}" onerror="this.onerror=null;this.src='{fallback}'">"#,
        src = escape_html(src),
        alt = escape_html(alt),
        fallback = escape_html(placeholder_url(kind)),
    )
}

/// The `src` for a card's QR graphic.
///
/// With [`QrSource::Local`] the code is encoded here and inlined as a PNG
/// data URL; otherwise the resolved QR URL is linked directly.
pub fn qr_src(resolved: &str, source: QrSource) -> String {
    if is_placeholder(resolved) || source == QrSource::Remote {
        return resolved.to_string();
    }
    let payload = qr_payload(resolved).unwrap_or_else(|| resolved.to_string());
    let encoded = encode_qr(&payload).and_then(|img| {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ResolveError::QrEncode(e.to_string()))?;
        Ok(png)
    });
    match encoded {
        Ok(png) => format!("data:image/png;base64,{}", STANDARD.encode(png)),
        Err(e) => {
            warn!("QR for {} could not be encoded: {}; using placeholder", resolved, e);
            placeholder_url(ImageKind::Qr).to_string()
        }
    }
}

const STYLE: &str = r#"
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: Helvetica, Arial, sans-serif; color: #1A191C; background: white; }
.item { overflow: hidden; background: white; page-break-after: always; break-after: page; position: relative; }
.card { width: 3in; height: 5in; border-left: 4px solid var(--accent); padding: 0 12px 12px 12px; }
.label { width: 3in; height: 1in; border-left: 4px solid var(--accent); padding: 6px 8px 6px 12px; display: flex; align-items: center; justify-content: space-between; }
.header { display: flex; justify-content: space-between; align-items: flex-start; background: #F9FAFB; border-bottom: 1px solid var(--border); margin: 0 -12px 8px -12px; padding: 10px 12px; }
.title { font-size: 12pt; font-weight: bold; }
.part { font-size: 10pt; color: #4B5563; text-transform: uppercase; margin-top: 4px; }
.qr { width: 48pt; height: 48pt; background: white; }
.description { font-size: 9pt; color: #4B5563; height: 36pt; overflow: hidden; margin-bottom: 6px; }
.reorder { display: flex; gap: 6px; margin-bottom: 6px; }
.reorder div { flex: 1; padding: 6px; }
.reorder .point { background: #FEE2E2; color: #DC2626; }
.reorder .qty { background: #DBEAFE; color: #2563EB; }
.reorder span { display: block; font-size: 8pt; color: #4B5563; }
.reorder strong { font-size: 12pt; }
.info { font-size: 9pt; background: #F9FAFB; padding: 4px 6px; margin-bottom: 4px; }
.image { height: 96pt; background: #F9FAFB; border: 1px solid #E5E7EB; padding: 4px; }
.image img, .label img { width: 100%; height: 100%; object-fit: contain; }
.label .thumb { width: 56pt; height: 56pt; flex: none; }
.footer { position: absolute; bottom: 8px; font-size: 8pt; color: #4B5563; }
@media print {
  * { -webkit-print-color-adjust: exact; print-color-adjust: exact; color-adjust: exact; }
}
"#;

fn document_html(document: DocumentType, body: &str) -> String {
    let title = match document {
        DocumentType::Cards => "Kanban Cards",
        DocumentType::Labels => "Bin Labels",
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>\n@page {{ size: {page}; margin: 0; }}{STYLE}</style>\n</head>\n<body>\n{body}\
         <script>\nwindow.onload = function () {{ window.print(); window.close(); }};\n</script>\n\
         </body>\n</html>\n",
        page = page_css(document),
    )
}

/// Render cards as a self-printing HTML document.
pub fn cards_html(cards: &[CardContent], qr_source: QrSource) -> String {
    let mut body = String::new();
    for card in cards {
        let _ = write!(
            body,
            r#"<div class="item card" style="--accent: {accent}; --border: {border};">
<div class="header"><div><div class="title">{name}</div><div class="part">{part}</div></div>{qr}</div>
<div class="description">{description}</div>
<div class="reorder"><div class="point"><span>Reorder Point</span><strong>{point}</strong></div><div class="qty"><span>Reorder QTY</span><strong>{qty}</strong></div></div>
<div class="info"><b>Location: </b>{location}</div>
<div class="info"><b>Department: </b>{department}</div>
<div class="image">{image}</div>
<div class="footer">Rev {rev} | {date}</div>
</div>
"#,
            accent = card.shades.base,
            border = card.shades.border,
            name = escape_html(&card.product_name),
            part = escape_html(&card.part_number),
            qr = img_tag(&qr_src(&card.qr_url, qr_source), ImageKind::Qr, "qr", "QR code"),
            description = escape_html(&card.description),
            point = escape_html(&card.reorder_point),
            qty = escape_html(&card.reorder_quantity),
            location = escape_html(&card.location),
            department = escape_html(&card.department),
            image = img_tag(&card.image_url, ImageKind::Product, "product", &card.product_name),
            rev = escape_html(&card.revision_number),
            date = escape_html(&card.revision_date),
        );
    }
    document_html(DocumentType::Cards, &body)
}

/// Render labels as a self-printing HTML document.
pub fn labels_html(labels: &[LabelContent]) -> String {
    let mut body = String::new();
    for label in labels {
        let _ = write!(
            body,
            r#"<div class="item label" style="--accent: {accent};">
<div><div class="title">{name}</div><div class="part">{part}</div></div>
<div class="thumb">{image}</div>
</div>
"#,
            accent = label.accent,
            name = escape_html(&label.product_name),
            part = escape_html(&label.part_number),
            image = img_tag(&label.image_url, ImageKind::Product, "product", &label.product_name),
        );
    }
    document_html(DocumentType::Labels, &body)
}
