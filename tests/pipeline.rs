//! Integration tests for kanban-cards: spreadsheet in, documents out.
//!
//! Spreadsheets are generated on the fly with rust_xlsxwriter into a
//! scratch directory. No test needs the network: remote URLs are only
//! parsed, and images that cannot be loaded fall back to placeholders.

use kanban_cards::pipeline::paginate::{page_count, paginate};
use kanban_cards::pipeline::resolve::{is_placeholder, Resolver, QR_ENDPOINT};
use kanban_cards::{
    export_documents, export_print, generate_documents, generate_template, import_and_export,
    import_from_bytes, import_spreadsheet, CancelToken, DepartmentPalette, DocumentType,
    ExportTarget, Field, ImageKind, KanbanConfig, KanbanError, KanbanProgressCallback,
    LABEL_SIZE, LETTER, PAGE_MARGIN,
};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const HEADERS: [&str; 9] = [
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

enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Blank,
}

use Cell::{Blank, Number, Text};

fn write_sheet(path: &Path, headers: &[&str], rows: &[Vec<Cell<'_>>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Text(s) => {
                    sheet.write_string(r, col, *s).unwrap();
                }
                Number(n) => {
                    sheet.write_number(r, col, *n).unwrap();
                }
                Blank => {}
            }
        }
    }
    workbook.save(path).unwrap();
}

fn part_row<'a>(name: &'a str, part: &'a str, image: &'a str) -> Vec<Cell<'a>> {
    vec![
        Text(name),
        Text(part),
        Text("Zinc-plated, M6"),
        Blank,
        Number(10.0),
        Number(50.0),
        Text("Shelf A-1"),
        Text("Hardware"),
        if image.is_empty() { Blank } else { Text(image) },
    ]
}

fn config_for(dir: &Path) -> KanbanConfig {
    let base = reqwest::Url::from_directory_path(dir).unwrap();
    KanbanConfig::builder()
        .base_url(base.to_string())
        .max_retries(0)
        .retry_delay_ms(1)
        .image_timeout_ms(500)
        .download_delay_ms(1)
        .build()
        .unwrap()
}

fn spreadsheet(dir: &Path, rows: &[Vec<Cell<'_>>]) -> PathBuf {
    let path = dir.join("parts.xlsx");
    write_sheet(&path, &HEADERS, rows);
    path
}

#[derive(Default)]
struct Recorder {
    image_failures: Mutex<Vec<(String, ImageKind)>>,
    written: Mutex<Vec<PathBuf>>,
    validated: Mutex<Vec<(usize, bool)>>,
}

impl KanbanProgressCallback for Recorder {
    fn on_row_validated(&self, row: usize, ok: bool) {
        self.validated.lock().unwrap().push((row, ok));
    }

    fn on_image_failed(&self, url: &str, kind: ImageKind, _attempts: u32, _error: &str) {
        self.image_failures
            .lock()
            .unwrap()
            .push((url.to_string(), kind));
    }

    fn on_document_written(&self, path: &Path) {
        self.written.lock().unwrap().push(path.to_path_buf());
    }
}

// ── Import scenarios ─────────────────────────────────────────────────────────

#[tokio::test]
async fn complete_rows_are_all_valid() {
    let dir = tempfile::tempdir().unwrap();
    let image = "https://cdn.example.com/images/PART-002.jpg";
    let path = spreadsheet(
        dir.path(),
        &[
            part_row("Hex Bolt", "PART-001", ""),
            part_row("Washer", "PART-002", image),
            part_row("Nut", "PART-003", ""),
        ],
    );

    let outcome = import_spreadsheet(&path, &config_for(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.valid_rows.len(), 3);
    assert_eq!(outcome.valid_rows[1].get(Field::ImageUrl), Some(image));
    assert_eq!(outcome.valid_rows[0].get(Field::ReorderPoint), Some("10"));
    assert_eq!(outcome.valid_rows[2].get(Field::ProductName), Some("Nut"));
}

#[tokio::test]
async fn missing_part_and_bad_number_give_two_messages() {
    let dir = tempfile::tempdir().unwrap();
    let mut bad = part_row("Hex Bolt", "", "");
    bad[4] = Text("abc");
    let path = spreadsheet(dir.path(), &[part_row("Nut", "PART-003", ""), bad]);

    let outcome = import_spreadsheet(&path, &config_for(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.valid_rows.len(), 1);
    assert_eq!(outcome.errors.len(), 1);
    let row_error = &outcome.errors[0];
    assert_eq!(row_error.row, 3);
    assert_eq!(
        row_error.errors,
        vec![
            "Missing required field: part_number".to_string(),
            "reorder_point must be a number".to_string(),
        ]
    );
    assert!(outcome
        .valid_rows
        .iter()
        .all(|r| r.get(Field::ProductName) != Some("Hex Bolt")));
}

#[tokio::test]
async fn blank_qr_is_synthesised_from_part_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = spreadsheet(dir.path(), &[part_row("Widget", "PART-7", "")]);

    let outcome = import_spreadsheet(&path, &config_for(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    let qr = outcome.valid_rows[0].get(Field::QrCodeUrl).unwrap();
    assert!(qr.starts_with(QR_ENDPOINT), "got: {qr}");
    let url = reqwest::Url::parse(qr).unwrap();
    let data = url.query_pairs().find(|(k, _)| k == "data").unwrap().1;
    assert_eq!(data, "PART-7");
}

#[tokio::test]
async fn every_row_lands_in_exactly_one_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = Vec::new();
    for i in 0..12 {
        let mut row = part_row("Item", "P", "");
        match i % 4 {
            0 => row[0] = Blank,
            1 => row[5] = Text("many"),
            2 => row[8] = Text("ftp://example.com/a.png"),
            _ => {}
        }
        rows.push(row);
    }
    let path = spreadsheet(dir.path(), &rows);
    let recorder = Arc::new(Recorder::default());
    let config = KanbanConfig::builder()
        .progress_callback(recorder.clone())
        .concurrency(4)
        .build()
        .unwrap();

    let outcome = import_spreadsheet(&path, &config, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.total(), 12);
    assert_eq!(outcome.valid_rows.len(), 3);
    let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![2, 3, 4, 6, 7, 8, 10, 11, 12]);
    assert!(outcome.errors[0].errors[0].contains("product_name"));
    assert!(outcome.errors[1].errors[0].contains("reorder_quantity"));
    assert!(outcome.errors[2].errors[0].starts_with("image_url must be a valid URL"));

    let validated = recorder.validated.lock().unwrap();
    assert_eq!(validated.len(), 12);
    assert!(validated.windows(2).all(|w| w[0].0 < w[1].0));
}

#[tokio::test]
async fn blank_rows_are_skipped_but_numbering_follows_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let mut bad = part_row("Bolt", "P-2", "");
    bad[6] = Blank;
    let path = spreadsheet(
        dir.path(),
        &[
            part_row("Nut", "P-1", ""),
            vec![Blank, Blank, Blank],
            bad,
        ],
    );

    let outcome = import_spreadsheet(&path, &config_for(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.total(), 2);
    assert_eq!(outcome.errors[0].row, 4);
    assert_eq!(
        outcome.errors[0].errors,
        vec!["Missing required field: location".to_string()]
    );
}

#[tokio::test]
async fn header_spelling_and_order_do_not_matter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shuffled.xlsx");
    write_sheet(
        &path,
        &[
            "DEPARTMENT",
            "reorder_quantity",
            "Reorder  Point",
            "Supplier",
            "location",
            "Part_Number",
            "(Description)",
            "product name",
            "Department Color",
        ],
        &[vec![
            Text("Quality"),
            Number(4.0),
            Number(2.5),
            Text("ACME"),
            Text("Bin 9"),
            Text("q-9"),
            Text("Gauge"),
            Text("Caliper"),
            Text("#123456"),
        ]],
    );

    let outcome = import_spreadsheet(&path, &config_for(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    let row = &outcome.valid_rows[0];
    assert_eq!(row.get(Field::ProductName), Some("Caliper"));
    assert_eq!(row.get(Field::ReorderPoint), Some("2.5"));
    assert_eq!(row.get(Field::DepartmentColor), Some("#123456"));
}

#[tokio::test]
async fn import_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut bad = part_row("Bolt", "P-2", "");
    bad[4] = Text("x");
    let path = spreadsheet(dir.path(), &[part_row("Nut", "P-1", "img/nut.png"), bad]);
    let bytes = std::fs::read(&path).unwrap();
    let config = config_for(dir.path());

    let first = import_from_bytes(bytes.clone(), &config, &CancelToken::new())
        .await
        .unwrap();
    let second = import_from_bytes(bytes, &config, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn template_imports_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(kanban_cards::TEMPLATE_FILENAME);
    std::fs::write(&path, generate_template().unwrap()).unwrap();

    let outcome = import_spreadsheet(&path, &config_for(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.valid_rows.len(), 1);
    let row = &outcome.valid_rows[0];
    assert_eq!(row.get(Field::PartNumber), Some("PART-001"));
    assert_eq!(row.get(Field::QrCodeUrl), Some("https://example.com/qr/PART-001"));
    assert_eq!(
        row.get(Field::ImageUrl),
        Some("https://example.com/images/PART-001.jpg")
    );
}

// ── Fatal import errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_is_reported() {
    let err = import_spreadsheet(
        "/definitely/not/here.xlsx",
        &KanbanConfig::default(),
        &CancelToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, KanbanError::FileNotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn garbage_file_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"this is not a workbook").unwrap();
    let err = import_spreadsheet(&path, &KanbanConfig::default(), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, KanbanError::UnreadableSpreadsheet { .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn cancelled_import_returns_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let path = spreadsheet(dir.path(), &[part_row("Nut", "P-1", "")]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = import_spreadsheet(&path, &config_for(dir.path()), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, KanbanError::Cancelled));
}

// ── Resolution and pagination ────────────────────────────────────────────────

#[test]
fn resolution_is_total() {
    let resolver = Resolver::new(&KanbanConfig::default()).unwrap();
    let inputs = [
        "",
        "   ",
        "http://",
        "https://exa mple.com/x",
        "mailto:parts@example.com",
        "\u{0}",
        "images/a.png",
        "https://example.com/a.png",
        "data:image/png;base64,AAAA",
    ];
    for input in inputs {
        for kind in [ImageKind::Product, ImageKind::Qr] {
            let url = resolver.resolve(input, kind);
            assert!(!url.is_empty(), "empty resolution for {input:?}");
        }
    }
    assert!(is_placeholder(&resolver.resolve("", ImageKind::Qr)));
}

#[test]
fn label_pagination_splits_20_20_5() {
    let rows: Vec<usize> = (0..45).collect();
    let pages = paginate(&rows, LETTER, LABEL_SIZE, PAGE_MARGIN).unwrap();
    let sizes: Vec<usize> = pages.iter().map(|p| p.items.len()).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
    assert_eq!(page_count(45, 20), 3);

    let flattened: Vec<usize> = pages.iter().flat_map(|p| p.items.iter().copied()).collect();
    assert_eq!(flattened, rows);
}

#[test]
fn pagination_is_exhaustive_for_many_sizes() {
    for n in [0usize, 1, 3, 4, 5, 19, 20, 21, 40, 41, 100] {
        let rows: Vec<usize> = (0..n).collect();
        for item in [LABEL_SIZE, kanban_cards::CARD_SIZE] {
            let pages = paginate(&rows, LETTER, item, PAGE_MARGIN).unwrap();
            let per = kanban_cards::pipeline::paginate::items_per_page(LETTER, item, PAGE_MARGIN)
                .unwrap();
            assert_eq!(pages.len(), n.div_ceil(per));
            let flattened: Vec<usize> =
                pages.iter().flat_map(|p| p.items.iter().copied()).collect();
            assert_eq!(flattened, rows);
        }
    }
}

// ── Export ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_and_export_writes_both_pdfs() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let path = spreadsheet(
        dir.path(),
        &[
            part_row("Nut", "P-1", "missing.png"),
            part_row("Bolt", "P-2", ""),
        ],
    );
    let recorder = Arc::new(Recorder::default());
    let base = reqwest::Url::from_directory_path(dir.path()).unwrap();
    let config = KanbanConfig::builder()
        .base_url(base.to_string())
        .max_retries(0)
        .download_delay_ms(1)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let summary = import_and_export(
        &path,
        ExportTarget::Both,
        &DepartmentPalette::new(),
        &out,
        &config,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.outcome.valid_rows.len(), 2);
    assert_eq!(summary.files.len(), 2);
    let names: Vec<String> = summary
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names[0].starts_with("kanban-cards-") && names[0].ends_with(".pdf"));
    assert!(names[1].starts_with("kanban-labels-") && names[1].ends_with(".pdf"));
    assert_eq!(
        names[0].trim_start_matches("kanban-cards-"),
        names[1].trim_start_matches("kanban-labels-")
    );
    for file in &summary.files {
        assert!(std::fs::read(file).unwrap().starts_with(b"%PDF"));
    }
    assert_eq!(*recorder.written.lock().unwrap(), summary.files);

    let failures = recorder.image_failures.lock().unwrap();
    assert!(!failures.is_empty());
    assert!(failures
        .iter()
        .all(|(url, kind)| url.ends_with("missing.png") && *kind == ImageKind::Product));
}

#[tokio::test]
async fn all_invalid_rows_is_no_valid_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = spreadsheet(
        dir.path(),
        &[part_row("", "P-1", ""), part_row("Bolt", "", "")],
    );
    let err = import_and_export(
        &path,
        ExportTarget::Cards,
        &DepartmentPalette::new(),
        dir.path(),
        &config_for(dir.path()),
        &CancelToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, KanbanError::NoValidRows { invalid: 2 }), "got: {err}");
}

#[tokio::test]
async fn card_layout_is_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = spreadsheet(
        dir.path(),
        &(0..9).map(|_| part_row("Nut", "P-1", "")).collect::<Vec<_>>(),
    );
    let config = config_for(dir.path());
    let outcome = import_spreadsheet(&path, &config, &CancelToken::new())
        .await
        .unwrap();
    let palette = DepartmentPalette::new();

    let a = generate_documents(&outcome.valid_rows, ExportTarget::Cards, &palette, &config, &CancelToken::new())
        .await
        .unwrap();
    let b = generate_documents(&outcome.valid_rows, ExportTarget::Cards, &palette, &config, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(a.len(), 1);
    assert_eq!(a[0].document, DocumentType::Cards);
    assert_eq!(a[0].layout, b[0].layout);
    assert_eq!(a[0].layout.items_per_page, 4);
    assert_eq!(a[0].layout.pages.len(), 3);
}

#[tokio::test]
async fn labels_only_export_writes_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = spreadsheet(dir.path(), &[part_row("Nut", "P-1", "")]);
    let config = config_for(dir.path());
    let outcome = import_spreadsheet(&path, &config, &CancelToken::new())
        .await
        .unwrap();

    let files = export_documents(
        &outcome.valid_rows,
        ExportTarget::Labels,
        &DepartmentPalette::new(),
        dir.path().join("labels"),
        &config,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("kanban-labels-"), "got: {name}");
}

#[tokio::test]
async fn print_export_writes_html() {
    let dir = tempfile::tempdir().unwrap();
    let path = spreadsheet(dir.path(), &[part_row("Nut & Bolt", "p-1", "")]);
    let config = config_for(dir.path());
    let outcome = import_spreadsheet(&path, &config, &CancelToken::new())
        .await
        .unwrap();

    let files = export_print(
        &outcome.valid_rows,
        ExportTarget::Both,
        &DepartmentPalette::new(),
        dir.path(),
        &config,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(files.len(), 2);
    let cards = std::fs::read_to_string(&files[0]).unwrap();
    assert!(files[0].extension().unwrap() == "html");
    assert!(cards.contains("size: 3in 5in"));
    assert!(cards.contains("Nut &amp; Bolt"));
    assert!(cards.contains("P-1"));
    assert!(cards.contains("window.print()"));
    let labels = std::fs::read_to_string(&files[1]).unwrap();
    assert!(labels.contains("size: 3in 1in"));
}
