//! Row validation: partition canonical rows into valid rows and row errors.
//!
//! Every check runs on every row and all messages are collected (no
//! fail-fast inside a row). Rows are independent of each other; they are
//! validated concurrently but recorded in input order, so both output
//! sequences keep the spreadsheet order.
//!
//! A row that passes keeps its fields, with URL fields rewritten to their
//! resolved form and a blank `qr_code_url` filled in with a URL synthesised
//! from the part number.

use crate::cancel::CancelToken;
use crate::config::KanbanConfig;
use crate::error::{KanbanError, ResolveError};
use crate::model::{CanonicalRow, Field, ImageKind, RowError, SheetRow, ValidationOutcome};
use crate::pipeline::resolve::{locate, Resolver};
use futures::stream::{self, StreamExt};
use reqwest::Url;
use tracing::{debug, info};

fn kind_of(field: Field) -> ImageKind {
    match field {
        Field::QrCodeUrl => ImageKind::Qr,
        _ => ImageKind::Product,
    }
}

/// Whether `value` parses as a finite number after trimming.
pub fn is_numeric(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .map(f64::is_finite)
        .unwrap_or(false)
}

/// The synchronous checks: required fields, numeric fields, URL syntax.
///
/// Returns every message for the row, in check order.
pub fn check_fields(row: &CanonicalRow, base: &Url) -> Vec<String> {
    let mut errors = Vec::new();

    for field in Field::REQUIRED {
        if row.non_blank(field).is_none() {
            errors.push(format!("Missing required field: {field}"));
        }
    }

    for field in Field::NUMERIC {
        if let Some(value) = row.non_blank(field) {
            if !is_numeric(value) {
                errors.push(format!("{field} must be a number"));
            }
        }
    }

    for field in Field::URL {
        if let Some(value) = row.non_blank(field) {
            if let Err(e) = locate(value, base) {
                errors.push(format!("{field} must be a valid URL: {e}"));
            }
        }
    }

    errors
}

async fn validate_row(
    row: SheetRow,
    resolver: &Resolver,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<(usize, Result<CanonicalRow, RowError>), KanbanError> {
    let SheetRow {
        row_number,
        mut fields,
    } = row;
    let mut errors = check_fields(&fields, &config.base_url);

    for field in Field::URL {
        let Some(raw) = fields.non_blank(field).map(str::to_string) else {
            continue;
        };
        if errors.iter().any(|e| e.starts_with(field.as_str())) {
            continue;
        }
        let resolved = resolver.resolve(&raw, kind_of(field));
        if config.check_reachability {
            match resolver.check_exists(&resolved, kind_of(field), cancel).await {
                Ok(()) => {}
                Err(ResolveError::Cancelled) => return Err(KanbanError::Cancelled),
                Err(e) => errors.push(format!("{field} could not be reached: {e}")),
            }
        }
        fields.set(field, resolved);
    }

    if !errors.is_empty() {
        debug!("Row {}: {} error(s)", row_number, errors.len());
        let error = RowError {
            row: row_number,
            errors,
        };
        return Ok((row_number, Err(error)));
    }

    if fields.non_blank(Field::QrCodeUrl).is_none() {
        fields.set(Field::QrCodeUrl, resolver.resolve_qr(&fields));
    }
    Ok((row_number, Ok(fields)))
}

/// Validate `rows`, keeping input order in both output sequences.
///
/// Returns [`KanbanError::Cancelled`] if `cancel` fires before every row
/// has been recorded; no partial outcome is returned in that case.
pub async fn validate_rows(
    rows: Vec<SheetRow>,
    resolver: &Resolver,
    config: &KanbanConfig,
    cancel: &CancelToken,
) -> Result<ValidationOutcome, KanbanError> {
    let total = rows.len();
    info!("Validating {} row(s)", total);
    if let Some(cb) = &config.progress_callback {
        cb.on_import_start(total);
    }

    let mut results = stream::iter(
        rows.into_iter()
            .map(|row| validate_row(row, resolver, config, cancel)),
    )
    .buffered(config.concurrency);

    let mut outcome = ValidationOutcome::default();
    while let Some(result) = results.next().await {
        if cancel.is_cancelled() {
            return Err(KanbanError::Cancelled);
        }
        let (row_number, result) = result?;
        let ok = result.is_ok();
        match result {
            Ok(fields) => outcome.valid_rows.push(fields),
            Err(row_error) => outcome.errors.push(row_error),
        }
        if let Some(cb) = &config.progress_callback {
            cb.on_row_validated(row_number, ok);
        }
    }

    info!(
        "Validation complete: {} valid, {} with errors",
        outcome.valid_rows.len(),
        outcome.errors.len()
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_import_complete(outcome.valid_rows.len(), outcome.errors.len());
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::resolve::QR_ENDPOINT;

    fn base() -> Url {
        Url::parse("https://parts.example.com/").unwrap()
    }

    fn complete_row() -> CanonicalRow {
        CanonicalRow::default()
            .with(Field::ProductName, "Hex Bolt")
            .with(Field::PartNumber, "HB-100")
            .with(Field::Description, "M6 x 20")
            .with(Field::ReorderPoint, "10")
            .with(Field::ReorderQuantity, "50")
            .with(Field::Location, "Shelf A-1")
            .with(Field::Department, "Hardware")
    }

    #[test]
    fn complete_row_has_no_errors() {
        assert!(check_fields(&complete_row(), &base()).is_empty());
    }

    #[test]
    fn every_missing_field_is_named() {
        let errors = check_fields(&CanonicalRow::default(), &base());
        assert_eq!(errors.len(), Field::REQUIRED.len());
        for field in Field::REQUIRED {
            assert!(
                errors.contains(&format!("Missing required field: {field}")),
                "no message for {field}"
            );
        }
    }

    #[test]
    fn blank_counts_as_missing_but_zero_does_not() {
        let mut row = complete_row();
        row.set(Field::Location, "   ");
        row.set(Field::ReorderPoint, "0");
        assert_eq!(
            check_fields(&row, &base()),
            vec!["Missing required field: location".to_string()]
        );
    }

    #[test]
    fn numeric_checks() {
        assert!(is_numeric(" 12 "));
        assert!(is_numeric("2.5"));
        assert!(is_numeric("-1e3"));
        assert!(!is_numeric("abc"));
        assert!(!is_numeric("NaN"));
        assert!(!is_numeric("inf"));

        let row = complete_row().with(Field::ReorderQuantity, "lots");
        assert_eq!(
            check_fields(&row, &base()),
            vec!["reorder_quantity must be a number".to_string()]
        );
    }

    #[test]
    fn bad_urls_are_reported() {
        let row = complete_row()
            .with(Field::ImageUrl, "http://")
            .with(Field::QrCodeUrl, "ftp://example.com/qr.png");
        let errors = check_fields(&row, &base());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("qr_code_url must be a valid URL"));
        assert!(errors[1].starts_with("image_url must be a valid URL"));
    }

    fn config() -> KanbanConfig {
        KanbanConfig::builder()
            .base_url("https://parts.example.com/")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn partitions_in_order() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let rows = SheetRow::number(vec![
            complete_row(),
            complete_row().with(Field::ReorderPoint, "abc"),
            complete_row().with(Field::PartNumber, "HB-300"),
        ]);
        let outcome = validate_rows(rows, &resolver, &config, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.valid_rows.len(), 2);
        assert_eq!(outcome.errors[0].row, 3);
        assert_eq!(
            outcome.valid_rows[1].get(Field::PartNumber),
            Some("HB-300")
        );
    }

    #[tokio::test]
    async fn blank_qr_is_synthesised() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let rows = SheetRow::number(vec![complete_row()]);
        let outcome = validate_rows(rows, &resolver, &config, &CancelToken::new())
            .await
            .unwrap();
        let qr = outcome.valid_rows[0].get(Field::QrCodeUrl).unwrap();
        assert!(qr.starts_with(QR_ENDPOINT));
        assert!(qr.contains("HB-100"));
    }

    #[tokio::test]
    async fn relative_image_is_rewritten() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let rows = SheetRow::number(vec![complete_row().with(Field::ImageUrl, "./img/hb.png")]);
        let outcome = validate_rows(rows, &resolver, &config, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome.valid_rows[0].get(Field::ImageUrl),
            Some("https://parts.example.com/img/hb.png")
        );
    }

    #[tokio::test]
    async fn cancelled_validation_returns_error() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = validate_rows(SheetRow::number(vec![complete_row()]), &resolver, &config, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KanbanError::Cancelled));
    }

    #[tokio::test]
    async fn reachability_failure_becomes_row_error() {
        let config = KanbanConfig::builder()
            .base_url("https://parts.example.com/")
            .check_reachability(true)
            .build()
            .unwrap();
        let resolver = Resolver::new(&config).unwrap();
        let rows = SheetRow::number(vec![
            complete_row().with(Field::ImageUrl, "file:///definitely/not/here.png")
        ]);
        let outcome = validate_rows(rows, &resolver, &config, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].errors[0].starts_with("image_url could not be reached"));
    }
}
