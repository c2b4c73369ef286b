//! Progress-callback trait for import and export events.
//!
//! Inject an [`Arc<dyn KanbanProgressCallback>`] via
//! [`crate::config::KanbanConfigBuilder::progress_callback`] to receive events
//! as rows are validated, images fail to load, and documents are written.
//!
//! The callback is also where image failures are *reported*: the resolver
//! never returns an error for an unloadable image (it substitutes a
//! placeholder), so `on_image_failed` is the only signal a host application
//! gets beyond the `tracing` log.
//!
//! # Example
//!
//! ```rust
//! use kanban_cards::{KanbanConfig, KanbanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     invalid: AtomicUsize,
//! }
//!
//! impl KanbanProgressCallback for CountingCallback {
//!     fn on_row_validated(&self, row: usize, ok: bool) {
//!         if !ok {
//!             self.invalid.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("row {row} has errors");
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { invalid: AtomicUsize::new(0) });
//!
//! let config = KanbanConfig::builder()
//!     .progress_callback(counter as Arc<dyn KanbanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::ImageKind;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it validates rows and exports documents.
///
/// Implementations must be `Send + Sync`: rows are validated and images are
/// fetched concurrently, so `on_row_validated` and `on_image_failed` may be
/// called from several tasks at once. All methods default to no-ops.
pub trait KanbanProgressCallback: Send + Sync {
    /// Called once after normalisation, before any row is validated.
    fn on_import_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called when a row's validation finishes.
    ///
    /// # Arguments
    /// * `row`: 1-based spreadsheet row number
    /// * `ok` : whether the row passed
    fn on_row_validated(&self, row: usize, ok: bool) {
        let _ = (row, ok);
    }

    /// Called once after every row has been validated.
    fn on_import_complete(&self, valid: usize, invalid: usize) {
        let _ = (valid, invalid);
    }

    /// Called when an image exhausted its retries and the placeholder was
    /// substituted.
    ///
    /// # Arguments
    /// * `url`     : the resolved URL that failed
    /// * `kind`    : product image or QR code
    /// * `attempts`: total load attempts made
    /// * `error`   : human-readable description of the last failure
    fn on_image_failed(&self, url: &str, kind: ImageKind, attempts: u32, error: &str) {
        let _ = (url, kind, attempts, error);
    }

    /// Called after a document has been written to disk.
    fn on_document_written(&self, path: &Path) {
        let _ = path;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl KanbanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::KanbanConfig`].
pub type ProgressCallback = Arc<dyn KanbanProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        validated: AtomicUsize,
        failed_rows: AtomicUsize,
        image_failures: Mutex<Vec<(String, ImageKind, u32)>>,
    }

    impl KanbanProgressCallback for TrackingCallback {
        fn on_row_validated(&self, _row: usize, ok: bool) {
            self.validated.fetch_add(1, Ordering::SeqCst);
            if !ok {
                self.failed_rows.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_image_failed(&self, url: &str, kind: ImageKind, attempts: u32, _error: &str) {
            self.image_failures
                .lock()
                .unwrap()
                .push((url.to_string(), kind, attempts));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_import_start(3);
        cb.on_row_validated(2, true);
        cb.on_image_failed("https://x.invalid/a.png", ImageKind::Product, 4, "timeout");
        cb.on_document_written(Path::new("kanban-cards-1.pdf"));
        cb.on_import_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_row_validated(2, true);
        tracker.on_row_validated(3, false);
        tracker.on_image_failed("https://x.invalid/qr.png", ImageKind::Qr, 4, "HTTP 404");

        assert_eq!(tracker.validated.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failed_rows.load(Ordering::SeqCst), 1);
        let failures = tracker.image_failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1, ImageKind::Qr);
        assert_eq!(failures[0].2, 4);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_import_start(10);
        cb.on_row_validated(2, false);
    }
}
