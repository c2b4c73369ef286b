//! Configuration types for importing spreadsheets and exporting documents.
//!
//! All behaviour is controlled through [`KanbanConfig`], built via its
//! [`KanbanConfigBuilder`]. Unset fields keep the documented defaults and
//! `build()` validates the result.

use crate::error::KanbanError;
use crate::pipeline::paginate::{Size, LETTER, PAGE_MARGIN};
use crate::progress::ProgressCallback;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a spreadsheet import and document export.
///
/// Built via [`KanbanConfig::builder()`] or using [`KanbanConfig::default()`].
///
/// # Example
/// ```rust
/// use kanban_cards::KanbanConfig;
///
/// let config = KanbanConfig::builder()
///     .max_retries(1)
///     .retry_delay_ms(250)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Clone)]
pub struct KanbanConfig {
    /// Base that relative image paths are resolved against. Default: the
    /// current working directory as a `file://` URL.
    pub base_url: Url,

    /// Timeout for each image existence check or download, in milliseconds. Default: 5000.
    pub image_timeout_ms: u64,

    /// Extra load attempts after a failed image load. Default: 3.
    ///
    /// Attempts are `retry_delay_ms` apart, so the added wait per image is
    /// at most `max_retries × retry_delay_ms`.
    pub max_retries: u32,

    /// Delay between image load attempts, in milliseconds. Default: 1000.
    pub retry_delay_ms: u64,

    /// Settling delay between sequential document writes, in milliseconds. Default: 500.
    pub download_delay_ms: u64,

    /// Number of rows validated, or images fetched, at once. Default: 8.
    ///
    /// Output order never depends on this value.
    pub concurrency: usize,

    /// HEAD-check `qr_code_url` and `image_url` while validating. Default: false.
    ///
    /// When off, a URL is accepted on syntax alone and an unreachable image
    /// is replaced by a placeholder at render time.
    pub check_reachability: bool,

    /// Where the QR graphic on a card comes from. Default: [`QrSource::Local`].
    pub qr_source: QrSource,

    /// Pixel size requested from the QR endpoint when a QR URL is synthesised. Default: 150.
    pub qr_size: u32,

    /// Physical page size in points. Default: US Letter (612×792).
    pub page_size: Size,

    /// Page margin on every side, in points. Default: 36 (0.5 in).
    pub page_margin: f32,

    /// Optional progress/diagnostic event sink.
    pub progress_callback: Option<ProgressCallback>,
}

fn default_base_url() -> Url {
    std::env::current_dir()
        .ok()
        .and_then(|dir| Url::from_directory_path(dir).ok())
        .unwrap_or_else(|| Url::parse("file:///").expect("static URL parses"))
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            image_timeout_ms: 5000,
            max_retries: 3,
            retry_delay_ms: 1000,
            download_delay_ms: 500,
            concurrency: 8,
            check_reachability: false,
            qr_source: QrSource::default(),
            qr_size: 150,
            page_size: LETTER,
            page_margin: PAGE_MARGIN,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for KanbanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KanbanConfig")
            .field("base_url", &self.base_url.as_str())
            .field("image_timeout_ms", &self.image_timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("download_delay_ms", &self.download_delay_ms)
            .field("concurrency", &self.concurrency)
            .field("check_reachability", &self.check_reachability)
            .field("qr_source", &self.qr_source)
            .field("qr_size", &self.qr_size)
            .field("page_size", &self.page_size)
            .field("page_margin", &self.page_margin)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl KanbanConfig {
    /// Create a new builder for `KanbanConfig`.
    pub fn builder() -> KanbanConfigBuilder {
        KanbanConfigBuilder {
            config: Self::default(),
            base_url: None,
        }
    }
}

/// Builder for [`KanbanConfig`].
pub struct KanbanConfigBuilder {
    config: KanbanConfig,
    base_url: Option<String>,
}

impl fmt::Debug for KanbanConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KanbanConfigBuilder")
            .field("config", &self.config)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl KanbanConfigBuilder {
    /// Base URL for relative image paths. Parsed and checked in [`Self::build`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn image_timeout_ms(mut self, ms: u64) -> Self {
        self.config.image_timeout_ms = ms.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn download_delay_ms(mut self, ms: u64) -> Self {
        self.config.download_delay_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn check_reachability(mut self, v: bool) -> Self {
        self.config.check_reachability = v;
        self
    }

    pub fn qr_source(mut self, source: QrSource) -> Self {
        self.config.qr_source = source;
        self
    }

    pub fn qr_size(mut self, px: u32) -> Self {
        self.config.qr_size = px.clamp(32, 1000);
        self
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn page_margin(mut self, pt: f32) -> Self {
        self.config.page_margin = pt;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<KanbanConfig, KanbanError> {
        if let Some(raw) = self.base_url.take() {
            let url = Url::parse(&raw)
                .map_err(|e| KanbanError::InvalidConfig(format!("base URL '{raw}': {e}")))?;
            if url.cannot_be_a_base() {
                return Err(KanbanError::InvalidConfig(format!(
                    "base URL '{raw}' cannot be used to resolve relative paths"
                )));
            }
            self.config.base_url = url;
        }

        let c = &self.config;
        if c.page_margin.is_nan() || c.page_margin < 0.0 {
            return Err(KanbanError::InvalidConfig(format!(
                "page margin must be ≥ 0, got {}",
                c.page_margin
            )));
        }
        let usable = c.page_size.inset(c.page_margin);
        if usable.width <= 0.0 || usable.height <= 0.0 {
            return Err(KanbanError::InvalidConfig(format!(
                "a {}pt margin leaves no usable area on a {}×{}pt page",
                c.page_margin, c.page_size.width, c.page_size.height
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Source of the QR graphic printed on each card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QrSource {
    /// Encode the QR payload locally with the `qrcode` crate. (default)
    #[default]
    Local,
    /// Download the row's resolved QR image URL, falling back to the QR placeholder.
    Remote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = KanbanConfig::default();
        assert_eq!(c.image_timeout_ms, 5000);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_delay_ms, 1000);
        assert_eq!(c.download_delay_ms, 500);
        assert_eq!(c.page_size, LETTER);
        assert_eq!(c.page_margin, 36.0);
        assert_eq!(c.qr_source, QrSource::Local);
        assert_eq!(c.base_url.scheme(), "file");
    }

    #[test]
    fn builder_clamps() {
        let c = KanbanConfig::builder()
            .concurrency(0)
            .qr_size(5000)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.qr_size, 1000);
    }

    #[test]
    fn builder_rejects_non_base_url() {
        let err = KanbanConfig::builder()
            .base_url("mailto:someone@example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, KanbanError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_oversized_margin() {
        let err = KanbanConfig::builder().page_margin(400.0).build().unwrap_err();
        assert!(err.to_string().contains("no usable area"), "got: {err}");
    }

    #[test]
    fn builder_accepts_http_base() {
        let c = KanbanConfig::builder()
            .base_url("https://parts.example.com/app/")
            .build()
            .unwrap();
        assert_eq!(c.base_url.as_str(), "https://parts.example.com/app/");
    }
}
