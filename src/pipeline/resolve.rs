//! Image and QR resolution.
//!
//! Two separate jobs live here:
//!
//! 1. **Resolving** a raw cell value into a usable URL ([`Resolver::resolve`]).
//!    Pure string work, total: blank, malformed or unsupported input comes
//!    back as the fixed placeholder for its [`ImageKind`], never an error and
//!    never an empty string. Results are cached per raw input for the life
//!    of the resolver.
//!
//! 2. **Loading** a resolved URL into pixels for embedding
//!    ([`Resolver::load`]). Runs a bounded retry loop with a fixed delay,
//!    races every request against the caller's [`CancelToken`], and on
//!    exhaustion substitutes a generated placeholder raster, logs a warning
//!    and fires `on_image_failed`.
//!
//! [`Resolver::check_exists`] is the optional HEAD probe the validator uses
//! when reachability checking is switched on.

use crate::cancel::CancelToken;
use crate::config::{KanbanConfig, QrSource};
use crate::error::{KanbanError, ResolveError};
use crate::model::{CanonicalRow, Field, ImageKind, ImageReference};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Luma, Rgb, RgbImage};
use once_cell::sync::Lazy;
use qrcode::{EcLevel, QrCode};
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// External endpoint used to synthesise a QR image URL from a part number.
pub const QR_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";

const PRODUCT_PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" viewBox="0 0 100 100"><rect width="100" height="100" fill="#f3f4f6"/><path d="M35 40h30v20H35z" fill="#d1d5db"/><path d="M30 30h40v40H30zm2 2h36v36H32z" fill="#9ca3af"/><circle cx="45" cy="45" r="5" fill="#9ca3af"/></svg>"##;

const QR_PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" viewBox="0 0 100 100"><rect width="100" height="100" fill="#f3f4f6"/><rect x="25" y="25" width="50" height="50" fill="#d1d5db"/></svg>"##;

static PRODUCT_PLACEHOLDER: Lazy<String> = Lazy::new(|| svg_data_url(PRODUCT_PLACEHOLDER_SVG));
static QR_PLACEHOLDER: Lazy<String> = Lazy::new(|| svg_data_url(QR_PLACEHOLDER_SVG));

// Two or more characters, so a Windows drive letter is not read as a scheme.
static RE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]+):").unwrap());

fn svg_data_url(svg: &str) -> String {
    format!("data:image/svg+xml,{}", urlencoding::encode(svg))
}

/// The fixed, always-available fallback URL for `kind`.
pub fn placeholder_url(kind: ImageKind) -> &'static str {
    match kind {
        ImageKind::Product => PRODUCT_PLACEHOLDER.as_str(),
        ImageKind::Qr => QR_PLACEHOLDER.as_str(),
    }
}

pub fn is_placeholder(url: &str) -> bool {
    url == PRODUCT_PLACEHOLDER.as_str() || url == QR_PLACEHOLDER.as_str()
}

/// Synthesise a QR image URL on the external endpoint for `data`.
pub fn qr_url(data: &str, size: u32) -> String {
    let size = format!("{size}x{size}");
    Url::parse_with_params(
        QR_ENDPOINT,
        &[("size", size.as_str()), ("data", data), ("format", "png")],
    )
    .map(String::from)
    .unwrap_or_else(|_| placeholder_url(ImageKind::Qr).to_string())
}

pub fn is_synthesized(url: &str) -> bool {
    url.starts_with(QR_ENDPOINT)
}

/// The `data` parameter of a synthesised QR URL.
pub fn qr_payload(url: &str) -> Option<String> {
    if !is_synthesized(url) {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "data")
        .map(|(_, v)| v.into_owned())
}

/// Turn a non-blank raw reference into an absolute URL.
///
/// * `http(s)` URLs must parse and are returned unchanged.
/// * `data:` URLs pass through.
/// * `file:` URLs must parse.
/// * Any other scheme is rejected.
/// * Anything else is a relative path: a leading `./` or `/` is dropped and
///   the rest is joined onto `base`.
pub fn locate(raw: &str, base: &Url) -> Result<String, ResolveError> {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(raw)
            .map(|_| raw.to_string())
            .map_err(|e| ResolveError::Malformed(e.to_string()));
    }
    if lower.starts_with("data:") {
        return if raw.contains(',') {
            Ok(raw.to_string())
        } else {
            Err(ResolveError::Malformed("data URL has no payload".into()))
        };
    }
    if let Some(caps) = RE_SCHEME.captures(raw) {
        let scheme = caps[1].to_ascii_lowercase();
        return if scheme == "file" {
            Url::parse(raw)
                .map(|_| raw.to_string())
                .map_err(|e| ResolveError::Malformed(e.to_string()))
        } else {
            Err(ResolveError::UnsupportedScheme(scheme))
        };
    }
    let clean = raw
        .strip_prefix("./")
        .or_else(|| raw.strip_prefix('/'))
        .unwrap_or(raw);
    base.join(clean)
        .map(String::from)
        .map_err(|e| ResolveError::Malformed(e.to_string()))
}

/// Encode `payload` as a QR code raster at error-correction level H.
pub fn encode_qr(payload: &str) -> Result<DynamicImage, ResolveError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)
        .map_err(|e| ResolveError::QrEncode(e.to_string()))?;
    let image = code.render::<Luma<u8>>().build();
    Ok(DynamicImage::ImageLuma8(image))
}

// ── Placeholder rasters ──────────────────────────────────────────────────

const BG: Rgb<u8> = Rgb([0xF3, 0xF4, 0xF6]);
const LIGHT: Rgb<u8> = Rgb([0xD1, 0xD5, 0xDB]);
const MID: Rgb<u8> = Rgb([0x9C, 0xA3, 0xAF]);

fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    for y in y0..y1.min(img.height()) {
        for x in x0..x1.min(img.width()) {
            img.put_pixel(x, y, color);
        }
    }
}

/// A 100×100 raster drawing of the placeholder graphic for `kind`.
pub fn placeholder_image(kind: ImageKind) -> DynamicImage {
    let mut img = RgbImage::from_pixel(100, 100, BG);
    match kind {
        ImageKind::Qr => fill_rect(&mut img, 25, 25, 75, 75, LIGHT),
        ImageKind::Product => {
            fill_rect(&mut img, 30, 30, 70, 70, MID);
            fill_rect(&mut img, 32, 32, 68, 68, BG);
            fill_rect(&mut img, 35, 40, 65, 60, LIGHT);
            for y in 40..=50u32 {
                for x in 40..=50u32 {
                    let (dx, dy) = (x as i32 - 45, y as i32 - 45);
                    if dx * dx + dy * dy <= 25 {
                        img.put_pixel(x, y, MID);
                    }
                }
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

/// Pixels ready for embedding, and whether they are the placeholder.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: DynamicImage,
    pub is_placeholder: bool,
}

impl LoadedImage {
    pub fn placeholder(kind: ImageKind) -> Self {
        Self {
            image: placeholder_image(kind),
            is_placeholder: true,
        }
    }

    fn loaded(image: DynamicImage) -> Self {
        Self {
            image,
            is_placeholder: false,
        }
    }
}

fn accepts_content_type(kind: ImageKind, content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("image/") || (kind == ImageKind::Qr && ct.contains("application/json"))
        }
        None => false,
    }
}

/// Split a `data:` URL into its media type and decoded bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), ResolveError> {
    let rest = url
        .get(5..)
        .filter(|_| url[..5].eq_ignore_ascii_case("data:"))
        .ok_or_else(|| ResolveError::Malformed("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ResolveError::Malformed("data URL has no payload".into()))?;
    let (mime, is_base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let mime = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| ResolveError::Decode(e.to_string()))?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };
    Ok((mime, bytes))
}

// ── Resolver ─────────────────────────────────────────────────────────────

/// Resolves image references and loads them, with a session cache.
pub struct Resolver {
    client: reqwest::Client,
    config: KanbanConfig,
    cache: Mutex<HashMap<(ImageKind, String), String>>,
}

impl Resolver {
    pub fn new(config: &KanbanConfig) -> Result<Self, KanbanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.image_timeout_ms))
            .build()
            .map_err(|e| KanbanError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a raw reference to a usable URL. Never fails.
    pub fn resolve(&self, raw: &str, kind: ImageKind) -> String {
        let raw = raw.trim();
        if raw.is_empty() {
            return placeholder_url(kind).to_string();
        }
        let key = (kind, raw.to_string());
        if let Some(hit) = self.lock_cache().get(&key) {
            return hit.clone();
        }
        let resolved = match locate(raw, &self.config.base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid {} image URL '{}': {}; using placeholder", kind, raw, e);
                placeholder_url(kind).to_string()
            }
        };
        self.lock_cache().insert(key, resolved.clone());
        resolved
    }

    /// The row's QR URL: its own `qr_code_url` when present, otherwise a
    /// URL synthesised from its part number.
    pub fn resolve_qr(&self, row: &CanonicalRow) -> String {
        match row.non_blank(Field::QrCodeUrl) {
            Some(raw) => self.resolve(raw, ImageKind::Qr),
            None => match row.non_blank(Field::PartNumber) {
                Some(part) => qr_url(part, self.config.qr_size),
                None => placeholder_url(ImageKind::Qr).to_string(),
            },
        }
    }

    /// Forget every cached resolution.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<(ImageKind, String), String>> {
        // A poisoned cache only holds plain strings; keep using it.
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancelToken,
    ) -> Result<reqwest::Response, ResolveError> {
        let ms = self.config.image_timeout_ms;
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            r = request.send() => r.map_err(|e| {
                if e.is_timeout() {
                    ResolveError::Timeout { ms }
                } else {
                    ResolveError::Http(e.to_string())
                }
            })?,
        };
        if !response.status().is_success() {
            return Err(ResolveError::Status(response.status().as_u16()));
        }
        Ok(response)
    }

    fn accept_header(kind: ImageKind) -> &'static str {
        match kind {
            ImageKind::Product => "image/*",
            ImageKind::Qr => "image/*, application/json",
        }
    }

    /// Check that a resolved URL points at something loadable.
    ///
    /// `data:` URLs always pass; `file:` URLs must name an existing file;
    /// `http(s)` URLs get a HEAD request whose content type must be an image
    /// (or JSON, for QR endpoints).
    pub async fn check_exists(
        &self,
        url: &str,
        kind: ImageKind,
        cancel: &CancelToken,
    ) -> Result<(), ResolveError> {
        if url.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
            return Ok(());
        }
        let parsed = Url::parse(url).map_err(|e| ResolveError::Malformed(e.to_string()))?;
        match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| ResolveError::Malformed(url.to_string()))?;
                match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => Ok(()),
                    _ => Err(ResolveError::NotFound(path.display().to_string())),
                }
            }
            "http" | "https" => {
                let request = self
                    .client
                    .head(parsed)
                    .header(ACCEPT, Self::accept_header(kind));
                let response = self.send(request, cancel).await?;
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                if accepts_content_type(kind, content_type.as_deref()) {
                    Ok(())
                } else {
                    Err(ResolveError::NotAnImage(content_type))
                }
            }
            other => Err(ResolveError::UnsupportedScheme(other.to_string())),
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        kind: ImageKind,
        cancel: &CancelToken,
    ) -> Result<DynamicImage, ResolveError> {
        if url.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
            let (mime, bytes) = decode_data_url(url)?;
            if mime == "image/svg+xml" {
                return Err(ResolveError::Decode("SVG images cannot be embedded".into()));
            }
            return image::load_from_memory(&bytes).map_err(|e| ResolveError::Decode(e.to_string()));
        }

        let parsed = Url::parse(url).map_err(|e| ResolveError::Malformed(e.to_string()))?;
        let bytes = match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| ResolveError::Malformed(url.to_string()))?;
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| ResolveError::NotFound(format!("{}: {e}", path.display())))?
            }
            "http" | "https" => {
                let request = self
                    .client
                    .get(parsed)
                    .header(ACCEPT, Self::accept_header(kind));
                let response = self.send(request, cancel).await?;
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                if content_type.is_some() && !accepts_content_type(kind, content_type.as_deref()) {
                    return Err(ResolveError::NotAnImage(content_type));
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                    body = response.bytes() => body.map_err(|e| ResolveError::Http(e.to_string()))?.to_vec(),
                }
            }
            other => return Err(ResolveError::UnsupportedScheme(other.to_string())),
        };
        image::load_from_memory(&bytes).map_err(|e| ResolveError::Decode(e.to_string()))
    }

    /// Load a resolved reference, retrying transient failures.
    ///
    /// Makes at most `1 + max_retries` attempts with `retry_delay_ms`
    /// between them. Placeholder URLs are drawn directly. A cancelled load
    /// returns the placeholder without reporting a failure.
    pub async fn load(&self, reference: &ImageReference, cancel: &CancelToken) -> LoadedImage {
        let ImageReference { url, kind } = reference;
        let kind = *kind;
        if is_placeholder(url) {
            return LoadedImage::placeholder(kind);
        }

        let max_attempts = self.config.max_retries + 1;
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut attempts = 0;
        let mut last_err: Option<ResolveError> = None;

        while attempts < max_attempts {
            if cancel.is_cancelled() {
                debug!("Load of {} image cancelled: {}", kind, url);
                return LoadedImage::placeholder(kind);
            }
            if attempts > 0 {
                warn!(
                    "{} image {}: retry {}/{} after {}ms",
                    kind,
                    url,
                    attempts,
                    self.config.max_retries,
                    delay.as_millis()
                );
                tokio::select! {
                    _ = cancel.cancelled() => return LoadedImage::placeholder(kind),
                    _ = sleep(delay) => {}
                }
            }
            attempts += 1;

            match self.fetch_once(url, kind, cancel).await {
                Ok(image) => {
                    debug!("Loaded {} image {} on attempt {}", kind, url, attempts);
                    return LoadedImage::loaded(image);
                }
                Err(ResolveError::Cancelled) => return LoadedImage::placeholder(kind),
                Err(e) => {
                    warn!("{} image {}: attempt {} failed: {}", kind, url, attempts, e);
                    let transient = e.is_transient();
                    last_err = Some(e);
                    if !transient {
                        break;
                    }
                }
            }
        }

        let detail = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        self.report_failure(url, kind, attempts, &detail);
        LoadedImage::placeholder(kind)
    }

    /// The QR graphic for a resolved QR URL.
    ///
    /// With [`QrSource::Local`] the payload (the part number of a synthesised
    /// URL, otherwise the URL itself) is encoded here; with
    /// [`QrSource::Remote`] the URL is downloaded like any other image.
    pub async fn load_qr(&self, resolved: &str, cancel: &CancelToken) -> LoadedImage {
        if is_placeholder(resolved) {
            return LoadedImage::placeholder(ImageKind::Qr);
        }
        match self.config.qr_source {
            QrSource::Remote => {
                self.load(&ImageReference::new(resolved, ImageKind::Qr), cancel)
                    .await
            }
            QrSource::Local => {
                let payload = qr_payload(resolved).unwrap_or_else(|| resolved.to_string());
                match encode_qr(&payload) {
                    Ok(image) => LoadedImage::loaded(image),
                    Err(e) => {
                        self.report_failure(resolved, ImageKind::Qr, 1, &e.to_string());
                        LoadedImage::placeholder(ImageKind::Qr)
                    }
                }
            }
        }
    }

    fn report_failure(&self, url: &str, kind: ImageKind, attempts: u32, detail: &str) {
        warn!(
            "Giving up on {} image {} after {} attempt(s): {}; using placeholder",
            kind, url, attempts, detail
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_image_failed(url, kind, attempts, detail);
        }
    }
}
