//! Image upload naming and fallback policy.
//!
//! # Responsibility
//! - Derive collision-free object names for uploaded images.
//! - Describe the upload outcome, including the placeholder fallback.
//!
//! # Invariants
//! - Object names are `<unix_millis>_<file name>` with whitespace runs
//!   replaced by `_`.
//! - Stamps are strictly increasing within one process.
//! - A failed upload still yields a usable image URL (the placeholder).

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Image shown when the gateway cannot store an upload.
pub const FALLBACK_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1618401471353-b98afee0b2eb?q=80&w=1476&auto=format&fit=crop";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static LAST_STAMP_MS: AtomicU64 = AtomicU64::new(0);

/// Raw image file handed over by a form or CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original client-side file name.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// MIME type when known, e.g. `image/png`.
    pub content_type: Option<String>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(str::to_string);
        Self {
            file_name,
            bytes,
            content_type,
        }
    }
}

/// Why an upload degraded to the placeholder image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    BucketMissing,
    /// Gateway could not be reached or rejected the request.
    Gateway(String),
}

/// Result of `ProjectStore::upload_image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadedImage {
    /// Blob stored; `url` is its public URL.
    Stored { url: String, path: String },
    /// Blob not stored; `url` is the configured placeholder.
    Placeholder { url: String, reason: FallbackReason },
}

impl UploadedImage {
    pub fn url(&self) -> &str {
        match self {
            Self::Stored { url, .. } | Self::Placeholder { url, .. } => url.as_str(),
        }
    }

    pub fn into_url(self) -> String {
        match self {
            Self::Stored { url, .. } | Self::Placeholder { url, .. } => url,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

/// Builds the storage object name for an upload.
pub fn object_name_for(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let base = if base.is_empty() { "upload" } else { base };
    format!("{}_{}", next_stamp_ms(), WHITESPACE_RE.replace_all(base, "_"))
}

/// Returns the current epoch millis, bumped past the previous stamp.
fn next_stamp_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);

    let mut previous = LAST_STAMP_MS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(previous + 1);
        match LAST_STAMP_MS.compare_exchange_weak(
            previous,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(current) => previous = current,
        }
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}
