//! Image validation, recompression, and data-URL encoding.
//!
//! DESIGN
//! ======
//! Selection runs [`validate_image`] synchronously so a bad file is rejected
//! before it is ever staged. Encoding happens later, at submission time, and
//! is a suspension point: the bytes are read with `tokio::fs` and the result
//! is a `data:<mime>;base64,...` string. Recompression decodes with the
//! `image` crate, downsamples proportionally to fit the bounds, and re-encodes
//! as JPEG on the blocking pool.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::config::CompressionSettings;
use crate::error::ErrorCode;

/// Inclusive upper bound on a selected image's size.
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("only JPG, PNG, and WebP images are supported (got {0})")]
    UnsupportedType(String),

    #[error("image must be 5MB or smaller (got {size} bytes)")]
    TooLarge { size: u64 },

    #[error("failed to read image: {0}")]
    Read(String),

    #[error("failed to load image: {0}")]
    Decode(String),

    #[error("image compression failed: {0}")]
    Encode(String),
}

impl ImageError {
    /// `true` for the selection-time rejections.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnsupportedType(_) | Self::TooLarge { .. })
    }
}

impl ErrorCode for ImageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "E_IMAGE_TYPE",
            Self::TooLarge { .. } => "E_IMAGE_TOO_LARGE",
            Self::Read(_) => "E_IMAGE_READ",
            Self::Decode(_) => "E_IMAGE_DECODE",
            Self::Encode(_) => "E_IMAGE_ENCODE",
        }
    }
}

// =============================================================================
// IMAGE FILE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A user-selected image: declared type and size plus where to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub source: ImageSource,
}

impl ImageFile {
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime: mime.into(), size: bytes.len() as u64, source: ImageSource::Bytes(bytes) }
    }

    /// Describe a file on disk. The declared type comes from the extension and
    /// the size from metadata; the contents are not read yet.
    ///
    /// # Errors
    ///
    /// [`ImageError::Read`] if the file's metadata is unavailable.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ImageError::Read(format!("{}: {e}", path.display())))?;
        if !meta.is_file() {
            return Err(ImageError::Read(format!("{}: not a regular file", path.display())));
        }
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self {
            name,
            mime: mime_for_path(path).to_owned(),
            size: meta.len(),
            source: ImageSource::Path(path.to_path_buf()),
        })
    }

    /// Read the full contents.
    ///
    /// # Errors
    ///
    /// [`ImageError::Read`] if the underlying file cannot be read.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, ImageError> {
        match &self.source {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ImageError::Read(format!("{}: {e}", path.display()))),
        }
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Selection gate: allowed declared type first, then the 5 MiB bound.
///
/// # Errors
///
/// [`ImageError::UnsupportedType`] or [`ImageError::TooLarge`].
pub fn validate_image(file: &ImageFile) -> Result<(), ImageError> {
    validate(&file.mime, file.size)
}

/// # Errors
///
/// See [`validate_image`].
pub fn validate(mime: &str, size: u64) -> Result<(), ImageError> {
    if !ALLOWED_IMAGE_TYPES.contains(&mime) {
        return Err(ImageError::UnsupportedType(mime.to_owned()));
    }
    if size > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge { size });
    }
    Ok(())
}

// =============================================================================
// ENCODING
// =============================================================================

#[must_use]
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Read the file and return it as a base64 data URL.
///
/// # Errors
///
/// [`ImageError::Read`] if the bytes cannot be read.
pub async fn encode(file: &ImageFile) -> Result<String, ImageError> {
    let bytes = file.read_bytes().await?;
    Ok(to_data_url(&file.mime, &bytes))
}

/// Encode for upload, recompressing first when `compression` is set.
///
/// # Errors
///
/// Any [`ImageError`] from reading, decoding, or re-encoding.
pub async fn prepare(file: &ImageFile, compression: Option<CompressionSettings>) -> Result<String, ImageError> {
    let Some(settings) = compression else {
        return encode(file).await;
    };
    let bytes = file.read_bytes().await?;
    let original = bytes.len();
    let compressed = tokio::task::spawn_blocking(move || {
        compress(&bytes, settings.max_width, settings.max_height, settings.quality)
    })
    .await
    .map_err(|e| ImageError::Encode(e.to_string()))??;
    debug!(name = %file.name, original, compressed = compressed.len(), "image: recompressed");
    Ok(to_data_url("image/jpeg", &compressed))
}

// =============================================================================
// COMPRESSION
// =============================================================================

/// Output dimensions after fitting `width`×`height` inside the bounds.
///
/// Unchanged when both dimensions already fit. Otherwise both are scaled by
/// `min(max_width / width, max_height / height)`, rounded, and floored at 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let ratio = (f64::from(max_width) / f64::from(width)).min(f64::from(max_height) / f64::from(height));
    let scaled = |dim: u32| ((f64::from(dim) * ratio).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Downsample to fit the bounds and re-encode as JPEG at `quality` (1-100).
///
/// # Errors
///
/// [`ImageError::Decode`] if `bytes` is not a recognizable image,
/// [`ImageError::Encode`] if JPEG output fails.
pub fn compress(bytes: &[u8], max_width: u32, max_height: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
    let (width, height) = scaled_dimensions(img.width(), img.height(), max_width.max(1), max_height.max(1));
    let resized = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    let rgb = image::DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
#[path = "imaging_test.rs"]
mod tests;
