// Image intake
//
// Validates uploads before any network call is spent on them. A RawImage is
// owned by the intake step and consumed by exactly one extraction call;
// nothing downstream retains the bytes.

use std::fs;
use std::path::Path;

use crate::error::TrackerError;

/// Largest image accepted, matching the inline-data cap of the AI endpoint.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Media types the pipeline accepts, same whitelist the original upload
/// surface enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
        }
    }

    /// Sniff from magic bytes. File extensions lie; the first bytes don't.
    fn sniff(bytes: &[u8]) -> Option<MediaType> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(MediaType::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(MediaType::Png);
        }
        None
    }
}

/// An opaque, validated image buffer bound to its declared media type.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    /// Where the image came from, for per-image reporting ("bill_3.jpg").
    pub label: String,
}

impl RawImage {
    /// Validate an in-memory buffer.
    pub fn from_bytes(bytes: Vec<u8>, label: impl Into<String>) -> Result<Self, TrackerError> {
        let label = label.into();
        if bytes.is_empty() {
            return Err(TrackerError::Intake {
                reason: format!("{label}: file is empty"),
            });
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(TrackerError::Intake {
                reason: format!(
                    "{label}: {} bytes exceeds the {} MB limit",
                    bytes.len(),
                    MAX_IMAGE_BYTES / (1024 * 1024)
                ),
            });
        }
        let media_type = MediaType::sniff(&bytes).ok_or_else(|| TrackerError::Intake {
            reason: format!("{label}: not a JPEG or PNG image"),
        })?;
        Ok(RawImage { bytes, media_type, label })
    }

    /// Read and validate a file from disk.
    pub fn from_path(path: &Path) -> Result<Self, TrackerError> {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let bytes = fs::read(path).map_err(|e| TrackerError::Intake {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_bytes(bytes, label)
    }
}

/// Load a batch of images, preserving input order. Each path validates
/// independently; the caller gets every failure, not just the first, so a
/// bad photo never blocks its neighbors.
pub fn load_images(paths: &[impl AsRef<Path>]) -> (Vec<RawImage>, Vec<TrackerError>) {
    let mut images = Vec::new();
    let mut failures = Vec::new();
    for path in paths {
        match RawImage::from_path(path.as_ref()) {
            Ok(image) => images.push(image),
            Err(e) => failures.push(e),
        }
    }
    (images, failures)
}
