//! Upload validation by size and magic bytes.
//!
//! Validation runs before any decode attempt, so an oversized or
//! wrong-format upload is rejected without touching the image decoder.

use crate::error::PipelineError;

/// Image containers the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }
}

/// Identifies the container from the first magic bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageKind> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some(ImageKind::Png);
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageKind::Jpeg);
    }
    // RIFF container with "WEBP" fourcc at offset 8.
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some(ImageKind::Webp);
    }
    None
}

/// Rejects oversized or unsupported uploads before decode.
pub fn validate_upload(data: &[u8], max_bytes: usize) -> Result<ImageKind, PipelineError> {
    if data.is_empty() {
        return Err(PipelineError::Validation("empty upload".to_string()));
    }
    if data.len() > max_bytes {
        return Err(PipelineError::Validation(format!(
            "upload of {} bytes exceeds the {} byte limit",
            data.len(),
            max_bytes
        )));
    }
    sniff_format(data).ok_or_else(|| {
        PipelineError::Validation("unsupported image format (expected JPEG, PNG or WEBP)".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 10 * 1024 * 1024;

    #[test]
    fn test_sniff_png() {
        let data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(sniff_format(&data), Some(ImageKind::Png));
    }

    #[test]
    fn test_sniff_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(sniff_format(&data), Some(ImageKind::Jpeg));
    }

    #[test]
    fn test_sniff_webp() {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"WEBP");
        assert_eq!(sniff_format(&data), Some(ImageKind::Webp));
    }

    #[test]
    fn test_sniff_riff_without_webp_fourcc() {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"WAVE");
        assert_eq!(sniff_format(&data), None);
    }

    #[test]
    fn test_validate_rejects_oversized_before_sniffing() {
        // 11 MB of valid-looking PNG must still fail on size.
        let mut data = vec![0u8; 11 * 1024 * 1024];
        data[..4].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47]);
        let result = validate_upload(&data, MAX);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_format() {
        let result = validate_upload(b"GIF89a....", MAX);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_validate_accepts_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        assert_eq!(validate_upload(&data, MAX).unwrap(), ImageKind::Jpeg);
    }
}
