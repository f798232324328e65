//! Image payload sniffing for upload validation.
//!
//! Content types are detected from magic bytes via `infer` rather than
//! client-supplied metadata, so a mislabelled payload cannot bypass
//! validation. Only the four supported input formats are accepted; anything
//! else `infer` recognizes (PDFs, executables, audio) is rejected the same
//! as unrecognized data.

/// Supported input image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageType {
    /// MIME type string for data-URL construction.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// Map a detected MIME type onto the supported set.
    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

/// Detect the image format from magic bytes.
///
/// Returns `None` when `infer` does not recognize the payload, or when the
/// detected type falls outside the supported image set.
pub fn detect_image_type(bytes: &[u8]) -> Option<ImageType> {
    infer::get(bytes).and_then(|kind| ImageType::from_mime(kind.mime_type()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_png() {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 8]);
        assert_eq!(detect_image_type(&bytes), Some(ImageType::Png));
    }

    #[test]
    fn test_detect_jpeg() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 12]);
        assert_eq!(detect_image_type(&bytes), Some(ImageType::Jpeg));
    }

    #[test]
    fn test_detect_gif() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        assert_eq!(detect_image_type(&bytes), Some(ImageType::Gif));
    }

    #[test]
    fn test_detect_webp() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(b"WEBP");
        assert_eq!(detect_image_type(&bytes), Some(ImageType::Webp));
    }

    #[test]
    fn test_reject_recognized_non_image() {
        // A PDF is detected by infer but is outside the supported set.
        assert_eq!(detect_image_type(b"%PDF-1.4 not an image"), None);
    }

    #[test]
    fn test_reject_unrecognized_data() {
        assert_eq!(detect_image_type(b"plain text content here"), None);
    }

    #[test]
    fn test_reject_truncated_payload() {
        assert_eq!(detect_image_type(&[0x89, 0x50, 0x4E]), None);
        assert_eq!(detect_image_type(&[]), None);
    }

    #[test]
    fn test_mime_strings() {
        assert_eq!(ImageType::Png.mime(), "image/png");
        assert_eq!(ImageType::Jpeg.mime(), "image/jpeg");
    }
}
