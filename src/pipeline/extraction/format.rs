use std::path::Path;

use super::types::{ContentKind, ImageMime};

/// Detect what an upload is from its magic bytes, falling back to the
/// filename extension only when the header is inconclusive.
pub fn detect_content_kind(bytes: &[u8], filename: &str) -> Option<ContentKind> {
    detect_from_magic(bytes).or_else(|| detect_from_extension(filename))
}

fn detect_from_magic(bytes: &[u8]) -> Option<ContentKind> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some(ContentKind::PaginatedDocument),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(ContentKind::Image {
            mime: ImageMime::Jpeg,
        }),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ContentKind::Image {
            mime: ImageMime::Png,
        }),
        // GIF87a / GIF89a
        [b'G', b'I', b'F', b'8', ..] => Some(ContentKind::Image {
            mime: ImageMime::Gif,
        }),
        // WebP: RIFF....WEBP
        _ if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" => {
            Some(ContentKind::Image {
                mime: ImageMime::Webp,
            })
        }
        _ => None,
    }
}

fn detect_from_extension(filename: &str) -> Option<ContentKind> {
    let ext = Path::new(filename)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    let kind = match ext.as_str() {
        "pdf" => ContentKind::PaginatedDocument,
        "jpg" | "jpeg" => ContentKind::Image {
            mime: ImageMime::Jpeg,
        },
        "png" => ContentKind::Image {
            mime: ImageMime::Png,
        },
        "webp" => ContentKind::Image {
            mime: ImageMime::Webp,
        },
        "gif" => ContentKind::Image {
            mime: ImageMime::Gif,
        },
        _ => return None,
    };
    Some(kind)
}
