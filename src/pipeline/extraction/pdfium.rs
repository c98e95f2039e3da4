//! First-page rendering for PDF receipts, backed by PDFium.
//!
//! A fresh `Pdfium` binding is created per render: the binding is `!Send`,
//! while `PdfiumRenderer` has to be shared across request threads.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Longest side of a rendered page. Long thermal rolls hit this first.
const MAX_DIMENSION_PX: u32 = 4096;

pub const DEFAULT_RENDER_DPI: u32 = 200;
pub const JPEG_QUALITY: u8 = 90;

const POINTS_PER_INCH: f32 = 72.0;

pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fails up front when no PDFium library can be found, looking at
    /// `PDFIUM_DYNAMIC_LIB_PATH`, then next to the executable (or its `lib/`),
    /// then the system search path.
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::PdfRendering {
                page: 0,
                reason: format!("PDFIUM_DYNAMIC_LIB_PATH={path} is not loadable: {e}"),
            }
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let bundled = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| [dir.to_path_buf(), dir.join("lib")]))
        .into_iter()
        .flatten();
    for dir in bundled {
        let candidate =
            Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            debug!(dir = %dir.display(), "Using bundled PDFium");
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: format!("No PDFium library found (set PDFIUM_DYNAMIC_LIB_PATH): {e}"),
        })
}

/// Password-protected receipts get their own error.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let text = e.to_string().to_lowercase();
    if text.contains("password") || text.contains("encrypt") {
        return ExtractionError::PdfEncrypted;
    }
    ExtractionError::PdfRendering {
        page: 0,
        reason: format!("Unreadable PDF: {e}"),
    }
}

/// Pixel size of a page at `dpi`, scaled down so neither side exceeds
/// [`MAX_DIMENSION_PX`]. Returns the size and whether it was capped.
fn render_size(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32, bool) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let width = (width_points * scale).max(1.0);
    let height = (height_points * scale).max(1.0);

    let longest = width.max(height);
    let shrink = (MAX_DIMENSION_PX as f32 / longest).min(1.0);
    let to_px = |v: f32| ((v * shrink) as u32).clamp(1, MAX_DIMENSION_PX);
    (to_px(width), to_px(height), shrink < 1.0)
}

/// Encode as baseline JPEG. Alpha is dropped first; the JPEG encoder rejects it.
fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut cursor = Cursor::new(Vec::new());
    rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| ExtractionError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

impl PdfPageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let pages = document.pages();
        let page = u16::try_from(page_number)
            .ok()
            .and_then(|index| pages.get(index).ok())
            .ok_or_else(|| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!("document has {} pages", pages.len()),
            })?;

        let (target_w, target_h, capped) =
            render_size(page.width().value, page.height().value, dpi);
        if capped {
            warn!(page = page_number, target_w, target_h, "Receipt page downscaled");
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!("Rendering failed: {e}"),
            })?;

        let jpeg_bytes = encode_jpeg(&bitmap.as_image())?;

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            jpeg_size = jpeg_bytes.len(),
            "Rendered PDF page to JPEG"
        );

        Ok(jpeg_bytes)
    }
}

/// Mock renderer returning a tiny JPEG for each page in range, without
/// needing the PDFium binary.
pub struct MockPdfPageRenderer {
    page_count: usize,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_number: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if page_number >= self.page_count {
            return Err(ExtractionError::PdfRendering {
                page: page_number,
                reason: format!(
                    "Page {page_number} out of range (mock has {} pages)",
                    self.page_count
                ),
            });
        }
        encode_jpeg(&DynamicImage::new_rgb8(1, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_scales_with_dpi() {
        // 612 x 792 pt; 144 dpi is exactly 2 px per point
        let (w, h, capped) = render_size(612.0, 792.0, 144);
        assert_eq!((w, h), (1224, 1584));
        assert!(!capped);
    }

    #[test]
    fn long_thermal_roll_is_capped_keeping_width_ratio() {
        // 80 mm roll, about 2 m of paper
        let (w, h, capped) = render_size(227.0, 5670.0, DEFAULT_RENDER_DPI);
        assert!(capped);
        assert!(h >= MAX_DIMENSION_PX - 1 && h <= MAX_DIMENSION_PX, "height {h}");
        let ratio = h as f32 / w as f32;
        assert!((ratio - 5670.0 / 227.0).abs() < 0.5, "ratio {ratio}");
    }

    #[test]
    fn empty_page_box_still_renders_one_pixel() {
        assert_eq!(render_size(0.0, 0.0, DEFAULT_RENDER_DPI), (1, 1, false));
    }

    #[test]
    fn encode_jpeg_drops_alpha() {
        let bytes = encode_jpeg(&DynamicImage::new_rgba8(4, 4)).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn mock_renders_pages_in_range_only() {
        let mock = MockPdfPageRenderer::new(2);
        let jpeg = mock.render_page(&[], 0, DEFAULT_RENDER_DPI).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        assert!(matches!(
            mock.render_page(&[], 2, DEFAULT_RENDER_DPI),
            Err(ExtractionError::PdfRendering { page: 2, .. })
        ));
    }
}
