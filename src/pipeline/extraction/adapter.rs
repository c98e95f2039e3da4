//! Extraction adapter: any supported upload in, one `StructuredRecord` out.
//!
//! Paginated documents are reduced to their first page before the model sees
//! them. The rendered page is written into the run's staging scope so the
//! caller's cleanup covers it along with the upload itself.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info, info_span};

use super::parser::parse_extraction_response;
use super::pdfium::DEFAULT_RENDER_DPI;
use super::prompt::EXTRACTION_INSTRUCTION;
use super::types::{ContentKind, ImageMime, PdfPageRenderer, StructuredRecord, VisionClient};
use super::ExtractionError;
use crate::pipeline::staging::StagingScope;

pub struct ExtractionAdapter {
    vision: Arc<dyn VisionClient>,
    renderer: Arc<dyn PdfPageRenderer>,
}

impl ExtractionAdapter {
    pub fn new(vision: Arc<dyn VisionClient>, renderer: Arc<dyn PdfPageRenderer>) -> Self {
        Self { vision, renderer }
    }

    /// Extract the nine invoice fields from `bytes`.
    ///
    /// `source_name` names the derived page image (`<stem>-page1.jpg`) when
    /// the document has to be rendered first.
    pub fn extract(
        &self,
        bytes: &[u8],
        kind: ContentKind,
        source_name: &str,
        scope: &mut StagingScope,
    ) -> Result<StructuredRecord, ExtractionError> {
        let _span = info_span!("vision_extract", kind = ?kind, size = bytes.len()).entered();

        let (image, mime) = match kind {
            ContentKind::Image { mime } => (bytes.to_vec(), mime),
            ContentKind::PaginatedDocument => {
                let jpeg = self.renderer.render_page(bytes, 0, DEFAULT_RENDER_DPI)?;
                let path = scope.write_artifact(&rendered_page_name(source_name), &jpeg)?;
                debug!(path = %path.display(), "First page rendered for extraction");
                (jpeg, ImageMime::Jpeg)
            }
        };

        let encoded = BASE64.encode(&image);
        let response = self
            .vision
            .describe_image(EXTRACTION_INSTRUCTION, &encoded, mime)?;

        let record = parse_extraction_response(&response)?;
        info!(
            invoice_number = %record.invoice_number,
            vendor = %record.vendor,
            "Extraction complete"
        );
        Ok(record)
    }

    /// Extract without knowing the kind up front; unknown formats are an error.
    pub fn extract_upload(
        &self,
        bytes: &[u8],
        filename: &str,
        scope: &mut StagingScope,
    ) -> Result<StructuredRecord, ExtractionError> {
        let kind = super::format::detect_content_kind(bytes, filename)
            .ok_or(ExtractionError::UnsupportedFormat)?;
        self.extract(bytes, kind, filename, scope)
    }
}

fn rendered_page_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}-page1.jpg")
}
