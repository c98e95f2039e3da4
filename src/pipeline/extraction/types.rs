use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Placeholder for any field the vision model could not determine.
pub const SENTINEL: &str = "N/A";

/// What the uploaded bytes are, as far as extraction is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A still image that can be sent to the model as-is.
    Image { mime: ImageMime },
    /// A paginated document; only the first page is rendered and inspected.
    PaginatedDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMime {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// Line items as the model returned them: a list, or one free-text string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineItems {
    List(Vec<String>),
    Text(String),
}

impl Default for LineItems {
    fn default() -> Self {
        Self::Text(SENTINEL.to_string())
    }
}

/// The nine invoice fields. Every field is always present; unknown values hold
/// [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub invoice_number: String,
    pub date: String,
    pub amount: String,
    pub customer_name: String,
    pub vendor: String,
    pub masked_card_suffix: String,
    pub line_items: LineItems,
    pub billing_address: String,
    pub payment_method: String,
}

impl StructuredRecord {
    /// A record with every field set to the sentinel.
    pub fn sentinel() -> Self {
        Self {
            invoice_number: SENTINEL.into(),
            date: SENTINEL.into(),
            amount: SENTINEL.into(),
            customer_name: SENTINEL.into(),
            vendor: SENTINEL.into(),
            masked_card_suffix: SENTINEL.into(),
            line_items: LineItems::default(),
            billing_address: SENTINEL.into(),
            payment_method: SENTINEL.into(),
        }
    }
}

impl Default for StructuredRecord {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// Why structured extraction did not happen, kept for the humans downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    /// Raw model output when there was one, otherwise the error text.
    pub raw_text: String,
    pub diagnostic: String,
}

/// The record handed to the sinks: structured fields, plus the failure details
/// when extraction degraded to sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(flatten)]
    pub fields: StructuredRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<ExtractionFailure>,
}

impl ExtractedRecord {
    pub fn is_degraded(&self) -> bool {
        self.extraction_error.is_some()
    }
}

impl From<StructuredRecord> for ExtractedRecord {
    fn from(fields: StructuredRecord) -> Self {
        Self {
            fields,
            extraction_error: None,
        }
    }
}

impl From<&ExtractionError> for ExtractedRecord {
    fn from(err: &ExtractionError) -> Self {
        let failure = match err {
            ExtractionError::InvalidResponse { raw, diagnostic } => ExtractionFailure {
                raw_text: raw.clone(),
                diagnostic: diagnostic.clone(),
            },
            other => ExtractionFailure {
                raw_text: other.to_string(),
                diagnostic: other.to_string(),
            },
        };
        Self {
            fields: StructuredRecord::sentinel(),
            extraction_error: Some(failure),
        }
    }
}

/// Vision-capable model, treated as an opaque oracle: image in, text out.
pub trait VisionClient: Send + Sync {
    fn describe_image(
        &self,
        instruction: &str,
        image_base64: &str,
        mime: ImageMime,
    ) -> Result<String, ExtractionError>;
}

/// Renders a single page of a paginated document to an image.
pub trait PdfPageRenderer: Send + Sync {
    /// Render `page_number` (0-based) and return JPEG bytes.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
