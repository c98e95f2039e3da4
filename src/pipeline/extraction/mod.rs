pub mod types;
pub mod format;
pub mod prompt;
pub mod parser;
pub mod vision;
pub mod pdfium;
pub mod adapter;

pub use types::*;
pub use format::*;
pub use parser::*;
pub use vision::*;
pub use adapter::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model answered, but not with the JSON object we asked for.
    #[error("Invalid JSON response: {diagnostic}")]
    InvalidResponse { raw: String, diagnostic: String },

    #[error("Vision model request failed: {0}")]
    Oracle(String),

    #[error("Vision model returned error (status {status}): {body}")]
    OracleStatus { status: u16, body: String },

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is encrypted or password-protected")]
    PdfEncrypted,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Unsupported format for extraction")]
    UnsupportedFormat,
}
