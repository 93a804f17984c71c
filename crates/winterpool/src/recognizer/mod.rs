//! Text recognition for applicant documents.
//!
//! Recognition is the slow stage of the pipeline, so it sits behind the
//! [`TextRecognizer`] trait: production uses the Tesseract-backed
//! engine, tests substitute a canned one.

pub mod tesseract;

use async_trait::async_trait;
use thiserror::Error;

pub use tesseract::TesseractRecognizer;

/// Errors that can occur while recognizing document text.
#[derive(Error, Debug)]
pub enum RecognizeError {
    /// PDF could not be parsed or rendered.
    #[error("Failed to process PDF: {0}")]
    Pdf(String),

    /// Character recognition on a rendered page failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// The blocking recognition task did not complete.
    #[error("Recognition task failed: {0}")]
    Task(String),
}

/// Turns document bytes into plain text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, pdf_bytes: Vec<u8>) -> Result<String, RecognizeError>;
}
