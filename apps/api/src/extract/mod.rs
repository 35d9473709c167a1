//! Text extraction: turns an uploaded resume into plain text.
//!
//! One canonical policy: a typed result. Unknown extensions are rejected with
//! `UnsupportedFormat` before any parsing, and parser failures surface as errors
//! rather than being papered over with a raw byte decode.

mod docx;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type '{0}'. Upload a PDF, DOCX or TXT file.")]
    UnsupportedFormat(String),

    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),

    #[error("Failed to extract text from DOCX: {0}")]
    Docx(String),
}

/// File formats the extractor understands, detected from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::PlainText),
            "" => Err(ExtractError::UnsupportedFormat("(none)".to_string())),
            other => Err(ExtractError::UnsupportedFormat(format!(".{other}"))),
        }
    }
}

/// Extracts trimmed plain text from `content`, using `filename` as the format hint.
pub async fn extract_text(filename: &str, content: Bytes) -> Result<String, ExtractError> {
    let format = DocumentFormat::from_filename(filename)?;
    debug!("Extracting {:?} text from '{}' ({} bytes)", format, filename, content.len());

    let text = match format {
        DocumentFormat::Pdf => extract_pdf(content).await?,
        DocumentFormat::Docx => docx::extract_docx(&content)?,
        DocumentFormat::PlainText => decode_text(&content),
    };

    Ok(text.trim().to_string())
}

/// PDF parsing is CPU-bound and pdf-extract may panic on malformed input,
/// so it runs on the blocking pool where a panic becomes a `JoinError`.
async fn extract_pdf(content: Bytes) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&content))
        .await
        .map_err(|e| ExtractError::Pdf(format!("parser aborted: {e}")))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// UTF-8 decode that drops invalid sequences instead of failing.
fn decode_text(content: &[u8]) -> String {
    String::from_utf8_lossy(content)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect()
}
