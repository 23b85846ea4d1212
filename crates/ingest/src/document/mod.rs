//! Document loading: format dispatch by file extension, producing plain
//! text for the chunker. Unknown extensions fall back to the text loader.

mod md;
mod pdf;
mod txt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source format, derived from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Markdown,
    Text,
}

impl SourceFormat {
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            // txt, code files, anything else: treat as text
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }
}

/// Extracted document text ready for chunking. Ephemeral: consumed by the
/// chunker, not retained anywhere.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Source identifier (the original filename).
    pub source_id: String,
    pub format: SourceFormat,
    /// Full extracted text, pages joined with blank lines for PDFs.
    pub text: String,
}

/// Extract text from file bytes, dispatching on the filename extension.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<SourceDocument, ExtractionError> {
    let format = SourceFormat::from_filename(filename);
    let text = match format {
        SourceFormat::Pdf => pdf::extract_pdf(bytes)?,
        SourceFormat::Markdown => md::extract_md(bytes),
        SourceFormat::Text => txt::extract_txt(bytes),
    };

    Ok(SourceDocument {
        source_id: filename.to_string(),
        format,
        text,
    })
}
