use super::ExtractionError;

/// Extract text from PDF bytes. Pages (separated by form feeds in the
/// pdf-extract output) are joined with blank lines so paragraph-preferring
/// chunking never spans a page boundary mid-line.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        // Extraction succeeded but found no text (scanned/image PDF).
        return Err(ExtractionError::Pdf(
            "no extractable text (scanned or image-only PDF)".to_string(),
        ));
    }

    if text.contains('\x0C') {
        Ok(text
            .split('\x0C')
            .map(str::trim)
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    } else {
        Ok(trimmed.to_string())
    }
}
