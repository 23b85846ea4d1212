/// Markdown is chunked as-is: headings stay inline so retrieval hits keep
/// their section titles.
pub fn extract_md(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec())
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
        .trim()
        .to_string()
}
