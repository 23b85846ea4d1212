pub fn extract_txt(bytes: &[u8]) -> String {
    // Try UTF-8 first, fall back to lossy conversion
    String::from_utf8(bytes.to_vec())
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
        .trim()
        .to_string()
}
