//! Fetched payloads and content-type inference.

/// A fetched payload and its content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    content_type: String,
    data: Vec<u8>,
}

impl Content {
    /// Create content from a type label and bytes.
    #[must_use]
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            data,
        }
    }

    /// The neutral "no data" result, as returned by a canceled fetch.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The content type: a MIME type or a bare file extension, possibly empty.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the content, returning its payload.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The extension of the final segment of `path`, or an empty string.
pub(crate) fn infer_from_extension(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.rfind('.')
        .map(|dot| name[dot + 1..].to_string())
        .unwrap_or_default()
}

/// Best-effort content type from leading magic bytes.
pub(crate) fn infer_from_data(data: &[u8]) -> String {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"II*\0", "image/tiff"),
        (b"MM\0*", "image/tiff"),
    ];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| data.starts_with(magic)) {
        return (*mime).to_string();
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp".to_string();
    }

    let text = data.trim_ascii_start();
    match text.first() {
        Some(b'{' | b'[') => "application/json".to_string(),
        Some(b'<') if text.starts_with(b"<?xml") => "application/xml".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_extension() {
        assert_eq!(infer_from_extension("/data/world.tif"), "tif");
        assert_eq!(infer_from_extension("http://host/a/b.tar.gz"), "gz");
        assert_eq!(infer_from_extension("http://host/v1.2/tiles"), "");
        assert_eq!(infer_from_extension("README"), "");
    }

    #[test]
    fn test_infer_from_data() {
        assert_eq!(
            infer_from_data(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            "image/png"
        );
        assert_eq!(infer_from_data(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(infer_from_data(b"II*\0\x08\0\0\0"), "image/tiff");
        assert_eq!(infer_from_data(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(infer_from_data(b"  {\"type\": 1}"), "application/json");
        assert_eq!(
            infer_from_data(b"<?xml version=\"1.0\"?><Capabilities/>"),
            "application/xml"
        );
        assert_eq!(infer_from_data(b"plain"), "");
        assert_eq!(infer_from_data(b""), "");
    }

    #[test]
    fn test_empty_content() {
        let content = Content::empty();
        assert!(content.is_empty());
        assert_eq!(content.content_type(), "");
    }
}
