use std::collections::HashMap;

use crate::constants::{GENERIC_EXTENSION, RESERVED_PATHS};

lazy_static::lazy_static! {
    /// Declared MIME type -> cosmetic file suffix. Not content sniffing.
    static ref EXTENSION_MAP: HashMap<&'static str, &'static str> = HashMap::from([
        ("image/jpeg", "jpg"),
        ("image/jpg", "jpg"),
        ("image/png", "png"),
        ("image/gif", "gif"),
        ("image/webp", "webp"),
        ("video/mp4", "mp4"),
        ("video/mpeg", "mpeg"),
        ("video/quicktime", "mov"),
        ("video/x-msvideo", "avi"),
        ("video/webm", "webm"),
        ("application/pdf", "pdf"),
        ("application/msword", "doc"),
        (
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "docx",
        ),
        ("text/plain", "txt"),
        ("application/zip", "zip"),
        ("application/x-rar-compressed", "rar"),
    ]);
}

/// Extension (without dot) for a declared content type; unknown types map to `bin`.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    EXTENSION_MAP.get(essence.as_str()).copied().unwrap_or(GENERIC_EXTENSION)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    pub code: String,
    pub extension: Option<String>,
}

/// Codes that collide with the API's own paths can never be looked up.
pub fn is_reserved_code(code: &str) -> bool {
    RESERVED_PATHS.contains(&code)
}

/// Split a `{code}` or `{code}.{ext}` path segment on its last dot.
///
/// Returns `None` for segments that can never name a file: empty parts and
/// the API's own paths.
pub fn parse_lookup_path(segment: &str) -> Option<LookupKey> {
    let (code, extension) = match segment.rsplit_once('.') {
        Some((code, ext)) => (code, Some(ext)),
        None => (segment, None),
    };

    if code.is_empty() || is_reserved_code(code) {
        return None;
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    match extension {
        Some("") => None,
        Some(ext) => Some(LookupKey {
            code: code.to_string(),
            extension: Some(ext.to_ascii_lowercase()),
        }),
        None => Some(LookupKey { code: code.to_string(), extension: None }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types_map_to_their_extension() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpg"), "jpg");
        assert_eq!(extension_for("video/quicktime"), "mov");
        assert_eq!(extension_for("text/plain; charset=utf-8"), "txt");
        assert_eq!(extension_for("Image/PNG"), "png");
    }

    #[test]
    fn test_unknown_types_fall_back_to_bin() {
        assert_eq!(extension_for("application/x-custom"), "bin");
        assert_eq!(extension_for("application/octet-stream"), "bin");
        assert_eq!(extension_for(""), "bin");
    }

    #[test]
    fn test_parse_code_with_and_without_extension() {
        assert_eq!(
            parse_lookup_path("aB3x"),
            Some(LookupKey { code: "aB3x".into(), extension: None })
        );
        assert_eq!(
            parse_lookup_path("aB3x.PNG"),
            Some(LookupKey { code: "aB3x".into(), extension: Some("png".into()) })
        );
    }

    #[test]
    fn test_parse_splits_on_last_dot() {
        // Codes are alphanumeric, so a dotted prefix can never resolve.
        assert_eq!(parse_lookup_path("aB.3x.png"), None);
    }

    #[test]
    fn test_parse_rejects_reserved_and_empty() {
        assert_eq!(parse_lookup_path(""), None);
        assert_eq!(parse_lookup_path(".png"), None);
        assert_eq!(parse_lookup_path("aB3x."), None);
        assert_eq!(parse_lookup_path("health"), None);
        assert_eq!(parse_lookup_path("files.json"), None);
    }
}
