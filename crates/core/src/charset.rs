//! Response body decoding.

use regex::bytes::Regex;
use std::sync::LazyLock;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).unwrap()
});

/// How far into the body a `<meta charset>` declaration is looked for.
const META_SNIFF_LIMIT: usize = 1024;

/// Decode body bytes to a String.
///
/// The charset comes from the Content-Type header, then a `<meta>` declaration
/// near the top of the document, then statistical detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type.and_then(extract_charset).or_else(|| sniff_meta_charset(body));
    if let Some(charset) = declared
        && let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes())
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_string();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    tracing::debug!(encoding = encoding.name(), "detected body charset");
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from a Content-Type header.
pub fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    lower.split(';').find_map(|part| {
        part.trim().strip_prefix("charset=").map(|charset| charset.trim_matches('"').trim_matches('\'').to_string())
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(META_SNIFF_LIMIT)];
    let caps = META_CHARSET.captures(head)?;
    Some(String::from_utf8_lossy(&caps[1]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_charset() {
        assert_eq!(extract_charset("text/html; charset=ISO-8859-1"), Some("iso-8859-1".to_string()));
        assert_eq!(extract_charset("text/html; charset=\"utf-8\""), Some("utf-8".to_string()));
        assert_eq!(extract_charset("text/html"), None);
    }

    #[test]
    fn test_decode_with_header_charset() {
        let bytes: &[u8] = &[0x63, 0x61, 0x66, 0xe9];
        assert_eq!(decode_body(bytes, Some("text/html; charset=iso-8859-1")), "caf\u{e9}");
    }

    #[test]
    fn test_decode_with_meta_charset() {
        let mut bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>caf".to_vec();
        bytes.push(0xe9);
        let decoded = decode_body(&bytes, Some("text/html"));
        assert!(decoded.ends_with("caf\u{e9}"));
    }

    #[test]
    fn test_decode_http_equiv_meta() {
        let html = br#"<meta http-equiv="Content-Type" content="text/html; charset=utf-8">"#;
        assert_eq!(sniff_meta_charset(html), Some("utf-8".to_string()));
    }

    #[test]
    fn test_decode_utf8_without_declaration() {
        assert_eq!(decode_body("na\u{ef}ve".as_bytes(), None), "na\u{ef}ve");
    }

    #[test]
    fn test_decode_iso_8859_1_with_chardetng() {
        let iso_bytes: &[u8] = &[0x63, 0x61, 0x66, 0xe9];
        assert_eq!(decode_body(iso_bytes, None), "caf\u{e9}");
    }
}
