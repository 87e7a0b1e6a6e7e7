//! Character encoding detection and decoding for export files
//!
//! # Detection Cascade
//!
//! 1. **Byte Order Mark**: UTF-8, UTF-16LE and UTF-16BE BOMs win outright
//! 2. **XML Declaration**: the `encoding="..."` pseudo-attribute of `<?xml ...?>`
//! 3. **Default to UTF-8**: XML's own default when nothing is declared
//!
//! # Examples
//!
//! ```rust
//! use article_export_markdown::charset::detect_charset;
//!
//! let xml = br#"<?xml version="1.0" encoding="ISO-8859-1"?><rss/>"#;
//! assert_eq!(detect_charset(xml), "ISO-8859-1");
//!
//! assert_eq!(detect_charset(b"<rss/>"), "UTF-8");
//! ```

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::error::ConversionError;

/// Default charset when detection fails
const DEFAULT_CHARSET: &str = "UTF-8";

/// The XML declaration must come first, so only the head of the file is scanned
const DECLARATION_SCAN_LIMIT: usize = 1024;

/// Detect the character encoding of an XML document
///
/// Always returns a charset label, normalized to uppercase.
pub fn detect_charset(xml: &[u8]) -> String {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(xml) {
        return normalize_charset(encoding.name());
    }

    if let Some(charset) = extract_charset_from_declaration(xml) {
        return normalize_charset(&charset);
    }

    DEFAULT_CHARSET.to_string()
}

/// Extract the `encoding` pseudo-attribute from the XML declaration
///
/// ```rust
/// use article_export_markdown::charset::extract_charset_from_declaration;
///
/// assert_eq!(
///     extract_charset_from_declaration(b"<?xml version='1.0' encoding='windows-1252'?>"),
///     Some("windows-1252".to_string())
/// );
/// assert_eq!(extract_charset_from_declaration(b"<?xml version=\"1.0\"?>"), None);
/// ```
pub fn extract_charset_from_declaration(xml: &[u8]) -> Option<String> {
    let scan_limit = std::cmp::min(xml.len(), DECLARATION_SCAN_LIMIT);
    let head = String::from_utf8_lossy(&xml[..scan_limit]);

    static DECLARATION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = DECLARATION_REGEX.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml\s[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).ok()
    });
    let regex = regex.as_ref()?;

    regex
        .captures(&head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalize charset name to uppercase
pub fn normalize_charset(charset: &str) -> String {
    charset.to_uppercase()
}

/// Decode raw export bytes to UTF-8 text
///
/// A leading BOM is stripped. Byte sequences that are invalid for the
/// detected charset are an error rather than being replaced.
pub fn decode_to_utf8(xml: &[u8]) -> Result<Cow<'_, str>, ConversionError> {
    decode_with_charset(xml).map(|(text, _)| text)
}

/// Decode raw export bytes to UTF-8 text, also returning the charset label
/// that was detected
pub fn decode_with_charset(xml: &[u8]) -> Result<(Cow<'_, str>, String), ConversionError> {
    let detected_charset = detect_charset(xml);

    let (encoding, body) = match encoding_rs::Encoding::for_bom(xml) {
        Some((encoding, bom_len)) => (encoding, &xml[bom_len..]),
        None => {
            let encoding = encoding_rs::Encoding::for_label(detected_charset.as_bytes())
                .ok_or_else(|| {
                    ConversionError::Encoding(format!(
                        "Unsupported charset '{}' in XML declaration",
                        detected_charset
                    ))
                })?;
            (encoding, xml)
        }
    };

    let text = if encoding == encoding_rs::UTF_8 {
        std::str::from_utf8(body).map(Cow::Borrowed).map_err(|e| {
            ConversionError::Encoding(format!(
                "Invalid UTF-8 at byte position {}: {}",
                e.valid_up_to(),
                e
            ))
        })?
    } else {
        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or_else(|| {
                ConversionError::Encoding(format!(
                    "Invalid byte sequence for charset '{}'",
                    detected_charset
                ))
            })?
    };

    Ok((text, detected_charset))
}
