use std::borrow::Cow;

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode bytes to a string, falling back from UTF-8 to a hinted encoding.
///
/// Handles UTF-8 (with or without BOM) first. If the bytes are not valid
/// UTF-8, the encoding named in `hint_encoding` is tried, and finally
/// Windows-1252, which covers most legacy ebooks.
///
/// # Examples
///
/// ```ignore
/// let utf8_bytes = "Hello, World!".as_bytes();
/// assert_eq!(decode_text(utf8_bytes, None), "Hello, World!");
/// ```
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    // Try UTF-8 first (handles BOM automatically)
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Decode markup bytes, honoring the encoding named in an XML declaration.
pub fn decode_markup(bytes: &[u8]) -> String {
    let hint = extract_xml_encoding(bytes);
    decode_text(bytes, hint).into_owned()
}

/// Decode stylesheet bytes, honoring a leading `@charset` rule.
pub fn decode_stylesheet(bytes: &[u8]) -> String {
    let hint = extract_css_charset(bytes);
    decode_text(bytes, hint).into_owned()
}

/// Extract the encoding from an XML declaration.
///
/// Only the first ~100 bytes are checked.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    quoted_value(after_enc)
}

/// Extract the encoding from a leading `@charset "...";` rule.
fn extract_css_charset(bytes: &[u8]) -> Option<&str> {
    let rest = bytes.strip_prefix(b"@charset ")?;
    quoted_value(rest)
}

fn quoted_value(bytes: &[u8]) -> Option<&str> {
    let quote = *bytes.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value_end = bytes[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&bytes[1..value_end]).ok()
}

/// Strip UTF-8 BOM (byte order mark) if present
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

// ============================================================================
// Tests
// ============================================================================
