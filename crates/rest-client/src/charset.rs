//! Content-Type charset negotiation

use encoding_rs::{EncoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// Charset applied to text bodies and JSON when none is given
pub const DEFAULT_CHARSET: &str = "utf-8";

const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "latin1",
    "l1",
    "cp819",
    "ibm819",
    "iso-ir-100",
    "csisolatin1",
];

const ASCII_LABELS: &[&str] = &[
    "us-ascii",
    "ascii",
    "us",
    "ansi_x3.4-1968",
    "ansi_x3.4-1986",
    "iso646-us",
    "iso_646.irv:1991",
    "iso-ir-6",
    "cp367",
    "ibm367",
    "csascii",
];

/// Byte written for characters the target charset cannot represent
const UNMAPPABLE: u8 = b'?';

/// Extract the `charset` parameter of a Content-Type value
pub fn parse_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Top-level media type of a Content-Type value, lowercased
pub fn top_level_type(content_type: &str) -> String {
    content_type
        .split(|c: char| c == '/' || c == ';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_latin1(label: &str) -> bool {
    LATIN1_LABELS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(label.trim()))
}

fn is_ascii(label: &str) -> bool {
    ASCII_LABELS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(label.trim()))
}

/// Whether the label names UTF-8
pub fn is_utf8(label: &str) -> bool {
    Encoding::for_label(label.trim().as_bytes()) == Some(UTF_8)
}

/// Encode text with the named charset, `None` if the charset is unknown
pub fn encode(text: &str, charset: &str) -> Option<Vec<u8>> {
    if is_latin1(charset) {
        return Some(
            text.chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(UNMAPPABLE))
                .collect(),
        );
    }
    // WHATWG maps the ASCII labels to windows-1252
    if is_ascii(charset) {
        return Some(
            text.chars()
                .map(|c| if c.is_ascii() { c as u8 } else { UNMAPPABLE })
                .collect(),
        );
    }

    let encoding = Encoding::for_label(charset.trim().as_bytes())?;

    // encoding_rs only encodes to ASCII-compatible targets
    if encoding == UTF_16LE {
        return Some(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Some(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }
    if encoding == UTF_8 {
        return Some(text.as_bytes().to_vec());
    }

    Some(encode_without_replacement(encoding, text))
}

fn encode_without_replacement(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(text.len())
        .unwrap_or(text.len());
    let mut out = Vec::with_capacity(capacity);
    let mut input = text;

    loop {
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(input, &mut out, true);
        input = &input[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => out.reserve(input.len().max(16)),
            EncoderResult::Unmappable(_) => {
                out.reserve(1);
                out.push(UNMAPPABLE);
            }
        }
    }
    out
}

/// Decode bytes with the named charset, `None` if the charset is unknown
pub fn decode(bytes: &[u8], charset: &str) -> Option<String> {
    if is_latin1(charset) {
        return Some(decode_latin1(bytes));
    }
    if is_ascii(charset) {
        return Some(
            bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        );
    }

    let encoding = Encoding::for_label(charset.trim().as_bytes())?;
    Some(encoding.decode_without_bom_handling(bytes).0.into_owned())
}

/// Decode bytes as ISO-8859-1
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_charset() {
        assert_eq!(
            parse_charset("text/plain; charset=ISO-8859-1"),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(
            parse_charset("text/html;Charset=\"utf-8\""),
            Some("utf-8".to_string())
        );
        assert_eq!(parse_charset("text/plain"), None);
        assert_eq!(parse_charset("text/plain; format=flowed"), None);
        assert_eq!(parse_charset("text/plain; charset="), None);
    }

    #[test]
    fn test_top_level_type() {
        assert_eq!(top_level_type("TEXT/html; charset=x"), "text");
        assert_eq!(top_level_type("application/json"), "application");
        assert_eq!(top_level_type(""), "");
    }

    #[test]
    fn test_latin1_round_trip_is_exact() {
        let bytes = encode("caf\u{e9}", "ISO-8859-1").expect("latin1 is supported");
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode(&bytes, "latin1").as_deref(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_latin1_replaces_unmappable() {
        let bytes = encode("\u{20ac}", "iso-8859-1").expect("latin1 is supported");
        assert_eq!(bytes, b"?");
    }

    #[test]
    fn test_utf16_encoding() {
        let bytes = encode("hi", "UTF-16BE").expect("utf-16be is supported");
        assert_eq!(bytes, vec![0, b'h', 0, b'i']);
        let bytes = encode("hi", "utf-16le").expect("utf-16le is supported");
        assert_eq!(bytes, vec![b'h', 0, b'i', 0]);
    }

    #[test]
    fn test_unknown_charset() {
        assert!(encode("x", "x-no-such-charset").is_none());
        assert!(decode(b"x", "x-no-such-charset").is_none());
    }

    #[test]
    fn test_unmappable_characters_become_question_marks() {
        let bytes = encode("caf\u{e9}", "Shift_JIS").expect("shift_jis is supported");
        assert_eq!(bytes, b"caf?");

        let bytes = encode("caf\u{e9} \u{3042}", "windows-1251").expect("cp1251 is supported");
        assert_eq!(bytes, b"caf? ?");
    }

    #[test]
    fn test_ascii_is_exact() {
        let bytes = encode("caf\u{e9}", "us-ascii").expect("ascii is supported");
        assert_eq!(bytes, b"caf?");
        assert_eq!(decode(b"caf\xe9", "US-ASCII").as_deref(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_shift_jis_decode() {
        let bytes = encode("\u{3042}", "Shift_JIS").expect("shift_jis is supported");
        assert_eq!(decode(&bytes, "shift_jis").as_deref(), Some("\u{3042}"));
    }
}
