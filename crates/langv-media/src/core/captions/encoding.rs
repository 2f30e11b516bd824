//! Text decoding with byte-order-mark detection.
//!
//! Subtitle files in the wild come as UTF-8 (with or without BOM), UTF-16 in
//! either byte order, and occasionally UTF-32LE. Input without a BOM is read
//! as UTF-8; invalid sequences are replaced, never rejected.

/// Encoding selected from the BOM prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
}

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF32_LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];

/// Detects the encoding and returns it with the BOM length.
///
/// The UTF-32LE mark starts with the UTF-16LE one, so it is checked first.
pub fn detect_encoding(bytes: &[u8]) -> (TextEncoding, usize) {
    if bytes.starts_with(BOM_UTF8) {
        (TextEncoding::Utf8, BOM_UTF8.len())
    } else if bytes.starts_with(BOM_UTF32_LE) {
        (TextEncoding::Utf32Le, BOM_UTF32_LE.len())
    } else if bytes.starts_with(BOM_UTF16_LE) {
        (TextEncoding::Utf16Le, BOM_UTF16_LE.len())
    } else if bytes.starts_with(BOM_UTF16_BE) {
        (TextEncoding::Utf16Be, BOM_UTF16_BE.len())
    } else {
        (TextEncoding::Utf8, 0)
    }
}

/// Decodes raw subtitle bytes into a string.
pub fn decode_text(bytes: &[u8]) -> String {
    let (encoding, bom_len) = detect_encoding(bytes);
    let body = &bytes[bom_len..];

    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
        TextEncoding::Utf16Le => decode_utf16(body, u16::from_le_bytes),
        TextEncoding::Utf16Be => decode_utf16(body, u16::from_be_bytes),
        TextEncoding::Utf32Le => body
            .chunks_exact(4)
            .map(|c| {
                char::from_u32(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
            })
            .collect(),
    }
}

fn decode_utf16(body: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units = body.chunks_exact(2).map(|c| to_unit([c[0], c[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
