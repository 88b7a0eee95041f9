//! Binary-safe text conversion: UTF-8 ⇄ UTF-16, byte-order marks, and the
//! plain-text file interface.
//!
//! # Decode policy
//! [`decode_utf8`] is **strict**: a malformed sequence yields
//! [`TextError::Malformed`] carrying the length of the valid prefix.
//! [`decode_utf8_lossy`] substitutes U+FFFD instead and never fails; the
//! container decoder uses it so that a damaged payload still parses and is
//! reported through the integrity verdict rather than as a hard error.
//!
//! # Plain-text files
//! Written as `EF BB BF ‖ utf8`.  Read by BOM:
//!
//! | BOM        | Decode path                                         |
//! |------------|-----------------------------------------------------|
//! | UTF-8      | strip 3 bytes, lossy UTF-8                          |
//! | UTF-16 LE  | strip 2 bytes, LE 16-bit units up to the first NUL  |
//! | UTF-16 BE  | strip 2 bytes, BE 16-bit units up to the first NUL  |
//! | none       | caller-supplied legacy decoder                      |
//!
//! A file always opens: malformed UTF-8 and unpaired surrogates become
//! U+FFFD on this path.  [`decode_utf8`] and [`utf16_to_utf8`] stay strict.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

/// UTF-8 byte-order mark.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
/// UTF-16 little-endian byte-order mark.
pub const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];
/// UTF-16 big-endian byte-order mark.
pub const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("Malformed UTF-8 after {valid_up_to} valid bytes")]
    Malformed { valid_up_to: usize },
    #[error("Unpaired UTF-16 surrogate at unit {index}")]
    UnpairedSurrogate { index: usize },
    #[error("Requested {requested} bytes but only {available} are available")]
    LengthOutOfRange { requested: usize, available: usize },
}

// ── BOM detection ────────────────────────────────────────────────────────────

/// Byte-order mark found at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    None,
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Bom {
    /// Number of bytes the mark occupies.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> usize {
        match self {
            Bom::None    => 0,
            Bom::Utf8    => UTF8_BOM.len(),
            Bom::Utf16Le => UTF16LE_BOM.len(),
            Bom::Utf16Be => UTF16BE_BOM.len(),
        }
    }
}

/// Inspect the first 2–3 bytes of `bytes`.
///
/// The 3-byte UTF-8 mark is tried first; the 2-byte UTF-16 marks only when
/// that fails.  Fewer than 2 bytes is always [`Bom::None`].
pub fn detect_bom(bytes: &[u8]) -> Bom {
    if bytes.len() < 2 {
        return Bom::None;
    }
    if bytes.starts_with(&UTF8_BOM) {
        Bom::Utf8
    } else if bytes.starts_with(&UTF16LE_BOM) {
        Bom::Utf16Le
    } else if bytes.starts_with(&UTF16BE_BOM) {
        Bom::Utf16Be
    } else {
        Bom::None
    }
}

// ── UTF-8 ────────────────────────────────────────────────────────────────────

/// UTF-8 bytes of `text`, with no BOM and no terminator.
pub fn encode_utf8(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

fn prefix(bytes: &[u8], len: Option<usize>) -> Result<&[u8], TextError> {
    match len {
        None => Ok(bytes),
        Some(n) if n <= bytes.len() => Ok(&bytes[..n]),
        Some(n) => Err(TextError::LengthOutOfRange { requested: n, available: bytes.len() }),
    }
}

/// Strictly decode the first `len` bytes (or all of them when `len` is `None`).
pub fn decode_utf8(bytes: &[u8], len: Option<usize>) -> Result<String, TextError> {
    let bytes = prefix(bytes, len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| TextError::Malformed { valid_up_to: e.valid_up_to() })
}

/// Decode with U+FFFD substitution.  A `len` past the end is clamped.
pub fn decode_utf8_lossy(bytes: &[u8], len: Option<usize>) -> String {
    let end = len.map_or(bytes.len(), |n| n.min(bytes.len()));
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// ── UTF-16 ───────────────────────────────────────────────────────────────────

/// 16-bit code units of `text`.
pub fn utf8_to_utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// UTF-8 bytes for a buffer of 16-bit units.  Unpaired surrogates are
/// rejected rather than replaced.
pub fn utf16_to_utf8(units: &[u16]) -> Result<Vec<u8>, TextError> {
    decode_units(units.iter().copied()).map(String::into_bytes)
}

fn decode_units<I: Iterator<Item = u16>>(units: I) -> Result<String, TextError> {
    let mut out   = String::new();
    let mut index = 0usize;
    for r in char::decode_utf16(units) {
        match r {
            Ok(c) => {
                index += c.len_utf16();
                out.push(c);
            }
            Err(_) => return Err(TextError::UnpairedSurrogate { index }),
        }
    }
    Ok(out)
}

fn decode_utf16_bytes_lossy(bytes: &[u8], big_endian: bool) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| if big_endian { BigEndian::read_u16(pair) } else { LittleEndian::read_u16(pair) })
        .take_while(|&u| u != 0);
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

// ── Plain-text files ─────────────────────────────────────────────────────────

/// File bytes for a plain-text save: UTF-8 BOM followed by the UTF-8 text.
pub fn encode_plain_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(UTF8_BOM.len() + text.len());
    out.extend_from_slice(&UTF8_BOM);
    out.extend_from_slice(text.as_bytes());
    out
}

/// Decode plain-text file bytes; BOM-less input is decoded as lossy UTF-8,
/// so this never returns an error.
pub fn decode_plain_text(bytes: &[u8]) -> Result<String, TextError> {
    decode_plain_text_with(bytes, |raw| Ok(decode_utf8_lossy(raw, None)))
}

/// Decode plain-text file bytes, handing BOM-less input to `legacy`
/// (the host's configured code page).
pub fn decode_plain_text_with<F>(bytes: &[u8], legacy: F) -> Result<String, TextError>
where
    F: FnOnce(&[u8]) -> Result<String, TextError>,
{
    let bom  = detect_bom(bytes);
    let body = &bytes[bom.len()..];
    match bom {
        Bom::Utf8    => Ok(decode_utf8_lossy(body, None)),
        Bom::Utf16Le => Ok(decode_utf16_bytes_lossy(body, false)),
        Bom::Utf16Be => Ok(decode_utf16_bytes_lossy(body, true)),
        Bom::None    => legacy(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trip() {
        assert!(encode_utf8("").is_empty());
        assert_eq!(decode_utf8(&[], None).unwrap(), "");
    }

    #[test]
    fn cjk_byte_lengths() {
        let bytes = encode_utf8("中文");
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode_utf8(&bytes, None).unwrap(), "中文");
        assert_eq!(utf8_to_utf16("Hello中文").len(), 7);
    }

    #[test]
    fn explicit_length_prefix() {
        assert_eq!(decode_utf8(b"Hello, World!", Some(5)).unwrap(), "Hello");
        assert_eq!(
            decode_utf8(b"abc", Some(4)),
            Err(TextError::LengthOutOfRange { requested: 4, available: 3 })
        );
    }

    #[test]
    fn malformed_is_reported_strictly_and_replaced_lossily() {
        let bad = [b'o', b'k', 0xC3, 0x28];
        assert_eq!(decode_utf8(&bad, None), Err(TextError::Malformed { valid_up_to: 2 }));
        assert_eq!(decode_utf8_lossy(&bad, None), "ok\u{FFFD}(");
    }

    #[test]
    fn bom_signatures() {
        assert_eq!(detect_bom(b"Hello"), Bom::None);
        assert_eq!(detect_bom(&[0xEF, 0xBB, 0xBF, b'x']), Bom::Utf8);
        assert_eq!(detect_bom(&[0xFF, 0xFE, b'x', 0]), Bom::Utf16Le);
        assert_eq!(detect_bom(&[0xFE, 0xFF, 0, b'x']), Bom::Utf16Be);
        assert_eq!(detect_bom(&[0xEF]), Bom::None);
        assert_eq!(detect_bom(&[0xEF, 0xBB]), Bom::None);
        assert_eq!(detect_bom(&[]), Bom::None);
    }

    #[test]
    fn unpaired_surrogate_rejected() {
        let units = [0x0041, 0xD800, 0x0042];
        assert_eq!(utf16_to_utf8(&units), Err(TextError::UnpairedSurrogate { index: 1 }));
        let pair = utf8_to_utf16("a😀");
        assert_eq!(utf16_to_utf8(&pair).unwrap(), "a😀".as_bytes());
    }

    #[test]
    fn plain_text_paths() {
        let saved = encode_plain_text("line1\r\n中文");
        assert_eq!(&saved[..3], &UTF8_BOM);
        assert_eq!(decode_plain_text(&saved).unwrap(), "line1\r\n中文");

        let mut le = UTF16LE_BOM.to_vec();
        for u in utf8_to_utf16("hi中") { le.extend_from_slice(&u.to_le_bytes()); }
        le.extend_from_slice(&[0, 0, b'z', 0]);
        assert_eq!(decode_plain_text(&le).unwrap(), "hi中");

        let mut be = UTF16BE_BOM.to_vec();
        for u in utf8_to_utf16("hé") { be.extend_from_slice(&u.to_be_bytes()); }
        assert_eq!(decode_plain_text(&be).unwrap(), "hé");

        assert_eq!(decode_plain_text(b"legacy").unwrap(), "legacy");
        assert_eq!(decode_plain_text(b"").unwrap(), "");
    }

    #[test]
    fn damaged_files_still_open() {
        let utf8 = [0xEF, 0xBB, 0xBF, b'o', b'k', 0xFF];
        assert_eq!(decode_plain_text(&utf8).unwrap(), "ok\u{FFFD}");
        assert_eq!(decode_plain_text(b"ok\xFF").unwrap(), "ok\u{FFFD}");

        let le = [0xFF, 0xFE, 0x41, 0x00, 0x00, 0xD8, 0x42, 0x00];
        assert_eq!(decode_plain_text(&le).unwrap(), "A\u{FFFD}B");

        let be = [0xFE, 0xFF, 0xDC, 0x00, 0x00, 0x43];
        assert_eq!(decode_plain_text(&be).unwrap(), "\u{FFFD}C");

        // The strict converters still refuse the same input.
        assert!(decode_utf8(&utf8[3..], None).is_err());
        assert!(utf16_to_utf8(&[0x0041, 0xD800, 0x0042]).is_err());
    }

    #[test]
    fn legacy_decoder_receives_body() {
        let out = decode_plain_text_with(&[0xE9], |raw| {
            Ok(raw.iter().map(|&b| b as char).collect())
        });
        assert_eq!(out.unwrap(), "é");
    }
}
