//! MyNote container codec.
//!
//! # Layout (all integers little-endian)
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 8    | magic `MYNOTE01`                        |
//! | 8      | 20   | identity, zero-padded                   |
//! | 28     | 4    | content length N (u32)                  |
//! | 32     | N    | content, UTF-8                          |
//! | 32+N   | 16   | IV                                      |
//! | 48+N   | 32   | AES-128-CBC sealed SHA-1 of the content |
//!
//! The smallest well-formed container (N = 0) is 80 bytes.  There is no
//! version field; the magic is the only format identity.
//!
//! # Integrity
//! Decoding succeeds for any well-formed container.  Whether the sealed
//! digest matches the content is reported separately as [`Integrity`]; a
//! tampered file or a wrong secret still parses.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::crypto::{self, CryptoError, SealingKey, DIGEST_LEN, IV_LEN, SEALED_LEN};
use crate::text;

pub const MAGIC: &[u8; 8] = b"MYNOTE01";
pub const MAGIC_LEN: usize = 8;
pub const IDENTITY_LEN: usize = 20;
pub const LENGTH_FIELD_LEN: usize = 4;
/// Fixed prefix: magic + identity + content length.
pub const HEADER_LEN: usize = MAGIC_LEN + IDENTITY_LEN + LENGTH_FIELD_LEN;
/// Fixed suffix: IV + sealed digest.
pub const TRAILER_LEN: usize = IV_LEN + SEALED_LEN;
/// Size of a container with empty content.
pub const MIN_CONTAINER_LEN: usize = HEADER_LEN + TRAILER_LEN;
/// Largest content the editor opens.  Caller policy; the codec accepts the full u32 range.
pub const EDITOR_MAX_CONTENT: usize = 100 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Container too small: need {needed} bytes, have {actual}")]
    TooSmall { needed: u64, actual: u64 },
    #[error("Invalid MyNote header")]
    InvalidHeader,
    #[error("Content of {0} bytes does not fit the 32-bit length field")]
    ContentTooLarge(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FormatError {
    /// Short reason code for display.
    pub fn reason(&self) -> &'static str {
        match self {
            FormatError::TooSmall { .. }    => "too small",
            FormatError::InvalidHeader      => "invalid header",
            FormatError::ContentTooLarge(_) => "content too large",
            FormatError::Io(_)              => "io",
        }
    }
}

#[derive(Error, Debug)]
pub enum NoteError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

// ── Identity field ───────────────────────────────────────────────────────────

/// Zero-padded 20-byte identity field.  Longer identities are cut at the
/// last character boundary that fits.
pub fn identity_field(identity: &str) -> [u8; IDENTITY_LEN] {
    let mut end = identity.len().min(IDENTITY_LEN);
    while !identity.is_char_boundary(end) {
        end -= 1;
    }
    let mut field = [0u8; IDENTITY_LEN];
    field[..end].copy_from_slice(&identity.as_bytes()[..end]);
    field
}

/// Identity string stored in a field: everything before the first NUL.
pub fn identity_from_field(field: &[u8; IDENTITY_LEN]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(IDENTITY_LEN);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// ── NoteHeader ───────────────────────────────────────────────────────────────

/// The 32-byte fixed prefix of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteHeader {
    pub magic:       [u8; MAGIC_LEN],
    pub identity:    [u8; IDENTITY_LEN],
    pub content_len: u32,
}

impl NoteHeader {
    pub fn new(identity: &str, content_len: u32) -> Self {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..MAGIC_LEN + IDENTITY_LEN].copy_from_slice(&header_bytes(identity));
        LittleEndian::write_u32(&mut bytes[MAGIC_LEN + IDENTITY_LEN..], content_len);
        Self::split(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let prefix = header_bytes_from_field(&self.magic, &self.identity);
        let mut out = [0u8; HEADER_LEN];
        out[..prefix.len()].copy_from_slice(&prefix);
        LittleEndian::write_u32(&mut out[prefix.len()..], self.content_len);
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, FormatError> {
        if &bytes[..MAGIC_LEN] != MAGIC {
            return Err(FormatError::InvalidHeader);
        }
        Ok(Self::split(bytes))
    }

    fn split(bytes: &[u8; HEADER_LEN]) -> Self {
        let mut magic    = [0u8; MAGIC_LEN];
        let mut identity = [0u8; IDENTITY_LEN];
        magic.copy_from_slice(&bytes[..MAGIC_LEN]);
        identity.copy_from_slice(&bytes[MAGIC_LEN..MAGIC_LEN + IDENTITY_LEN]);
        let content_len = LittleEndian::read_u32(&bytes[MAGIC_LEN + IDENTITY_LEN..]);
        Self { magic, identity, content_len }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, FormatError> {
        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }

    /// Identity as stored, up to the first NUL.
    pub fn identity(&self) -> String {
        identity_from_field(&self.identity)
    }

    /// Total container length this header declares.
    pub fn container_len(&self) -> u64 {
        MIN_CONTAINER_LEN as u64 + u64::from(self.content_len)
    }
}

/// Magic followed by the padded identity field.
pub fn header_bytes(identity: &str) -> [u8; MAGIC_LEN + IDENTITY_LEN] {
    header_bytes_from_field(MAGIC, &identity_field(identity))
}

fn header_bytes_from_field(
    magic:    &[u8; MAGIC_LEN],
    identity: &[u8; IDENTITY_LEN],
) -> [u8; MAGIC_LEN + IDENTITY_LEN] {
    let mut out = [0u8; MAGIC_LEN + IDENTITY_LEN];
    out[..MAGIC_LEN].copy_from_slice(magic);
    out[MAGIC_LEN..].copy_from_slice(identity);
    out
}

/// `true` when `bytes` is at least [`MIN_CONTAINER_LEN`] long and starts with [`MAGIC`].
pub fn validate_header(bytes: &[u8]) -> bool {
    bytes.len() >= MIN_CONTAINER_LEN && bytes.starts_with(MAGIC)
}

// ── Integrity verdict ────────────────────────────────────────────────────────

/// Outcome of checking the sealed digest against the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    Valid,
    /// The sealed digest decrypted but does not match the content.
    DigestMismatch,
    /// The sealed digest did not decrypt under the supplied secret.
    Undecryptable,
}

impl Integrity {
    pub fn is_valid(self) -> bool {
        self == Integrity::Valid
    }

    pub fn reason(self) -> Option<&'static str> {
        match self {
            Integrity::Valid          => None,
            Integrity::DigestMismatch => Some("digest mismatch"),
            Integrity::Undecryptable  => Some("sealed digest undecryptable"),
        }
    }
}

// ── ParsedNote ───────────────────────────────────────────────────────────────

/// A decoded container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNote {
    /// Identity as stored, independent of what the caller expects.
    pub identity:  String,
    /// Content decoded with U+FFFD substitution for malformed bytes.
    pub content:   String,
    pub iv:        [u8; IV_LEN],
    pub integrity: Integrity,
}

impl ParsedNote {
    pub fn integrity_valid(&self) -> bool {
        self.integrity.is_valid()
    }

    /// Whether `expected` would be stored as the identity this note carries.
    pub fn identity_matches(&self, expected: &str) -> bool {
        self.identity == identity_from_field(&identity_field(expected))
    }
}

// ── Encode / decode ──────────────────────────────────────────────────────────

/// Encode `content` as a container with a fresh random IV.
pub fn encode(content: &str, identity: &str, secret: &[u8]) -> Result<Vec<u8>, NoteError> {
    let iv = crypto::generate_iv()?;
    encode_with_iv(content, identity, secret, &iv)
}

/// Encode with a caller-chosen IV.  Reusing an IV across saves makes two
/// saves of the same content byte-identical; [`encode`] is the normal path.
pub fn encode_with_iv(
    content:  &str,
    identity: &str,
    secret:   &[u8],
    iv:       &[u8; IV_LEN],
) -> Result<Vec<u8>, NoteError> {
    let utf8 = text::encode_utf8(content);
    let content_len = u32::try_from(utf8.len())
        .map_err(|_| FormatError::ContentTooLarge(utf8.len()))?;

    let header = NoteHeader::new(identity, content_len);
    let digest = crypto::digest(&utf8);
    let sealed = SealingKey::derive(secret).seal(&digest, iv)?;

    tracing::debug!(
        identity = %header.identity(),
        content_len,
        iv = %hex::encode(iv),
        secret_len = secret.len(),
        "encoding MyNote container"
    );

    let mut out = Vec::with_capacity(MIN_CONTAINER_LEN + utf8.len());
    header.write(&mut out).map_err(FormatError::from)?;
    out.extend_from_slice(&utf8);
    out.extend_from_slice(iv);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decode a container and check its integrity under `secret`.
///
/// Fails only for malformed containers or an unusable crypto backend; a
/// digest that does not verify is reported through [`ParsedNote::integrity`].
/// Bytes past the declared end are ignored.
pub fn decode(bytes: &[u8], secret: &[u8]) -> Result<ParsedNote, NoteError> {
    let header = read_header(bytes)?;

    let content_end = HEADER_LEN + header.content_len as usize;
    let content     = &bytes[HEADER_LEN..content_end];
    let mut iv      = [0u8; IV_LEN];
    let mut sealed  = [0u8; SEALED_LEN];
    iv.copy_from_slice(&bytes[content_end..content_end + IV_LEN]);
    sealed.copy_from_slice(&bytes[content_end + IV_LEN..content_end + TRAILER_LEN]);

    let computed  = crypto::digest(content);
    let integrity = verify(&computed, &sealed, secret, &iv)?;

    let identity = header.identity();
    tracing::debug!(
        identity = %identity,
        content_len = header.content_len,
        iv = %hex::encode(iv),
        ?integrity,
        "decoded MyNote container"
    );
    if let Some(reason) = integrity.reason() {
        tracing::warn!(identity = %identity, reason, "MyNote integrity check failed");
    }

    Ok(ParsedNote {
        identity,
        content: text::decode_utf8_lossy(content, None),
        iv,
        integrity,
    })
}

/// Fixed prefix of `bytes`, checked against the buffer: size and magic
/// first, then the declared length.
pub fn read_header(bytes: &[u8]) -> Result<NoteHeader, FormatError> {
    if !validate_header(bytes) {
        if bytes.len() < MIN_CONTAINER_LEN {
            return Err(FormatError::TooSmall {
                needed: MIN_CONTAINER_LEN as u64,
                actual: bytes.len() as u64,
            });
        }
        return Err(FormatError::InvalidHeader);
    }
    let header = NoteHeader::read(&bytes[..HEADER_LEN])?;

    let needed = header.container_len();
    if (bytes.len() as u64) < needed {
        return Err(FormatError::TooSmall { needed, actual: bytes.len() as u64 });
    }
    Ok(header)
}

fn verify(
    computed: &[u8; DIGEST_LEN],
    sealed:   &[u8; SEALED_LEN],
    secret:   &[u8],
    iv:       &[u8; IV_LEN],
) -> Result<Integrity, CryptoError> {
    match SealingKey::derive(secret).open(sealed, iv) {
        Ok(stored) if crypto::digests_match(computed, &stored) => Ok(Integrity::Valid),
        Ok(_)                                                   => Ok(Integrity::DigestMismatch),
        Err(CryptoError::DecryptionFailed)                      => Ok(Integrity::Undecryptable),
        Err(e)                                                  => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str     = "20250313017Z";
    const SECRET: &[u8] = b"BIGC_AI_2025_KEY";

    #[test]
    fn header_layout() {
        let h = header_bytes(ID);
        assert_eq!(h.len(), MAGIC_LEN + IDENTITY_LEN);
        assert_eq!(&h[..8], b"MYNOTE01");
        assert_eq!(&h[8..20], ID.as_bytes());
        assert!(h[20..].iter().all(|&b| b == 0));
        assert_eq!(&header_bytes("")[8..], &[0u8; IDENTITY_LEN]);
    }

    #[test]
    fn identity_truncates_on_char_boundary() {
        assert_eq!(identity_field("ABCDEFGHIJKLMNOPQRSTUVWXYZ"), *b"ABCDEFGHIJKLMNOPQRST");
        // 7 × 3-byte characters = 21 bytes; only 6 fit.
        let field = identity_field("学学学学学学学");
        assert_eq!(identity_from_field(&field), "学学学学学学");
        assert_eq!(&field[18..], &[0u8, 0]);
    }

    #[test]
    fn header_bytes_round_trip() {
        let header = NoteHeader::new(ID, 0x0102_0304);
        let bytes  = header.to_bytes();
        assert_eq!(&bytes[28..32], &[0x04, 0x03, 0x02, 0x01]);
        let back = NoteHeader::read(&bytes[..]).unwrap();
        assert_eq!(back, header);
        assert_eq!(back.identity(), ID);
        assert_eq!(back.container_len(), 80 + 0x0102_0304);
    }

    #[test]
    fn header_write_matches_prefix_helper() {
        let header = NoteHeader::new(ID, 5);
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        assert_eq!(out.len(), HEADER_LEN);
        assert_eq!(&out[..MAGIC_LEN + IDENTITY_LEN], &header_bytes(ID));
        assert_eq!(&out[..], &header.to_bytes());

        let note = encode_with_iv("hello", ID, SECRET, &[0u8; IV_LEN]).unwrap();
        assert_eq!(&note[..HEADER_LEN], &out[..]);
    }

    #[test]
    fn read_header_reports_size_before_magic() {
        let note = encode("abc", ID, SECRET).unwrap();
        assert_eq!(read_header(&note).unwrap().content_len, 3);

        assert!(matches!(read_header(&note[..20]), Err(FormatError::TooSmall { needed: 80, actual: 20 })));
        assert!(matches!(read_header(&[0u8; 90]), Err(FormatError::InvalidHeader)));
        assert!(matches!(read_header(&note[..82]), Err(FormatError::TooSmall { needed: 83, actual: 82 })));
    }

    #[test]
    fn validate_header_checks_size_and_magic() {
        let mut data = vec![0u8; MIN_CONTAINER_LEN];
        data[..8].copy_from_slice(MAGIC);
        assert!(validate_header(&data));
        data[0] = b'X';
        assert!(!validate_header(&data));
        assert!(!validate_header(&MAGIC[..]));
    }

    #[test]
    fn fixed_iv_output_is_deterministic() {
        let iv = [7u8; IV_LEN];
        let a  = encode_with_iv("same", ID, SECRET, &iv).unwrap();
        let b  = encode_with_iv("same", ID, SECRET, &iv).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), MIN_CONTAINER_LEN + 4);
    }

    #[test]
    fn empty_note_known_answer() {
        let mut iv = [0u8; IV_LEN];
        for (i, b) in iv.iter_mut().enumerate() { *b = i as u8; }
        let out = encode_with_iv("", ID, SECRET, &iv).unwrap();
        assert_eq!(out.len(), 80);
        assert_eq!(&out[28..32], &[0, 0, 0, 0]);
        assert_eq!(&out[32..48], &iv);
        assert_eq!(
            hex::encode(&out[48..]),
            "2a249c144d73269deb07a0bbfc65b9211d19a659d07b957d23e428d67ede231a"
        );
    }

    #[test]
    fn identity_policy_helper() {
        let note = decode(&encode("x", ID, SECRET).unwrap(), SECRET).unwrap();
        assert!(note.identity_matches(ID));
        assert!(!note.identity_matches("99999999999"));
    }

    #[test]
    fn error_reasons() {
        let short = decode(&[0u8; 10], SECRET).unwrap_err();
        assert!(matches!(short, NoteError::Format(ref e) if e.reason() == "too small"));
        let bad = decode(&[0u8; 100], SECRET).unwrap_err();
        assert!(matches!(bad, NoteError::Format(ref e) if e.reason() == "invalid header"));
    }
}
