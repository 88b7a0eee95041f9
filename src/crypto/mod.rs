//! SHA-1 content digests sealed with AES-128-CBC for MyNote files.
//!
//! Key derivation: SHA-256(secret)[..16] → AES-128 key
//! Sealing:        AES-128-CBC(key, iv, PKCS#7) over the 20-byte digest
//!
//! Sealed digest layout: [ ciphertext (32 B) ] holding a 20 B digest and 12 B of PKCS#7 padding.
//! The IV is stored next to the sealed digest by the container, not here.
//!
//! Only the digest is encrypted; note content is stored in the clear.

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of a SHA-1 digest.
pub const DIGEST_LEN: usize = 20;
/// Byte length of the CBC initialisation vector.
pub const IV_LEN: usize = 16;
/// Byte length of the sealed digest (digest padded to two AES blocks).
pub const SEALED_LEN: usize = 32;
/// Byte length of the derived AES-128 key.
pub const KEY_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The random source or cipher could not produce output.  Fatal for the call.
    #[error("Cryptographic primitive unavailable: {0}")]
    Unavailable(String),
    /// Padding or length check failed: wrong secret or damaged ciphertext.
    #[error("Sealed digest could not be decrypted")]
    DecryptionFailed,
}

/// SHA-1 of `data`.
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Sha1::digest(data));
    out
}

/// Fresh IV from the operating system's CSPRNG.
pub fn generate_iv() -> Result<[u8; IV_LEN], CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::Unavailable(e.to_string()))?;
    Ok(iv)
}

/// Constant-time equality of two digests.  Different lengths never match.
pub fn digests_match(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

// ── SealingKey ───────────────────────────────────────────────────────────────

/// AES-128 key derived from a shared secret.  Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SealingKey {
    key: [u8; KEY_LEN],
}

impl SealingKey {
    /// Derive the key as the first 16 bytes of SHA-256(`secret`).
    pub fn derive(secret: &[u8]) -> Self {
        let mut hash = Sha256::digest(secret);
        let mut key  = [0u8; KEY_LEN];
        key.copy_from_slice(&hash[..KEY_LEN]);
        hash.as_mut_slice().zeroize();
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Encrypt a digest under `iv`.  Deterministic for a given (digest, key, iv).
    pub fn seal(&self, digest: &[u8; DIGEST_LEN], iv: &[u8; IV_LEN]) -> Result<[u8; SEALED_LEN], CryptoError> {
        let mut buf = [0u8; SEALED_LEN];
        buf[..DIGEST_LEN].copy_from_slice(digest);
        let written = Aes128CbcEnc::new(&self.key.into(), &(*iv).into())
            .encrypt_padded_mut::<Pkcs7>(&mut buf, DIGEST_LEN)
            .map_err(|_| CryptoError::Unavailable("cipher output exceeds sealed digest size".into()))?
            .len();
        if written != SEALED_LEN {
            return Err(CryptoError::Unavailable(format!("cipher produced {written} bytes, expected {SEALED_LEN}")));
        }
        Ok(buf)
    }

    /// Decrypt a sealed digest.  A wrong key almost always fails the padding
    /// check; when it does not, the length check or the caller's digest
    /// comparison rejects it.
    pub fn open(&self, sealed: &[u8; SEALED_LEN], iv: &[u8; IV_LEN]) -> Result<[u8; DIGEST_LEN], CryptoError> {
        let mut buf = *sealed;
        let plain = Aes128CbcDec::new(&self.key.into(), &(*iv).into())
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let out = <[u8; DIGEST_LEN]>::try_from(plain).map_err(|_| CryptoError::DecryptionFailed);
        buf.zeroize();
        out
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey").field("key", &"[REDACTED]").finish()
    }
}

/// Derive a key from `secret` and seal `digest` under `iv`.
pub fn encrypt_digest(
    digest: &[u8; DIGEST_LEN],
    secret: &[u8],
    iv:     &[u8; IV_LEN],
) -> Result<[u8; SEALED_LEN], CryptoError> {
    SealingKey::derive(secret).seal(digest, iv)
}

/// Derive a key from `secret` and open a digest sealed by [`encrypt_digest`].
pub fn decrypt_digest(
    sealed: &[u8; SEALED_LEN],
    secret: &[u8],
    iv:     &[u8; IV_LEN],
) -> Result<[u8; DIGEST_LEN], CryptoError> {
    SealingKey::derive(secret).open(sealed, iv)
}
