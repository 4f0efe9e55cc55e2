//! Binary container for encrypted payloads.
//!
//! ```text
//! offset size  field
//! 0      4     magic "EJSN"
//! 4      1     format version
//! 5      1     algorithm (1 = AES-128-GCM, 2 = AES-256-GCM)
//! 6      12    nonce
//! 18     n+16  ciphertext followed by the GCM tag
//! ```
//!
//! The header bytes are authenticated as associated data, so a change to any
//! byte of the file is reported as an authentication failure rather than
//! decrypting to garbage.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use crate::key_provider::KeyMaterial;

pub const MAGIC: &[u8; 4] = b"EJSN";
pub const VERSION: u8 = 1;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const HEADER_LEN: usize = MAGIC.len() + 2 + NONCE_LEN;
/// Smallest well-formed envelope: header plus the tag of an empty payload.
pub const MIN_LEN: usize = HEADER_LEN + TAG_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope too short: {len} bytes, need at least {MIN_LEN}")]
    Truncated { len: usize },
    #[error("not an ejson envelope (bad magic)")]
    BadMagic,
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown algorithm id {0}")]
    UnknownAlgorithm(u8),
    #[error("unsupported key length {0} (expected 16 or 32 bytes)")]
    UnsupportedKeyLength(usize),
    #[error("{algorithm} needs a {expected}-byte key, got {actual}")]
    KeyMismatch {
        algorithm: Algorithm,
        expected: usize,
        actual: usize,
    },
    #[error("authentication failed (wrong key or corrupted data)")]
    Authentication,
    #[error("encrypt failed: {0}")]
    Encrypt(String),
    #[error("nonce generation failed: {0}")]
    Random(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Aes128Gcm,
    Aes256Gcm,
}

impl Algorithm {
    pub fn for_key(key: &KeyMaterial) -> Result<Self, EnvelopeError> {
        match key.bytes().len() {
            16 => Ok(Self::Aes128Gcm),
            32 => Ok(Self::Aes256Gcm),
            other => Err(EnvelopeError::UnsupportedKeyLength(other)),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Aes128Gcm => 1,
            Self::Aes256Gcm => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, EnvelopeError> {
        match id {
            1 => Ok(Self::Aes128Gcm),
            2 => Ok(Self::Aes256Gcm),
            other => Err(EnvelopeError::UnknownAlgorithm(other)),
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm => 32,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes128Gcm => f.write_str("AES-128-GCM"),
            Self::Aes256Gcm => f.write_str("AES-256-GCM"),
        }
    }
}

/// Per-file metadata stored in front of the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub algorithm: Algorithm,
    pub nonce: [u8; NONCE_LEN],
}

impl Header {
    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(MAGIC);
        out[4] = self.version;
        out[5] = self.algorithm.id();
        out[6..].copy_from_slice(&self.nonce);
        out
    }

    fn parse(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < MIN_LEN {
            return Err(EnvelopeError::Truncated { len: bytes.len() });
        }
        if &bytes[..4] != MAGIC {
            return Err(EnvelopeError::BadMagic);
        }
        if bytes[4] != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(bytes[4]));
        }
        let algorithm = Algorithm::from_id(bytes[5])?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[6..HEADER_LEN]);
        Ok(Self {
            version: bytes[4],
            algorithm,
            nonce,
        })
    }
}

enum Cipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn new(algorithm: Algorithm, key: &KeyMaterial) -> Result<Self, EnvelopeError> {
        let mismatch = || EnvelopeError::KeyMismatch {
            algorithm,
            expected: algorithm.key_len(),
            actual: key.bytes().len(),
        };
        match algorithm {
            Algorithm::Aes128Gcm => Aes128Gcm::new_from_slice(key.bytes())
                .map(Self::Aes128)
                .map_err(|_| mismatch()),
            Algorithm::Aes256Gcm => Aes256Gcm::new_from_slice(key.bytes())
                .map(Self::Aes256)
                .map_err(|_| mismatch()),
        }
    }

    fn encrypt(
        &self,
        nonce: &[u8; NONCE_LEN],
        payload: Payload<'_, '_>,
    ) -> aes_gcm::aead::Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.encrypt(nonce, payload),
            Self::Aes256(cipher) => cipher.encrypt(nonce, payload),
        }
    }

    fn decrypt(
        &self,
        nonce: &[u8; NONCE_LEN],
        payload: Payload<'_, '_>,
    ) -> aes_gcm::aead::Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, payload),
            Self::Aes256(cipher) => cipher.decrypt(nonce, payload),
        }
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let algorithm = Algorithm::for_key(key)?;
    let cipher = Cipher::new(algorithm, key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| EnvelopeError::Random(e.to_string()))?;

    let header = Header {
        version: VERSION,
        algorithm,
        nonce,
    }
    .to_bytes();

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|e| EnvelopeError::Encrypt(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Authenticate and decrypt an envelope produced by [`seal`].
pub fn open(key: &KeyMaterial, bytes: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let header = Header::parse(bytes)?;
    let cipher = Cipher::new(header.algorithm, key)?;
    let (aad, ciphertext) = bytes.split_at(HEADER_LEN);

    cipher
        .decrypt(
            &header.nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EnvelopeError::Authentication)
}

/// Read header metadata without decrypting.
pub fn inspect(bytes: &[u8]) -> Result<(Header, usize), EnvelopeError> {
    let header = Header::parse(bytes)?;
    Ok((header, bytes.len() - HEADER_LEN))
}
