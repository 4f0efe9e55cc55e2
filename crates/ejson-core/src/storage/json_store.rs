use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Errors produced by encrypted JSON store implementations.
///
/// Each failure stage keeps its own variant so callers can tell a missing
/// file apart from a wrong key or a corrupted payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonStoreError {
    /// File could not be opened, read, written or renamed into place.
    #[error("i/o failure on {path}: {reason}")]
    Io { path: String, reason: String },
    /// Envelope is truncated, malformed, or failed authentication.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },
    /// Decrypted bytes are not valid UTF-8 JSON (or not the requested shape).
    #[error("invalid json: {reason}")]
    Parse { reason: String },
    /// Key material could not be obtained from the provider, or has a length
    /// the cipher does not accept.
    #[error("key unavailable: {reason}")]
    Key { reason: String },
    /// Sealing failed before anything was written (nonce generation or
    /// cipher failure). The destination is untouched.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },
    /// A typed value could not be turned into JSON.
    #[error("serialization failed: {reason}")]
    Serialize { reason: String },
}

impl JsonStoreError {
    pub fn io(path: &Path, err: impl ToString) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn decryption(err: impl ToString) -> Self {
        Self::Decryption {
            reason: err.to_string(),
        }
    }

    pub fn parse(err: impl ToString) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_decryption(&self) -> bool {
        matches!(self, Self::Decryption { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Load/save contract for JSON documents kept encrypted at rest.
///
/// Calls are synchronous and keep no state between them beyond whatever key
/// the implementation was built with. Concurrent saves to the same path are
/// not coordinated; callers that need that must serialize them.
pub trait JsonStore: Send + Sync {
    /// Read, decrypt and parse the document at `path`.
    fn load(&self, path: &Path) -> Result<Value, JsonStoreError>;

    /// Serialize, encrypt and atomically replace the document at `path`.
    fn save(&self, path: &Path, value: &Value) -> Result<(), JsonStoreError>;

    /// Whether a document exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}
