use std::path::Path;

use ejson_core::storage::{FileSystem, JsonStore, JsonStoreError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    envelope::{self, EnvelopeError},
    key_provider::{BuiltinKeyProvider, KeyProvider},
    local_fs::LocalFileSystem,
};

/// Read, decrypt and parse the JSON document at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load<F, P>(fs: &F, keys: &P, path: &Path) -> Result<Value, JsonStoreError>
where
    F: FileSystem + ?Sized,
    P: KeyProvider + ?Sized,
{
    let sealed = fs.read_all(path).map_err(|e| JsonStoreError::io(path, e))?;
    // Never create a key here: a fresh key cannot open an existing file.
    let key = keys.key().map_err(key_err)?;

    let plaintext = envelope::open(&key, &sealed).map_err(|e| {
        warn!(key_id = %key.id(), error = %e, "failed to open envelope");
        JsonStoreError::decryption(e)
    })?;

    let text = std::str::from_utf8(&plaintext).map_err(JsonStoreError::parse)?;
    let value = serde_json::from_str(text).map_err(JsonStoreError::parse)?;
    debug!(key_id = %key.id(), len = sealed.len(), "loaded document");
    Ok(value)
}

/// Serialize, encrypt and atomically write `value` to `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn save<F, P>(fs: &F, keys: &P, path: &Path, value: &Value) -> Result<(), JsonStoreError>
where
    F: FileSystem + ?Sized,
    P: KeyProvider + ?Sized,
{
    // Serializing an in-memory Value cannot fail: map keys are always strings.
    let plaintext = serde_json::to_vec(value).map_err(|e| JsonStoreError::Serialize {
        reason: e.to_string(),
    })?;
    let key = keys.get_or_create().map_err(key_err)?;

    let sealed = envelope::seal(&key, &plaintext).map_err(seal_err)?;

    fs.write_atomic(path, &sealed)
        .map_err(|e| JsonStoreError::io(path, e))?;
    debug!(key_id = %key.id(), len = sealed.len(), "saved document");
    Ok(())
}

/// Encrypted JSON store bound to a file system and key provider.
pub struct EncryptedJsonStore<F: FileSystem, P: KeyProvider> {
    fs: F,
    key_provider: P,
}

impl EncryptedJsonStore<LocalFileSystem, BuiltinKeyProvider> {
    /// Local disk with the built-in key. Files are obfuscated, not protected
    /// against anyone who has a copy of this program.
    pub fn builtin() -> Self {
        Self::new(LocalFileSystem, BuiltinKeyProvider)
    }
}

impl<F: FileSystem, P: KeyProvider> EncryptedJsonStore<F, P> {
    pub fn new(fs: F, key_provider: P) -> Self {
        Self { fs, key_provider }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    /// Load and deserialize into `T`. A shape mismatch is a parse error.
    pub fn load_as<T: DeserializeOwned>(&self, path: &Path) -> Result<T, JsonStoreError> {
        let value = self.load(path)?;
        serde_json::from_value(value).map_err(JsonStoreError::parse)
    }

    pub fn save_as<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), JsonStoreError> {
        let value = serde_json::to_value(value).map_err(|e| JsonStoreError::Serialize {
            reason: e.to_string(),
        })?;
        self.save(path, &value)
    }
}

impl<F: FileSystem, P: KeyProvider> JsonStore for EncryptedJsonStore<F, P> {
    fn load(&self, path: &Path) -> Result<Value, JsonStoreError> {
        load(&self.fs, &self.key_provider, path)
    }

    fn save(&self, path: &Path, value: &Value) -> Result<(), JsonStoreError> {
        save(&self.fs, &self.key_provider, path, value)
    }

    fn exists(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }
}

fn seal_err(err: EnvelopeError) -> JsonStoreError {
    match err {
        EnvelopeError::UnsupportedKeyLength(_) | EnvelopeError::KeyMismatch { .. } => {
            JsonStoreError::Key {
                reason: err.to_string(),
            }
        }
        other => JsonStoreError::Encryption {
            reason: other.to_string(),
        },
    }
}

fn key_err(err: crate::key_provider::KeyError) -> JsonStoreError {
    JsonStoreError::Key {
        reason: err.to_string(),
    }
}
