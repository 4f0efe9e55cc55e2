use std::{
    fmt,
    sync::{Arc, Mutex},
};

use base64::{engine::general_purpose, Engine as _};
use keyring::credential::{CredentialBuilder, CredentialBuilderApi, CredentialPersistence};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Legacy program-wide key. Obfuscates files at rest; anyone holding the
/// binary can recover it, so it is not a confidentiality boundary.
const BUILTIN_KEY: &[u8; 16] = b"k7GhZ52Jb9wS7gRm";

/// Key material used for encryption at rest. Always 16 or 32 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    id: String,
    bytes: Vec<u8>,
}

impl KeyMaterial {
    pub fn new(id: impl Into<String>, bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() != 16 && bytes.len() != 32 {
            return Err(KeyError::Decode(format!(
                "expected 16 or 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            id: id.into(),
            bytes,
        })
    }

    /// Identifier for logging (never log key bytes).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("no key configured: {0}")]
    Missing(String),
}

/// Provides the key used to seal and open envelopes.
pub trait KeyProvider: Send + Sync {
    /// Return the existing key without creating or storing anything.
    fn key(&self) -> Result<KeyMaterial, KeyError>;

    /// Return the existing key, creating and storing one if the provider
    /// supports it. Only writers call this.
    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        self.key()
    }
}

impl<T: KeyProvider + ?Sized> KeyProvider for Box<T> {
    fn key(&self) -> Result<KeyMaterial, KeyError> {
        (**self).key()
    }

    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        (**self).get_or_create()
    }
}

/// The built-in legacy key shared by every installation.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinKeyProvider;

impl KeyProvider for BuiltinKeyProvider {
    fn key(&self) -> Result<KeyMaterial, KeyError> {
        KeyMaterial::new("builtin", BUILTIN_KEY.to_vec())
    }
}

/// OS keyring-backed provider. Generates a 256-bit key on first write.
///
/// Refuses to generate a key when the credential store would not keep it
/// (the in-memory mock store used on platforms without a native backend),
/// since files sealed with a forgotten key can never be opened again.
pub struct KeyringProvider {
    service: String,
    account: String,
    builder: Box<CredentialBuilder>,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self::with_builder(service, account, keyring::default::default_credential_builder())
    }

    /// Use a specific credential store instead of the platform default.
    pub fn with_builder(
        service: impl Into<String>,
        account: impl Into<String>,
        builder: Box<CredentialBuilder>,
    ) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            builder,
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        let credential = self
            .builder
            .build(None, &self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(keyring::Entry::new_with_credential(credential))
    }

    fn ensure_persistent(&self) -> Result<(), KeyError> {
        let lifetime = match self.builder.persistence() {
            CredentialPersistence::UntilDelete => return Ok(()),
            CredentialPersistence::EntryOnly => "entry only",
            CredentialPersistence::ProcessOnly => "process only",
            CredentialPersistence::UntilReboot => "until reboot",
            _ => "unknown",
        };
        Err(KeyError::Keyring(format!(
            "credential store does not persist keys (lifetime: {lifetime}); \
             build with a native keyring backend or use another key source"
        )))
    }
}

impl KeyProvider for KeyringProvider {
    fn key(&self) -> Result<KeyMaterial, KeyError> {
        match self.entry()?.get_password() {
            Ok(secret) => decode_key(&self.account, &secret),
            Err(keyring::Error::NoEntry) => Err(KeyError::Missing(format!(
                "no keyring entry for {}/{}",
                self.service, self.account
            ))),
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }

    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(secret) => decode_key(&self.account, &secret),
            Err(keyring::Error::NoEntry) => {
                self.ensure_persistent()?;
                let material = generate_key(&self.account)?;
                entry
                    .set_password(&encode_key(&material))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                Ok(material)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// Reads a base64 key from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyProvider for EnvKeyProvider {
    fn key(&self) -> Result<KeyMaterial, KeyError> {
        let secret = std::env::var(&self.var)
            .map_err(|e| KeyError::Missing(format!("{}: {e}", self.var)))?;
        decode_key(&self.var, secret.trim())
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

impl InMemoryKeyProvider {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<KeyMaterial>>, KeyError> {
        self.inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))
    }
}

impl KeyProvider for InMemoryKeyProvider {
    fn key(&self) -> Result<KeyMaterial, KeyError> {
        self.lock()?
            .clone()
            .ok_or_else(|| KeyError::Missing("in-memory key not created yet".to_string()))
    }

    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self.lock()?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = generate_key("memory")?;
        *guard = Some(material.clone());
        Ok(material)
    }
}

fn generate_key(id: &str) -> Result<KeyMaterial, KeyError> {
    let mut bytes = vec![0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KeyError::Generation(e.to_string()))?;
    KeyMaterial::new(id, bytes)
}

fn encode_key(material: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(&material.bytes)
}

fn decode_key(id: &str, secret: &str) -> Result<KeyMaterial, KeyError> {
    let bytes = general_purpose::STANDARD
        .decode(secret)
        .map_err(|e| KeyError::Decode(e.to_string()))?;
    KeyMaterial::new(id, bytes)
}
