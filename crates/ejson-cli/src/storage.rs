use std::path::PathBuf;

use crate::config::{Config, KeyConfig, KeySource};
use color_eyre::Result;
use dirs::data_dir;
#[cfg(test)]
use ejson_storage::key_provider::InMemoryKeyProvider;
use ejson_storage::{
    key_provider::{BuiltinKeyProvider, EnvKeyProvider, KeyProvider, KeyringProvider},
    local_fs::LocalFileSystem,
    EncryptedJsonStore,
};
use tracing::debug;

pub type CliStore = EncryptedJsonStore<LocalFileSystem, Box<dyn KeyProvider>>;

/// Resolve the default data directory for ejson.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("ejson"))
}

/// Data directory from config overrides, falling back to the platform default.
pub fn data_dir_from_config(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

/// Pick the key provider; a command-line source wins over the config file.
pub fn key_provider(config: &Config, source: Option<KeySource>) -> Box<dyn KeyProvider> {
    let key_cfg = config.key.clone().unwrap_or_default();
    let source = source.unwrap_or(key_cfg.source);
    debug!(?source, "selecting key provider");
    provider_for(source, &key_cfg)
}

fn provider_for(source: KeySource, key_cfg: &KeyConfig) -> Box<dyn KeyProvider> {
    match source {
        KeySource::Builtin => Box::new(BuiltinKeyProvider),
        KeySource::Keyring => Box::new(KeyringProvider::new(key_cfg.service(), key_cfg.account())),
        KeySource::Env => Box::new(EnvKeyProvider::new(key_cfg.env_var())),
    }
}

/// Build a store on local disk using config overrides.
pub fn store_from_config(config: &Config, source: Option<KeySource>) -> CliStore {
    EncryptedJsonStore::new(LocalFileSystem, key_provider(config, source))
}

/// Helper for tests to construct a store with an in-memory key.
#[cfg(test)]
pub fn test_store() -> EncryptedJsonStore<LocalFileSystem, InMemoryKeyProvider> {
    EncryptedJsonStore::new(LocalFileSystem, InMemoryKeyProvider::default())
}
