use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

pub const DEFAULT_KEY_ENV: &str = "EJSON_KEY";
const DEFAULT_KEYRING_SERVICE: &str = "ejson";
const DEFAULT_KEYRING_ACCOUNT: &str = "data-key";

/// User-level configuration loaded from `~/.config/ejson/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the data directory used by `ejson health`.
    pub data_dir: Option<PathBuf>,
    /// Key selection; the built-in key is used when absent.
    pub key: Option<KeyConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// Legacy key compiled into the binary (obfuscation only).
    #[default]
    Builtin,
    /// 256-bit key kept in the OS keychain.
    Keyring,
    /// Base64 key from an environment variable.
    Env,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct KeyConfig {
    #[serde(default)]
    pub source: KeySource,
    pub service: Option<String>,
    pub account: Option<String>,
    pub env_var: Option<String>,
}

impl KeyConfig {
    pub fn service(&self) -> &str {
        self.service.as_deref().unwrap_or(DEFAULT_KEYRING_SERVICE)
    }

    pub fn account(&self) -> &str {
        self.account.as_deref().unwrap_or(DEFAULT_KEYRING_ACCOUNT)
    }

    pub fn env_var(&self) -> &str {
        self.env_var.as_deref().unwrap_or(DEFAULT_KEY_ENV)
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("ejson").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn empty_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "  \n").expect("write");
        assert_eq!(load_from_path(&path).expect("load"), Config::default());
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/tmp/ejson-data"
            [key]
            source = "keyring"
            service = "studio"
            account = "profiles"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                data_dir: Some(PathBuf::from("/tmp/ejson-data")),
                key: Some(KeyConfig {
                    source: KeySource::Keyring,
                    service: Some("studio".into()),
                    account: Some("profiles".into()),
                    env_var: None,
                }),
            }
        );
        let key = cfg.key.expect("key config");
        assert_eq!(key.env_var(), DEFAULT_KEY_ENV);
        assert_eq!(key.service(), "studio");
    }

    #[test]
    fn key_source_defaults_to_builtin() {
        let cfg: Config = toml::from_str("[key]\nenv_var = \"MY_KEY\"").expect("parse");
        let key = cfg.key.expect("key config");
        assert_eq!(key.source, KeySource::Builtin);
        assert_eq!(key.env_var(), "MY_KEY");
    }

    #[test]
    fn write_default_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        let cfg = Config {
            data_dir: Some(PathBuf::from("/tmp/ejson-data")),
            key: None,
        };

        write_to_path_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config::default();
        let second = write_to_path_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        assert_eq!(load_from_path(&path).expect("load"), cfg);
    }
}
