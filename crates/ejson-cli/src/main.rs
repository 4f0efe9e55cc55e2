mod cli;
mod config;
mod storage;

use std::{fs, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use ejson_core::storage::JsonStore;
use ejson_storage::envelope;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let store = || storage::store_from_config(&config, cli.key_source);

    match cli.command {
        Command::Encrypt { input, output } => {
            encrypt_file(&store(), &input, &output)?;
            println!("Encrypted {} -> {}", input.display(), output.display());
        }
        Command::Decrypt {
            input,
            output,
            pretty,
        } => {
            let rendered = decrypt_file(&store(), &input, pretty)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered + "\n")
                        .wrap_err_with(|| format!("writing {}", path.display()))?;
                    println!("Decrypted {} -> {}", input.display(), path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Command::Inspect { input } => print!("{}", inspect_file(&input)?),
        Command::Health => run_health_check(&config, &store())?,
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Version => print_version(),
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("ejson {}", env!("CARGO_PKG_VERSION"));
}

fn encrypt_file<S: JsonStore>(store: &S, input: &Path, output: &Path) -> Result<()> {
    let text =
        fs::read_to_string(input).wrap_err_with(|| format!("reading {}", input.display()))?;
    let value: Value = serde_json::from_str(&text)
        .wrap_err_with(|| format!("{} is not valid JSON", input.display()))?;
    store.save(output, &value)?;
    Ok(())
}

fn decrypt_file<S: JsonStore>(store: &S, input: &Path, pretty: bool) -> Result<String> {
    let value = store.load(input)?;
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(rendered)
}

fn inspect_file(input: &Path) -> Result<String> {
    let bytes = fs::read(input).wrap_err_with(|| format!("reading {}", input.display()))?;
    let (header, body_len) = envelope::inspect(&bytes)?;
    Ok(format!(
        "format: v{}\nalgorithm: {}\nnonce: {}\nciphertext: {} bytes (incl. {}-byte tag)\n",
        header.version,
        header.algorithm,
        STANDARD.encode(header.nonce),
        body_len,
        envelope::TAG_LEN,
    ))
}

/// Runs a quick health check of the encrypted storage path.
fn run_health_check<S: JsonStore>(config: &config::Config, store: &S) -> Result<()> {
    let root = storage::data_dir_from_config(config)?;
    fs::create_dir_all(&root).wrap_err_with(|| format!("creating {}", root.display()))?;
    run_store_health(store, &root)?;
    info!(root = %root.display(), "health check passed");
    println!("Storage: ok");
    Ok(())
}

fn run_store_health<S: JsonStore>(store: &S, root: &Path) -> Result<()> {
    let dir = tempfile::Builder::new()
        .prefix("health-")
        .tempdir_in(root)?;
    let sample = dir.path().join("health.enc");
    let payload = serde_json::json!({"health": "ok"});

    store.save(&sample, &payload)?;
    let round_trip = store.load(&sample)?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ejson_core::storage::JsonStoreError;

    #[test]
    fn health_check_with_test_store_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store();
        run_store_health(&store, dir.path()).expect("health check should succeed");
        assert_eq!(
            fs::read_dir(dir.path()).expect("read_dir").count(),
            0,
            "health check directory should be removed"
        );
    }

    #[test]
    fn encrypt_then_decrypt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("session.json");
        let output = dir.path().join("session.enc");
        fs::write(&input, r#"{ "name": "Alice", "score": 42 }"#).expect("write input");
        let store = storage::test_store();

        encrypt_file(&store, &input, &output).expect("encrypt");
        let compact = decrypt_file(&store, &output, false).expect("decrypt");
        assert_eq!(compact, r#"{"name":"Alice","score":42}"#);

        let pretty = decrypt_file(&store, &output, true).expect("decrypt");
        assert!(pretty.contains("\n  \"name\": \"Alice\""));
    }

    #[test]
    fn encrypt_rejects_invalid_json_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("broken.json");
        let output = dir.path().join("broken.enc");
        fs::write(&input, "{ not json").expect("write input");

        encrypt_file(&storage::test_store(), &input, &output).expect_err("invalid input");
        assert!(!output.exists(), "nothing should be written");
    }

    #[test]
    fn decrypt_surfaces_typed_store_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = decrypt_file(&storage::test_store(), &dir.path().join("absent.enc"), false)
            .expect_err("missing file");
        let store_err = err
            .downcast_ref::<JsonStoreError>()
            .expect("store error should be preserved");
        assert!(store_err.is_io());
    }

    #[test]
    fn inspect_reports_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.enc");
        let store = storage::test_store();
        store.save(&path, &serde_json::json!([1, 2, 3])).expect("save");

        let report = inspect_file(&path).expect("inspect");
        assert!(report.starts_with("format: v1\nalgorithm: AES-256-GCM\n"));
        assert!(report.contains("ciphertext: 23 bytes"));
    }

    #[test]
    fn inspect_rejects_plain_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plain.json");
        fs::write(&path, r#"{"padding": "enough bytes to pass the length check"}"#)
            .expect("write");
        let err = inspect_file(&path).expect_err("not an envelope");
        assert_eq!(
            err.downcast_ref::<envelope::EnvelopeError>(),
            Some(&envelope::EnvelopeError::BadMagic)
        );
    }
}
