use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::KeySource;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "ejson",
    about = "Load and save JSON documents encrypted at rest",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Where the encryption key comes from (overrides the config file).
    #[arg(long, global = true, value_enum)]
    pub key_source: Option<KeySource>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt a plaintext JSON file.
    Encrypt {
        /// Plaintext JSON input.
        input: PathBuf,
        /// Encrypted output (replaced atomically).
        output: PathBuf,
    },
    /// Decrypt a file and print its JSON.
    Decrypt {
        input: PathBuf,
        /// Write plaintext JSON here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print the document.
        #[arg(long)]
        pretty: bool,
    },
    /// Show envelope metadata without decrypting.
    Inspect { input: PathBuf },
    /// Round-trip a sample document through the data directory.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
