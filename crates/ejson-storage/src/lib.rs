//! Encrypted-at-rest JSON documents.
//! AES-GCM envelopes keyed by a `KeyProvider` (built-in legacy key by default),
//! written through a `FileSystem` with atomic replace.

pub mod encrypted_json;
pub mod envelope;
pub mod key_provider;
pub mod local_fs;

pub use encrypted_json::{load, save, EncryptedJsonStore};
