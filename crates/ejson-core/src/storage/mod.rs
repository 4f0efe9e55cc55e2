//! Storage contracts shared by implementations and callers.

pub mod file_system;
pub mod json_store;

pub use file_system::{FileSystem, MemoryFileSystem};
pub use json_store::{JsonStore, JsonStoreError};
