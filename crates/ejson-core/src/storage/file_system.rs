use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

/// Byte-oriented file system used by the encrypted store.
pub trait FileSystem: Send + Sync {
    /// Read the whole file into memory.
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the file's contents so readers see either the old bytes or the
    /// new bytes, never a partial write. On error the old contents remain.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Map-backed file system for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write_atomic` fail without touching stored files.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Overwrite raw bytes directly, bypassing any encryption.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> io::Result<()> {
        let mut files = self.lock()?;
        files.insert(path.into(), bytes);
        Ok(())
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|err| io::Error::other(format!("lock poisoned: {err}")))
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        let files = self.lock()?;
        files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("simulated write failure"));
        }
        let mut files = self.lock()?;
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().map(|f| f.contains_key(path)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_is_not_found() {
        let fs = MemoryFileSystem::new();
        let err = fs
            .read_all(Path::new("missing.enc"))
            .expect_err("should be missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!fs.exists(Path::new("missing.enc")));
    }

    #[test]
    fn failed_write_keeps_previous_bytes() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("doc.enc");
        fs.write_atomic(path, b"first").expect("write");

        fs.fail_writes(true);
        fs.write_atomic(path, b"second")
            .expect_err("write should fail");

        assert_eq!(fs.read_all(path).expect("read"), b"first");
    }
}
