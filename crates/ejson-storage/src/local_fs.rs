use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use ejson_core::storage::FileSystem;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Disk-backed file system. Writes go to a temporary sibling which is then
/// renamed over the destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

/// Fully written temporary file that has not yet replaced its target.
/// Dropping it without [`StagedWrite::commit`] deletes the temporary file and
/// leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Rename the staged file over the target.
    pub fn commit(self) -> io::Result<()> {
        self.tmp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

impl LocalFileSystem {
    /// Write `bytes` to a synced temporary file next to `path`.
    pub fn stage(&self, path: &Path, bytes: &[u8]) -> io::Result<StagedWrite> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ejson-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        Ok(StagedWrite {
            tmp,
            target: path.to_path_buf(),
        })
    }
}

impl FileSystem for LocalFileSystem {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    #[instrument(skip_all, fields(path = %path.display(), len = bytes.len()))]
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let staged = self.stage(path, bytes)?;
        debug!(tmp = %staged.temp_path().display(), "staged write");
        staged.commit()
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn write_creates_parents_and_replaces_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/doc.enc");

        LocalFileSystem.write_atomic(&path, b"one").expect("first write");
        LocalFileSystem.write_atomic(&path, b"two").expect("second write");

        assert_eq!(LocalFileSystem.read_all(&path).expect("read"), b"two");
        assert!(LocalFileSystem.exists(&path));
        assert_eq!(entries(&dir.path().join("nested")), vec!["doc.enc"]);
    }

    #[test]
    fn uncommitted_stage_leaves_target_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.enc");
        fs::write(&path, b"original").expect("seed");

        let staged = LocalFileSystem.stage(&path, b"replacement").expect("stage");
        let tmp_path = staged.temp_path().to_path_buf();
        assert!(tmp_path.exists());
        assert_eq!(fs::read(&path).expect("read"), b"original");

        drop(staged);
        assert!(!tmp_path.exists(), "temporary file should be cleaned up");
        assert_eq!(fs::read(&path).expect("read"), b"original");
    }

    #[test]
    fn uncommitted_stage_does_not_create_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fresh.enc");

        drop(LocalFileSystem.stage(&path, b"data").expect("stage"));
        assert!(!LocalFileSystem.exists(&path));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn failed_rename_keeps_existing_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("occupied");
        fs::create_dir(&path).expect("mkdir");
        fs::write(path.join("keep.txt"), b"keep").expect("seed");

        LocalFileSystem
            .write_atomic(&path, b"data")
            .expect_err("cannot replace a directory");

        assert!(path.is_dir());
        assert_eq!(fs::read(path.join("keep.txt")).expect("read"), b"keep");
        assert_eq!(entries(dir.path()), vec!["occupied"]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LocalFileSystem
            .read_all(&dir.path().join("absent.enc"))
            .expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
