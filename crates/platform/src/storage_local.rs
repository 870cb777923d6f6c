//! Local filesystem Storage implementation for the desktop simulator.
//!
//! `LocalFileStorage` implements `platform::Storage` using `std::fs`.
//! Used when the `std` feature is enabled (simulator and tooling builds).
//! All paths are resolved relative to the `root` provided at construction.

use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::config::WIKI_ROOT_ENV;
use crate::storage::{File, Storage};

/// Error type for local filesystem operations.
#[derive(Debug)]
pub struct LocalStorageError(pub std::io::Error);

impl core::fmt::Display for LocalStorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "local storage error: {}", self.0)
    }
}

impl std::error::Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// An open file on the local filesystem.
pub struct LocalFile {
    inner: fs::File,
    size: u64,
}

impl File for LocalFile {
    type Error = LocalStorageError;

    /// Fills `buf` unless the end of the file comes first, like the
    /// on-device file layer does.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut pos = 0;
        while pos < buf.len() {
            // SAFETY: pos < buf.len() so buf[pos..] is a valid non-empty slice.
            #[allow(clippy::indexing_slicing)]
            match Read::read(&mut self.inner, &mut buf[pos..]) {
                Ok(0) => break,
                Ok(n) => pos = pos.saturating_add(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(LocalStorageError(e)),
            }
        }
        Ok(pos)
    }

    fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        Seek::seek(&mut self.inner, SeekFrom::Start(pos)).map_err(LocalStorageError)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A `platform::Storage` implementation backed by `std::fs`.
///
/// Paths passed to [`LocalFileStorage::open_file`] and [`LocalFileStorage::exists`]
/// are resolved relative to the `root` provided at construction.
///
/// # Example
/// ```no_run
/// use platform::storage_local::LocalFileStorage;
/// use platform::Storage;
/// let mut storage = LocalFileStorage::new("/home/user/wiki");
/// let file = storage.open_file("pedia.wom").unwrap();
/// ```
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Create a new storage rooted at `root`.
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self { root: PathBuf::from(root) }
    }

    /// Create from the `WIKI_ROOT` environment variable.
    ///
    /// Returns `None` if `WIKI_ROOT` is not set or is not valid UTF-8.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(WIKI_ROOT_ENV).ok().map(|p| Self::new(&p))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;

    fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let full = self.resolve(path);
        let file = fs::File::open(&full).map_err(LocalStorageError)?;
        let meta = file.metadata().map_err(LocalStorageError)?;
        Ok(LocalFile { inner: file, size: meta.len() })
    }

    fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(path).exists())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::{File, Storage};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn local_storage_read_full_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.bin"), b"hello world").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        let mut file = storage.open_file("test.bin").unwrap();
        let mut buf = [0u8; 11];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn local_storage_short_read_at_eof() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("short.bin"), b"abc").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        let mut file = storage.open_file("short.bin").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).unwrap(), 3);
    }

    #[test]
    fn local_storage_size_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("size.bin"), [0u8; 64]).unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        let file = storage.open_file("size.bin").unwrap();
        assert_eq!(file.size(), 64);
    }

    #[test]
    fn local_storage_seek_and_read() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("seek.bin"), b"ABCDEFGH").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        let mut file = storage.open_file("seek.bin").unwrap();
        file.seek(4).unwrap();
        let mut buf = [0u8; 4];
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, b"EFGH");
    }

    #[test]
    fn local_storage_leading_slash_is_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("pedia.wom"), b"x").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        assert!(storage.exists("/pedia.wom").unwrap());
    }

    #[test]
    fn local_storage_exists_false() {
        let tmp = TempDir::new().unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        assert!(!storage.exists("missing.bin").unwrap());
    }

    #[test]
    fn local_storage_open_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut storage = LocalFileStorage::new(tmp.path().to_str().unwrap());
        assert!(storage.open_file("missing.bin").is_err());
    }

    // The only test touching WIKI_ROOT, so no other test observes the change.
    #[test]
    fn local_storage_from_env_uses_wiki_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(crate::config::INDEX_FILE_NAME), b"WOM1").unwrap();

        let previous = std::env::var_os(WIKI_ROOT_ENV);
        std::env::set_var(WIKI_ROOT_ENV, tmp.path());
        let storage = LocalFileStorage::from_env();
        std::env::remove_var(WIKI_ROOT_ENV);
        let unset = LocalFileStorage::from_env();
        if let Some(value) = previous {
            std::env::set_var(WIKI_ROOT_ENV, value);
        }

        let mut storage = storage.unwrap();
        assert!(storage.exists(crate::config::INDEX_FILE_NAME).unwrap());
        assert!(unset.is_none());
    }
}
