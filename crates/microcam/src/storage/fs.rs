//! Filesystem operations used by the frame store.
//!
//! Everything the store does to disk goes through [`FrameFs`] so that
//! failures in individual operations can be injected in tests.

use std::io;
use std::path::Path;

/// A file in the storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, without the directory.
    pub name: String,
    /// Size in bytes.
    pub len: u64,
}

/// The filesystem operations the frame store relies on.
pub trait FrameFs: Send + Sync + std::fmt::Debug {
    /// Create a directory and all of its parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write `bytes` to `path`, replacing any existing contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Read the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create a hard link at `link` pointing at `original`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// Copy the contents of `from` into a new file at `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Rename `from` to `to`, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// List the regular files directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<FileEntry>>;
}

/// [`FrameFs`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FrameFs for OsFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(path, bytes)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        std::fs::hard_link(original, link)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        std::fs::copy(from, to)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                files.push(FileEntry {
                    name,
                    len: metadata.len(),
                });
            }
        }
        Ok(files)
    }
}
