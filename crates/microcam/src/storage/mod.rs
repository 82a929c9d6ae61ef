//! Storage layer for microcam.
//!
//! Frames are plain files in a single directory, named after the second they
//! were received in. The directory also holds the `latest.jpg` pointer. There
//! is no index and no retention; frames accumulate until something outside
//! the service removes them.

pub mod fs;
pub mod pointer;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::frame::{Frame, FrameId, LATEST_POINTER_NAME};

pub use fs::{FileEntry, FrameFs, OsFs};
pub use pointer::{update_pointer, PointerUpdate};

/// Directory-backed frame storage.
#[derive(Debug)]
pub struct FrameStore {
    /// Directory holding frames and the latest pointer.
    root: PathBuf,
    /// Filesystem operations.
    fs: Arc<dyn FrameFs>,
    /// Sequence for pointer scratch files.
    scratch_seq: AtomicU64,
}

impl FrameStore {
    /// Open the store rooted at `root`, creating the directory (and its
    /// parents) if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(root, Arc::new(OsFs))
    }

    /// Open the store with custom filesystem operations.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_with(root: impl AsRef<Path>, fs: Arc<dyn FrameFs>) -> Result<Self> {
        let store = Self::at(root, fs);
        store
            .fs
            .create_dir_all(&store.root)
            .map_err(|source| Error::DirectoryCreate {
                path: store.root.clone(),
                source,
            })?;
        info!("Frame storage ready at {}", store.root.display());
        Ok(store)
    }

    /// Attach to a store without touching the filesystem.
    ///
    /// Used by read-only commands that should not create the directory.
    #[must_use]
    pub fn at(root: impl AsRef<Path>, fs: Arc<dyn FrameFs>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            fs,
            scratch_seq: AtomicU64::new(0),
        }
    }

    /// Get the storage directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the frame with the given identity.
    #[must_use]
    pub fn frame_path(&self, id: FrameId) -> PathBuf {
        self.root.join(id.file_name())
    }

    /// Path of the latest pointer.
    #[must_use]
    pub fn latest_path(&self) -> PathBuf {
        self.root.join(LATEST_POINTER_NAME)
    }

    /// Write a frame to disk, overwriting any frame with the same identity.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWrite`] if the file cannot be written.
    pub fn write_frame(&self, frame: &Frame) -> Result<PathBuf> {
        let path = self.frame_path(frame.id);
        self.fs
            .write(&path, &frame.payload)
            .map_err(|source| Error::StorageWrite {
                path: path.clone(),
                source,
            })?;
        debug!("Wrote {} ({} bytes)", path.display(), frame.len());
        Ok(path)
    }

    /// Point `latest.jpg` at the frame stored at `frame_path`.
    ///
    /// Never fails; the outcome says which strategy took effect.
    pub fn update_latest(&self, frame_path: &Path) -> PointerUpdate {
        let latest = self.latest_path();
        let seq = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        let scratch = pointer::scratch_path(&latest, seq);
        update_pointer(self.fs.as_ref(), frame_path, &latest, &scratch)
    }

    /// Read the bytes currently behind the latest pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameNotFound`] if no pointer exists, or
    /// [`Error::StorageRead`] if it cannot be read.
    pub fn read_latest(&self) -> Result<Vec<u8>> {
        let path = self.latest_path();
        match self.fs.read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::frame_not_found(path)),
            Err(source) => Err(Error::StorageRead { path, source }),
        }
    }

    /// Get storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        let mut oldest: Option<FrameId> = None;
        let mut newest: Option<FrameId> = None;

        for entry in self.fs.list_files(&self.root)? {
            if entry.name == LATEST_POINTER_NAME {
                stats.has_latest = true;
                continue;
            }
            let Some(id) = FrameId::parse_file_name(&entry.name) else {
                continue;
            };
            stats.total_frames += 1;
            stats.total_bytes += entry.len;
            oldest = Some(oldest.map_or(id, |o| o.min(id)));
            newest = Some(newest.map_or(id, |n| n.max(id)));
        }

        stats.oldest_frame = oldest.and_then(FrameId::timestamp);
        stats.newest_frame = newest.and_then(FrameId::timestamp);
        Ok(stats)
    }
}

/// Statistics about the storage directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of frame files.
    pub total_frames: u64,
    /// Combined size of all frame files in bytes.
    pub total_bytes: u64,
    /// Receive time of the oldest frame.
    pub oldest_frame: Option<DateTime<Utc>>,
    /// Receive time of the newest frame.
    pub newest_frame: Option<DateTime<Utc>>,
    /// Whether the latest pointer is present.
    pub has_latest: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn frame_at(secs: i64, payload: &[u8]) -> Frame {
        Frame::new(
            Utc.timestamp_opt(secs, 0).unwrap(),
            "test-cam",
            payload.to_vec(),
        )
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("non_existent_dir").join("nested");

        let store = FrameStore::open(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_open_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, b"not a dir").unwrap();

        let result = FrameStore::open(&root);
        assert!(matches!(result, Err(Error::DirectoryCreate { .. })));
    }

    #[test]
    fn test_at_does_not_create_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("absent");

        let _store = FrameStore::at(&root, Arc::new(OsFs));
        assert!(!root.exists());
    }

    #[test]
    fn test_write_and_read_frame() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();
        let frame = frame_at(1_234_567_890, b"fake image data");

        let path = store.write_frame(&frame).unwrap();

        assert_eq!(path, dir.path().join("frame_1234567890.jpg"));
        assert_eq!(std::fs::read(store.frame_path(frame.id)).unwrap(), b"fake image data");
    }

    #[test]
    fn test_same_second_overwrites() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();

        store.write_frame(&frame_at(100, b"first")).unwrap();
        store.write_frame(&frame_at(100, b"second")).unwrap();

        assert_eq!(
            std::fs::read(store.frame_path(FrameId::from_epoch_secs(100))).unwrap(),
            b"second"
        );
        assert_eq!(store.stats().unwrap().total_frames, 1);
    }

    #[test]
    fn test_write_frame_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let store = FrameStore::at(dir.path().join("gone"), Arc::new(OsFs));

        let result = store.write_frame(&frame_at(1, b"x"));
        assert!(matches!(result, Err(Error::StorageWrite { .. })));
    }

    #[test]
    fn test_read_latest_before_any_upload() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();

        let err = store.read_latest().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_latest_follows_newest_frame() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();

        for (secs, payload) in [(1, b"image 0"), (2, b"image 1"), (3, b"image 2")] {
            let path = store.write_frame(&frame_at(secs, payload)).unwrap();
            assert_eq!(store.update_latest(&path), PointerUpdate::Linked);
        }

        assert_eq!(store.read_latest().unwrap(), b"image 2");
        assert_eq!(
            std::fs::read(store.frame_path(FrameId::from_epoch_secs(1))).unwrap(),
            b"image 0"
        );
    }

    #[test]
    fn test_stats_empty() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();

        assert_eq!(store.stats().unwrap(), StorageStats::default());
    }

    #[test]
    fn test_stats_counts_frames_only() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();
        let first = store.write_frame(&frame_at(1_000, b"aaaa")).unwrap();
        store.write_frame(&frame_at(3_000, b"bb")).unwrap();
        store.write_frame(&frame_at(2_000, b"c")).unwrap();
        store.update_latest(&first);
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let stats = store.stats().unwrap();

        assert_eq!(stats.total_frames, 3);
        assert_eq!(stats.total_bytes, 7);
        assert!(stats.has_latest);
        assert_eq!(stats.oldest_frame, Utc.timestamp_opt(1_000, 0).single());
        assert_eq!(stats.newest_frame, Utc.timestamp_opt(3_000, 0).single());
    }

    #[test]
    fn test_stats_missing_directory() {
        let dir = tempdir().unwrap();
        let store = FrameStore::at(dir.path().join("absent"), Arc::new(OsFs));

        assert!(matches!(store.stats(), Err(Error::Io(_))));
    }
}
