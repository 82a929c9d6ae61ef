//! The upload pipeline: name, persist, repoint, count.

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameId, UploadMeta};
use crate::metrics::UploadCounter;
use crate::storage::{FrameStore, PointerUpdate};

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFrame {
    /// Identity of the stored frame.
    pub id: FrameId,
    /// Source label the upload was counted under.
    pub source: String,
    /// Payload size in bytes.
    pub size: usize,
    /// How the latest pointer was updated.
    pub pointer: PointerUpdate,
}

impl StoredFrame {
    /// File name of the stored frame.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.id.file_name()
    }
}

/// Accepts frames into storage and keeps the latest pointer and counter in
/// step with them.
#[derive(Debug, Clone)]
pub struct FrameIngestor {
    store: Arc<FrameStore>,
    counter: Arc<UploadCounter>,
    clock: Arc<dyn Clock>,
}

impl FrameIngestor {
    /// Create an ingestor over shared store and counter.
    #[must_use]
    pub fn new(
        store: Arc<FrameStore>,
        counter: Arc<UploadCounter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            counter,
            clock,
        }
    }

    /// Ingest one uploaded payload with its optional raw metadata.
    ///
    /// Steps run in order and are not rolled back: the frame is written,
    /// the latest pointer is moved to it, then the source is counted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an empty payload and
    /// [`Error::StorageWrite`] if the frame cannot be written. Pointer
    /// problems never fail the upload.
    pub fn ingest(&self, payload: Vec<u8>, meta: Option<&str>) -> Result<StoredFrame> {
        if payload.is_empty() {
            return Err(Error::InvalidRequest);
        }

        let meta = UploadMeta::parse(meta);
        let frame = Frame::new(self.clock.now(), meta.source_label(), payload);

        let path = self.store.write_frame(&frame)?;
        let pointer = self.store.update_latest(&path);
        self.counter.increment(&frame.source);

        info!(
            file = %frame.id,
            source = %frame.source,
            bytes = frame.len(),
            pointer = %pointer,
            "Frame stored"
        );

        Ok(StoredFrame {
            id: frame.id,
            size: frame.len(),
            source: frame.source,
            pointer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::frame::DEFAULT_SOURCE;
    use crate::storage::OsFs;
    use tempfile::{tempdir, TempDir};

    fn ingestor_at(secs: i64) -> (TempDir, FrameIngestor) {
        let dir = tempdir().unwrap();
        let store = Arc::new(FrameStore::open(dir.path()).unwrap());
        let ingestor = FrameIngestor::new(
            store,
            Arc::new(UploadCounter::new()),
            Arc::new(FixedClock::at_epoch_secs(secs)),
        );
        (dir, ingestor)
    }

    #[test]
    fn test_ingest_stores_frame_and_pointer() {
        let (dir, ingestor) = ingestor_at(1_234_567_890);

        let stored = ingestor
            .ingest(b"fake image data".to_vec(), Some(r#"{"source": "test-cam"}"#))
            .unwrap();

        assert_eq!(stored.file_name(), "frame_1234567890.jpg");
        assert_eq!(stored.source, "test-cam");
        assert_eq!(stored.size, 15);
        assert_eq!(stored.pointer, PointerUpdate::Linked);
        assert!(dir.path().join("frame_1234567890.jpg").exists());
        assert_eq!(
            std::fs::read(dir.path().join("latest.jpg")).unwrap(),
            b"fake image data"
        );
        assert_eq!(ingestor.counter.get("test-cam"), 1);
    }

    #[test]
    fn test_ingest_empty_payload_is_rejected_without_side_effects() {
        let (dir, ingestor) = ingestor_at(1);

        let err = ingestor.ingest(Vec::new(), None).unwrap_err();

        assert!(matches!(err, Error::InvalidRequest));
        assert!(!dir.path().join("latest.jpg").exists());
        assert!(ingestor.counter.snapshot().is_empty());
        assert_eq!(ingestor.store.stats().unwrap().total_frames, 0);
    }

    #[test]
    fn test_ingest_malformed_meta_counts_default_source() {
        let (_dir, ingestor) = ingestor_at(1);

        let stored = ingestor
            .ingest(b"test image".to_vec(), Some("invalid json{"))
            .unwrap();

        assert_eq!(stored.source, DEFAULT_SOURCE);
        assert_eq!(ingestor.counter.get(DEFAULT_SOURCE), 1);
    }

    #[test]
    fn test_ingest_same_second_last_write_wins() {
        let (dir, ingestor) = ingestor_at(500);

        let first = ingestor.ingest(b"first".to_vec(), None).unwrap();
        let second = ingestor.ingest(b"second".to_vec(), None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            std::fs::read(dir.path().join("frame_500.jpg")).unwrap(),
            b"second"
        );
        assert_eq!(
            std::fs::read(dir.path().join("latest.jpg")).unwrap(),
            b"second"
        );
        assert_eq!(ingestor.counter.get(DEFAULT_SOURCE), 2);
    }

    #[test]
    fn test_ingest_storage_failure_surfaces_and_skips_counter() {
        crate::logging::init_test_logging();
        let dir = tempdir().unwrap();
        let store = Arc::new(FrameStore::at(dir.path().join("missing"), Arc::new(OsFs)));
        let counter = Arc::new(UploadCounter::new());
        let ingestor = FrameIngestor::new(
            store,
            Arc::clone(&counter),
            Arc::new(FixedClock::at_epoch_secs(1)),
        );

        let err = ingestor.ingest(b"bytes".to_vec(), None).unwrap_err();

        assert!(matches!(err, Error::StorageWrite { .. }));
        assert!(counter.snapshot().is_empty());
    }
}
