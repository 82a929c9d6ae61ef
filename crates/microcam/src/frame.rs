//! Core frame types for microcam.
//!
//! A frame is an opaque image payload whose identity is the wall-clock second
//! it was received in. This module also owns the upload metadata record and
//! the rules for resolving the `source` label from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source label used when the upload metadata names no usable source.
pub const DEFAULT_SOURCE: &str = "uno-r4";

/// File name of the pointer to the most recently ingested frame.
pub const LATEST_POINTER_NAME: &str = "latest.jpg";

const FRAME_PREFIX: &str = "frame_";
const FRAME_SUFFIX: &str = ".jpg";

/// Identity of a stored frame: whole seconds since the Unix epoch.
///
/// Two frames received within the same second share an identity, and the
/// later one overwrites the earlier one on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(i64);

impl FrameId {
    /// Create an identity from epoch seconds.
    #[must_use]
    pub fn from_epoch_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Derive the identity for a frame received at `at`, truncating to seconds.
    #[must_use]
    pub fn from_time(at: DateTime<Utc>) -> Self {
        Self(at.timestamp())
    }

    /// The epoch seconds this identity was derived from.
    #[must_use]
    pub fn epoch_secs(self) -> i64 {
        self.0
    }

    /// The storage file name, `frame_<epoch-seconds>.jpg`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{FRAME_PREFIX}{}{FRAME_SUFFIX}", self.0)
    }

    /// Parse a storage file name back into an identity.
    ///
    /// Returns `None` for anything that is not exactly `frame_<integer>.jpg`,
    /// including the latest pointer.
    #[must_use]
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(FRAME_PREFIX)?.strip_suffix(FRAME_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }

    /// The identity as a UTC timestamp.
    #[must_use]
    pub fn timestamp(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Structured form of the optional `meta` upload field.
///
/// Only `source` is interpreted; any other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMeta {
    /// Label of the device that produced the frame.
    #[serde(default)]
    pub source: Option<String>,
}

impl UploadMeta {
    /// Parse the raw `meta` field.
    ///
    /// Anything other than a JSON object whose `source` (if present) is a
    /// string yields the empty record. Parse failures never surface.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .filter(serde_json::Value::is_object)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// The source label to count this upload under.
    #[must_use]
    pub fn source_label(&self) -> &str {
        match self.source.as_deref() {
            Some(source) if !source.is_empty() => source,
            _ => DEFAULT_SOURCE,
        }
    }
}

/// A received frame, ready to be written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identity derived from the receive time.
    pub id: FrameId,

    /// Resolved source label.
    pub source: String,

    /// Raw image bytes, stored as-is.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame received at `at` from `source`.
    #[must_use]
    pub fn new(at: DateTime<Utc>, source: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: FrameId::from_time(at),
            source: source.into(),
            payload,
        }
    }

    /// The storage file name for this frame.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.id.file_name()
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
