//! Upload counter and its text exposition.
//!
//! The counter is rendered in the Prometheus text format by hand; it is the
//! only metric the service exports.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Name of the upload counter.
pub const UPLOAD_EVENTS_METRIC: &str = "camera_upload_events_total";

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const UPLOAD_EVENTS_HELP: &str = "Count of camera uploads";

/// Number of accepted uploads, partitioned by source label.
///
/// Lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct UploadCounter {
    by_source: RwLock<HashMap<String, AtomicU64>>,
}

impl UploadCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one upload for `source` and return the new total for it.
    pub fn increment(&self, source: &str) -> u64 {
        {
            let map = self.by_source.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(count) = map.get(source) {
                return count.fetch_add(1, Ordering::Relaxed) + 1;
            }
        }

        let mut map = self
            .by_source
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(source.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    /// Current count for `source` (zero if never seen).
    #[must_use]
    pub fn get(&self, source: &str) -> u64 {
        self.by_source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Copy of every observed label and its count, ordered by label.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.by_source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(source, count)| (source.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Render the counter in the text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "# HELP {UPLOAD_EVENTS_METRIC} {UPLOAD_EVENTS_HELP}");
        let _ = writeln!(body, "# TYPE {UPLOAD_EVENTS_METRIC} counter");
        for (source, count) in self.snapshot() {
            let _ = writeln!(
                body,
                "{UPLOAD_EVENTS_METRIC}{{source=\"{}\"}} {count}",
                escape_label_value(&source)
            );
        }
        body
    }
}

/// Escape a label value for the text exposition format.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
