//! `microcam` - A home-lab receiver for camera frame uploads
//!
//! This library accepts JPEG frames posted by small camera boards, stores them
//! in a flat directory, keeps a `latest.jpg` pointer at the newest one and
//! counts uploads per source for scraping.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Frame, FrameId, UploadMeta};
pub use ingest::{FrameIngestor, StoredFrame};
pub use logging::init_logging;
pub use metrics::UploadCounter;
pub use server::{build_router, serve, AppState};
pub use storage::{FrameStore, StorageStats};
