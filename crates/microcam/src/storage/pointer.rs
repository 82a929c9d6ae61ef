//! Maintenance of the `latest.jpg` pointer.
//!
//! The pointer is recreated on every upload: the old entry is removed on a
//! best-effort basis, then a hard link to the new frame is attempted, and if
//! that fails an independent copy is put in place instead. None of this ever
//! fails an upload.
//!
//! There is no lock around the pointer. A reader racing an upload can see
//! the gap between removal and relink and get "not found".

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use super::fs::FrameFs;

/// How the pointer ended up being updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerUpdate {
    /// The pointer is a hard link to the frame.
    Linked,
    /// Linking failed; the pointer is an independent copy of the frame.
    Copied,
    /// Both strategies failed; the pointer may be stale or missing.
    Failed,
}

impl std::fmt::Display for PointerUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linked => write!(f, "linked"),
            Self::Copied => write!(f, "copied"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Point `dest` at the frame stored at `source`.
///
/// `scratch` is a sibling path of `dest` that no concurrent caller is using;
/// the copy strategy stages its file there and renames it over `dest`, so a
/// stale hard link left behind by a failed removal is replaced instead of
/// written through into an older frame.
pub fn update_pointer(
    fs: &dyn FrameFs,
    source: &Path,
    dest: &Path,
    scratch: &Path,
) -> PointerUpdate {
    remove_stale(fs, dest);

    match fs.hard_link(source, dest) {
        Ok(()) => return PointerUpdate::Linked,
        Err(e) => debug!(
            "Hard link {} -> {} failed ({e}), falling back to copy",
            dest.display(),
            source.display()
        ),
    }

    match copy_into_place(fs, source, dest, scratch) {
        Ok(()) => PointerUpdate::Copied,
        Err(e) => {
            warn!("Could not update {}: {e}", dest.display());
            PointerUpdate::Failed
        }
    }
}

/// Best-effort removal of the previous pointer.
fn remove_stale(fs: &dyn FrameFs, dest: &Path) {
    match fs.remove_file(dest) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            trace!("Ignoring failure to remove {}: {e}", dest.display());
        }
        _ => {}
    }
}

fn copy_into_place(
    fs: &dyn FrameFs,
    source: &Path,
    dest: &Path,
    scratch: &Path,
) -> io::Result<()> {
    fs.copy(source, scratch)?;
    if let Err(e) = fs.rename(scratch, dest) {
        let _ = fs.remove_file(scratch);
        return Err(e);
    }
    Ok(())
}

/// A scratch path next to `dest`, unique per `seq`.
#[must_use]
pub fn scratch_path(dest: &Path, seq: u64) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(|| "pointer".into(), |n| n.to_string_lossy().into_owned());
    dest.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}
