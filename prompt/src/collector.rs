//! Profile artifact collection
//!
//! The consumer writes its raw profile next to where it ran (`deplog.txt`
//! for the dependence modules). Not every module writes one, so a missing
//! artifact is recorded and skipped rather than treated as a failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::domain::CollectError;

/// Raw artifact written by the consumer
pub const DEFAULT_ARTIFACT: &str = "deplog.txt";

/// Where the artifact lands when no output path is given
pub const DEFAULT_OUTPUT: &str = "benchmark.result.slamp.profile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    Moved(PathBuf),
    Missing,
}

/// Move `expected` to `destination` if it exists
///
/// Falls back to copy-and-remove when the two paths are on different
/// filesystems.
///
/// # Errors
/// Returns [`CollectError::MoveFailed`] if the artifact exists but cannot be
/// moved
pub fn collect(expected: &Path, destination: &Path) -> Result<CollectOutcome, CollectError> {
    if !expected.exists() {
        info!("No profile artifact at {}, nothing to collect", expected.display());
        return Ok(CollectOutcome::Missing);
    }

    let move_failed = |source| CollectError::MoveFailed {
        from: expected.to_path_buf(),
        to: destination.to_path_buf(),
        source,
    };

    match fs::rename(expected, destination) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            debug!("Cross-device move, copying {}", expected.display());
            copy_then_remove(expected, destination).map_err(move_failed)?;
        }
        Err(e) => return Err(move_failed(e)),
    }

    debug!("Moved {} to {}", expected.display(), destination.display());
    Ok(CollectOutcome::Moved(destination.to_path_buf()))
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    fs::remove_file(from)
}
