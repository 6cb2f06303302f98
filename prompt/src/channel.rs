//! # Channel Allocation
//!
//! Reserves a shared-memory channel id for one session.
//!
//! The consumer creates its segment as `<namespace>/slamp_queue_<id>` (on
//! Linux the namespace is `/dev/shm`). Before launching anything, the
//! allocator claims a random id by creating `slamp_queue_<id>.lock` with
//! `O_CREAT | O_EXCL`, so two sessions racing for the same id cannot both
//! win. The reservation lives in a [`ChannelSlot`] guard and is released
//! exactly once: explicitly via [`ChannelSlot::release`] or on drop.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rand::Rng;

use crate::domain::{ChannelError, ChannelId};

/// Default shared-memory namespace on Linux
pub const DEFAULT_NAMESPACE: &str = "/dev/shm";

/// Default id range
pub const DEFAULT_RANGE: RangeInclusive<u32> = 0..=999;

/// Default number of candidates tried before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 128;

const SEGMENT_PREFIX: &str = "slamp_queue_";
const MARKER_SUFFIX: &str = ".lock";

/// Picks free channel ids inside a namespace directory
#[derive(Debug, Clone)]
pub struct ChannelAllocator {
    namespace: PathBuf,
    range: RangeInclusive<u32>,
    max_attempts: u32,
}

impl ChannelAllocator {
    pub fn new(namespace: impl Into<PathBuf>) -> Self {
        Self { namespace: namespace.into(), range: DEFAULT_RANGE, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }

    #[must_use]
    pub fn with_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.range = range;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    /// Path of the segment the consumer creates for `id`
    #[must_use]
    pub fn segment_path(&self, id: ChannelId) -> PathBuf {
        self.namespace.join(format!("{SEGMENT_PREFIX}{id}"))
    }

    /// Path of the reservation marker for `id`
    #[must_use]
    pub fn marker_path(&self, id: ChannelId) -> PathBuf {
        self.namespace.join(format!("{SEGMENT_PREFIX}{id}{MARKER_SUFFIX}"))
    }

    /// Reserve a free channel id
    ///
    /// Candidates are drawn uniformly from the configured range. A candidate
    /// is skipped when its marker already exists (another session holds it)
    /// or when a live segment with that id exists (a session that predates
    /// markers).
    ///
    /// # Errors
    /// - [`ChannelError::AllocationExhausted`] if the range is empty or no candidate could be
    ///   reserved within the attempt budget
    /// - [`ChannelError::Namespace`] if the marker cannot be created for any
    ///   other reason (missing directory, permissions)
    pub fn acquire(&self) -> Result<ChannelSlot, ChannelError> {
        if self.range.is_empty() {
            return Err(self.exhausted(0));
        }
        let mut rng = rand::thread_rng();

        for attempt in 1..=self.max_attempts {
            let id = ChannelId(rng.gen_range(self.range.clone()));
            let segment = self.segment_path(id);
            if segment.exists() {
                debug!("Channel {id} is live, retrying (attempt {attempt})");
                continue;
            }

            let marker = self.marker_path(id);
            match OpenOptions::new().write(true).create_new(true).open(&marker) {
                Ok(mut file) => {
                    // Owner pid, for humans cleaning up after a crash
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        warn!("Failed to write owner to {}: {e}", marker.display());
                    }
                    // The segment may have appeared between the check and the
                    // reservation; it belongs to someone else, so only undo our marker
                    if segment.exists() {
                        if let Err(e) = remove_if_present(&marker) {
                            warn!("Failed to remove {}: {e}", marker.display());
                        }
                        continue;
                    }

                    debug!("Reserved channel {id} after {attempt} attempt(s)");
                    return Ok(ChannelSlot { id, marker, segment, released: false });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Channel {id} is reserved, retrying (attempt {attempt})");
                }
                Err(source) => return Err(ChannelError::Namespace { path: marker, source }),
            }
        }

        Err(self.exhausted(self.max_attempts))
    }

    fn exhausted(&self, attempts: u32) -> ChannelError {
        ChannelError::AllocationExhausted {
            low: *self.range.start(),
            high: *self.range.end(),
            attempts,
        }
    }
}

/// An exclusively owned channel reservation
///
/// Dropping the slot releases it; [`ChannelSlot::release`] does the same but
/// reports failures.
#[derive(Debug)]
pub struct ChannelSlot {
    id: ChannelId,
    marker: PathBuf,
    segment: PathBuf,
    released: bool,
}

impl ChannelSlot {
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    #[must_use]
    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    #[must_use]
    pub fn segment_path(&self) -> &Path {
        &self.segment
    }

    /// Remove the reservation marker and any segment left behind
    ///
    /// Already-missing files are not an error.
    ///
    /// # Errors
    /// Returns the first removal failure other than "not found"
    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        remove_if_present(&self.segment)?;
        remove_if_present(&self.marker)
    }
}

impl Drop for ChannelSlot {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for path in [&self.segment, &self.marker] {
            if let Err(e) = remove_if_present(path) {
                warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_acquire_creates_marker_and_release_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path());

        let slot = allocator.acquire().unwrap();
        let marker = slot.marker_path().to_path_buf();
        assert!(marker.exists());
        assert!(DEFAULT_RANGE.contains(&slot.id().0));

        slot.release().unwrap();
        assert!(!marker.exists());
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path());

        let marker = {
            let slot = allocator.acquire().unwrap();
            slot.marker_path().to_path_buf()
        };
        assert!(!marker.exists());
    }

    #[test]
    fn test_release_removes_leftover_segment() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path());

        let slot = allocator.acquire().unwrap();
        let segment = slot.segment_path().to_path_buf();
        fs::write(&segment, b"queue").unwrap();

        slot.release().unwrap();
        assert!(!segment.exists());
    }

    #[test]
    fn test_skips_reserved_id() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path()).with_range(0..=1);
        fs::write(allocator.marker_path(ChannelId(0)), b"").unwrap();

        for _ in 0..16 {
            let slot = allocator.acquire().unwrap();
            assert_eq!(slot.id(), ChannelId(1));
        }
    }

    #[test]
    fn test_skips_live_segment() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path()).with_range(0..=1);
        fs::write(allocator.segment_path(ChannelId(1)), b"").unwrap();

        let slot = allocator.acquire().unwrap();
        assert_eq!(slot.id(), ChannelId(0));
    }

    #[test]
    fn test_exhaustion_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path()).with_range(7..=7).with_max_attempts(5);
        fs::write(allocator.marker_path(ChannelId(7)), b"").unwrap();

        let err = allocator.acquire().unwrap_err();
        assert!(matches!(
            err,
            ChannelError::AllocationExhausted { low: 7, high: 7, attempts: 5 }
        ));
    }

    #[test]
    fn test_missing_namespace() {
        let allocator = ChannelAllocator::new("/nonexistent/prompt-namespace");
        assert!(matches!(allocator.acquire(), Err(ChannelError::Namespace { .. })));
    }

    #[test]
    fn test_empty_range_is_exhausted_immediately() {
        let dir = tempfile::tempdir().unwrap();
        #[allow(clippy::reversed_empty_ranges)]
        let allocator = ChannelAllocator::new(dir.path()).with_range(5..=3);

        let err = allocator.acquire().unwrap_err();
        assert!(matches!(
            err,
            ChannelError::AllocationExhausted { low: 5, high: 3, attempts: 0 }
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_acquire_has_single_winner() {
        const RACERS: usize = 16;

        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path()).with_range(0..=0).with_max_attempts(4);
        let barrier = Barrier::new(RACERS);

        let results: Vec<Result<ChannelSlot, ChannelError>> = thread::scope(|s| {
            let allocator = &allocator;
            let barrier = &barrier;
            let handles: Vec<_> = (0..RACERS)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        allocator.acquire()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err, ChannelError::AllocationExhausted { low: 0, high: 0, .. }));
        }
    }

    #[test]
    fn test_two_slots_never_share_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = ChannelAllocator::new(dir.path()).with_range(0..=3);

        let a = allocator.acquire().unwrap();
        let b = allocator.acquire().unwrap();
        assert_ne!(a.id(), b.id());
    }
}
