//! Cache Reader
//!
//! Live handle a serving process queries through. Starts unattached;
//! `attach` points it at a specific (cache name, directory, timestamp)
//! generation and can be called again later to advance.
//!
//! ## Concurrency
//! - The current snapshot lives in an `ArcSwapOption`: lookups load an
//!   `Arc` (pinning their generation for the duration of the call) and
//!   never block each other or a concurrent `attach`.
//! - `attach` maps and validates the new snapshot completely before the
//!   single-word pointer swap; a failed attach leaves the previous
//!   attachment serving.
//! - The old mapping is released when the last in-flight lookup drops
//!   its `Arc` — no torn state is ever visible.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::Result;
use crate::generation;
use crate::snapshot::Snapshot;
use crate::GlacierError;

/// Lock-free reader handle over the current generation of one cache
#[derive(Default)]
pub struct CacheReader {
    current: ArcSwapOption<Snapshot>,
}

impl CacheReader {
    /// Produce an unattached reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the snapshot at
    /// `{directory}/{cache_name}/{timestamp}/{cache_name}.cache`.
    ///
    /// The new snapshot is fully mapped and validated before the swap;
    /// on failure the previous attachment (if any) keeps serving.
    pub fn attach(&self, cache_name: &str, directory: &Path, timestamp: u64) -> Result<()> {
        let path = generation::snapshot_path(directory, cache_name, timestamp);
        let snapshot = Snapshot::open(&path)?;

        tracing::info!(
            "Attached {} generation {} ({} entries)",
            cache_name,
            timestamp,
            snapshot.entry_count()
        );

        self.current.store(Some(Arc::new(snapshot)));
        Ok(())
    }

    /// Look up a key, returning its value bytes.
    ///
    /// `Err(KeyNotFound)` means the key is absent — distinct from a key
    /// present with an empty value, which returns `Ok(vec![])`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let snapshot = self.snapshot()?;
        let (value, _) = snapshot.get(key)?;
        Ok(value.to_vec())
    }

    /// Look up a key, returning its value bytes and type tag
    pub fn get_with_type(&self, key: &[u8]) -> Result<(Vec<u8>, u8)> {
        let snapshot = self.snapshot()?;
        let (value, type_tag) = snapshot.get(key)?;
        Ok((value.to_vec(), type_tag))
    }

    /// Presence check without materializing the value
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.snapshot()?.contains(key))
    }

    /// Whether the reader currently serves a snapshot
    pub fn is_attached(&self) -> bool {
        self.current.load().is_some()
    }

    /// Generation timestamp of the current attachment, if any
    pub fn timestamp(&self) -> Option<u64> {
        self.current.load().as_ref().map(|s| s.timestamp())
    }

    /// Entry count of the current attachment, if any
    pub fn entry_count(&self) -> Option<u64> {
        self.current.load().as_ref().map(|s| s.entry_count())
    }

    /// Pin the current generation explicitly. The returned `Arc` keeps
    /// that snapshot mapped even across later `attach` calls.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Detach. Subsequent lookups fail with `NotAttached`; the mapping
    /// itself is released once in-flight lookups finish.
    pub fn close(&self) {
        self.current.store(None);
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.current.load_full().ok_or(GlacierError::NotAttached)
    }
}
