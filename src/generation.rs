//! Generation Directory Protocol
//!
//! Each committed snapshot lives at a path keyed by (cache name,
//! timestamp):
//!
//! ```text
//! {destination_root}/{cache_name}/{timestamp}/{cache_name}.cache
//! ```
//!
//! Multiple generations coexist; the engine never deletes old ones, so
//! rollback stays possible and retention is left to external tooling.
//! Discovery is a plain directory listing — which timestamp to attach to
//! (and when) is the caller's policy, not the engine's.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::layout::CACHE_FILE_SUFFIX;

/// Directory holding all generations of one cache
pub fn cache_dir(destination_root: &Path, cache_name: &str) -> PathBuf {
    destination_root.join(cache_name)
}

/// Directory of one committed generation
pub fn snapshot_dir(destination_root: &Path, cache_name: &str, timestamp: u64) -> PathBuf {
    cache_dir(destination_root, cache_name).join(timestamp.to_string())
}

/// Snapshot file of one committed generation
pub fn snapshot_path(destination_root: &Path, cache_name: &str, timestamp: u64) -> PathBuf {
    snapshot_dir(destination_root, cache_name, timestamp)
        .join(format!("{}{}", cache_name, CACHE_FILE_SUFFIX))
}

/// Staging directory a build writes into before the atomic rename.
/// The leading dot keeps it out of `list_generations`.
pub(crate) fn staging_dir(destination_root: &Path, cache_name: &str, timestamp: u64) -> PathBuf {
    cache_dir(destination_root, cache_name).join(format!(".staging-{}", timestamp))
}

/// List committed generation timestamps for a cache, oldest first.
///
/// Returns an empty list when the cache directory does not exist yet.
/// Non-numeric entries (staging dirs, stray files) are skipped.
pub fn list_generations(destination_root: &Path, cache_name: &str) -> Result<Vec<u64>> {
    let dir = cache_dir(destination_root, cache_name);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut timestamps = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(ts) = parse_timestamp(&path) {
            timestamps.push(ts);
        } else {
            tracing::debug!("Skipping non-generation entry {:?}", path);
        }
    }

    timestamps.sort_unstable();
    Ok(timestamps)
}

/// Newest committed generation timestamp, if any
pub fn latest_generation(destination_root: &Path, cache_name: &str) -> Result<Option<u64>> {
    Ok(list_generations(destination_root, cache_name)?.pop())
}

/// Parse a generation timestamp from a directory name
/// "1651622570800" → Some(1651622570800)
fn parse_timestamp(path: &Path) -> Option<u64> {
    path.file_name()?.to_str()?.parse().ok()
}
