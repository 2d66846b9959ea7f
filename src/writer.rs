//! Cache Writer
//!
//! Accumulates (key, value, type_tag) records in a single-producer build
//! session, then commits an immutable snapshot in one shot:
//!
//! 1. Serialize all records into the record region (insertion order)
//! 2. Compute the slot table once, over the final key set
//! 3. Write header + slot table + records to a staging directory
//! 4. Atomically rename the staging directory into its timestamped place
//!
//! Computing slot assignment only at commit keeps `insert` O(1) amortized
//! and makes the produced table reproducible regardless of insert order
//! beyond the documented last-write-wins tie-break.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::generation;
use crate::hash::{hash_key, SlotLayout};
use crate::layout::{
    SnapshotHeader, CACHE_FILE_SUFFIX, HEADER_SIZE, MAX_KEY_LEN, MAX_VALUE_LEN, RECORD_REGION_PAD,
    SLOT_WIDTH, VERSION,
};
use crate::GlacierError;

/// One record accumulated during the build session
struct PendingRecord {
    key: Vec<u8>,
    value: Vec<u8>,
    type_tag: u8,
}

/// Builder for one immutable snapshot
///
/// Single-producer: concurrent inserts into one session are not
/// supported; serialize externally if multiple producers are required.
pub struct CacheWriter {
    config: CacheConfig,
    layout: SlotLayout,
    /// Records in insertion order; duplicate keys overwrite in place
    records: Vec<PendingRecord>,
    /// key → index into `records`, for last-write-wins duplicate handling
    index: HashMap<Vec<u8>, usize>,
    /// Set once the session has committed or been closed
    finished: bool,
}

impl CacheWriter {
    /// Begin a build session
    ///
    /// Validates the configuration and makes sure the destination is
    /// writable by creating the cache directory up front.
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let layout = SlotLayout::new(config.number_of_key_slots, config.offset_bits)?;

        let cache_dir = generation::cache_dir(&config.destination_root, &config.cache_name);
        fs::create_dir_all(&cache_dir).map_err(|e| {
            GlacierError::Config(format!(
                "destination {:?} is not writable: {}",
                cache_dir, e
            ))
        })?;

        Ok(Self {
            config,
            layout,
            records: Vec::new(),
            index: HashMap::new(),
            finished: false,
        })
    }

    /// Add or overwrite a record. Last insert for a key wins; values are
    /// never merged.
    pub fn insert(&mut self, key: &[u8], value: &[u8], type_tag: u8) -> Result<()> {
        if self.finished {
            return Err(GlacierError::Build(
                "writer session is already finished".to_string(),
            ));
        }
        if key.is_empty() {
            return Err(GlacierError::InvalidKey("key is empty".to_string()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(GlacierError::InvalidKey(format!(
                "key length {} exceeds maximum {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(GlacierError::Build(format!(
                "value length {} exceeds maximum {}",
                value.len(),
                MAX_VALUE_LEN
            )));
        }

        match self.index.get(key) {
            Some(&i) => {
                // Last write wins, position in the entry region is reused
                self.records[i].value = value.to_vec();
                self.records[i].type_tag = type_tag;
            }
            None => {
                self.index.insert(key.to_vec(), self.records.len());
                self.records.push(PendingRecord {
                    key: key.to_vec(),
                    value: value.to_vec(),
                    type_tag,
                });
            }
        }
        Ok(())
    }

    /// Number of distinct keys accumulated so far
    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// Commit the snapshot and return its generation timestamp.
    ///
    /// On any I/O failure the staging directory is removed and nothing
    /// becomes visible at the final path.
    pub fn finish_cache_creation(&mut self) -> Result<u64> {
        if self.finished {
            return Err(GlacierError::Build(
                "writer session is already finished".to_string(),
            ));
        }

        let entry_count = self.records.len() as u64;
        if entry_count > self.layout.slot_count() {
            return Err(GlacierError::Config(format!(
                "{} entries exceed {} key slots",
                entry_count,
                self.layout.slot_count()
            )));
        }

        // Serialize the record region in insertion order
        let mut data = vec![0u8; RECORD_REGION_PAD as usize];
        let mut offsets = Vec::with_capacity(self.records.len());
        for record in &self.records {
            offsets.push(data.len() as u64);
            data.extend_from_slice(&(record.key.len() as u16).to_le_bytes());
            data.push(record.type_tag);
            data.extend_from_slice(&(record.value.len() as u32).to_le_bytes());
            data.extend_from_slice(&record.key);
            data.extend_from_slice(&record.value);
        }

        if data.len() as u64 > self.layout.max_offset() {
            return Err(GlacierError::Build(format!(
                "record region of {} bytes is not addressable with {} offset bits",
                data.len(),
                self.layout.offset_bits()
            )));
        }

        // Compute the slot table over the final key set. Keys are already
        // unique (deduplicated at insert), so probing only needs to find
        // the first empty slot.
        let mut slots = vec![0u64; self.layout.slot_count() as usize];
        let mut max_collisions = 0u32;
        for (record, &offset) in self.records.iter().zip(&offsets) {
            let hash = hash_key(&record.key);
            let fingerprint = self.layout.fingerprint(hash);
            let mut slot = self.layout.home_slot(hash);
            let mut collisions = 0u32;
            while self.layout.word_offset(slots[slot as usize]) != 0 {
                collisions += 1;
                slot = self.layout.next_slot(slot);
            }
            slots[slot as usize] = self.layout.pack(fingerprint, offset);
            max_collisions = max_collisions.max(collisions);
        }

        let mut crc = crc32fast::Hasher::new();
        crc.update(&data);

        let timestamp = self.pick_timestamp()?;

        let header = SnapshotHeader {
            version: VERSION,
            offset_bits: self.layout.offset_bits(),
            slot_count: self.layout.slot_count(),
            entry_count,
            data_size: data.len() as u64,
            total_size: HEADER_SIZE + self.layout.slot_count() * SLOT_WIDTH + data.len() as u64,
            timestamp_ms: timestamp,
            data_crc: crc.finalize(),
            max_collisions,
        };

        self.publish(&header, &slots, &data, timestamp)?;

        tracing::info!(
            "Committed snapshot {}/{} ({} entries, {} slots, max probe chain {})",
            self.config.cache_name,
            timestamp,
            entry_count,
            self.layout.slot_count(),
            max_collisions
        );

        self.finished = true;
        self.records.clear();
        self.index.clear();

        Ok(timestamp)
    }

    /// Release session resources. Idempotent; safe after
    /// `finish_cache_creation` or on an aborted build.
    pub fn close(&mut self) {
        self.records.clear();
        self.index.clear();
        self.finished = true;
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Generation timestamp: wall clock in milliseconds, bumped past any
    /// generation already on disk so two builds in the same millisecond
    /// cannot collide.
    fn pick_timestamp(&self) -> Result<u64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GlacierError::Build(format!("system clock before epoch: {}", e)))?
            .as_millis() as u64;

        let mut timestamp = now;
        while generation::snapshot_dir(
            &self.config.destination_root,
            &self.config.cache_name,
            timestamp,
        )
        .exists()
        {
            timestamp += 1;
        }
        Ok(timestamp)
    }

    /// Write the snapshot into a staging directory, then rename it into
    /// its final timestamped place. Rename atomicity is what guarantees
    /// readers never observe a partial snapshot.
    fn publish(
        &self,
        header: &SnapshotHeader,
        slots: &[u64],
        data: &[u8],
        timestamp: u64,
    ) -> Result<()> {
        let root = &self.config.destination_root;
        let name = &self.config.cache_name;
        let staging = generation::staging_dir(root, name, timestamp);
        let final_dir = generation::snapshot_dir(root, name, timestamp);
        let staging_file = staging.join(format!("{}{}", name, CACHE_FILE_SUFFIX));

        let result = write_snapshot_file(&staging, &staging_file, header, slots, data)
            .and_then(|_| fs::rename(&staging, &final_dir));

        if let Err(e) = result {
            // Abort cleanly: nothing partial may stay visible
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove staging dir {:?}: {}", staging, cleanup);
                }
            }
            return Err(GlacierError::Build(format!(
                "failed to publish snapshot {}/{}: {}",
                name, timestamp, e
            )));
        }
        Ok(())
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serialize one snapshot into `staging_file` and fsync it
fn write_snapshot_file(
    staging_dir: &Path,
    staging_file: &Path,
    header: &SnapshotHeader,
    slots: &[u64],
    data: &[u8],
) -> io::Result<()> {
    fs::create_dir_all(staging_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(staging_file)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&header.encode())?;
    for word in slots {
        writer.write_all(&word.to_le_bytes())?;
    }
    writer.write_all(data)?;
    writer.flush()?;

    let file: File = writer
        .into_inner()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    file.sync_all()?;

    Ok(())
}
