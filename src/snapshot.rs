//! Snapshot
//!
//! Read-only view of one committed snapshot, memory-mapped. Lookups take
//! `&self` and touch only immutable bytes, so any number of threads can
//! probe one snapshot concurrently without locks.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::Result;
use crate::hash::{hash_key, SlotLayout};
use crate::layout::{SnapshotHeader, RECORD_PREFIX_SIZE, SLOT_WIDTH};
use crate::GlacierError;

/// One mapped, immutable snapshot
pub struct Snapshot {
    mmap: Mmap,
    header: SnapshotHeader,
    layout: SlotLayout,
    path: PathBuf,
}

impl Snapshot {
    /// Map a snapshot file and validate its header.
    ///
    /// The header's declared sizes must match the actual file length
    /// before any slot table offset is trusted.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GlacierError::SnapshotNotFound(path.to_path_buf())
            } else {
                GlacierError::Io(e)
            }
        })?;

        let file_len = file.metadata()?.len();

        // Safety: the snapshot is immutable once published; nothing in
        // this process or the generation protocol mutates or truncates a
        // committed file.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = SnapshotHeader::decode(&mmap, file_len)?;
        let layout = SlotLayout::new(header.slot_count, header.offset_bits)
            .map_err(|e| GlacierError::CorruptSnapshot(e.to_string()))?;

        tracing::debug!(
            "Mapped snapshot {:?}: {} entries, {} slots, built at {}",
            path,
            header.entry_count,
            header.slot_count,
            header.timestamp_ms
        );

        Ok(Self {
            mmap,
            header,
            layout,
            path: path.to_path_buf(),
        })
    }

    /// Look up a key; returns (value, type_tag).
    ///
    /// Probes linearly from the home slot, comparing the inlined
    /// fingerprint before touching the record region. Stops at the first
    /// empty slot (absent) or after a full table sweep, so lookups
    /// terminate even at load factor 1.0.
    pub fn get(&self, key: &[u8]) -> Result<(&[u8], u8)> {
        if key.is_empty() {
            return Err(GlacierError::KeyNotFound);
        }

        let hash = hash_key(key);
        let fingerprint = self.layout.fingerprint(hash);
        let mut slot = self.layout.home_slot(hash);

        for _ in 0..self.layout.slot_count() {
            let word = self.slot_word(slot)?;
            let offset = self.layout.word_offset(word);
            if offset == 0 {
                return Err(GlacierError::KeyNotFound);
            }

            if self.layout.fingerprint_matches(word, fingerprint) {
                if let Some(found) = self.record_matches(offset, key)? {
                    return Ok(found);
                }
            }

            slot = self.layout.next_slot(slot);
        }

        Err(GlacierError::KeyNotFound)
    }

    /// Presence check without materializing the value
    pub fn contains(&self, key: &[u8]) -> bool {
        matches!(self.get(key), Ok(_))
    }

    /// Number of records in this snapshot
    pub fn entry_count(&self) -> u64 {
        self.header.entry_count
    }

    /// Fixed slot table size chosen at build time
    pub fn slot_count(&self) -> u64 {
        self.header.slot_count
    }

    /// Generation timestamp (build completion, ms since epoch)
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp_ms
    }

    /// Longest probe chain observed when the slot table was built
    pub fn max_collisions(&self) -> u32 {
        self.header.max_collisions
    }

    /// Total mapped size in bytes
    pub fn size(&self) -> u64 {
        self.header.total_size
    }

    /// Path this snapshot was mapped from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recompute the record-region CRC and compare against the header.
    ///
    /// Not run on `open` — it touches every mapped page. Intended for
    /// offline integrity checks.
    pub fn verify_checksum(&self) -> Result<()> {
        let start = self.header.record_region_offset() as usize;
        let mut crc = crc32fast::Hasher::new();
        crc.update(&self.mmap[start..]);
        let actual = crc.finalize();
        if actual != self.header.data_crc {
            return Err(GlacierError::CorruptSnapshot(format!(
                "record region CRC mismatch: header says {:#010x}, computed {:#010x}",
                self.header.data_crc, actual
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Read one slot table word
    fn slot_word(&self, slot: u64) -> Result<u64> {
        let start = (self.header.slot_table_offset() + slot * SLOT_WIDTH) as usize;
        let bytes = self
            .mmap
            .get(start..start + SLOT_WIDTH as usize)
            .ok_or_else(|| {
                GlacierError::CorruptSnapshot(format!("slot {} outside mapped file", slot))
            })?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Compare the record at `offset` (relative to the record region)
    /// against `key`; on a match return its value and type tag.
    fn record_matches(&self, offset: u64, key: &[u8]) -> Result<Option<(&[u8], u8)>> {
        let start = (self.header.record_region_offset() + offset) as usize;
        let prefix = self
            .mmap
            .get(start..start + RECORD_PREFIX_SIZE as usize)
            .ok_or_else(|| {
                GlacierError::CorruptSnapshot(format!(
                    "record offset {} outside mapped file",
                    offset
                ))
            })?;

        let key_len = u16::from_le_bytes(prefix[0..2].try_into().unwrap()) as usize;
        let type_tag = prefix[2];
        let val_len = u32::from_le_bytes(prefix[3..7].try_into().unwrap()) as usize;

        if key_len != key.len() {
            return Ok(None);
        }

        let key_start = start + RECORD_PREFIX_SIZE as usize;
        let stored_key = self.mmap.get(key_start..key_start + key_len).ok_or_else(|| {
            GlacierError::CorruptSnapshot(format!("record key at {} outside mapped file", offset))
        })?;
        if stored_key != key {
            return Ok(None);
        }

        let val_start = key_start + key_len;
        let value = self.mmap.get(val_start..val_start + val_len).ok_or_else(|| {
            GlacierError::CorruptSnapshot(format!(
                "record value at {} outside mapped file",
                offset
            ))
        })?;

        Ok(Some((value, type_tag)))
    }
}
