//! Binary Snapshot Layout
//!
//! On-disk format of one committed snapshot. The format is self-describing:
//! everything a reader needs beyond the version marker is in the header.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (64 bytes)                                            │
//! │   Magic: "GKVS" (4) | Version: u16 (2) | OffsetBits: u16 (2) │
//! │   SlotCount: u64 (8) | EntryCount: u64 (8)                   │
//! │   DataSize: u64 (8)  | TotalSize: u64 (8)                    │
//! │   TimestampMs: u64 (8)                                       │
//! │   DataCRC: u32 (4)   | MaxCollisions: u32 (4)                │
//! │   Reserved (8)                                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Slot Table (SlotCount × 8 bytes)                             │
//! │   Word = fingerprint (high 64-offset_bits bits)              │
//! │        | record offset (low offset_bits bits)                │
//! │   Offset 0 = empty slot                                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Record Region (DataSize bytes)                               │
//! │   8 reserved zero bytes (so a valid offset is never 0)       │
//! │   [KeyLen: u16][TypeTag: u8][ValLen: u32][Key][Value]        │
//! │   ... repeated for each entry ...                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::error::Result;
use crate::GlacierError;

// =============================================================================
// Shared Constants (used by writer, snapshot, hash)
// =============================================================================

/// Magic bytes identifying a GlacierKV snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"GKVS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size in bytes
pub(crate) const HEADER_SIZE: u64 = 64;

/// Record prefix size: KeyLen (2) + TypeTag (1) + ValLen (4)
pub(crate) const RECORD_PREFIX_SIZE: u64 = 7;

/// Reserved bytes at the start of the record region; keeps every real
/// record at a non-zero offset so 0 can mean "empty slot".
pub(crate) const RECORD_REGION_PAD: u64 = 8;

/// Width of one slot table entry
pub(crate) const SLOT_WIDTH: u64 = 8;

/// Smallest allowed offset-bits split (addresses 64 KiB of records)
pub(crate) const MIN_OFFSET_BITS: u16 = 16;

/// Largest allowed offset-bits split (addresses 1 TiB of records)
pub(crate) const MAX_OFFSET_BITS: u16 = 40;

/// Default offset-bits split: 35 bits → 32 GiB of records,
/// 29 bits of fingerprint
pub(crate) const DEFAULT_OFFSET_BITS: u16 = 35;

/// Maximum key length (KeyLen is a u16)
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Maximum value length (ValLen is a u32)
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// File name suffix for snapshot files
pub(crate) const CACHE_FILE_SUFFIX: &str = ".cache";

// =============================================================================
// Snapshot Header
// =============================================================================

/// Decoded snapshot header.
///
/// Sizes are carried redundantly (`data_size`, `total_size`) so a reader
/// can cross-check the header against the actual file length before
/// trusting any offset in the slot table.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    /// Format version
    pub version: u16,
    /// Split of the 64-bit hash into fingerprint / record offset
    pub offset_bits: u16,
    /// Fixed slot table size, chosen at build time
    pub slot_count: u64,
    /// Number of records stored
    pub entry_count: u64,
    /// Record region size in bytes (includes the reserved prefix pad)
    pub data_size: u64,
    /// Total file size: header + slot table + record region
    pub total_size: u64,
    /// Build completion time, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// CRC32 of the record region
    pub data_crc: u32,
    /// Longest probe chain observed while building the slot table
    pub max_collisions: u32,
}

impl SnapshotHeader {
    /// Serialize the header into its fixed 64-byte form
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.offset_bits.to_le_bytes());
        buf[8..16].copy_from_slice(&self.slot_count.to_le_bytes());
        buf[16..24].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.data_size.to_le_bytes());
        buf[32..40].copy_from_slice(&self.total_size.to_le_bytes());
        buf[40..48].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        buf[48..52].copy_from_slice(&self.data_crc.to_le_bytes());
        buf[52..56].copy_from_slice(&self.max_collisions.to_le_bytes());
        // bytes 56..64 reserved
        buf
    }

    /// Parse and validate a header from the first bytes of a mapped file.
    ///
    /// `file_len` is the actual on-disk length; every size the header
    /// declares must agree with it.
    pub fn decode(bytes: &[u8], file_len: u64) -> Result<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(GlacierError::CorruptSnapshot(format!(
                "file too small for header: {} bytes",
                bytes.len()
            )));
        }

        if &bytes[0..4] != MAGIC {
            return Err(GlacierError::CorruptSnapshot(format!(
                "invalid magic: expected GKVS, got {:?}",
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(GlacierError::CorruptSnapshot(format!(
                "unsupported snapshot version: {}",
                version
            )));
        }

        let offset_bits = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
        if !(MIN_OFFSET_BITS..=MAX_OFFSET_BITS).contains(&offset_bits) {
            return Err(GlacierError::CorruptSnapshot(format!(
                "offset bits {} outside [{}, {}]",
                offset_bits, MIN_OFFSET_BITS, MAX_OFFSET_BITS
            )));
        }

        let header = Self {
            version,
            offset_bits,
            slot_count: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            entry_count: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            data_size: u64::from_le_bytes(bytes[24..32].try_into().unwrap()),
            total_size: u64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            timestamp_ms: u64::from_le_bytes(bytes[40..48].try_into().unwrap()),
            data_crc: u32::from_le_bytes(bytes[48..52].try_into().unwrap()),
            max_collisions: u32::from_le_bytes(bytes[52..56].try_into().unwrap()),
        };

        if header.slot_count == 0 {
            return Err(GlacierError::CorruptSnapshot(
                "slot count is zero".to_string(),
            ));
        }

        if header.data_size < RECORD_REGION_PAD {
            return Err(GlacierError::CorruptSnapshot(format!(
                "record region too small: {} bytes",
                header.data_size
            )));
        }

        let expected = HEADER_SIZE
            .checked_add(header.slot_count.checked_mul(SLOT_WIDTH).ok_or_else(|| {
                GlacierError::CorruptSnapshot("slot table size overflow".to_string())
            })?)
            .and_then(|n| n.checked_add(header.data_size))
            .ok_or_else(|| GlacierError::CorruptSnapshot("declared size overflow".to_string()))?;

        if header.total_size != expected {
            return Err(GlacierError::CorruptSnapshot(format!(
                "declared total size {} does not match header + slots + data = {}",
                header.total_size, expected
            )));
        }

        if header.total_size != file_len {
            return Err(GlacierError::CorruptSnapshot(format!(
                "declared total size {} does not match file length {}",
                header.total_size, file_len
            )));
        }

        Ok(header)
    }

    /// Byte offset where the slot table starts
    pub fn slot_table_offset(&self) -> u64 {
        HEADER_SIZE
    }

    /// Byte offset where the record region starts
    pub fn record_region_offset(&self) -> u64 {
        HEADER_SIZE + self.slot_count * SLOT_WIDTH
    }
}
