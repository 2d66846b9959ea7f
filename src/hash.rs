//! Hasher & Probe Arithmetic
//!
//! Keys are hashed with seedless XXH3-64 so the slot table computed at
//! build time is reproducible by any reader using the same algorithm.
//! The 64-bit hash is split in two:
//! - low `offset_bits` bits of a slot word hold the record offset
//! - the remaining high bits hold the key fingerprint, compared before
//!   touching the record region to reject most collisions cheaply

use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::layout::{MAX_OFFSET_BITS, MIN_OFFSET_BITS};
use crate::GlacierError;

/// Hash a key. Deterministic across processes and builds.
#[inline]
pub fn hash_key(key: &[u8]) -> u64 {
    xxh3_64(key)
}

/// Precomputed masks for one snapshot's fingerprint/offset split.
#[derive(Debug, Clone, Copy)]
pub struct SlotLayout {
    slot_count: u64,
    offset_bits: u16,
    fingerprint_mask: u64,
    offset_mask: u64,
}

impl SlotLayout {
    pub fn new(slot_count: u64, offset_bits: u16) -> Result<Self> {
        if slot_count == 0 {
            return Err(GlacierError::Config(
                "number of key slots must be greater than zero".to_string(),
            ));
        }
        if !(MIN_OFFSET_BITS..=MAX_OFFSET_BITS).contains(&offset_bits) {
            return Err(GlacierError::Config(format!(
                "offset bits must be in range [{}, {}], got {}",
                MIN_OFFSET_BITS, MAX_OFFSET_BITS, offset_bits
            )));
        }

        let offset_mask = (1u64 << offset_bits) - 1;
        Ok(Self {
            slot_count,
            offset_bits,
            fingerprint_mask: !offset_mask,
            offset_mask,
        })
    }

    #[inline]
    pub fn slot_count(&self) -> u64 {
        self.slot_count
    }

    #[inline]
    pub fn offset_bits(&self) -> u16 {
        self.offset_bits
    }

    /// Largest record-region offset this split can address
    #[inline]
    pub fn max_offset(&self) -> u64 {
        self.offset_mask
    }

    /// First slot in the probe sequence for a hash
    #[inline]
    pub fn home_slot(&self, hash: u64) -> u64 {
        hash % self.slot_count
    }

    /// Slot after `slot` in the probe sequence (wrapping)
    #[inline]
    pub fn next_slot(&self, slot: u64) -> u64 {
        let next = slot + 1;
        if next == self.slot_count {
            0
        } else {
            next
        }
    }

    /// Fingerprint bits of a hash, already positioned for comparison
    /// against a packed slot word
    #[inline]
    pub fn fingerprint(&self, hash: u64) -> u64 {
        hash & self.fingerprint_mask
    }

    /// Pack a fingerprint and record offset into one slot word
    #[inline]
    pub fn pack(&self, fingerprint: u64, offset: u64) -> u64 {
        fingerprint | offset
    }

    /// Record offset stored in a slot word; 0 means the slot is empty
    #[inline]
    pub fn word_offset(&self, word: u64) -> u64 {
        word & self.offset_mask
    }

    /// Whether a slot word's fingerprint matches the key's
    #[inline]
    pub fn fingerprint_matches(&self, word: u64, fingerprint: u64) -> bool {
        word & self.fingerprint_mask == fingerprint
    }
}
