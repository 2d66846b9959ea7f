//! Configuration for GlacierKV
//!
//! The engine consumes a destination root, a cache name, and a slot
//! count; anything richer (properties files, CLI flags) is parsed by the
//! host and passed in here.

use std::path::PathBuf;

use crate::error::Result;
use crate::layout::{DEFAULT_OFFSET_BITS, MAX_OFFSET_BITS, MIN_OFFSET_BITS};
use crate::GlacierError;

/// Build-time configuration for one writer session
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache name; becomes a path component under the destination root
    pub cache_name: String,

    /// Root directory under which generations are published:
    ///   {destination_root}/
    ///     └── {cache_name}/
    ///           ├── 1651622570800/{cache_name}.cache
    ///           └── 1651622870412/{cache_name}.cache
    pub destination_root: PathBuf,

    /// Fixed slot table size. Never resized; choose ≥ 2× the expected
    /// key count to keep probe chains short.
    pub number_of_key_slots: u64,

    /// Split of the 64-bit hash between fingerprint and record offset
    pub offset_bits: u16,
}

impl CacheConfig {
    /// Create a config with the default offset-bits split
    pub fn new(
        cache_name: impl Into<String>,
        destination_root: impl Into<PathBuf>,
        number_of_key_slots: u64,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            destination_root: destination_root.into(),
            number_of_key_slots,
            offset_bits: DEFAULT_OFFSET_BITS,
        }
    }

    /// Override the fingerprint/offset split
    pub fn with_offset_bits(mut self, offset_bits: u16) -> Self {
        self.offset_bits = offset_bits;
        self
    }

    /// Validate before opening a writer session
    pub fn validate(&self) -> Result<()> {
        if self.cache_name.is_empty() {
            return Err(GlacierError::Config("cache name is empty".to_string()));
        }
        if self
            .cache_name
            .contains(|c: char| c == '/' || c == '\\' || c == '\0')
        {
            return Err(GlacierError::Config(format!(
                "cache name {:?} contains path separators",
                self.cache_name
            )));
        }
        if self.number_of_key_slots == 0 {
            return Err(GlacierError::Config(
                "number of key slots must be greater than zero".to_string(),
            ));
        }
        if !(MIN_OFFSET_BITS..=MAX_OFFSET_BITS).contains(&self.offset_bits) {
            return Err(GlacierError::Config(format!(
                "offset bits must be in range [{}, {}], got {}",
                MIN_OFFSET_BITS, MAX_OFFSET_BITS, self.offset_bits
            )));
        }
        Ok(())
    }
}
