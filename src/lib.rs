//! # GlacierKV
//!
//! A read-optimized, immutable, on-disk key-value store:
//! - Bulk offline builds produce hash-indexed binary snapshots
//! - Snapshots are memory-mapped and served lock-free
//! - Linear probing with fingerprint short-circuit for O(1) lookups
//! - Atomic generation swapping under concurrent readers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CacheWriter                             │
//! │       insert(key, value, type_tag) ... finish()              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ atomic publish (staging dir + rename)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        destination_root/cache_name/<timestamp>/              │
//! │            <cache_name>.cache  (immutable)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ attach(name, dir, timestamp)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      CacheReader                             │
//! │   ArcSwap<Snapshot> ── mmap ── get / get_with_type /         │
//! │                                contains (lock-free)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod layout;
pub mod hash;
pub mod writer;
pub mod generation;
pub mod snapshot;
pub mod reader;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GlacierError, Result};
pub use config::CacheConfig;
pub use writer::CacheWriter;
pub use snapshot::Snapshot;
pub use reader::CacheReader;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of GlacierKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
