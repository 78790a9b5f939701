//! Persistent key/value cache
//!
//! A disk-backed map from string keys to byte values with per-entry TTL,
//! LRU eviction under a global byte budget, atomic writes and crash-safe
//! startup recovery.
//!
//! # On-disk layout
//!
//! | File | Contents |
//! |------|----------|
//! | `<digest>.cache` | payload bytes, verbatim |
//! | `<digest>.meta` | one JSON line: `key`, `created`, `ttl_ns`, `size` |
//! | `.tmp-*` | in-progress atomic writes (ignored by scans) |

pub mod atomic;
pub mod digest;
pub mod engine;
pub mod entry;
pub mod lru;

pub use atomic::{atomic_write, TempPattern};
pub use digest::{digest, short_sha256_hex};
pub use engine::{CacheOptions, CacheStats, DiskCache};
pub use entry::MetaRecord;

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
