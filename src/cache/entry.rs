//! Cache entry metadata
//!
//! Each live entry has a `{digest}.meta` record next to its `{digest}.cache`
//! payload. The record is one line of JSON with the fields `key`, `created`,
//! `ttl_ns` and `size`.

use crate::cache::digest::digest;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Payload file extension
pub const CACHE_EXT: &str = "cache";

/// Metadata file extension
pub const META_EXT: &str = "meta";

/// On-disk metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaRecord {
    /// Original user key, verbatim
    pub key: String,

    /// Creation time, nanoseconds since the Unix epoch
    pub created: i64,

    /// Time to live in nanoseconds (0 = never expires)
    pub ttl_ns: u64,

    /// Payload size in bytes
    pub size: u64,
}

impl MetaRecord {
    /// Encode as a single JSON line
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// In-memory descriptor of a live entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub key: String,
    pub digest: String,
    pub created: i64,
    pub ttl_ns: u64,
    pub size: u64,
}

impl EntryMeta {
    pub fn new(key: &str, created: i64, ttl_ns: u64, size: u64) -> Self {
        Self {
            key: key.to_string(),
            digest: digest(key),
            created,
            ttl_ns,
            size,
        }
    }

    pub fn from_record(record: MetaRecord) -> Self {
        Self {
            digest: digest(&record.key),
            key: record.key,
            created: record.created,
            ttl_ns: record.ttl_ns,
            size: record.size,
        }
    }

    pub fn to_record(&self) -> MetaRecord {
        MetaRecord {
            key: self.key.clone(),
            created: self.created,
            ttl_ns: self.ttl_ns,
            size: self.size,
        }
    }

    /// Expired iff `ttl > 0` and `now - created > ttl`
    pub fn is_expired_at(&self, now_ns: i64) -> bool {
        self.ttl_ns > 0 && i128::from(now_ns) - i128::from(self.created) > i128::from(self.ttl_ns)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_nanos())
    }

    pub fn payload_file(&self) -> String {
        format!("{}.{}", self.digest, CACHE_EXT)
    }

    pub fn meta_file(&self) -> String {
        format!("{}.{}", self.digest, META_EXT)
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch
pub fn now_nanos() -> i64 {
    // Out of range only after the year 2262
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Saturating conversion of a TTL to nanoseconds
pub fn ttl_to_nanos(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX)
}
