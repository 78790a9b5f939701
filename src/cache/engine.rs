//! Disk-backed key/value cache
//!
//! Every live entry is a `{digest}.cache` payload plus a `{digest}.meta`
//! record in the cache directory. An in-memory LRU index mirrors the set of
//! live entries and enforces a global byte budget. A background sweeper
//! removes entries whose TTL has elapsed.
//!
//! # Locking
//!
//! One readers/writer lock guards the index, the size counter and the
//! statistics. Mutations (and `get`, which promotes) take the write lock and
//! perform their disk I/O inside it, so per-key operations are totally
//! ordered. Reads never fail: I/O errors fold into misses.

use crate::cache::atomic::{atomic_write, TempPattern};
use crate::cache::digest::digest;
use crate::cache::entry::{now_nanos, ttl_to_nanos, EntryMeta, MetaRecord, CACHE_EXT, META_EXT};
use crate::cache::lru::LruIndex;
use crate::config::schema::CacheConfig;
use crate::error::{PulseError, PulseResult};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default byte budget in megabytes
pub const DEFAULT_MAX_SIZE_MB: i64 = 50;

/// Default entry lifetime for `put`
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default period of the background sweep
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Options for opening a [`DiskCache`]
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Root directory; created if absent
    pub dir: PathBuf,

    /// Total payload budget in megabytes (≤ 0 = default)
    pub max_size_mb: i64,

    /// Lifetime applied by `put` (`None` = default, zero = never expires)
    pub default_ttl: Option<Duration>,

    /// Sweep period (`None` or zero = default)
    pub cleanup_interval: Option<Duration>,
}

impl CacheOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            default_ttl: None,
            cleanup_interval: None,
        }
    }

    pub fn max_size_mb(mut self, mb: i64) -> Self {
        self.max_size_mb = mb;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Build options from the `[cache]` config section
    ///
    /// Negative TTLs fall back to the default; a TTL of 0 disables expiry.
    pub fn from_config(config: &CacheConfig, dir: PathBuf) -> Self {
        Self {
            dir,
            max_size_mb: config.max_size_mb,
            default_ttl: u64::try_from(config.default_ttl_secs)
                .ok()
                .map(Duration::from_secs),
            cleanup_interval: u64::try_from(config.cleanup_interval_secs)
                .ok()
                .map(Duration::from_secs),
        }
    }

    fn max_bytes(&self) -> u64 {
        let mb = if self.max_size_mb <= 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            self.max_size_mb
        };
        u64::try_from(mb).unwrap_or(0).saturating_mul(1024 * 1024)
    }

    fn effective_ttl(&self) -> Duration {
        self.default_ttl.unwrap_or(DEFAULT_TTL)
    }

    fn effective_cleanup_interval(&self) -> Duration {
        match self.cleanup_interval {
            Some(interval) if !interval.is_zero() => interval,
            _ => DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size_bytes: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct State {
    index: LruIndex,
    current_size: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

#[derive(Debug)]
struct Shared {
    dir: PathBuf,
    max_bytes: u64,
    default_ttl: Duration,
    state: RwLock<State>,
}

/// Persistent, size-bounded key/value cache with TTL expiry
///
/// Only one instance may own a directory at a time.
#[derive(Debug)]
pub struct DiskCache {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl DiskCache {
    /// Open (or create) a cache directory and recover its entries
    ///
    /// Must be called inside a tokio runtime; the sweeper is spawned on it.
    pub async fn open(options: CacheOptions) -> PulseResult<Self> {
        let dir = options.dir.clone();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PulseError::io(format!("creating cache dir {}", dir.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            fs::set_permissions(&dir, perms)
                .await
                .map_err(|e| PulseError::io("setting cache dir permissions", e))?;
        }

        let shared = Arc::new(Shared {
            dir,
            max_bytes: options.max_bytes(),
            default_ttl: options.effective_ttl(),
            state: RwLock::new(State::default()),
        });

        {
            let mut state = shared.state.write().await;
            shared.recover(&mut state).await?;
            // No entry was just written, so the cache may drain completely
            shared.evict(&mut state, 0).await;
            info!(
                "Opened cache at {} ({} entries, {} bytes)",
                shared.dir.display(),
                state.index.len(),
                state.current_size
            );
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let sweeper = spawn_sweeper(
            Arc::clone(&shared),
            options.effective_cleanup_interval(),
            shutdown_rx,
        );

        Ok(Self {
            shared,
            shutdown,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Byte budget
    pub fn max_bytes(&self) -> u64 {
        self.shared.max_bytes
    }

    /// Look up a key, promoting it on hit
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let digest = digest(key);
        let mut state = self.shared.state.write().await;

        let entry = state.index.get(&digest).filter(|e| e.key == key).cloned();
        let Some(entry) = entry else {
            state.misses += 1;
            return None;
        };

        if entry.is_expired() {
            debug!(key, "cache entry expired");
            self.shared.drop_entry(&mut state, &digest).await;
            state.misses += 1;
            return None;
        }

        match fs::read(self.shared.dir.join(entry.payload_file())).await {
            Ok(bytes) => {
                state.index.promote(&digest);
                state.hits += 1;
                Some(bytes)
            }
            Err(e) => {
                debug!(key, error = %e, "failed to read cache payload");
                self.shared.drop_entry(&mut state, &digest).await;
                state.misses += 1;
                None
            }
        }
    }

    /// Store a value with the default TTL
    pub async fn put(&self, key: &str, value: &[u8]) -> PulseResult<()> {
        self.put_with_ttl(key, value, self.shared.default_ttl).await
    }

    /// Store a value with an explicit TTL (zero = never expires)
    pub async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> PulseResult<()> {
        let entry = EntryMeta::new(key, now_nanos(), ttl_to_nanos(ttl), value.len() as u64);
        let record = entry.to_record().encode()?;
        let dir = &self.shared.dir;
        let payload_path = dir.join(entry.payload_file());
        let meta_path = dir.join(entry.meta_file());

        let mut state = self.shared.state.write().await;

        atomic_write(&payload_path, value, dir, TempPattern::KV).await?;

        if let Err(e) = atomic_write(&meta_path, &record, dir, TempPattern::KV).await {
            // The payload may have replaced a previous entry's; drop both
            if let Err(remove_err) = remove_if_present(&payload_path).await {
                debug!(key, error = %remove_err, "failed to remove payload after metadata write failure");
            }
            if let Some(old) = self.shared.unindex(&mut state, &entry.digest) {
                if let Err(remove_err) = self.shared.remove_files(&old).await {
                    debug!(key, error = %remove_err, "failed to remove replaced entry");
                }
            }
            return Err(e);
        }

        let size = entry.size;
        if let Some(old) = state.index.insert_front(entry) {
            state.current_size -= old.size;
        }
        state.current_size += size;
        debug!(key, size, "stored cache entry");

        self.shared.evict(&mut state, 1).await;
        Ok(())
    }

    /// Remove a key; absent keys are a no-op
    pub async fn delete(&self, key: &str) -> PulseResult<()> {
        let digest = digest(key);
        let mut state = self.shared.state.write().await;

        let Some(entry) = self.shared.unindex(&mut state, &digest) else {
            return Ok(());
        };

        self.shared
            .remove_files(&entry)
            .await
            .map_err(|e| PulseError::io(format!("removing cache entry for {}", key), e))
    }

    /// Whether a key is present and not expired
    pub async fn has(&self, key: &str) -> bool {
        let digest = digest(key);

        {
            let state = self.shared.state.read().await;
            match state.index.get(&digest) {
                None => return false,
                Some(entry) if !entry.is_expired() => return true,
                Some(_) => {}
            }
        }

        // Observed an expired entry: re-validate under the write lock
        let mut state = self.shared.state.write().await;
        let expired = state.index.get(&digest).map(EntryMeta::is_expired);
        match expired {
            Some(true) => {
                self.shared.drop_entry(&mut state, &digest).await;
                false
            }
            Some(false) => true,
            None => false,
        }
    }

    /// Snapshot of all non-expired keys, in no particular order
    pub async fn keys(&self) -> Vec<String> {
        let state = self.shared.state.read().await;
        let now = now_nanos();
        state
            .index
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Remove every entry and temp file, and reset all counters
    pub async fn clear(&self) -> PulseResult<()> {
        let dir = &self.shared.dir;
        let mut state = self.shared.state.write().await;

        let result = remove_cache_files(dir).await;

        // Some files may already be gone even when the scan failed
        *state = State::default();

        let removed = result?;
        info!("Cleared cache at {} ({} files removed)", dir.display(), removed);
        Ok(())
    }

    /// Tracked payload bytes
    pub async fn size(&self) -> u64 {
        self.shared.state.read().await.current_size
    }

    /// Number of live entries, including expired ones not yet observed
    pub async fn len(&self) -> usize {
        self.shared.state.read().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.shared.state.read().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            size_bytes: state.current_size,
            entries: state.index.len(),
        }
    }

    /// Remove all expired entries now; returns how many were removed
    pub async fn sweep(&self) -> usize {
        self.shared.sweep().await
    }

    /// Stop the sweeper and wait for it; idempotent
    pub async fn close(&self) -> PulseResult<()> {
        self.shutdown.send_replace(true);
        let handle = self.sweeper.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Cache sweeper ended abnormally: {}", e);
            }
        }
        Ok(())
    }
}

impl Shared {
    /// Rebuild the index from the files in the cache directory
    async fn recover(&self, state: &mut State) -> PulseResult<()> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| PulseError::io(format!("reading cache dir {}", self.dir.display()), e))?;

        let now = now_nanos();
        let mut payload_stems = Vec::new();

        while let Some(dirent) = entries
            .next_entry()
            .await
            .map_err(|e| PulseError::io("reading cache dir entry", e))?
        {
            if !dirent.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            let name = dirent.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if TempPattern::KV.matches(name) {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".cache") {
                payload_stems.push(stem.to_string());
                continue;
            }
            let Some(stem) = name.strip_suffix(".meta") else {
                continue;
            };

            let meta_path = dirent.path();
            let payload_path = self.dir.join(format!("{stem}.{CACHE_EXT}"));

            if !fs::try_exists(&payload_path).await.unwrap_or(false) {
                debug!(digest = stem, "removing metadata without payload");
                remove_best_effort(&meta_path).await;
                continue;
            }

            let record = match fs::read(&meta_path).await {
                Ok(bytes) => MetaRecord::decode(&bytes).ok(),
                Err(_) => None,
            };
            let Some(record) = record else {
                debug!(digest = stem, "removing entry with unreadable metadata");
                remove_best_effort(&meta_path).await;
                remove_best_effort(&payload_path).await;
                continue;
            };

            let entry = EntryMeta::from_record(record);
            if entry.digest != stem {
                debug!(digest = stem, "removing entry whose key does not match its file name");
                remove_best_effort(&meta_path).await;
                remove_best_effort(&payload_path).await;
                continue;
            }
            if entry.is_expired_at(now) {
                debug!(key = %entry.key, "removing expired entry");
                remove_best_effort(&meta_path).await;
                remove_best_effort(&payload_path).await;
                continue;
            }

            state.current_size += entry.size;
            state.index.push_back(entry);
        }

        for stem in payload_stems {
            if !state.index.contains(&stem) {
                let payload_path = self.dir.join(format!("{stem}.{CACHE_EXT}"));
                let meta_path = self.dir.join(format!("{stem}.{META_EXT}"));
                if !fs::try_exists(&meta_path).await.unwrap_or(false) {
                    debug!(digest = %stem, "removing payload without metadata");
                    remove_best_effort(&payload_path).await;
                }
            }
        }

        Ok(())
    }

    /// Evict until the tracked size fits the budget
    ///
    /// Expired entries go first, then least recently used. The LRU pass stops
    /// once `keep` entries remain; after a put `keep` is 1 so the value just
    /// written survives even when it alone exceeds the budget.
    async fn evict(&self, state: &mut State, keep: usize) {
        if state.current_size <= self.max_bytes {
            return;
        }

        let now = now_nanos();
        let expired: Vec<String> = state
            .index
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.digest.clone())
            .collect();

        for digest in expired {
            if state.current_size <= self.max_bytes {
                break;
            }
            if self.drop_entry(state, &digest).await.is_some() {
                state.evictions += 1;
            }
        }

        while state.current_size > self.max_bytes && state.index.len() > keep {
            let Some(digest) = state.index.back().map(|entry| entry.digest.clone()) else {
                break;
            };
            if let Some(entry) = self.drop_entry(state, &digest).await {
                debug!(key = %entry.key, size = entry.size, "evicted cache entry");
                state.evictions += 1;
            }
        }
    }

    async fn sweep(&self) -> usize {
        let mut state = self.state.write().await;
        let now = now_nanos();
        let expired: Vec<String> = state
            .index
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.digest.clone())
            .collect();

        let mut removed = 0;
        for digest in expired {
            if self.drop_entry(&mut state, &digest).await.is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove an entry from the index and the size counter
    fn unindex(&self, state: &mut State, digest: &str) -> Option<EntryMeta> {
        let entry = state.index.remove(digest)?;
        state.current_size -= entry.size;
        Some(entry)
    }

    /// Unindex an entry and delete its files, logging file errors
    async fn drop_entry(&self, state: &mut State, digest: &str) -> Option<EntryMeta> {
        let entry = self.unindex(state, digest)?;
        if let Err(e) = self.remove_files(&entry).await {
            debug!(key = %entry.key, error = %e, "failed to remove cache files");
        }
        Some(entry)
    }

    async fn remove_files(&self, entry: &EntryMeta) -> io::Result<()> {
        let payload = remove_if_present(&self.dir.join(entry.payload_file())).await;
        let meta = remove_if_present(&self.dir.join(entry.meta_file())).await;
        payload.and(meta)
    }
}

fn spawn_sweeper(
    shared: Arc<Shared>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = shared.sweep().await;
                    if removed > 0 {
                        debug!(removed, "swept expired cache entries");
                    }
                }
                changed = shutdown.changed() => {
                    // Sender dropped or close() signalled
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!(dir = %shared.dir.display(), "cache sweeper stopped");
    })
}

/// Remove payload, metadata and temp files; returns how many were removed
async fn remove_cache_files(dir: &Path) -> PulseResult<usize> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| PulseError::io(format!("reading cache dir {}", dir.display()), e))?;

    let mut removed = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PulseError::io("reading cache dir entry", e))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_cache_file(name) {
            continue;
        }
        if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }
        match remove_if_present(&entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => debug!(file = name, error = %e, "failed to remove cache file"),
        }
    }
    Ok(removed)
}

fn is_cache_file(name: &str) -> bool {
    name.ends_with(".cache") || name.ends_with(".meta") || TempPattern::KV.matches(name)
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn remove_best_effort(path: &Path) {
    if let Err(e) = remove_if_present(path).await {
        debug!(path = %path.display(), error = %e, "failed to remove cache file");
    }
}
