//! Content-addressed cache of rendered images
//!
//! Keyed by `(content-hash, protocol, width, height)`. The filesystem is the
//! source of truth: reads go straight to disk with no lock. The mutex guards
//! the size/entry counters and is held across writes and removals so the
//! counters track what those operations did to the disk.

use crate::cache::atomic::{atomic_write, TempPattern};
use crate::error::{PulseError, PulseResult};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Rendered file extension
pub const RENDER_EXT: &str = "render";

/// Length of the content-hash prefix used as the subdirectory name
const PREFIX_LEN: usize = 8;

/// Key of a rendered image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub content_hash: String,
    pub protocol: String,
    pub width: u32,
    pub height: u32,
}

impl ImageKey {
    pub fn new(
        content_hash: impl Into<String>,
        protocol: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            content_hash: content_hash.into(),
            protocol: protocol.into(),
            width,
            height,
        }
    }

    /// `{content-hash[0:8]}` subdirectory name
    pub fn prefix(&self) -> String {
        let prefix: String = self.content_hash.chars().take(PREFIX_LEN).collect();
        if prefix.is_empty() {
            return "%".to_string();
        }
        encode_component(&prefix)
    }

    /// `{protocol}_{w}x{h}.render` file name
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}x{}.{}",
            encode_component(&self.protocol),
            self.width,
            self.height,
            RENDER_EXT
        )
    }

    /// Path relative to the cache root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.prefix()).join(self.file_name())
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}x{}",
            self.content_hash, self.protocol, self.width, self.height
        )
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9_-]`
///
/// The mapping is injective, so distinct tags never share a file, and the
/// result never contains a separator or starts with a dot.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Snapshot of image cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImageCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size_bytes: u64,
    pub entries: usize,
    pub max_bytes: u64,
}

/// Result of a prune pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub removed: usize,
    pub freed_bytes: u64,
    pub remaining_bytes: u64,
}

#[derive(Debug, Default)]
struct Usage {
    size_bytes: u64,
    entries: usize,
}

#[derive(Debug)]
struct RenderFile {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

/// Disk cache of rendered terminal image payloads
#[derive(Debug)]
pub struct ImageCache {
    root: PathBuf,
    max_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    usage: Mutex<Usage>,
}

impl ImageCache {
    /// Open an image cache, creating the root and counting existing renders
    pub async fn open(root: impl Into<PathBuf>, max_bytes: u64) -> PulseResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            PulseError::io(format!("creating image cache dir {}", root.display()), e)
        })?;

        let files = scan(&root).await?;
        let usage = Usage {
            size_bytes: files.iter().map(|f| f.len).sum(),
            entries: files.len(),
        };
        debug!(
            root = %root.display(),
            entries = usage.entries,
            size = usage.size_bytes,
            "opened image cache"
        );

        Ok(Self {
            root,
            max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            usage: Mutex::new(usage),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a key's render file
    pub fn path_for(&self, key: &ImageKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Read a rendered payload; misses on any I/O error
    pub async fn get(&self, key: &ImageKey) -> Option<Vec<u8>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bytes)
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(key = %key, error = %e, "failed to read rendered image");
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a rendered payload atomically
    pub async fn put(&self, key: &ImageKey, rendered: &[u8]) -> PulseResult<()> {
        let prefix_dir = self.root.join(key.prefix());
        let path = prefix_dir.join(key.file_name());

        // Held across the write so racing puts of one key see each other's
        // file and an evict cannot drop the prefix dir underneath us
        let mut usage = self.usage.lock().await;
        fs::create_dir_all(&prefix_dir).await.map_err(|e| {
            PulseError::io(format!("creating image dir {}", prefix_dir.display()), e)
        })?;
        let previous = file_len(&path).await;

        atomic_write(&path, rendered, &prefix_dir, TempPattern::RENDER).await?;

        match previous {
            Some(old) => usage.size_bytes = usage.size_bytes.saturating_sub(old),
            None => usage.entries += 1,
        }
        usage.size_bytes += rendered.len() as u64;
        debug!(key = %key, size = rendered.len(), "stored rendered image");
        Ok(())
    }

    pub async fn has(&self, key: &ImageKey) -> bool {
        fs::metadata(self.path_for(key))
            .await
            .is_ok_and(|m| m.is_file())
    }

    /// Remove a render; returns whether one existed
    pub async fn evict(&self, key: &ImageKey) -> PulseResult<bool> {
        let prefix_dir = self.root.join(key.prefix());
        let path = prefix_dir.join(key.file_name());

        {
            let mut usage = self.usage.lock().await;
            let Some(len) = file_len(&path).await else {
                return Ok(false);
            };

            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => {
                    return Err(PulseError::io(
                        format!("removing rendered image {}", path.display()),
                        e,
                    ))
                }
            }

            usage.size_bytes = usage.size_bytes.saturating_sub(len);
            usage.entries = usage.entries.saturating_sub(1);
            remove_dir_if_empty(&prefix_dir).await;
        }

        Ok(true)
    }

    /// Remove the oldest renders (by mtime) until the total fits the budget
    pub async fn prune(&self) -> PulseResult<PruneReport> {
        let mut usage = self.usage.lock().await;
        let mut files = scan(&self.root).await?;
        files.sort_by_key(|f| f.modified);

        let mut total: u64 = files.iter().map(|f| f.len).sum();
        let mut report = PruneReport::default();
        let mut kept = files.len();

        for file in &files {
            if total <= self.max_bytes {
                break;
            }
            match fs::remove_file(&file.path).await {
                Ok(()) => {
                    total = total.saturating_sub(file.len);
                    kept -= 1;
                    report.removed += 1;
                    report.freed_bytes += file.len;
                    if let Some(parent) = file.path.parent() {
                        remove_dir_if_empty(parent).await;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    total = total.saturating_sub(file.len);
                    kept -= 1;
                }
                Err(e) => {
                    debug!(path = %file.path.display(), error = %e, "failed to prune render")
                }
            }
        }

        report.remaining_bytes = total;
        usage.size_bytes = total;
        usage.entries = kept;
        drop(usage);

        if report.removed > 0 {
            info!(
                "Pruned {} rendered image(s), freed {} bytes",
                report.removed, report.freed_bytes
            );
        }
        Ok(report)
    }

    /// Remove every render; returns how many were removed
    ///
    /// Keeps going past files it cannot remove and reports the first failure
    /// once the counters match what is left on disk.
    pub async fn clear(&self) -> PulseResult<usize> {
        let mut usage = self.usage.lock().await;
        let files = scan(&self.root).await?;
        let mut removed = 0;
        let mut first_err = None;

        for file in &files {
            match fs::remove_file(&file.path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    debug!(path = %file.path.display(), error = %e, "failed to remove render");
                    if first_err.is_none() {
                        first_err = Some(PulseError::io(
                            format!("removing rendered image {}", file.path.display()),
                            e,
                        ));
                    }
                }
            }
            if let Some(parent) = file.path.parent() {
                remove_dir_if_empty(parent).await;
            }
        }

        match first_err {
            None => {
                *usage = Usage::default();
                Ok(removed)
            }
            Some(err) => {
                let left = scan(&self.root).await?;
                usage.size_bytes = left.iter().map(|f| f.len).sum();
                usage.entries = left.len();
                Err(err)
            }
        }
    }

    pub async fn stats(&self) -> ImageCacheStats {
        let usage = self.usage.lock().await;
        ImageCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size_bytes: usage.size_bytes,
            entries: usage.entries,
            max_bytes: self.max_bytes,
        }
    }
}

/// List every `*.render` file one level below the root
async fn scan(root: &Path) -> PulseResult<Vec<RenderFile>> {
    let mut files = Vec::new();
    let mut prefixes = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
        Err(e) => {
            return Err(PulseError::io(
                format!("reading image cache dir {}", root.display()),
                e,
            ))
        }
    };

    while let Some(prefix) = prefixes
        .next_entry()
        .await
        .map_err(|e| PulseError::io("reading image cache dir entry", e))?
    {
        if !prefix.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let mut entries = match fs::read_dir(prefix.path()).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %prefix.path().display(), error = %e, "failed to read image dir");
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != RENDER_EXT) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            files.push(RenderFile {
                path,
                len: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
    }

    Ok(files)
}

async fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .await
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}

async fn remove_dir_if_empty(dir: &Path) {
    // Fails while the directory still holds renders or temp files
    if let Err(e) = fs::remove_dir(dir).await {
        debug!(dir = %dir.display(), error = %e, "kept image prefix dir");
    }
}
