//! Atomic file writes
//!
//! A payload is written to a uniquely named temp file in a staging directory
//! on the same filesystem, synced, and renamed over the destination. Readers
//! see either the previous content or the full new content.

use crate::error::{PulseError, PulseResult};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Naming scheme for in-progress temp files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempPattern {
    pub prefix: &'static str,
    pub suffix: &'static str,
}

impl TempPattern {
    /// `.tmp-{pid}-{n}`, used by the key/value engine
    pub const KV: Self = Self {
        prefix: ".tmp-",
        suffix: "",
    };

    /// `.render-{pid}-{n}.tmp`, used by the image cache
    pub const RENDER: Self = Self {
        prefix: ".render-",
        suffix: ".tmp",
    };

    /// `.config-{pid}-{n}.tmp`, used when saving the config file
    pub const CONFIG: Self = Self {
        prefix: ".config-",
        suffix: ".tmp",
    };

    /// Whether a file name belongs to this pattern
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(self.prefix) && file_name.ends_with(self.suffix)
    }

    fn name(&self, pid: u32, counter: u64) -> String {
        format!("{}{}-{}{}", self.prefix, pid, counter, self.suffix)
    }
}

/// Write `bytes` to `path` atomically, staging in `staging_dir`
///
/// `staging_dir` must live on the same filesystem as `path`. On failure the
/// temp file is removed best effort and `path` is left untouched.
pub async fn atomic_write(
    path: &Path,
    bytes: &[u8],
    staging_dir: &Path,
    pattern: TempPattern,
) -> PulseResult<()> {
    let (tmp_path, mut file) = open_unique_tmp_file(staging_dir, pattern)
        .await
        .map_err(|e| {
            PulseError::io(
                format!("creating temp file in {}", staging_dir.display()),
                e,
            )
        })?;

    let write_result = async {
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok::<_, io::Error>(())
    }
    .await;
    drop(file);

    if let Err(e) = write_result {
        remove_tmp_best_effort(&tmp_path).await;
        return Err(PulseError::io(
            format!("writing temp file {}", tmp_path.display()),
            e,
        ));
    }

    if let Err(e) = fs::rename(&tmp_path, path).await {
        remove_tmp_best_effort(&tmp_path).await;
        return Err(PulseError::io(
            format!("renaming {} to {}", tmp_path.display(), path.display()),
            e,
        ));
    }

    sync_dir_best_effort(staging_dir).await;
    Ok(())
}

async fn open_unique_tmp_file(
    staging_dir: &Path,
    pattern: TempPattern,
) -> io::Result<(PathBuf, fs::File)> {
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = staging_dir.join(pattern.name(pid, counter));

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .await
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

async fn remove_tmp_best_effort(tmp_path: &Path) {
    if let Err(e) = fs::remove_file(tmp_path).await {
        if e.kind() != io::ErrorKind::NotFound {
            debug!(
                path = %tmp_path.display(),
                error = %e,
                "failed to remove temp file after write failure"
            );
        }
    }
}

async fn sync_dir_best_effort(dir: &Path) {
    #[cfg(unix)]
    {
        let result = async { fs::File::open(dir).await?.sync_all().await }.await;
        if let Err(e) = result {
            debug!(dir = %dir.display(), error = %e, "failed to sync directory");
        }
    }

    #[cfg(not(unix))]
    let _ = dir;
}
