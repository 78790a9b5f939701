//! Session records and image selection

use crate::cache::digest::short_sha256_hex;
use crate::error::{PulseError, PulseResult};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Prefix of every session identifier
pub const SESSION_PREFIX: &str = "ppulse-";

/// Bytes of the image read when computing its content hash
pub const HASH_WINDOW_BYTES: u64 = 64 * 1024;

/// Image file extensions eligible for selection (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Per-process binding to one selected image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// `ppulse-{pid}`
    pub id: String,

    /// Absolute path of the selected image
    pub image_path: PathBuf,

    /// 16 hex chars of SHA-256 over the first 64 KiB of the image
    pub content_hash: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Session identifier for a process; stable across invocations sharing
    /// the PID
    pub fn id_for_pid(pid: u32) -> String {
        format!("{SESSION_PREFIX}{pid}")
    }

    /// Pick a random image from `image_dir` and hash it
    pub async fn create(id: String, image_dir: &Path) -> PulseResult<Self> {
        let images = list_images(image_dir).await?;
        let image = images
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| PulseError::NoImages(image_dir.to_path_buf()))?;

        let image_path = std::path::absolute(image)
            .map_err(|e| PulseError::io(format!("resolving {}", image.display()), e))?;
        let content_hash = content_hash(&image_path).await?;
        debug!(
            "Selected {} for session {} (hash {})",
            image_path.display(),
            id,
            content_hash
        );

        Ok(Self {
            id,
            image_path,
            content_hash,
            created_at: Utc::now(),
        })
    }
}

/// Regular, non-hidden files in `dir` with an image extension, sorted by name
pub async fn list_images(dir: &Path) -> PulseResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PulseError::NoImages(dir.to_path_buf()))
        }
        Err(e) => {
            return Err(PulseError::io(
                format!("reading image directory {}", dir.display()),
                e,
            ))
        }
    };

    let mut images = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PulseError::io("reading image directory entry", e))?
    {
        if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if is_image(&path) {
            images.push(path);
        }
    }

    images.sort();
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Content hash over the first 64 KiB of a file
pub async fn content_hash(path: &Path) -> PulseResult<String> {
    let file = fs::File::open(path)
        .await
        .map_err(|e| PulseError::io(format!("opening image {}", path.display()), e))?;

    let mut head = Vec::new();
    file.take(HASH_WINDOW_BYTES)
        .read_to_end(&mut head)
        .await
        .map_err(|e| PulseError::io(format!("reading image {}", path.display()), e))?;

    Ok(short_sha256_hex(&head))
}
