//! Prefetch command - render the session image and print it

use crate::cli::args::PrefetchArgs;
use crate::cli::commands::{default_pid, image};
use crate::config::{Config, ConfigManager};
use crate::error::{PulseError, PulseResult};
use crate::prefetch::{CommandRenderer, Prefetcher};
use crate::session::SessionManager;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Execute the prefetch command
pub async fn execute(args: PrefetchArgs, config: &Config) -> PulseResult<()> {
    let width = args.width.unwrap_or(config.render.width);
    let height = args.height.unwrap_or(config.render.height);
    let protocol = args
        .protocol
        .unwrap_or_else(|| config.render.protocol.clone());

    let pid = args.pid.unwrap_or_else(default_pid);
    let sessions = SessionManager::with_pid(ConfigManager::image_dir(config), pid);
    let session = sessions.get_or_create().await?;

    let cache = Arc::new(image::open(config).await?);
    let renderer = CommandRenderer::from_config(&config.render).with_protocol(&protocol);
    let prefetcher = Prefetcher::new(cache, Arc::new(renderer));

    let rx = prefetcher
        .prefetch_with_protocol(&session, &protocol, width, height)
        .await;
    let result = rx
        .await
        .map_err(|_| PulseError::Internal("prefetch worker exited without a result".into()))?;
    prefetcher.close().await;

    info!(
        "Prefetched {} ({}x{} {}) from_cache={} in {:?}",
        session.image_path.display(),
        width,
        height,
        protocol,
        result.from_cache,
        result.duration
    );

    let rendered = result.into_rendered()?;
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&rendered)
        .await
        .map_err(|e| PulseError::io("writing render to stdout", e))?;
    stdout
        .flush()
        .await
        .map_err(|e| PulseError::io("flushing stdout", e))
}
