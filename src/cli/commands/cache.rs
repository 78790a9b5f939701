//! Cache command - read and write the artifact cache

use crate::cache::{format_bytes, CacheOptions, CacheStats, DiskCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{PulseError, PulseResult};
use crate::ui::{self, UiContext};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> PulseResult<()> {
    let cache = open(config).await?;
    let result = run(&cache, args.action).await;
    // Stop the sweeper even when the action failed
    cache.close().await?;
    result
}

/// Open the artifact cache described by the config
pub async fn open(config: &Config) -> PulseResult<DiskCache> {
    let dir = ConfigManager::kv_dir(config);
    debug!("Opening cache at {}", dir.display());
    DiskCache::open(CacheOptions::from_config(&config.cache, dir)).await
}

async fn run(cache: &DiskCache, action: CacheAction) -> PulseResult<()> {
    match action {
        CacheAction::Get { key } => get(cache, &key).await,
        CacheAction::Put { key, value, ttl } => put(cache, &key, value, ttl).await,
        CacheAction::Rm { key } => cache.delete(&key).await,
        CacheAction::Has { key } => {
            if cache.has(&key).await {
                Ok(())
            } else {
                Err(PulseError::User(format!("Key not cached: {key}")))
            }
        }
        CacheAction::Keys { format } => list_keys(cache, format).await,
        CacheAction::Sweep => {
            let removed = cache.sweep().await;
            ui::step_ok(&UiContext::detect(), &format!("Removed {removed} expired entries"));
            Ok(())
        }
        CacheAction::Clear { yes } => clear(cache, yes).await,
        CacheAction::Stats { format } => show_stats(cache, format).await,
    }
}

async fn get(cache: &DiskCache, key: &str) -> PulseResult<()> {
    let value = cache
        .get(key)
        .await
        .ok_or_else(|| PulseError::User(format!("Key not cached: {key}")))?;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&value)
        .await
        .map_err(|e| PulseError::io("writing value to stdout", e))?;
    stdout
        .flush()
        .await
        .map_err(|e| PulseError::io("flushing stdout", e))
}

async fn put(
    cache: &DiskCache,
    key: &str,
    value: Option<String>,
    ttl: Option<u64>,
) -> PulseResult<()> {
    let bytes = match value {
        Some(value) => value.into_bytes(),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .map_err(|e| PulseError::io("reading value from stdin", e))?;
            buf
        }
    };

    match ttl {
        Some(secs) => {
            cache
                .put_with_ttl(key, &bytes, Duration::from_secs(secs))
                .await
        }
        None => cache.put(key, &bytes).await,
    }
}

async fn list_keys(cache: &DiskCache, format: OutputFormat) -> PulseResult<()> {
    let keys = cache.keys().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Plain => {
            for key in &keys {
                println!("{key}");
            }
        }
        OutputFormat::Table => {
            if keys.is_empty() {
                println!("No cached keys.");
                return Ok(());
            }
            println!("{:<6} KEY", "RANK");
            println!("{}", "-".repeat(40));
            for (rank, key) in keys.iter().enumerate() {
                println!("{:<6} {}", rank + 1, key);
            }
            println!();
            println!("Total: {} key(s)", keys.len());
        }
    }

    Ok(())
}

async fn clear(cache: &DiskCache, yes: bool) -> PulseResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let entries = cache.len().await;

    if entries == 0 {
        ui::step_info(&ctx, "Cache is already empty");
        return Ok(());
    }

    let message = format!("Remove {entries} cached entries?");
    if !ui::confirm(&ctx, &message, false).await? {
        ui::step_warn_hint(&ctx, "Cache not cleared", "Use --yes to skip the prompt");
        return Ok(());
    }

    cache.clear().await?;
    ui::step_ok_detail(
        &ctx,
        &format!("Removed {entries} entries"),
        &cache.dir().display().to_string(),
    );
    Ok(())
}

async fn show_stats(cache: &DiskCache, format: OutputFormat) -> PulseResult<()> {
    let stats = cache.stats().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => println!(
            "entries={} size={} hits={} misses={} evictions={}",
            stats.entries, stats.size_bytes, stats.hits, stats.misses, stats.evictions
        ),
        OutputFormat::Table => print_stats_table(cache, &stats),
    }

    Ok(())
}

fn print_stats_table(cache: &DiskCache, stats: &CacheStats) {
    let ctx = UiContext::detect();
    ui::section(&ctx, "Artifact cache");
    ui::key_value(&ctx, "dir", &cache.dir().display().to_string());
    ui::key_value(&ctx, "entries", &stats.entries.to_string());
    ui::key_value(
        &ctx,
        "size",
        &format!(
            "{} / {}",
            format_bytes(stats.size_bytes),
            format_bytes(cache.max_bytes())
        ),
    );
    // Counters only cover this invocation
    ui::remark(
        &ctx,
        &format!(
            "hits {} / misses {} / evictions {} (this process)",
            stats.hits, stats.misses, stats.evictions
        ),
    );
}
