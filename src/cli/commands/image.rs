//! Image command - manage the rendered-image cache

use crate::cache::format_bytes;
use crate::cli::args::{ImageAction, ImageArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::PulseResult;
use crate::image::ImageCache;
use crate::ui::{self, UiContext};

const MB: u64 = 1024 * 1024;

/// Execute the image command
pub async fn execute(args: ImageArgs, config: &Config) -> PulseResult<()> {
    let cache = open(config).await?;

    match args.action {
        ImageAction::Stats { format } => show_stats(&cache, format).await,
        ImageAction::Prune => prune(&cache).await,
        ImageAction::Clear { yes } => clear(&cache, yes).await,
    }
}

/// Open the rendered-image cache described by the config
pub async fn open(config: &Config) -> PulseResult<ImageCache> {
    let max_bytes = config.images.max_size_mb.saturating_mul(MB);
    ImageCache::open(ConfigManager::image_cache_dir(config), max_bytes).await
}

async fn show_stats(cache: &ImageCache, format: OutputFormat) -> PulseResult<()> {
    let stats = cache.stats().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => println!(
            "entries={} size={} max={}",
            stats.entries, stats.size_bytes, stats.max_bytes
        ),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::section(&ctx, "Image cache");
            ui::key_value(&ctx, "dir", &cache.root().display().to_string());
            ui::key_value(&ctx, "renders", &stats.entries.to_string());
            ui::key_value(
                &ctx,
                "size",
                &format!(
                    "{} / {}",
                    format_bytes(stats.size_bytes),
                    format_bytes(stats.max_bytes)
                ),
            );
        }
    }

    Ok(())
}

async fn prune(cache: &ImageCache) -> PulseResult<()> {
    let ctx = UiContext::detect();
    let report = cache.prune().await?;

    if report.removed == 0 {
        ui::step_info(
            &ctx,
            &format!(
                "Nothing to prune ({} in use)",
                format_bytes(report.remaining_bytes)
            ),
        );
    } else {
        ui::step_ok_detail(
            &ctx,
            &format!("Pruned {} render(s)", report.removed),
            &format!(
                "freed {}, {} remaining",
                format_bytes(report.freed_bytes),
                format_bytes(report.remaining_bytes)
            ),
        );
    }
    Ok(())
}

async fn clear(cache: &ImageCache, yes: bool) -> PulseResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let stats = cache.stats().await;

    if stats.entries == 0 {
        ui::step_info(&ctx, "Image cache is already empty");
        return Ok(());
    }

    let message = format!(
        "Remove {} rendered image(s) ({})?",
        stats.entries,
        format_bytes(stats.size_bytes)
    );
    if !ui::confirm(&ctx, &message, false).await? {
        ui::step_warn_hint(&ctx, "Image cache not cleared", "Use --yes to skip the prompt");
        return Ok(());
    }

    let removed = cache.clear().await?;
    ui::step_ok(&ctx, &format!("Removed {removed} rendered image(s)"));
    Ok(())
}
