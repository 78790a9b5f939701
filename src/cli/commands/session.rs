//! Session command - show the image bound to a shell

use crate::cli::args::{OutputFormat, SessionArgs};
use crate::cli::commands::default_pid;
use crate::config::{Config, ConfigManager};
use crate::error::PulseResult;
use crate::session::SessionManager;
use crate::ui::{self, UiContext};

/// Execute the session command
pub async fn execute(args: SessionArgs, config: &Config) -> PulseResult<()> {
    let pid = args.pid.unwrap_or_else(default_pid);
    let manager = SessionManager::with_pid(ConfigManager::image_dir(config), pid);
    let session = manager.get_or_create().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*session)?),
        OutputFormat::Plain => println!("{}", session.image_path.display()),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::section(&ctx, &session.id);
            ui::key_value(&ctx, "image", &session.image_path.display().to_string());
            ui::key_value(&ctx, "hash", &session.content_hash);
            ui::key_value(
                &ctx,
                "created",
                &session.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
        }
    }

    Ok(())
}
