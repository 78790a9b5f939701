//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::PulseResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> PulseResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> PulseResult<()> {
    println!("{}", toml::to_string_pretty(config)?);

    // Resolved directories after defaults are applied
    let ctx = UiContext::non_interactive();
    ui::remark(
        &ctx,
        &format!("# cache dir: {}", ConfigManager::kv_dir(config).display()),
    );
    ui::remark(
        &ctx,
        &format!("# image dir: {}", ConfigManager::image_dir(config).display()),
    );
    ui::remark(
        &ctx,
        &format!(
            "# image cache dir: {}",
            ConfigManager::image_cache_dir(config).display()
        ),
    );
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> PulseResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());

    Ok(())
}
