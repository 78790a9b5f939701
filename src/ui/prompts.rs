//! Confirmation prompts

use super::context::UiContext;
use crate::error::{PulseError, PulseResult};

/// Ask a yes/no question
///
/// Returns `true` under `--yes`, and `default` when nobody can answer.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> PulseResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| PulseError::Internal(format!("prompt task failed: {e}")))?
    .map_err(|e| PulseError::io("reading confirmation", e))
}
