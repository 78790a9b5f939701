//! Terminal output helpers
//!
//! Status lines go through `cliclack` when attached to a terminal and fall
//! back to bracketed plain text otherwise, so scripted callers (shell
//! prompts, CI) get stable output.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{key_value, remark, section, step_info, step_ok, step_ok_detail, step_warn_hint};
pub use prompts::confirm;
