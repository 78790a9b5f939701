//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod config;
pub mod image;
pub mod prefetch;
pub mod session;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use config::execute as config;
pub use image::execute as image;
pub use prefetch::execute as prefetch;
pub use session::execute as session;

/// Shell PID a session binds to when `--pid` is not given
pub(crate) fn default_pid() -> u32 {
    #[cfg(unix)]
    {
        std::os::unix::process::parent_id()
    }
    #[cfg(not(unix))]
    {
        std::process::id()
    }
}
