//! Image renderer abstraction
//!
//! The prefetcher only needs "turn this image into terminal bytes at this
//! size". The production backend shells out to an external program; tests
//! plug in fakes.

use crate::config::RenderConfig;
use crate::error::{PulseError, PulseResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Renders an image file into a terminal payload
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `path` at `width` x `height` terminal cells
    async fn render_file(&self, path: &Path, width: u32, height: u32) -> PulseResult<Vec<u8>>;
}

/// Renderer backed by an external program such as `chafa`
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    protocol: String,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>, protocol: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            protocol: protocol.into(),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(&config.program, config.args.clone(), &config.protocol)
    }

    /// Override the protocol substituted into `{protocol}`
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Substitute placeholders into the argument template
    fn expand_args(&self, path: &Path, width: u32, height: u32) -> Vec<String> {
        let path = path.to_string_lossy();
        let width = width.to_string();
        let height = height.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{path}", &path)
                    .replace("{width}", &width)
                    .replace("{height}", &height)
                    .replace("{protocol}", &self.protocol)
            })
            .collect()
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render_file(&self, path: &Path, width: u32, height: u32) -> PulseResult<Vec<u8>> {
        let args = self.expand_args(path, width, height);
        debug!("Executing: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PulseError::command_failed(&self.program, e))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("{} exited with {}", self.program, output.status),
                msg => msg.to_string(),
            };
            Err(PulseError::render_failed(path, reason))
        }
    }
}
