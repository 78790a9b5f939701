//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// ppulse - artifact cache and image prefetcher for prompt dashboards
///
/// Keeps collector output in a persistent TTL/LRU cache and pre-renders a
/// per-shell image so the prompt never waits on a renderer.
#[derive(Parser, Debug)]
#[command(name = "ppulse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PPULSE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read and write the artifact cache
    Cache(CacheArgs),

    /// Manage the rendered-image cache
    Image(ImageArgs),

    /// Show the image session for a shell
    Session(SessionArgs),

    /// Render the session image (cached) and write it to stdout
    Prefetch(PrefetchArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print a value; exits non-zero on a miss
    Get {
        /// Cache key
        key: String,
    },

    /// Store a value (read from stdin when VALUE is omitted)
    Put {
        /// Cache key
        key: String,

        /// Value to store
        value: Option<String>,

        /// Time to live in seconds (0 = never expires; default from config)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Remove a key
    Rm {
        /// Cache key
        key: String,
    },

    /// Check whether a fresh entry exists; exits non-zero if not
    Has {
        /// Cache key
        key: String,
    },

    /// List keys, most recently used first
    Keys {
        /// Output format
        #[arg(short, long, default_value = "plain")]
        format: OutputFormat,
    },

    /// Remove expired entries now
    Sweep,

    /// Remove every entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show cache statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for the image command
#[derive(Parser, Debug)]
pub struct ImageArgs {
    /// Subcommand for image
    #[command(subcommand)]
    pub action: ImageAction,
}

/// Image cache subcommands
#[derive(Subcommand, Debug)]
pub enum ImageAction {
    /// Show image cache statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove oldest renders until the cache fits its size limit
    Prune,

    /// Remove every rendered image
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the session command
#[derive(Parser, Debug)]
pub struct SessionArgs {
    /// Shell process to bind the session to (defaults to the parent process)
    #[arg(long)]
    pub pid: Option<u32>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the prefetch command
#[derive(Parser, Debug)]
pub struct PrefetchArgs {
    /// Width in terminal cells (default from config)
    #[arg(long)]
    pub width: Option<u32>,

    /// Height in terminal cells (default from config)
    #[arg(long)]
    pub height: Option<u32>,

    /// Terminal graphics protocol (default from config)
    #[arg(long)]
    pub protocol: Option<String>,

    /// Shell process to bind the session to (defaults to the parent process)
    #[arg(long)]
    pub pid: Option<u32>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
