use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::output::OutputFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path (TOML, JSON or YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format
    #[arg(short, long, default_value = "human", global = true)]
    pub output: OutputFormat,

    /// Metrics server port (0 disables it)
    #[arg(long, default_value_t = 0, global = true)]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a page, click an element and wait for the file it downloads
    Fetch(FetchArgs),

    /// Show the effective download configuration
    Config,
}

#[derive(Args, Clone, Debug)]
pub struct FetchArgs {
    /// Page to open
    #[arg(long)]
    pub url: String,

    /// CSS selector of the element to click
    #[arg(long)]
    pub selector: String,

    /// Expected file name
    #[arg(long)]
    pub name: Option<String>,

    /// Expected file extension
    #[arg(long)]
    pub extension: Option<String>,

    /// Regular expression the file name must match
    #[arg(long, value_name = "REGEX")]
    pub matching: Option<String>,

    /// Substring the file name must contain
    #[arg(long)]
    pub containing: Option<String>,

    /// Overall timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Fail when no download progresses for this many milliseconds
    #[arg(long)]
    pub stall_timeout_ms: Option<u64>,

    /// How long to wait for the element to appear, in milliseconds
    #[arg(long, default_value_t = 4_000)]
    pub element_wait_ms: u64,

    /// Folder the browser downloads into (defaults to a temporary folder)
    #[arg(long, value_name = "DIR")]
    pub downloads_folder: Option<PathBuf>,

    /// Folder finished downloads are moved into
    #[arg(long, value_name = "DIR")]
    pub reports_folder: Option<PathBuf>,

    /// Connect to a running browser instead of launching one
    #[arg(long, value_name = "WS_URL")]
    pub ws_url: Option<String>,

    /// Chrome/Chromium executable to launch
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}
