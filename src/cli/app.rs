use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::config::cmd_config;
use super::context::CliContext;
use super::env::{CliArgs, Commands};
use super::fetch::cmd_fetch;
use super::runtime::{init_logging, load_config, LoadedConfig};
use crate::metrics;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;
    let _metrics_server = metrics::spawn_metrics_server(cli.metrics_port);

    info!("Starting cdp-download v{}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig { config, path } = load_config(cli.config.as_ref())?;
    let ctx = CliContext::new(config, path, cli.output);

    let result = match cli.command {
        Commands::Fetch(args) => cmd_fetch(args, &ctx).await,
        Commands::Config => cmd_config(&ctx),
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
