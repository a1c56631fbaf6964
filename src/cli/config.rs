use anyhow::Result;

use super::context::CliContext;

pub fn cmd_config(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    ctx.output().print(config, || {
        let source = ctx
            .config_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "defaults and environment".to_string());
        format!(
            "Download configuration ({source}):\n  downloads_folder: {}\n  reports_folder: {}\n  polling_interval_ms: {}\n  timeout_ms: {}\n  stall_timeout_ms: {}\n  download_behavior: {:?}",
            config
                .downloads_folder
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
            config.reports_folder.display(),
            config.polling_interval_ms,
            config.timeout_ms,
            config.stall_timeout_ms,
            config.download_behavior,
        )
    })
}
