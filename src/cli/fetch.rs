use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cdp_adapter::{
    BrowserEngine, CdpConfig, ChromiumTransport, DevTools, LazyElementSnapshot, Navigate,
    PageEnable, SelectorElement,
};
use cdp_downloads::{
    ClickAction, DownloadConfig, DownloadSession, FileFilter, FileFilterExt, FileFilters,
    FsRelocator, StaticDownloadsFolder,
};
use serde::Serialize;
use tracing::info;

use super::context::CliContext;
use super::env::FetchArgs;

#[derive(Debug, Serialize)]
struct FetchReport {
    file: PathBuf,
    url: String,
    selector: String,
    filter: String,
}

pub async fn cmd_fetch(args: FetchArgs, ctx: &CliContext) -> Result<()> {
    let filter = build_filter(&args)?;
    let mut config = ctx.config().clone();
    apply_overrides(&mut config, &args);

    // Held until the download has been moved out of it.
    let scratch = if config.downloads_folder.is_none() {
        let dir = tempfile::Builder::new()
            .prefix("cdp-download-")
            .tempdir()
            .context("Failed to create a temporary downloads folder")?;
        info!(folder = %dir.path().display(), "no downloads folder configured, using a temporary one");
        config.downloads_folder = Some(dir.path().to_path_buf());
        Some(dir)
    } else {
        None
    };

    let devtools = Arc::new(DevTools::new(
        Arc::new(ChromiumTransport::new(browser_config(&args))),
        BrowserEngine::Chromium,
    ));
    devtools
        .open_session()
        .await
        .context("Failed to open a DevTools session")?;
    devtools.send(&PageEnable::default()).await?;
    devtools
        .send(&Navigate {
            url: args.url.clone(),
        })
        .await
        .with_context(|| format!("Failed to open {}", args.url))?;

    let element = LazyElementSnapshot::wrap(
        SelectorElement::css(&args.selector).with_wait(Duration::from_millis(args.element_wait_ms)),
    );
    let session = DownloadSession::new(
        devtools.clone(),
        Arc::new(StaticDownloadsFolder::from_path(config.downloads_folder.clone())),
        Arc::new(FsRelocator::new(&config.reports_folder)),
        config.clone(),
    );

    let result = session
        .download(
            &element,
            config.timeout(),
            config.stall_timeout(),
            filter.as_ref(),
            &ClickAction,
        )
        .await;
    devtools.shutdown();
    drop(scratch);
    let file = result?;

    let report = FetchReport {
        file,
        url: args.url,
        selector: args.selector,
        filter: filter.description().trim().to_string(),
    };
    ctx.output()
        .print(&report, || report.file.display().to_string())
}

fn apply_overrides(config: &mut DownloadConfig, args: &FetchArgs) {
    if let Some(timeout) = args.timeout_ms {
        config.timeout_ms = timeout;
    }
    if let Some(stall) = args.stall_timeout_ms {
        config.stall_timeout_ms = stall;
    }
    if let Some(folder) = &args.downloads_folder {
        config.downloads_folder = Some(folder.clone());
    }
    if let Some(folder) = &args.reports_folder {
        config.reports_folder = folder.clone();
    }
}

fn browser_config(args: &FetchArgs) -> CdpConfig {
    let mut cfg = CdpConfig::default();
    if let Some(chrome) = &args.chrome {
        cfg.executable = chrome.clone();
    }
    if args.ws_url.is_some() {
        cfg.websocket_url = args.ws_url.clone();
    }
    if args.headful {
        cfg.headless = false;
    }
    cfg
}

/// Combine every filter flag given; no flags accepts any file.
pub fn build_filter(args: &FetchArgs) -> Result<Box<dyn FileFilter>> {
    let mut parts: Vec<Box<dyn FileFilter>> = Vec::new();
    if let Some(name) = &args.name {
        parts.push(Box::new(FileFilters::with_name(name.clone())));
    }
    if let Some(extension) = &args.extension {
        parts.push(Box::new(FileFilters::with_extension(extension.clone())));
    }
    if let Some(pattern) = &args.matching {
        let filter = FileFilters::with_name_matching(pattern)
            .with_context(|| format!("Invalid --matching pattern '{pattern}'"))?;
        parts.push(Box::new(filter));
    }
    if let Some(part) = &args.containing {
        parts.push(Box::new(FileFilters::with_name_containing(part.clone())));
    }

    Ok(parts
        .into_iter()
        .reduce(|acc, next| -> Box<dyn FileFilter> { Box::new(acc.and(next)) })
        .unwrap_or_else(|| Box::new(FileFilters::none())))
}
