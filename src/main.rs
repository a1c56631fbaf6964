use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cdp_download_cli::cli::app::run().await
}
