use anyhow::{anyhow, Result};
use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};

/// Read Chromium's stderr until it announces the DevTools websocket URL.
pub async fn extract_ws_url(child: &mut Child, wait: Duration) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process has no stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut seen = Vec::new();

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(url) = parse_ws_line(&line) {
                return Ok(url);
            }
            seen.push(line);
        }
        Err(anyhow!(
            "chromium exited without a devtools websocket url; stderr: {}",
            seen.iter().take(8).cloned().collect::<Vec<_>>().join(" | ")
        ))
    };

    timeout(wait, reader)
        .await
        .map_err(|_| anyhow!("no devtools websocket url within {}ms", wait.as_millis()))?
}

fn parse_ws_line(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then(|| ws.to_string())
}
