use anyhow::{anyhow, Result};
use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};

const STDERR_PREVIEW_LINES: usize = 8;

/// Pulls the browser DevTools endpoint out of one line of Chromium stderr.
pub fn parse_ws_line(line: &str) -> Option<&str> {
    let (_, tail) = line.rsplit_once("listening on ")?;
    let ws = tail.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then_some(ws)
}

/// Waits for Chromium to announce its DevTools websocket on stderr.
pub async fn extract_ws_url(child: &mut Child) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process missing stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::with_capacity(STDERR_PREVIEW_LINES);

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(ws) = parse_ws_line(&line) {
                return Ok(ws.to_string());
            }
            if preview.len() < STDERR_PREVIEW_LINES {
                preview.push(line);
            }
        }
        Err(anyhow!(
            "chromium exited before exposing a devtools url; stderr: {}",
            preview.join(" | ")
        ))
    };

    timeout(Duration::from_secs(20), reader)
        .await
        .map_err(|_| anyhow!("timed out waiting for chromium devtools url"))?
}

#[cfg(test)]
mod tests {
    use super::parse_ws_line;

    #[test]
    fn finds_browser_endpoint() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-123 ";
        assert_eq!(
            parse_ws_line(line),
            Some("ws://127.0.0.1:9222/devtools/browser/abc-123")
        );
    }

    #[test]
    fn ignores_unrelated_output() {
        assert_eq!(parse_ws_line("[0101/000000.000:WARNING] gpu init"), None);
        assert_eq!(parse_ws_line("listening on http://localhost:3000"), None);
    }
}
