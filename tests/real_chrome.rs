use std::sync::Arc;
use std::time::Duration;

use mapsync_cli::config::BrowserSettings;
use mapsync_cli::CdpInterface;
use serial_test::serial;
use sync_engine::wait::{wait_text_contains, wait_visible};
use sync_engine::{ElementPort, InputPort, Locator, NavigationPort, Session, SyncPolicy};
use tempfile::{Builder, TempDir};

struct ProfileGuard {
    temp: Option<TempDir>,
    previous: Option<String>,
}

impl ProfileGuard {
    fn new() -> Self {
        match std::env::var("MAPSYNC_CHROME_PROFILE") {
            Ok(existing) => ProfileGuard {
                temp: None,
                previous: Some(existing),
            },
            Err(_) => {
                let dir = Builder::new()
                    .prefix("mapsync-profile-")
                    .tempdir()
                    .expect("create temporary chrome profile directory");
                std::env::set_var("MAPSYNC_CHROME_PROFILE", dir.path());
                ProfileGuard {
                    temp: Some(dir),
                    previous: None,
                }
            }
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        if self.temp.take().is_some() {
            std::env::remove_var("MAPSYNC_CHROME_PROFILE");
        } else if let Some(value) = &self.previous {
            std::env::set_var("MAPSYNC_CHROME_PROFILE", value);
        }
    }
}

fn is_real_chrome_enabled() -> bool {
    matches!(
        std::env::var("MAPSYNC_USE_REAL_CHROME")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

const PAGE: &str = "data:text/html,<button id='go' onclick=\"this.hidden=true;document.getElementById('out').textContent='clicked 1 time'\">Go</button><p id='out'></p>";

#[tokio::test]
#[serial]
async fn real_chrome_click_and_readback_smoke() -> Result<(), Box<dyn std::error::Error>> {
    if !is_real_chrome_enabled() {
        println!("Skipping real-chrome smoke test (set MAPSYNC_USE_REAL_CHROME=1 to enable)");
        return Ok(());
    }

    let _profile = ProfileGuard::new();
    let interface = tokio::time::timeout(
        Duration::from_secs(60),
        CdpInterface::connect(BrowserSettings::default().cdp_config()),
    )
    .await??;

    interface.goto(PAGE).await?;
    let button = Locator::css("#go");
    assert!(interface.is_visible(&button).await?);
    assert_eq!(interface.count(&Locator::css("p")).await?, 1);

    let session = Session::new(Arc::new(interface.clone()), SyncPolicy::default());
    interface.click(&button).await?;
    let text = wait_text_contains(
        &session,
        &Locator::css("#out"),
        "clicked",
        Duration::from_secs(5),
    )
    .await?;
    assert_eq!(sync_engine::parse_count(&text), Some(1));
    assert!(!interface.is_visible(&button).await?);
    assert!(wait_visible(&session, &button, Duration::from_millis(300)).await.is_err());
    assert!(interface.current_url().await?.starts_with("data:text/html"));

    interface.shutdown().await;
    Ok(())
}
