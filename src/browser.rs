//! Headless-browser collaborator.
//!
//! The shop page is client-side rendered, so a plain GET returns an empty
//! shell. We drive a Chromium instance over CDP instead: navigate, wait for
//! the app root to produce children, and hand the rendered document back as
//! a string for the extractor.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::debug;

use crate::config::Config;

const RENDER_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Fetch the fully rendered shop page.
///
/// Connects to the remote DevTools endpoint when one is configured,
/// otherwise launches a local headless Chromium for the duration of the run.
pub async fn fetch_rendered(cfg: &Config) -> Result<String> {
    let (mut browser, mut handler) = match &cfg.browser_ws {
        Some(ws) => Browser::connect(ws.as_str())
            .await
            .context("failed to connect to remote browser")?,
        None => {
            let config = BrowserConfig::builder()
                .build()
                .map_err(|e| anyhow!("browser config: {e}"))?;
            Browser::launch(config)
                .await
                .context("failed to launch browser")?
        }
    };

    // CDP messages keep flowing for as long as the session is open.
    let event_loop = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let result = render_page(&browser, cfg).await;

    let _ = browser.close().await;
    let _ = browser.wait().await;
    event_loop.abort();

    result
}

async fn render_page(browser: &Browser, cfg: &Config) -> Result<String> {
    let page = browser
        .new_page(cfg.shop_url.as_str())
        .await
        .context("failed to open shop page")?;

    wait_for_selector(&page, &cfg.wait_selector, RENDER_TIMEOUT).await?;

    let html = page.content().await.context("failed to read page content")?;
    debug!(bytes = html.len(), "rendered page captured");
    Ok(html)
}

/// Poll until the selector matches; CDP has no ready-made wait primitive.
async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for selector {selector:?}");
        }
        sleep(POLL_INTERVAL).await;
    }
}
