//! One run of the watcher: page load through notify and record.

use anyhow::{Context, Result, anyhow};
use futures::future;
use robotstxt::DefaultMatcher;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::browser;
use crate::config::Config;
use crate::extract::{self, Listing, ProductLink};
use crate::notify::Notify;
use crate::store::ListingStore;

/// Outcome of a completed run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub candidates: usize,
    pub unseen: usize,
    pub notified: Option<Listing>,
}

/// Execute one scheduled run against the live shop page.
pub async fn run_once<S: ListingStore, N: Notify>(
    cfg: &Config,
    store: &S,
    notifier: &N,
) -> Result<RunReport> {
    check_robots(&cfg.shop_url).await?;

    let html = browser::fetch_rendered(cfg).await?;
    let candidates = extract::extract_listings(&html, &cfg.shop_url);
    info!(count = candidates.len(), "listings extracted");

    process_listings(candidates, store, notifier).await
}

/// The earlier, log-only variant: collect product links and report them.
pub async fn scan_links(cfg: &Config) -> Result<Vec<ProductLink>> {
    check_robots(&cfg.shop_url).await?;

    let html = browser::fetch_rendered(cfg).await?;
    let links = extract::extract_product_links(&html, &cfg.shop_url);
    for link in &links {
        info!(handle = %link.handle, url = %link.url, "product link");
    }
    Ok(links)
}

/// Diff candidates against the store, then notify and record.
pub async fn process_listings<S: ListingStore, N: Notify>(
    candidates: Vec<Listing>,
    store: &S,
    notifier: &N,
) -> Result<RunReport> {
    let total = candidates.len();
    let unseen = filter_unseen(store, candidates).await?;
    info!(candidates = total, unseen = unseen.len(), "new paintings found");

    let Some(first) = unseen.first() else {
        return Ok(RunReport {
            candidates: total,
            unseen: 0,
            notified: None,
        });
    };

    // One notification per run, for the first unseen listing only. The rest
    // stay unrecorded and come back as new on the next run.
    notifier.notify(first).await?;
    store
        .put(first)
        .await
        .context("failed to record notified listing")?;
    info!(handle = %first.handle, "listing recorded");

    Ok(RunReport {
        candidates: total,
        unseen: unseen.len(),
        notified: Some(first.clone()),
    })
}

/// Keep only candidates whose handle has never been recorded.
///
/// Lookups are independent and issued together; the surviving candidates
/// keep their page order.
async fn filter_unseen<S: ListingStore>(
    store: &S,
    candidates: Vec<Listing>,
) -> Result<Vec<Listing>> {
    let lookups =
        future::try_join_all(candidates.iter().map(|c| store.get(&c.handle))).await?;
    Ok(candidates
        .into_iter()
        .zip(lookups)
        .filter_map(|(candidate, stored)| stored.is_none().then_some(candidate))
        .collect())
}

async fn check_robots(shop_url: &Url) -> Result<()> {
    let host = shop_url
        .host_str()
        .ok_or_else(|| anyhow!("shop url has no host"))?;
    let robots_url = format!("{}://{}/robots.txt", shop_url.scheme(), host);
    let robots_txt = match reqwest::get(&robots_url).await {
        Ok(rsp) => rsp.text().await.unwrap_or_default(),
        Err(_) => String::new(),
    };
    let mut matcher = DefaultMatcher::default();
    if !matcher.one_agent_allowed_by_robots(&robots_txt, "Mozilla", shop_url.as_str()) {
        return Err(anyhow!("robots.txt disallows scraping {shop_url}"));
    }
    Ok(())
}
