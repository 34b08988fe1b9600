//! Map-search listing source over a live browser tab.
//!
//! One [`MapSession`] per worker. Each search navigates the worker's tab to
//! the map search results, scrolls the results feed until enough place
//! links are loaded, and harvests their URLs. Opening a listing navigates
//! the same tab and hands the rendered page to the extractor.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use chrome_client::{ChromeDriver, Page};
use prospector_common::{ScrapedBusiness, SearchTerm};

use crate::browse::CdpPage;
use crate::extractor;
use crate::session::SessionManager;
use crate::worker::ListingSource;

const NAV_TIMEOUT: Duration = Duration::from_secs(30);
/// Results feed polling: how often and how long to wait for place links.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLLS: u32 = 20;
/// Feed scrolling: rounds of scroll-to-bottom with a settle pause between.
const SCROLL_ROUNDS: u32 = 8;
const SCROLL_SETTLE: Duration = Duration::from_millis(700);
/// Detail pages render their header asynchronously after navigation.
const DETAIL_SETTLE: Duration = Duration::from_millis(1200);

const HARVEST_SCRIPT: &str = "(() => { \
    const seen = new Set(); const out = []; \
    for (const a of document.querySelectorAll(\"a[href*='/maps/place/']\")) { \
        const href = (a.href || '').split('?')[0]; \
        if (href && !seen.has(href)) { seen.add(href); out.push(href); } \
    } \
    return out; })()";

const SCROLL_SCRIPT: &str = "(() => { \
    const feed = document.querySelector(\"[role='feed']\"); \
    if (feed) { feed.scrollTop = feed.scrollHeight; return true; } \
    window.scrollTo(0, document.body.scrollHeight); return false; })()";

pub struct MapSession {
    session: SessionManager,
    base_url: String,
}

impl MapSession {
    pub fn new(driver: Arc<ChromeDriver>) -> Self {
        Self {
            session: SessionManager::new(driver),
            base_url: "https://www.google.com/maps/search".to_string(),
        }
    }

    fn search_url(&self, term: &SearchTerm) -> String {
        let raw_query = term.query();
        let query = utf8_percent_encode(&raw_query, NON_ALPHANUMERIC);
        format!("{}/{query}?hl=en", self.base_url)
    }

    async fn goto(&mut self, url: &str) -> Result<Page> {
        let page = self.session.ensure_page().await?;
        tokio::time::timeout(NAV_TIMEOUT, page.goto(url))
            .await
            .map_err(|_| anyhow!("Navigation to {url} timed out"))?
            .with_context(|| format!("Failed to navigate to {url}"))?;
        let _ = tokio::time::timeout(NAV_TIMEOUT, page.wait_for_navigation()).await;
        Ok(page)
    }

    async fn eval<T: serde::de::DeserializeOwned>(page: &Page, script: &str) -> Result<T> {
        let result = page
            .evaluate(script)
            .await
            .context("Page evaluate failed")?;
        result
            .into_value()
            .map_err(|e| anyhow!("Failed to convert JS result: {e:?}"))
    }

    async fn harvest(page: &Page) -> Result<Vec<String>> {
        Self::eval(page, HARVEST_SCRIPT).await
    }

    /// Poll until at least one place link is present, or give up.
    async fn wait_for_results(page: &Page) -> Result<()> {
        for _ in 0..MAX_POLLS {
            let count: u32 = Self::eval(
                page,
                "(() => document.querySelectorAll(\"a[href*='/maps/place/']\").length)()",
            )
            .await?;
            if count > 0 {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(anyhow!("No results appeared in the feed"))
    }
}

#[async_trait]
impl ListingSource for MapSession {
    async fn listings(&mut self, term: &SearchTerm, cap: usize) -> Result<Vec<String>> {
        let url = self.search_url(term);
        let page = self.goto(&url).await?;

        // A single-match query redirects straight to the place page.
        if let Ok(Some(current)) = page.url().await {
            let current = current.to_string();
            if current.contains("/maps/place/") {
                debug!(url = %current, "search redirected to a single place");
                return Ok(vec![current]);
            }
        }

        Self::wait_for_results(&page).await?;

        let mut urls = Vec::new();
        for _ in 0..SCROLL_ROUNDS {
            urls = Self::harvest(&page).await?;
            if urls.len() >= cap {
                break;
            }
            let scrolled: bool = Self::eval(&page, SCROLL_SCRIPT).await?;
            if !scrolled {
                // No feed to scroll: whatever is on screen is all we get.
                break;
            }
            tokio::time::sleep(SCROLL_SETTLE).await;
        }

        urls.truncate(cap);
        Ok(urls)
    }

    async fn open(&mut self, url: &str) -> Result<Option<ScrapedBusiness>> {
        let page = match self.goto(url).await {
            Ok(page) => page,
            Err(err) => {
                // The tab may be wedged; drop it so the next call starts fresh.
                warn!(url = %url, error = %err, "listing navigation failed");
                self.session.discard().await;
                return Err(err);
            }
        };
        tokio::time::sleep(DETAIL_SETTLE).await;

        let detail = CdpPage::new(page);
        Ok(extractor::extract(&detail).await)
    }
}
