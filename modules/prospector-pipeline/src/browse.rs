//! The seam between extraction logic and a live browser page.
//!
//! [`DetailPage`] is the only surface the extractor sees, so extraction
//! unit-tests run against a canned fake with no browser. [`CdpPage`] is the
//! real implementation over a chromiumoxide page; every read is bounded by
//! a short per-field timeout, and the target DOM is treated as unstable —
//! callers degrade a failed read to an absent field.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::page::Page;

/// How long a single field read may block before it degrades to absent.
pub const FIELD_TIMEOUT: Duration = Duration::from_secs(4);

#[async_trait]
pub trait DetailPage: Send + Sync {
    /// Canonical URL of the listing currently shown.
    async fn current_url(&self) -> Result<String>;

    /// Text of the page's headings, in document order.
    async fn headings(&self) -> Result<Vec<String>>;

    /// Trimmed text content of the first element matching `selector`.
    async fn read_text(&self, selector: &str) -> Result<Option<String>>;

    /// Trimmed text content of up to `cap` elements matching `selector`.
    async fn read_all_text(&self, selector: &str, cap: usize) -> Result<Vec<String>>;

    /// Attribute value of the first element matching `selector`.
    async fn read_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>>;

    /// Visible body text, truncated to `max_len` characters.
    async fn body_text(&self, max_len: usize) -> Result<String>;
}

// --- chromiumoxide adapter ---

pub struct CdpPage {
    page: Page,
    field_timeout: Duration,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            field_timeout: FIELD_TIMEOUT,
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = tokio::time::timeout(self.field_timeout, self.page.evaluate(script))
            .await
            .context("Field read timed out")?
            .context("Page evaluate failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("Failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl DetailPage for CdpPage {
    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("Failed to read page URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn headings(&self) -> Result<Vec<String>> {
        self.eval(
            "(() => Array.from(document.querySelectorAll('h1, h2')) \
                .map(e => (e.textContent || '').trim()) \
                .filter(t => t.length > 0) \
                .slice(0, 12))()"
                .to_string(),
        )
        .await
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        let sel = serde_json::to_string(selector)?;
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); \
                return el ? (el.textContent || '').trim() : null; }})()"
        ))
        .await
    }

    async fn read_all_text(&self, selector: &str, cap: usize) -> Result<Vec<String>> {
        let sel = serde_json::to_string(selector)?;
        self.eval(format!(
            "(() => Array.from(document.querySelectorAll({sel})) \
                .map(e => (e.textContent || '').trim()) \
                .filter(t => t.length > 0) \
                .slice(0, {cap}))()"
        ))
        .await
    }

    async fn read_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        let sel = serde_json::to_string(selector)?;
        let attr = serde_json::to_string(attr)?;
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); \
                return el ? el.getAttribute({attr}) : null; }})()"
        ))
        .await
    }

    async fn body_text(&self, max_len: usize) -> Result<String> {
        self.eval(format!(
            "(() => (document.body ? document.body.innerText : '').slice(0, {max_len}))()"
        ))
        .await
    }
}
