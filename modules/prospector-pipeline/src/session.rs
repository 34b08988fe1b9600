use std::sync::Arc;

use anyhow::{Context, Result};
use chrome_client::{ChromeDriver, Page};
use tracing::{debug, warn};

/// Owns one browser page per worker and recreates it transparently when it
/// dies. Callers never receive a handle known to be dead.
pub struct SessionManager {
    driver: Arc<ChromeDriver>,
    page: Option<Page>,
}

impl SessionManager {
    pub fn new(driver: Arc<ChromeDriver>) -> Self {
        Self { driver, page: None }
    }

    /// Return a live page handle. The existing handle is probed with a
    /// trivial evaluate first; on failure it is discarded (close errors
    /// swallowed) and a fresh page is opened. Idempotent from the caller's
    /// perspective.
    pub async fn ensure_page(&mut self) -> Result<Page> {
        if let Some(page) = &self.page {
            match page.evaluate("1 + 1").await {
                Ok(_) => return Ok(page.clone()),
                Err(e) => {
                    warn!(error = %e, "Browser page is dead, recreating");
                    let _ = page.clone().close().await;
                    self.page = None;
                }
            }
        }

        let page = self
            .driver
            .new_page()
            .await
            .context("Failed to open a fresh browser page")?;
        debug!("Opened fresh browser page");
        self.page = Some(page.clone());
        Ok(page)
    }

    /// Drop the current page, best-effort.
    pub async fn discard(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
    }
}
