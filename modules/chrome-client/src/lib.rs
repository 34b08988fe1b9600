pub mod error;

pub use chromiumoxide::page::Page;
pub use error::{ChromeError, Result};

use std::path::PathBuf;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tracing::info;

/// Fixed viewport for every page. Listing layouts shift below desktop widths.
pub const VIEWPORT: (u32, u32) = (1366, 900);

/// Desktop user agent sent with every session.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Find the Chromium binary path: env override first, then system PATH.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["chromium", "chromium-browser", "google-chrome"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
                if path.exists() {
                    return Some(path);
                }
            }
        }
    }

    None
}

/// Handle to one headless Chromium process. Shared behind an `Arc`; pages
/// are created per worker and never shared between workers.
pub struct ChromeDriver {
    browser: Browser,
}

impl ChromeDriver {
    /// Launch a headless Chromium instance and spawn its CDP event loop.
    pub async fn launch() -> Result<Self> {
        let chrome_path = find_chromium().ok_or(ChromeError::BinaryNotFound)?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--lang=en-US")
            .arg(format!("--window-size={},{}", VIEWPORT.0, VIEWPORT.1))
            .arg(format!("--user-agent={USER_AGENT}"))
            // Emulated per page as well, so the size holds even where the
            // window argument does not.
            .viewport(Viewport {
                width: VIEWPORT.0,
                height: VIEWPORT.1,
                ..Default::default()
            })
            .build()
            .map_err(ChromeError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ChromeError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!("Headless Chromium launched");
        Ok(Self { browser })
    }

    /// Open a fresh blank page with the fixed user agent applied. The
    /// viewport comes from the launch config's per-page emulation, so
    /// every page comes up identically configured.
    pub async fn new_page(&self) -> Result<Page> {
        let page = self.browser.new_page("about:blank").await?;
        page.set_user_agent(USER_AGENT).await?;
        Ok(page)
    }

    /// Close the browser and reap the Chromium process.
    pub async fn shutdown(mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        Ok(())
    }
}
