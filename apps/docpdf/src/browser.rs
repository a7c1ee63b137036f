//! Headless browser lifecycle and page pool
//!
//! One browser process serves every render; pages are pooled and reused
//! between navigations because page creation is the expensive part of a
//! print. The pool grows up to the render parallelism and is never
//! explicitly bounded.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct PagePool {
    browser: Browser,
    handler: JoinHandle<()>,
    idle: Mutex<Vec<Page>>,
}

impl PagePool {
    /// Launch a headless browser and an event-handler task for it.
    pub async fn launch() -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if let Some(chrome) = find_chrome_for_testing() {
            debug!("Using Chrome for Testing: {}", chrome.display());
            builder = builder.chrome_executable(chrome);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!("Browser launched");
        Ok(PagePool {
            browser,
            handler: handle,
            idle: Mutex::new(Vec::new()),
        })
    }

    /// Take an idle page or open a new one.
    pub async fn acquire(&self) -> Result<Page> {
        if let Some(page) = self.idle.lock().unwrap().pop() {
            return Ok(page);
        }
        self.browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser page")
    }

    /// Return a page for reuse.
    pub fn release(&self, page: Page) {
        self.idle.lock().unwrap().push(page);
    }

    pub async fn close(mut self) -> Result<()> {
        self.idle.lock().unwrap().clear();
        self.browser.close().await.context("Failed to close browser")?;
        self.handler.abort();
        Ok(())
    }
}

/// Find Chrome for Testing installed by Puppeteer, preferring the newest
/// version. Falls back to chromiumoxide's own executable detection when
/// absent.
pub fn find_chrome_for_testing() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let cache = PathBuf::from(home).join(".cache/puppeteer/chrome");
    let mut versions: Vec<PathBuf> = std::fs::read_dir(&cache)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    versions.sort();
    for version in versions.into_iter().rev() {
        for candidate in [
            "chrome-linux64/chrome",
            "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        ] {
            let path = version.join(candidate);
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}
