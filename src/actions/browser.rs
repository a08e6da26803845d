//! Page opening through a CDP-driven Chrome/Chromium
//!
//! Each request launches a fresh browser, opens one page, keeps it alive for
//! the configured hold time and then shuts the browser down.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;

use crate::config::ActionsConfig;
use crate::{Error, Result};

/// Opens a URL somewhere the user can hear or see it
#[async_trait]
pub trait PageOpener: Send + Sync {
    /// Open `url`, returning once the page has been held and released
    ///
    /// # Errors
    ///
    /// Returns error if the page could not be opened
    async fn open(&self, url: &str) -> Result<()>;
}

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Path to Chrome/Chromium executable
    pub chrome_path: Option<PathBuf>,
    /// Run in headless mode
    pub headless: bool,
    /// How long the page stays open
    pub hold: Duration,
    /// Window width
    pub width: u32,
    /// Window height
    pub height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            hold: Duration::from_secs(5),
            width: 1280,
            height: 720,
        }
    }
}

impl From<&ActionsConfig> for BrowserSettings {
    fn from(config: &ActionsConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            headless: config.headless,
            hold: config.browser_hold,
            ..Self::default()
        }
    }
}

/// [`PageOpener`] that drives a short-lived Chromium instance
pub struct ChromiumOpener {
    settings: BrowserSettings,
}

impl ChromiumOpener {
    /// Create an opener with the given launch settings
    #[must_use]
    pub const fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.settings.width, self.settings.height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--autoplay-policy=no-user-gesture-required");

        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(ref chrome_path) = self.settings.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }

        builder
            .build()
            .map_err(|e| Error::Browser(format!("config error: {e}")))
    }
}

#[async_trait]
impl PageOpener for ChromiumOpener {
    async fn open(&self, url: &str) -> Result<()> {
        let config = self.browser_config()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Browser(format!("launch failed: {e}")))?;

        let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let opened = async {
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| Error::Browser(format!("new page failed: {e}")))?;

            tracing::info!(url, hold_secs = self.settings.hold.as_secs(), "page opened");
            tokio::time::sleep(self.settings.hold).await;

            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "page close failed");
            }
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "browser close failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "browser wait failed");
        }
        events.abort();

        tracing::debug!("browser closed");
        opened
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ActionsConfig {
            browser_hold: Duration::from_secs(9),
            headless: false,
            ..ActionsConfig::default()
        };

        let settings = BrowserSettings::from(&config);
        assert_eq!(settings.hold, Duration::from_secs(9));
        assert!(!settings.headless);
        assert!(settings.chrome_path.is_none());
    }
}
