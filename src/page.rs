//! Browser, context and page handles
//!
//! A thin layer over one [`WebDriverClient`]: one `Browser` owns one client
//! and therefore at most one live session.

use crate::client::WebDriverClient;
use crate::locator::Locator;
use crate::wait::WaitUntil;
use crate::{BestEffort, Cookie, DriverConfig, Result, ScriptValue, Viewport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Options for [`Browser::new_page`]
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    /// Overrides the configured viewport
    pub viewport: Option<Viewport>,
}

/// Options for [`Page::goto`]
#[derive(Debug, Clone, Default)]
pub struct GotoOptions {
    pub wait_until: WaitUntil,
}

/// Options for [`Page::screenshot`]
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    /// Also write the PNG here
    pub path: Option<PathBuf>,
}

pub struct Browser {
    client: Arc<WebDriverClient>,
}

impl Browser {
    pub fn new(config: DriverConfig) -> Result<Self> {
        Ok(Self::from_client(WebDriverClient::new(config)?))
    }

    pub fn from_client(client: WebDriverClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Arc<WebDriverClient> {
        &self.client
    }

    pub fn new_context(&self, options: PageOptions) -> BrowserContext<'_> {
        BrowserContext {
            browser: self,
            options,
        }
    }

    /// Open a session and prepare it as a page.
    ///
    /// Window sizing and helper-script injection are best-effort; only
    /// session creation can fail this call.
    pub fn new_page(&self, options: PageOptions) -> Result<Page> {
        let config = self.client.config();
        let viewport = options.viewport.unwrap_or(config.viewport);

        self.client.create_session(config.capabilities.clone())?;

        let page = Page {
            client: Arc::clone(&self.client),
        };

        // outer window height includes the browser chrome
        BestEffort::from_result(
            "set window size",
            self.client.set_window_size(
                viewport.width,
                viewport.height + config.window_chrome_height,
            ),
        );
        page.inject_init_script();

        Ok(page)
    }

    /// Delete the session, if any.
    pub fn close(&self) -> BestEffort {
        self.client.delete_session()
    }
}

/// Page options shared by every page opened through it
pub struct BrowserContext<'a> {
    browser: &'a Browser,
    options: PageOptions,
}

impl BrowserContext<'_> {
    pub fn new_page(&self) -> Result<Page> {
        self.browser.new_page(self.options.clone())
    }

    pub fn cookies(&self) -> Result<Vec<Cookie>> {
        self.browser.client.get_all_cookies()
    }
}

#[derive(Clone)]
pub struct Page {
    client: Arc<WebDriverClient>,
}

impl Page {
    fn inject_init_script(&self) -> BestEffort {
        match &self.client.config().init_script {
            Some(script) => BestEffort::from_result(
                "inject init script",
                self.client.execute_script(script, &[]),
            ),
            None => BestEffort::Completed,
        }
    }

    pub fn goto(&self, url: &str, options: &GotoOptions) -> Result<()> {
        self.client.navigate(url, options.wait_until)?;
        self.inject_init_script();
        Ok(())
    }

    pub fn url(&self) -> Result<String> {
        self.client.current_url()
    }

    pub fn title(&self) -> Result<String> {
        self.client.title()
    }

    pub fn evaluate(&self, script: &str) -> Result<ScriptValue> {
        self.client.execute_script(script, &[])
    }

    pub fn click(&self, selector: &str) -> Result<()> {
        self.locator(selector).click()
    }

    pub fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.locator(selector).fill(text)
    }

    pub fn locator(&self, selector: &str) -> Locator {
        Locator::new(Arc::clone(&self.client), selector)
    }

    /// Viewport screenshot as PNG. The bytes are returned even when also
    /// written to `options.path`.
    pub fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>> {
        let png = self.client.take_screenshot()?;
        if let Some(path) = &options.path {
            std::fs::write(path, &png)?;
            log::debug!("saved screenshot to {}", path.display());
        }
        Ok(png)
    }

    pub fn wait_for_timeout(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    pub fn close(&self) -> BestEffort {
        self.client.delete_session()
    }
}
