//! RFox WebDriver core
//!
//! A blocking client for the W3C WebDriver wire protocol with the pieces
//! browser tests actually need on top of it: a selector micro-language with
//! script-generated lookups, condition polling, and screenshot cropping and
//! comparison.
//!
//! # Features
//!
//! - **Protocol client**: one session per [`WebDriverClient`], typed commands,
//!   distinct errors per failing stage
//! - **Selectors**: `text=`, `role=`, `data-testid=` and friends resolved via
//!   generated scripts when the protocol has no native strategy
//! - **Waits**: bounded 100ms polling for readiness and element state
//! - **Images**: viewport-cropped screenshots, similarity score, pixel diff
//!   count, and visual diff images
//! - **Async facade** (`async` feature): worker-thread bridge for async hosts
//!
//! # Example
//!
//! ```no_run
//! use rfdriver::{Browser, DriverConfig, GotoOptions, PageOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = Browser::new(DriverConfig::default())?;
//! let page = browser.new_page(PageOptions::default())?;
//! page.goto("https://example.com", &GotoOptions::default())?;
//! page.locator("text=More information...").click()?;
//! println!("Title: {}", page.title()?);
//! page.close();
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod error;
pub use error::{BestEffort, Error, ErrorKind, Result};

pub mod value;
pub use value::{ElementRef, ScriptValue};

pub mod transport;
pub use transport::{HttpTransport, Method, Transport, WireResponse};

pub mod selectors;
pub use selectors::{is_regex, parse_regex, parse_selector, ParsedSelector, Strategy};

pub mod wait;
pub use wait::{ElementState, Poller, WaitUntil};

pub mod client;
pub use client::{Session, WebDriverClient};

pub mod screenshot;
pub use screenshot::ViewportMetrics;

pub mod image_diff;
pub use image_diff::{compare_images, create_diff_image, pixel_difference_count};

pub mod locator;
pub use locator::{Locator, TypeOptions};

pub mod page;
pub use page::{Browser, BrowserContext, GotoOptions, Page, PageOptions, ScreenshotOptions};

// External driver daemon supervision (used by hosts, never by the client)
pub mod daemon;

// Async-friendly facade (worker-thread backed)
#[cfg(feature = "async")]
pub mod async_api;

#[cfg(feature = "async")]
pub use async_api::AsyncClient;

#[cfg(test)]
pub(crate) mod testing;

/// Default endpoint of a locally running driver
pub const DEFAULT_BASE_URL: &str = "http://localhost:4444";
/// Per-request HTTP timeout
pub const HTTP_TIMEOUT_MS: u64 = 30_000;
/// Extra outer window height reserved for browser chrome (tabs, address bar)
pub const WINDOW_CHROME_HEIGHT: u32 = 52;

/// Configuration for a WebDriver client
///
/// Every timing value defaults to the fixed protocol behaviour; overriding
/// them is mainly useful in tests.
///
/// # Examples
///
/// ```
/// let cfg = rfdriver::DriverConfig::default();
/// assert_eq!(cfg.base_url, "http://localhost:4444");
/// assert_eq!(cfg.poll_interval_ms, 100);
/// ```
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Base URL of the remote end
    pub base_url: String,
    /// Timeout for each HTTP exchange in milliseconds
    pub http_timeout_ms: u64,
    /// Interval between wait-condition checks in milliseconds
    pub poll_interval_ms: u64,
    /// Deadline for a single wait in milliseconds
    pub wait_timeout_ms: u64,
    /// Settle delay for `networkidle` navigation in milliseconds
    pub network_idle_settle_ms: u64,
    /// Viewport requested for new pages
    pub viewport: Viewport,
    /// Height added to the viewport when sizing the outer window
    pub window_chrome_height: u32,
    /// Capabilities sent under `alwaysMatch` when creating a session
    pub capabilities: serde_json::Map<String, serde_json::Value>,
    /// Helper script run after session creation and after each navigation
    pub init_script: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        let mut capabilities = serde_json::Map::new();
        capabilities.insert("browserName".into(), "Safari".into());
        // DPR 1 keeps screenshots comparable across machines
        capabilities.insert("safari:devicePixelRatio".into(), 1.0.into());

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout_ms: HTTP_TIMEOUT_MS,
            poll_interval_ms: wait::POLL_INTERVAL.as_millis() as u64,
            wait_timeout_ms: wait::WAIT_TIMEOUT.as_millis() as u64,
            network_idle_settle_ms: wait::NETWORK_IDLE_SETTLE.as_millis() as u64,
            viewport: Viewport::default(),
            window_chrome_height: WINDOW_CHROME_HEIGHT,
            capabilities,
            init_script: None,
        }
    }
}

impl DriverConfig {
    /// Defaults overlaid with `RFDRIVER_BASE_URL`, `RFDRIVER_HTTP_TIMEOUT_MS`
    /// and `RFDRIVER_WAIT_TIMEOUT_MS` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(url) = lookup("RFDRIVER_BASE_URL") {
            cfg.base_url = url;
        }
        if let Some(v) = lookup("RFDRIVER_HTTP_TIMEOUT_MS") {
            cfg.http_timeout_ms = parse_ms("RFDRIVER_HTTP_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("RFDRIVER_WAIT_TIMEOUT_MS") {
            cfg.wait_timeout_ms = parse_ms("RFDRIVER_WAIT_TIMEOUT_MS", &v)?;
        }
        Ok(cfg)
    }
}

fn parse_ms(key: &str, v: &str) -> Result<u64> {
    v.trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{} must be milliseconds, got '{}'", key, v)))
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A cookie as reported by the remote end
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expiry: Option<u64>,
    #[serde(default)]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub same_site: Option<String>,
}

/// Cooperative cancellation shared between a caller and a client
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
