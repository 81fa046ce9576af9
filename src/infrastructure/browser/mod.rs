//! Chromium session management over CDP.

mod page;
mod script;

pub use page::ChromePage;

use crate::error::{Result, ScraperError};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headful: bool,
    pub chrome_path: Option<PathBuf>,
    /// DevTools endpoint of an already running browser.
    pub remote_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headful: false,
            chrome_path: None,
            remote_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One browser with one tab. Must be released with [`BrowserSession::close`].
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: ChromePage,
    remote: bool,
}

impl BrowserSession {
    /// Launches a local browser, or connects to `remote_url` if set.
    pub async fn open(settings: &BrowserSettings) -> Result<Self> {
        let (browser, handler, remote) = match &settings.remote_url {
            Some(url) => {
                let (browser, handler) = connect_remote(url, settings.request_timeout).await?;
                (browser, handler, true)
            }
            None => {
                let (browser, handler) = launch(settings).await?;
                (browser, handler, false)
            }
        };

        let page = match new_prepared_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                Self::shutdown(browser, handler, None, remote).await;
                return Err(e);
            }
        };

        Ok(Self {
            browser,
            handler,
            page: ChromePage::new(page),
            remote,
        })
    }

    pub fn page(&self) -> &ChromePage {
        &self.page
    }

    /// Closes the tab and, for a launched browser, the browser process.
    pub async fn close(self) {
        Self::shutdown(self.browser, self.handler, Some(self.page.into_inner()), self.remote).await;
    }

    async fn shutdown(mut browser: Browser, handler: JoinHandle<()>, page: Option<Page>, remote: bool) {
        if let Some(page) = page {
            if let Err(e) = page.close().await {
                debug!("Closing tab failed: {}", e);
            }
        }

        if !remote {
            if let Err(e) = browser.close().await {
                warn!("Closing browser failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Waiting for browser exit failed: {}", e);
            }
        }

        handler.abort();
        info!("Browser session closed");
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

async fn launch(settings: &BrowserSettings) -> Result<(Browser, JoinHandle<()>)> {
    let chrome = find_chrome(settings.chrome_path.as_deref())?;
    info!("Launching browser (headless={})", !settings.headful);

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome)
        .request_timeout(settings.request_timeout)
        .viewport(Viewport {
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg(format!("--user-agent={}", USER_AGENT));

    if settings.headful {
        builder = builder.with_head();
    } else {
        builder = builder.arg("--disable-gpu");
    }

    let config = builder
        .build()
        .map_err(|e| ScraperError::Launch(format!("invalid browser config: {}", e)))?;

    let (browser, handler) = Browser::launch(config)
        .await
        .map_err(|e| ScraperError::Launch(e.to_string()))?;

    Ok((browser, spawn_handler(handler)))
}

async fn connect_remote(url: &str, request_timeout: Duration) -> Result<(Browser, JoinHandle<()>)> {
    info!("Connecting to remote browser at {}", url);

    let http_url = url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let version: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .send()
        .await
        .map_err(|e| ScraperError::Launch(format!("remote browser unreachable: {}", e)))?
        .json()
        .await?;

    let ws_url = version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ScraperError::Launch("no webSocketDebuggerUrl in response".to_string()))?;

    debug!("Connecting to WebSocket: {}", ws_url);
    let handler_config = HandlerConfig {
        request_timeout,
        ..Default::default()
    };
    let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
        .await
        .map_err(|e| ScraperError::Launch(e.to_string()))?;

    Ok((browser, spawn_handler(handler)))
}

async fn new_prepared_page(browser: &Browser) -> Result<Page> {
    let page = browser.new_page("about:blank").await?;
    page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
        .await?;
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        script::WEBDRIVER_OVERRIDE.to_string(),
    ))
    .await?;
    Ok(page)
}

/// Resolution order: explicit path, `CHROME_EXECUTABLE`, well-known install
/// paths, then `which`.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ScraperError::Launch(format!(
            "browser not found at {}",
            path.display()
        )));
    }

    if let Ok(path) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&path).exists() {
            info!("Using CHROME_EXECUTABLE: {}", path);
            return Ok(PathBuf::from(path));
        }
        warn!("CHROME_EXECUTABLE points to a missing file: {}", path);
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(ScraperError::Launch(
        "Chrome/Chromium not found. Install it or pass --chrome-path".to_string(),
    ))
}
