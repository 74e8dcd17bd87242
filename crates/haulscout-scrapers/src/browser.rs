//! Browser session management.
//!
//! The scan pipeline only talks to the [`BrowserPage`] trait, so the Chrome
//! implementation here can be swapped for an in-process page in tests.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig as ChromeConfig, Page};
use futures::StreamExt;
use haulscout_core::{BrowserConfig, HaulError, MarketplaceConfig, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const CHROME_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// One tab of an automation context.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<Option<String>>;

    /// Waits until `selector` matches an element. Returns false on timeout.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> bool;

    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Sets the value of a `<select>` and fires its change event.
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    /// The rendered HTML of the page.
    async fn content(&self) -> Result<String>;

    async fn set_cookie(&self, name: &str, value: &str, domain: &str) -> Result<()>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> &dyn BrowserPage;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Starts an isolated context with a single blank page.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Launches a session, injects the marketplace cookie and checks that the
/// marketplace accepts it.
///
/// On failure the session is already closed.
pub async fn open_authenticated(
    launcher: &dyn BrowserLauncher,
    config: &MarketplaceConfig,
    cookie: &str,
) -> Result<Box<dyn BrowserSession>> {
    let mut session = launcher.launch().await?;
    match authenticate(session.page(), config, cookie).await {
        Ok(()) => Ok(session),
        Err(e) => {
            close_quietly(session.as_mut()).await;
            Err(e)
        }
    }
}

/// Sets the session cookie and visits an authenticated page. Landing on
/// the login page means the cookie is no longer accepted.
pub async fn authenticate(page: &dyn BrowserPage, config: &MarketplaceConfig, cookie: &str) -> Result<()> {
    page.set_cookie(&config.session_cookie_name, cookie, &config.session_cookie_domain)
        .await?;

    let url = config.url_for(&config.auth_check_path)?;
    debug!("Verifying session at {}", url);
    page.goto(url.as_str()).await?;

    let landed = page.current_url().await?.unwrap_or_default();
    if config.is_login_url(&landed) {
        warn!("Marketplace redirected to login ({}), session expired", landed);
        return Err(HaulError::SessionExpired);
    }
    Ok(())
}

/// Closes a session, logging instead of returning close failures.
pub async fn close_quietly(session: &mut dyn BrowserSession) {
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
}

fn browser_err(e: impl std::fmt::Display) -> HaulError {
    HaulError::Browser(e.to_string())
}

/// Launches local Chrome, or attaches to a remote DevTools endpoint when
/// one is configured.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn find_chrome(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.chrome_path {
            if path.exists() {
                return Ok(path.clone());
            }
            warn!("Configured Chrome path {} does not exist", path.display());
        }

        for name in CHROME_BINARIES {
            if let Ok(path) = which::which(name) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(HaulError::Browser(
            "Chrome/Chromium not found; install it or set CHROME_PATH".to_string(),
        ))
    }

    async fn launch_local(&self) -> Result<(Browser, chromiumoxide::Handler)> {
        let chrome_path = self.find_chrome()?;
        info!("Launching browser (headless={})", self.config.headless);

        let mut builder = ChromeConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(self.config.request_timeout());
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(HaulError::Browser)?;
        Browser::launch(config).await.map_err(browser_err)
    }

    async fn connect_remote(&self, url: &str) -> Result<(Browser, chromiumoxide::Handler)> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));
        let version: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(self.config.request_timeout())
            .send()
            .await?
            .json()
            .await?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HaulError::Browser("No webSocketDebuggerUrl in response".to_string()))?;
        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: self.config.request_timeout(),
            ..Default::default()
        };
        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(browser_err)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let remote = self.config.remote_url.is_some();
        let (browser, mut handler) = match &self.config.remote_url {
            Some(url) => self.connect_remote(url).await?,
            None => self.launch_local().await?,
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(browser_err(e));
            }
        };

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            page: ChromePage { page },
            handler_task,
            remote,
        }))
    }
}

/// A launched (or attached) browser and its page. Remote browsers are
/// shared, so closing only closes our page.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: ChromePage,
    handler_task: JoinHandle<()>,
    remote: bool,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn page(&self) -> &dyn BrowserPage {
        &self.page
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let result = if self.remote {
            self.page.page.clone().close().await.map_err(browser_err)
        } else {
            match browser.close().await {
                Ok(_) => browser.wait().await.map(|_| ()).map_err(HaulError::from),
                Err(e) => Err(browser_err(e)),
            }
        };

        self.handler_task.abort();
        debug!("Browser session closed");
        result
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn evaluate_bool(&self, script: String) -> Result<bool> {
        self.page
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value::<bool>()
            .map_err(browser_err)
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page.url().await.map_err(browser_err)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await.map_err(browser_err)?;
        element.click().await.map_err(browser_err)?;
        element.type_str(text).await.map_err(browser_err)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.page.find_element(selector).await.map_err(browser_err)?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) return false;
                el.value = {value};
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            selector = serde_json::to_string(selector)?,
            value = serde_json::to_string(value)?,
        );
        if self.evaluate_bool(script).await? {
            Ok(())
        } else {
            Err(HaulError::Browser(format!("no element matches {}", selector)))
        }
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.map_err(browser_err)
    }

    async fn set_cookie(&self, name: &str, value: &str, domain: &str) -> Result<()> {
        let cookie = CookieParam::builder()
            .name(name)
            .value(value)
            .domain(domain)
            .path("/")
            .secure(true)
            .http_only(true)
            .build()
            .map_err(HaulError::Browser)?;
        self.page.set_cookie(cookie).await.map_err(browser_err)?;
        Ok(())
    }
}
