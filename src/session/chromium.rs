//! Chromium-backed session driver using chromiumoxide.
//!
//! Each session launches its own headless browser so a restart always begins
//! from a clean profile, mirroring the terminal's expectation of one fresh
//! login per browser context.

use super::{InfoColumn, SessionDriver, TerminalSession};
use crate::config::{Config, LoginTuning, ENTRY_URL};
use crate::error::StreamError;
use crate::extract::INFO_COLUMN_QUERY;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Polling step while waiting for a DOM landmark.
const LANDMARK_POLL_STEP: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. PRICESTREAM_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PRICESTREAM_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Session driver that logs into the terminal through headless Chromium.
pub struct ChromiumSessionDriver {
    username: String,
    password: String,
    entry_url: String,
    headless: bool,
    tuning: LoginTuning,
}

impl ChromiumSessionDriver {
    pub fn new(config: &Config) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            entry_url: ENTRY_URL.to_string(),
            headless: config.headless,
            tuning: config.login,
        }
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), StreamError> {
        let chrome_path = find_chromium().ok_or_else(|| {
            StreamError::Transport(
                "Chromium not found. Set PRICESTREAM_CHROMIUM_PATH or install google-chrome."
                    .to_string(),
            )
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1280, 800)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if self.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| StreamError::Transport(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| StreamError::Transport(format!("failed to launch Chromium: {e}")))?;

        // CDP event pump; must keep draining for the session's lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok((browser, handler_task))
    }

    /// Drive the login flow on a freshly-opened page.
    async fn login(&self, page: &Page) -> Result<(), StreamError> {
        info!("navigating to {}", self.entry_url);
        page.goto(self.entry_url.as_str())
            .await
            .map_err(|e| StreamError::Auth(format!("navigation to login page failed: {e}")))?;

        // The login form is the only reliable landmark the SPA exposes.
        let name_input = wait_for_element(page, "#name-input", self.tuning.form_wait).await?;

        info!("attempting login as {}", self.username);
        fill(&name_input, &self.username, "#name-input").await?;
        let password_input = page
            .find_element("#password-input")
            .await
            .map_err(|e| StreamError::Auth(format!("password field not found: {e}")))?;
        fill(&password_input, &self.password, "#password-input").await?;
        tokio::time::sleep(self.tuning.field_settle).await;

        page.find_element("button.MuiButton-containedPrimary")
            .await
            .map_err(|e| StreamError::Auth(format!("login submit button not found: {e}")))?
            .click()
            .await
            .map_err(|e| StreamError::Auth(format!("login submit click failed: {e}")))?;
        tokio::time::sleep(self.tuning.submit_settle).await;

        // Optional workspace launch control. The UI may land directly on the
        // price view, so absence is not an error.
        match page
            .find_element("button.MuiButtonBase-root.MuiButton-root")
            .await
        {
            Ok(launch) => {
                info!("clicking Launch to open the price view");
                match launch.click().await {
                    Ok(_) => tokio::time::sleep(self.tuning.launch_settle).await,
                    Err(e) => warn!("launch click failed: {e}"),
                }
            }
            Err(e) => warn!("launch button not found: {e}"),
        }

        Ok(())
    }
}

#[async_trait]
impl SessionDriver for ChromiumSessionDriver {
    async fn start(&self) -> Result<Box<dyn TerminalSession>, StreamError> {
        let (browser, handler_task) = self.launch().await?;
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                teardown(browser, handler_task).await;
                return Err(StreamError::Transport(format!(
                    "failed to open browser page: {e}"
                )));
            }
        };

        let session = ChromiumSession {
            browser,
            page,
            handler_task,
        };
        if let Err(err) = self.login(&session.page).await {
            // Do not leak the browser process on a failed login.
            Box::new(session).close().await;
            return Err(err);
        }

        Ok(Box::new(session))
    }
}

/// An authenticated terminal session on a live Chromium page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl TerminalSession for ChromiumSession {
    async fn read_columns(&self) -> Result<Vec<InfoColumn>, StreamError> {
        let result = self.page.evaluate(INFO_COLUMN_QUERY).await?;
        result
            .into_value::<Vec<InfoColumn>>()
            .map_err(|e| StreamError::Transport(format!("unexpected info column shape: {e}")))
    }

    async fn close(self: Box<Self>) {
        let ChromiumSession {
            browser,
            page,
            handler_task,
        } = *self;
        if let Err(e) = page.close().await {
            debug!("page close failed: {e}");
        }
        teardown(browser, handler_task).await;
        info!("browser closed");
    }
}

async fn teardown(mut browser: Browser, handler_task: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        debug!("browser close failed: {e}");
    }
    let _ = browser.wait().await;
    handler_task.abort();
}

/// Poll for a DOM landmark instead of sleeping blind, bounded by `timeout`.
async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, StreamError> {
    let deadline = Instant::now() + timeout;
    loop {
        match page.find_element(selector).await {
            Ok(element) => return Ok(element),
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(StreamError::Auth(format!(
                        "element `{selector}` not found within {}ms: {e}",
                        timeout.as_millis()
                    )));
                }
                tokio::time::sleep(LANDMARK_POLL_STEP).await;
            }
        }
    }
}

async fn fill(element: &Element, text: &str, selector: &str) -> Result<(), StreamError> {
    element
        .click()
        .await
        .map_err(|e| StreamError::Auth(format!("focus on `{selector}` failed: {e}")))?;
    element
        .type_str(text)
        .await
        .map_err(|e| StreamError::Auth(format!("typing into `{selector}` failed: {e}")))?;
    Ok(())
}
