//! Shared browser session lifecycle.
//!
//! One browser process serves every operation. The `Session` owns it behind
//! a mutex together with the authenticated flag; recycling tears both down
//! at once so a fresh browser always re-runs the login flow.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser::input::{self, Locator};
use crate::browser::launch::{build_stealth_config, find_chrome_executable, stealth_script};
use crate::browser::netfilter;
use crate::core::config::Settings;
use crate::core::portal::{
    LOGIN_ERROR_SELECTOR, LOGIN_PATH, LOGIN_SUBMIT_SELECTOR, PASSWORD_FIELD_PATH, SETTLE_DELAY_MS,
    USERNAME_FIELD_PATH,
};
use crate::error::ScrapeError;

#[derive(Default)]
struct SessionState {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    authenticated: bool,
}

/// The single shared browser session.
pub struct Session {
    settings: Arc<Settings>,
    state: Mutex<SessionState>,
    logins: AtomicU32,
}

impl Session {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            state: Mutex::new(SessionState::default()),
            logins: AtomicU32::new(0),
        }
    }

    /// Launch the browser if it is not already running. Idempotent.
    pub async fn initialize(&self) -> Result<(), ScrapeError> {
        let mut state = self.state.lock().await;
        if state.browser.is_some() {
            return Ok(());
        }

        let exe = find_chrome_executable().ok_or_else(|| {
            ScrapeError::Launch(
                "no Chromium-family executable found (set CHROME_EXECUTABLE)".into(),
            )
        })?;
        info!("launching browser: {}", exe);
        let config = build_stealth_config(
            &exe,
            self.settings.headless,
            self.settings.navigation_timeout,
        )?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(format!("failed to launch {}: {}", exe, e)))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        state.browser = Some(browser);
        state.handler_task = Some(handler_task);
        state.authenticated = false;
        Ok(())
    }

    /// Close the browser and forget the authenticated flag. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut browser) = state.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close failed: {}", e);
            }
            info!("browser session closed");
        }
        if let Some(task) = state.handler_task.take() {
            task.abort();
        }
        state.authenticated = false;
    }

    /// Full reset: tear everything down and launch anew. The next operation
    /// will log in again from scratch.
    pub async fn recycle(&self) -> Result<(), ScrapeError> {
        info!("recycling browser session");
        self.close().await;
        self.initialize().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    /// How many times the login flow has actually navigated, over the life
    /// of this `Session`. A second `ensure_authenticated` on a live session
    /// must not move this.
    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    /// Open a stealth-prepared blank tab with the network filter installed.
    pub async fn new_page(&self) -> Result<Page, ScrapeError> {
        let state = self.state.lock().await;
        let browser = state
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::Launch("browser not initialized".into()))?;
        let page = browser.new_page("about:blank").await?;
        drop(state);

        page.execute(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(stealth_script())
                .build()
                .map_err(ScrapeError::Browser)?,
        )
        .await?;
        netfilter::install(&page, &self.settings.blocked_origins).await?;
        Ok(page)
    }

    /// Log in through `page` unless the session is already authenticated.
    ///
    /// The state lock is held across the whole flow, so concurrent callers
    /// on different queues cannot race two logins; the second caller sees
    /// the flag set and returns immediately.
    pub async fn ensure_authenticated(&self, page: &Page) -> Result<(), ScrapeError> {
        let mut state = self.state.lock().await;
        if state.authenticated {
            return Ok(());
        }
        if state.browser.is_none() {
            return Err(ScrapeError::Launch("browser not initialized".into()));
        }

        let login_url = self.settings.portal_url(LOGIN_PATH);
        self.logins.fetch_add(1, Ordering::SeqCst);
        info!("logging in at {}", login_url);
        page.goto(login_url.as_str()).await?;
        page.wait_for_navigation().await?;
        tokio::time::sleep(std::time::Duration::from_millis(SETTLE_DELAY_MS)).await;

        let min = self.settings.typing_delay_min.as_millis() as u64;
        let max = self.settings.typing_delay_max.as_millis() as u64;
        input::type_like_human(
            page,
            Locator::Path(USERNAME_FIELD_PATH),
            &self.settings.credentials.username,
            min,
            max,
        )
        .await?;
        input::type_like_human(
            page,
            Locator::Path(PASSWORD_FIELD_PATH),
            &self.settings.credentials.password,
            min,
            max,
        )
        .await?;
        input::click(page, Locator::Css(LOGIN_SUBMIT_SELECTOR)).await?;

        match tokio::time::timeout(self.settings.navigation_timeout, page.wait_for_navigation())
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ScrapeError::Browser(e.to_string())),
            Err(_) => {
                return Err(ScrapeError::NavigationTimeout(format!(
                    "login submit at {} did not navigate",
                    login_url
                )))
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(SETTLE_DELAY_MS)).await;

        let error_probe = format!(
            "(() => {{ const el = document.querySelector({}); \
             return el !== null && el.textContent.trim().length > 0; }})()",
            serde_json::to_string(LOGIN_ERROR_SELECTOR).unwrap_or_else(|_| "\"\"".into())
        );
        let rejected = page
            .evaluate(error_probe.as_str())
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false);
        if rejected {
            return Err(ScrapeError::Authentication(
                "login form rejected the configured credentials".into(),
            ));
        }

        state.authenticated = true;
        info!("login succeeded");
        Ok(())
    }
}
