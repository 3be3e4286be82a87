//! Scrape operations and their orchestration.
//!
//! `Scout` is the public surface: one method per operation, each dispatched
//! through its own serial queue so that same-category requests never overlap
//! in the browser. Every operation shares the bounded retry-with-recycle
//! shape from [`retry`].

pub mod content;
pub mod graphic;
pub mod retry;
pub mod search;
pub mod suggest;

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use tracing::warn;

use crate::browser::wait;
use crate::browser::Session;
use crate::core::config::Settings;
use crate::core::portal::{LOADING_MARKER, LOADING_WAIT_MS, SETTLE_DELAY_MS};
use crate::core::types::{GraphicCapture, HealthReport, HtmlCapture, SuggestCapture};
use crate::error::ScrapeError;
use crate::queue::SerialQueue;

const CAPTURE_TEMPLATE: &str = r#"
(() => {
    const root = document.querySelector(__SELECTOR__);
    if (!root) { return ''; }
    return root.outerHTML;
})()
"#;

/// Grab the outer HTML of the first element matching `selector`, or an
/// empty string when nothing matches.
pub(crate) async fn capture_outer_html(
    page: &Page,
    selector: &str,
) -> Result<String, ScrapeError> {
    let script = CAPTURE_TEMPLATE.replace(
        "__SELECTOR__",
        &serde_json::to_string(selector).unwrap_or_else(|_| "\"body\"".into()),
    );
    Ok(page
        .evaluate(script)
        .await?
        .into_value::<String>()
        .unwrap_or_default())
}

pub(crate) async fn current_url(page: &Page) -> String {
    page.url().await.ok().flatten().unwrap_or_default()
}

/// Post-navigation settling: wait out the loading placeholder, give the
/// renderer a beat, and optionally hold for network idle.
pub(crate) async fn settle_after_load(settings: &Settings, page: &Page) {
    wait::wait_for_marker_gone(page, LOADING_MARKER, LOADING_WAIT_MS).await;
    tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;
    if settings.wait_for_network_idle {
        wait::wait_until_stable(page, settings.network_idle_timeout.as_millis() as u64).await;
    }
}

/// Throttle, then close the tab. Runs on success and failure alike so the
/// browser never accumulates orphaned tabs.
pub(crate) async fn release_page(settings: &Settings, page: Page) {
    tokio::time::sleep(settings.per_request_delay).await;
    if let Err(e) = page.close().await {
        warn!("page close failed: {}", e);
    }
}

/// The service facade: shared session plus one serial queue per operation
/// category.
pub struct Scout {
    settings: Arc<Settings>,
    session: Arc<Session>,
    search_queue: SerialQueue<HtmlCapture>,
    suggest_queue: SerialQueue<SuggestCapture>,
    content_queue: SerialQueue<HtmlCapture>,
    graphic_queue: SerialQueue<GraphicCapture>,
}

impl Scout {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        Self {
            session: Arc::new(Session::new(Arc::clone(&settings))),
            settings,
            search_queue: SerialQueue::new("search"),
            suggest_queue: SerialQueue::new("suggest"),
            content_queue: SerialQueue::new("content"),
            graphic_queue: SerialQueue::new("graphic"),
        }
    }

    /// Warm the browser up front. Failure is not fatal; the first operation
    /// retries the launch.
    pub async fn initialize(&self) -> Result<(), ScrapeError> {
        self.session.initialize().await
    }

    pub async fn close(&self) {
        self.session.close().await;
    }

    pub async fn search(
        &self,
        query: &str,
        interactive: bool,
    ) -> Result<HtmlCapture, ScrapeError> {
        let settings = Arc::clone(&self.settings);
        let session = Arc::clone(&self.session);
        let query = query.to_string();
        self.search_queue
            .enqueue(Box::pin(async move {
                search::run(&settings, &session, &query, interactive).await
            }))
            .await
    }

    pub async fn suggest(&self, query: &str) -> Result<SuggestCapture, ScrapeError> {
        let settings = Arc::clone(&self.settings);
        let session = Arc::clone(&self.session);
        let query = query.to_string();
        self.suggest_queue
            .enqueue(Box::pin(async move {
                suggest::run(&settings, &session, &query).await
            }))
            .await
    }

    pub async fn page_content(&self, url: &str) -> Result<HtmlCapture, ScrapeError> {
        let settings = Arc::clone(&self.settings);
        let session = Arc::clone(&self.session);
        let url = url.to_string();
        self.content_queue
            .enqueue(Box::pin(async move {
                content::run(&settings, &session, &url).await
            }))
            .await
    }

    pub async fn network_graphic(&self, url: &str) -> Result<GraphicCapture, ScrapeError> {
        let settings = Arc::clone(&self.settings);
        let session = Arc::clone(&self.session);
        let url = url.to_string();
        self.graphic_queue
            .enqueue(Box::pin(async move {
                graphic::run(&settings, &session, &url).await
            }))
            .await
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            search: self.search_queue.stats(),
            suggest: self.suggest_queue.stats(),
            content: self.content_queue.stats(),
            graphic: self.graphic_queue.stats(),
            authenticated: self.session.is_authenticated().await,
        }
    }
}
