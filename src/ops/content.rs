//! Arbitrary portal page capture.
//!
//! Takes a full URL instead of a query. The URL must live on the configured
//! portal origin; anything else is rejected up front without spending a
//! browser attempt on it.

use std::sync::Arc;

use tracing::info;

use crate::browser::session::Session;
use crate::core::config::Settings;
use crate::core::portal::CONTENT_SELECTOR;
use crate::core::types::{now_rfc3339, HtmlCapture};
use crate::error::ScrapeError;
use crate::ops::retry::{run_with_recovery, RetryPolicy};
use crate::ops::{capture_outer_html, current_url, release_page, settle_after_load};
use crate::sanitize::sanitize_fragment;

pub async fn run(
    settings: &Arc<Settings>,
    session: &Arc<Session>,
    url: &str,
) -> Result<HtmlCapture, ScrapeError> {
    if !settings.same_origin(url) {
        return Err(ScrapeError::BadUrl(format!(
            "{} is not on the configured portal origin",
            url
        )));
    }

    let policy = RetryPolicy::new(settings.max_retries);
    run_with_recovery(
        policy,
        "page-content",
        |_| {
            let settings = Arc::clone(settings);
            let session = Arc::clone(session);
            let url = url.to_string();
            async move { attempt(&settings, &session, &url).await }
        },
        || {
            let session = Arc::clone(session);
            async move { session.recycle().await }
        },
    )
    .await
}

async fn attempt(
    settings: &Settings,
    session: &Session,
    url: &str,
) -> Result<HtmlCapture, ScrapeError> {
    session.initialize().await?;
    let page = session.new_page().await?;
    let out = drive(settings, session, &page, url).await;
    release_page(settings, page).await;
    out
}

async fn drive(
    settings: &Settings,
    session: &Session,
    page: &chromiumoxide::Page,
    url: &str,
) -> Result<HtmlCapture, ScrapeError> {
    session.ensure_authenticated(page).await?;

    info!("page content: {}", url);
    page.goto(url).await?;
    page.wait_for_navigation().await?;
    settle_after_load(settings, page).await;

    let raw = capture_outer_html(page, CONTENT_SELECTOR).await?;
    Ok(HtmlCapture {
        html: sanitize_fragment(&raw),
        url: current_url(page).await,
        fetched_at: now_rfc3339(),
    })
}
