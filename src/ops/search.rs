//! Search results capture.
//!
//! Two entry styles: the default builds the results URL directly, the
//! interactive variant walks through the portal's search box with humanized
//! typing, which is the path to take when direct URLs start attracting
//! challenge pages.

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::info;

use crate::browser::input::{self, Locator};
use crate::browser::session::Session;
use crate::core::config::Settings;
use crate::core::portal::{QUERY_PARAM, RESULTS_SELECTOR, SEARCH_BOX_SELECTOR, SEARCH_PATH};
use crate::core::types::{now_rfc3339, HtmlCapture};
use crate::error::ScrapeError;
use crate::ops::retry::{run_with_recovery, RetryPolicy};
use crate::ops::{capture_outer_html, current_url, release_page, settle_after_load};
use crate::sanitize::sanitize_fragment;

pub fn results_url(settings: &Settings, query: &str) -> String {
    format!(
        "{}?{}={}",
        settings.portal_url(SEARCH_PATH),
        QUERY_PARAM,
        utf8_percent_encode(query, NON_ALPHANUMERIC)
    )
}

pub async fn run(
    settings: &Arc<Settings>,
    session: &Arc<Session>,
    query: &str,
    interactive: bool,
) -> Result<HtmlCapture, ScrapeError> {
    let policy = RetryPolicy::new(settings.max_retries);
    run_with_recovery(
        policy,
        "search",
        |_| {
            let settings = Arc::clone(settings);
            let session = Arc::clone(session);
            let query = query.to_string();
            async move { attempt(&settings, &session, &query, interactive).await }
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
    query: &str,
    interactive: bool,
) -> Result<HtmlCapture, ScrapeError> {
    session.initialize().await?;
    let page = session.new_page().await?;
    let out = drive(settings, session, &page, query, interactive).await;
    release_page(settings, page).await;
    out
}

async fn drive(
    settings: &Settings,
    session: &Session,
    page: &chromiumoxide::Page,
    query: &str,
    interactive: bool,
) -> Result<HtmlCapture, ScrapeError> {
    session.ensure_authenticated(page).await?;

    if interactive {
        info!("search (interactive): {:?}", query);
        page.goto(settings.base_url.as_str()).await?;
        page.wait_for_navigation().await?;
        let min = settings.typing_delay_min.as_millis() as u64;
        let max = settings.typing_delay_max.as_millis() as u64;
        input::type_like_human(page, Locator::Css(SEARCH_BOX_SELECTOR), query, min, max).await?;
        input::press_enter(page).await?;
        match tokio::time::timeout(settings.navigation_timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ScrapeError::Browser(e.to_string())),
            Err(_) => {
                return Err(ScrapeError::NavigationTimeout(
                    "search submit did not navigate".into(),
                ))
            }
        }
    } else {
        let url = results_url(settings, query);
        info!("search (direct): {}", url);
        page.goto(url.as_str()).await?;
        page.wait_for_navigation().await?;
    }

    settle_after_load(settings, page).await;

    // A query with no hits renders no results container at all; that is a
    // legitimate empty result, not a failure.
    let raw = capture_outer_html(page, RESULTS_SELECTOR).await?;
    Ok(HtmlCapture {
        html: sanitize_fragment(&raw),
        url: current_url(page).await,
        fetched_at: now_rfc3339(),
    })
}
