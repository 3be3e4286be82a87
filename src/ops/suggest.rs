//! Typeahead suggestion capture.
//!
//! The portal's suggest endpoint returns JSON, but it sits behind the same
//! anti-bot screening as everything else, so it is fetched through the
//! authenticated browser rather than a plain HTTP client. The response body
//! is read out of the rendered page and parsed.

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::info;

use crate::browser::session::Session;
use crate::core::config::Settings;
use crate::core::portal::{QUERY_PARAM, SUGGEST_PATH};
use crate::core::types::{now_rfc3339, SuggestCapture};
use crate::error::ScrapeError;
use crate::ops::retry::{run_with_recovery, RetryPolicy};
use crate::ops::{current_url, release_page};

pub fn suggest_url(settings: &Settings, query: &str) -> String {
    format!(
        "{}?{}={}",
        settings.portal_url(SUGGEST_PATH),
        QUERY_PARAM,
        utf8_percent_encode(query, NON_ALPHANUMERIC)
    )
}

pub async fn run(
    settings: &Arc<Settings>,
    session: &Arc<Session>,
    query: &str,
) -> Result<SuggestCapture, ScrapeError> {
    let policy = RetryPolicy::new(settings.max_retries);
    run_with_recovery(
        policy,
        "suggest",
        |_| {
            let settings = Arc::clone(settings);
            let session = Arc::clone(session);
            let query = query.to_string();
            async move { attempt(&settings, &session, &query).await }
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
) -> Result<SuggestCapture, ScrapeError> {
    session.initialize().await?;
    let page = session.new_page().await?;
    let out = drive(settings, session, &page, query).await;
    release_page(settings, page).await;
    out
}

async fn drive(
    settings: &Settings,
    session: &Session,
    page: &chromiumoxide::Page,
    query: &str,
) -> Result<SuggestCapture, ScrapeError> {
    session.ensure_authenticated(page).await?;

    let url = suggest_url(settings, query);
    info!("suggest: {}", url);
    page.goto(url.as_str()).await?;
    page.wait_for_navigation().await?;

    // JSON responses render as bare text in the body.
    let body = page
        .evaluate("document.body ? document.body.innerText : ''")
        .await?
        .into_value::<String>()
        .unwrap_or_default();
    let json: serde_json::Value = serde_json::from_str(body.trim()).map_err(|e| {
        ScrapeError::ExtractionEmpty(format!("suggest body is not JSON ({}): {:.120}", e, body))
    })?;

    Ok(SuggestCapture {
        json,
        url: current_url(page).await,
        fetched_at: now_rfc3339(),
    })
}
