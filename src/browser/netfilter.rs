//! Per-page network filter.
//!
//! Every outgoing request is inspected through the CDP Fetch domain; anything
//! aimed at a known analytics / bot-detection beacon is aborted, everything
//! else continues unmodified. Installation is idempotent per page; a second
//! install on the same target is a no-op.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use aho_corasick::AhoCorasick;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::ScrapeError;

fn installed() -> &'static Mutex<HashSet<String>> {
    static INSTALLED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    INSTALLED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Linear-time substring matcher over the blocked-origin list.
pub fn build_matcher(blocked: &[String]) -> Result<AhoCorasick, ScrapeError> {
    AhoCorasick::new(blocked)
        .map_err(|e| ScrapeError::Browser(format!("blocked-origin patterns: {}", e)))
}

/// Returns `true` if this request targets a blocked origin. Matching runs
/// against the URL's host only, so a portal URL that merely mentions a
/// blocked name in its path or query passes through.
pub fn is_blocked(matcher: &AhoCorasick, url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(u) => u.host_str().map(|h| matcher.is_match(h)).unwrap_or(false),
        Err(_) => false,
    }
}

/// Install the filter on `page`. Requests matching `blocked` are failed with
/// `BlockedByClient`; all others pass through. Safe to call twice on the same
/// page.
pub async fn install(page: &Page, blocked: &[String]) -> Result<(), ScrapeError> {
    let key = page.target_id().inner().to_string();
    {
        let mut seen = installed()
            .lock()
            .map_err(|_| ScrapeError::Browser("network filter registry poisoned".into()))?;
        if !seen.insert(key.clone()) {
            return Ok(());
        }
    }

    let matcher = build_matcher(blocked)?;
    page.execute(EnableParams::default()).await?;
    let mut events = page.event_listener::<EventRequestPaused>().await?;

    let worker_page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let url = event.request.url.clone();
            if is_blocked(&matcher, &url) {
                debug!("network filter aborting {}", url);
                if let Err(e) = worker_page
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                {
                    warn!("network filter abort failed for {}: {}", url, e);
                }
            } else if let Err(e) = worker_page
                .execute(ContinueRequestParams::new(event.request_id.clone()))
                .await
            {
                warn!("network filter continue failed for {}: {}", url, e);
            }
        }
        // Event stream closed: the page is gone; forget it so a future page
        // reusing the target id gets a fresh install.
        if let Ok(mut seen) = installed().lock() {
            seen.remove(&key);
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::portal::DEFAULT_BLOCKED_ORIGINS;

    fn default_matcher() -> AhoCorasick {
        let patterns: Vec<String> = DEFAULT_BLOCKED_ORIGINS
            .iter()
            .map(|s| s.to_string())
            .collect();
        build_matcher(&patterns).unwrap()
    }

    #[test]
    fn blocks_detection_beacons() {
        let m = default_matcher();
        assert!(is_blocked(&m, "https://api-js.datadome.co/js/"));
        assert!(is_blocked(
            &m,
            "https://www.google-analytics.com/collect?v=1"
        ));
        assert!(is_blocked(&m, "https://www.googletagmanager.com/gtm.js"));
    }

    #[test]
    fn passes_portal_traffic() {
        let m = default_matcher();
        assert!(!is_blocked(&m, "https://portal.example.com/search?query=x"));
        assert!(!is_blocked(&m, "https://portal.example.com/assets/app.css"));
        assert!(!is_blocked(&m, "https://cdn.example.net/fonts/inter.woff2"));
    }

    #[test]
    fn blocked_names_outside_the_host_pass() {
        let m = default_matcher();
        assert!(!is_blocked(
            &m,
            "https://portal.example.com/search?ref=google-analytics.com"
        ));
        assert!(!is_blocked(
            &m,
            "https://portal.example.com/docs/hotjar.com/migration"
        ));
    }
}
