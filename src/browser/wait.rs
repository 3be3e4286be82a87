//! Page readiness helpers.
//!
//! The portal renders most of its interesting content after load, behind a
//! "Loading" placeholder, so plain navigation completion is rarely enough.
//! These helpers poll cheap JS predicates until the page settles or a
//! deadline passes.

use std::time::Duration;

use chromiumoxide::Page;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::ScrapeError;

const POLL_INTERVAL_MS: u64 = 250;

/// Wait until the document is complete and no new resources have been
/// fetched for a quiet window. Best effort; returns `true` when the page
/// settled before the deadline.
pub async fn wait_until_stable(page: &Page, timeout_ms: u64) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let quiet_window = Duration::from_millis(POLL_INTERVAL_MS * 3);
    let mut last_count: i64 = -1;
    let mut quiet_since = Instant::now();

    while Instant::now() < deadline {
        let probe = page
            .evaluate(
                "JSON.stringify({ ready: document.readyState === 'complete', \
                 resources: performance.getEntriesByType('resource').length })",
            )
            .await
            .ok()
            .and_then(|v| v.into_value::<String>().ok())
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok());

        if let Some(state) = probe {
            let ready = state["ready"].as_bool().unwrap_or(false);
            let count = state["resources"].as_i64().unwrap_or(0);
            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            }
            if ready && quiet_since.elapsed() >= quiet_window {
                debug!("page stable after {} resources", count);
                return true;
            }
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
    false
}

/// Wait for the text `marker` to disappear from the visible body. Returns
/// `true` if it was gone before the deadline; the caller decides whether a
/// lingering marker is fatal.
pub async fn wait_for_marker_gone(page: &Page, marker: &str, timeout_ms: u64) -> bool {
    let script = format!(
        "!(document.body && document.body.innerText.includes({}))",
        serde_json::to_string(marker).unwrap_or_else(|_| "\"\"".into())
    );
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while Instant::now() < deadline {
        let gone = page
            .evaluate(script.as_str())
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false);
        if gone {
            return true;
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
    false
}

/// Wait until `selector` matches an element, or fail with a timeout.
pub async fn wait_for_selector(
    page: &Page,
    selector: &str,
    timeout_ms: u64,
) -> Result<(), ScrapeError> {
    let script = format!(
        "document.querySelector({}) !== null",
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".into())
    );
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while Instant::now() < deadline {
        let present = page
            .evaluate(script.as_str())
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false);
        if present {
            return Ok(());
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
    Err(ScrapeError::NavigationTimeout(format!(
        "selector {:?} not found within {}ms",
        selector, timeout_ms
    )))
}

const GRAPHIC_READY_TEMPLATE: &str = r#"
(() => {
    const svg = document.querySelector(__SELECTOR__);
    if (!svg) { return false; }
    const nodes = svg.querySelector(__NODE_GROUP__);
    const edges = svg.querySelector(__EDGE_GROUP__);
    if (!nodes || !edges) { return false; }
    for (const shape of nodes.querySelectorAll('circle, rect, path, ellipse')) {
        try {
            const box = shape.getBBox();
            if (box.width > 0 || box.height > 0) { return true; }
        } catch (_) {}
    }
    return false;
})()
"#;

/// Wait until the network graphic has materialized: the SVG exists, both the
/// node and edge groups are present, and at least one node shape has real
/// geometry.
pub async fn wait_for_graphic_ready(
    page: &Page,
    selector: &str,
    node_group: &str,
    edge_group: &str,
    timeout_ms: u64,
) -> Result<(), ScrapeError> {
    let script = GRAPHIC_READY_TEMPLATE
        .replace(
            "__SELECTOR__",
            &serde_json::to_string(selector).unwrap_or_else(|_| "\"svg\"".into()),
        )
        .replace(
            "__NODE_GROUP__",
            &serde_json::to_string(node_group).unwrap_or_else(|_| "\"g\"".into()),
        )
        .replace(
            "__EDGE_GROUP__",
            &serde_json::to_string(edge_group).unwrap_or_else(|_| "\"g\"".into()),
        );
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while Instant::now() < deadline {
        let ready = page
            .evaluate(script.as_str())
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false);
        if ready {
            return Ok(());
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
    Err(ScrapeError::NavigationTimeout(format!(
        "graphic {:?} not ready within {}ms",
        selector, timeout_ms
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphic_template_quotes_selectors() {
        let script = GRAPHIC_READY_TEMPLATE
            .replace("__SELECTOR__", "\"svg.network-graph\"")
            .replace("__NODE_GROUP__", "\"g.nodes\"")
            .replace("__EDGE_GROUP__", "\"g.edges\"");
        assert!(script.contains("document.querySelector(\"svg.network-graph\")"));
        assert!(!script.contains("__SELECTOR__"));
    }
}
