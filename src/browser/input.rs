//! Human-interaction emulation.
//!
//! Text is delivered one keystroke at a time through the CDP Input domain
//! with a randomized pause between characters, so the page sees the cadence
//! of a person typing rather than a single programmatic value assignment.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::Page;
use rand::distr::{Distribution, Uniform};
use tracing::debug;

use crate::core::portal::SETTLE_DELAY_MS;
use crate::error::ScrapeError;

/// How to find the element that should receive input.
///
/// `Path` walks the DOM by child index from `document.body`, which survives
/// markup without stable ids or classes.
#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    Path(&'a [usize]),
}

const FOCUS_BY_PATH_TEMPLATE: &str = r#"
(() => {
    let node = document.body;
    const path = __PATH__;
    for (const idx of path) {
        if (!node || !node.children || node.children.length <= idx) { return false; }
        node = node.children[idx];
    }
    if (!node || typeof node.focus !== 'function') { return false; }
    node.focus();
    if (typeof node.select === 'function') { node.select(); }
    return true;
})()
"#;

const CLICK_BY_PATH_TEMPLATE: &str = r#"
(() => {
    let node = document.body;
    const path = __PATH__;
    for (const idx of path) {
        if (!node || !node.children || node.children.length <= idx) { return false; }
        node = node.children[idx];
    }
    if (!node || typeof node.click !== 'function') { return false; }
    node.click();
    return true;
})()
"#;

fn path_literal(path: &[usize]) -> String {
    let parts: Vec<String> = path.iter().map(|i| i.to_string()).collect();
    format!("[{}]", parts.join(","))
}

async fn focus(page: &Page, locator: Locator<'_>) -> Result<(), ScrapeError> {
    match locator {
        Locator::Css(selector) => {
            let element = page
                .find_element(selector)
                .await
                .map_err(|_| ScrapeError::ElementNotFound(selector.to_string()))?;
            element.focus().await?;
        }
        Locator::Path(path) => {
            let script = FOCUS_BY_PATH_TEMPLATE.replace("__PATH__", &path_literal(path));
            let found = page
                .evaluate(script)
                .await?
                .into_value::<bool>()
                .unwrap_or(false);
            if !found {
                return Err(ScrapeError::ElementNotFound(format!(
                    "child path {:?}",
                    path
                )));
            }
        }
    }
    Ok(())
}

/// Draw one pause per keystroke from the closed `[min_ms, max_ms]` range.
/// Sampled up front; the rng handle is not Send and must not be held across
/// an await.
fn sample_delays(
    count: usize,
    min_ms: u64,
    max_ms: u64,
    divisor: u64,
) -> Result<Vec<u64>, ScrapeError> {
    let mut rng = rand::rng();
    let span = Uniform::new_inclusive(min_ms, max_ms.max(min_ms))
        .map_err(|e| ScrapeError::Browser(format!("keystroke delay range: {}", e)))?;
    Ok((0..count).map(|_| span.sample(&mut rng) / divisor).collect())
}

/// Focus the target element and type `text` character by character, pausing
/// a random `[min_delay_ms, max_delay_ms]` between keystrokes. Path-located
/// fields get a quarter of that pause; they sit on pages we have already
/// settled on and the full cadence just slows login down.
pub async fn type_like_human(
    page: &Page,
    locator: Locator<'_>,
    text: &str,
    min_delay_ms: u64,
    max_delay_ms: u64,
) -> Result<(), ScrapeError> {
    focus(page, locator).await?;

    let divisor = match locator {
        Locator::Css(_) => 1,
        Locator::Path(_) => 4,
    };
    let delays = sample_delays(text.chars().count(), min_delay_ms, max_delay_ms, divisor)?;

    debug!("typing {} characters", text.chars().count());
    for (ch, pause) in text.chars().zip(delays) {
        let event = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(ch.to_string())
            .build()
            .map_err(ScrapeError::Browser)?;
        page.execute(event).await?;
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
    tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS / 3)).await;
    Ok(())
}

/// Click the target element.
pub async fn click(page: &Page, locator: Locator<'_>) -> Result<(), ScrapeError> {
    match locator {
        Locator::Css(selector) => {
            let element = page
                .find_element(selector)
                .await
                .map_err(|_| ScrapeError::ElementNotFound(selector.to_string()))?;
            element.click().await?;
        }
        Locator::Path(path) => {
            let script = CLICK_BY_PATH_TEMPLATE.replace("__PATH__", &path_literal(path));
            let clicked = page
                .evaluate(script)
                .await?
                .into_value::<bool>()
                .unwrap_or(false);
            if !clicked {
                return Err(ScrapeError::ElementNotFound(format!(
                    "child path {:?}",
                    path
                )));
            }
        }
    }
    Ok(())
}

/// Send a real Enter keypress (down + up) to the focused element.
pub async fn press_enter(page: &Page) -> Result<(), ScrapeError> {
    let down = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key("Enter")
        .code("Enter")
        .text("\r")
        .windows_virtual_key_code(13)
        .native_virtual_key_code(13)
        .build()
        .map_err(ScrapeError::Browser)?;
    page.execute(down).await?;
    let up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key("Enter")
        .code("Enter")
        .windows_virtual_key_code(13)
        .native_virtual_key_code(13)
        .build()
        .map_err(ScrapeError::Browser)?;
    page.execute(up).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_literal_renders_js_array() {
        assert_eq!(path_literal(&[1, 0, 0, 1, 0]), "[1,0,0,1,0]");
        assert_eq!(path_literal(&[]), "[]");
    }

    #[test]
    fn delays_cover_the_closed_interval() {
        let delays = sample_delays(256, 3, 5, 1).unwrap();
        assert!(delays.iter().all(|d| (3..=5).contains(d)));
        // The upper bound is drawable, not just approached.
        assert!(delays.iter().any(|d| *d == 5));
    }

    #[test]
    fn coinciding_bounds_yield_constant_delay() {
        let delays = sample_delays(8, 40, 40, 4).unwrap();
        assert!(delays.iter().all(|d| *d == 10));
    }

    #[test]
    fn path_template_embeds_path() {
        let script = FOCUS_BY_PATH_TEMPLATE.replace("__PATH__", &path_literal(&[2, 3]));
        assert!(script.contains("const path = [2,3];"));
        assert!(!script.contains("__PATH__"));
    }
}
