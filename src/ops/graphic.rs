//! Network graphic export.
//!
//! The portal renders its relationship graph as an SVG whose look comes
//! entirely from external stylesheets, so a naive `outerHTML` copy renders
//! as unstyled black shapes. The export script walks the live SVG and its
//! clone in lockstep, bakes the computed presentation styles into inline
//! attributes, inlines referenced images and fonts as data URIs, and
//! returns a self-contained document.

use std::sync::Arc;

use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use tracing::info;

use crate::browser::session::Session;
use crate::browser::wait;
use crate::core::config::Settings;
use crate::core::portal::{GRAPHIC_EDGE_GROUP, GRAPHIC_NODE_GROUP, GRAPHIC_SELECTOR};
use crate::core::types::{now_rfc3339, GraphicCapture};
use crate::error::ScrapeError;
use crate::ops::retry::{run_with_recovery, RetryPolicy};
use crate::ops::{current_url, release_page, settle_after_load};

const EXPORT_TEMPLATE: &str = r#"
(async () => {
    const PROPS = [
        'fill', 'fill-opacity', 'fill-rule',
        'stroke', 'stroke-width', 'stroke-opacity', 'stroke-dasharray',
        'stroke-dashoffset', 'stroke-linecap', 'stroke-linejoin', 'stroke-miterlimit',
        'opacity', 'font-family', 'font-size', 'font-weight', 'font-style',
        'text-anchor', 'letter-spacing', 'clip-path', 'clip-rule',
        'cursor', 'visibility', 'display',
        'marker-start', 'marker-mid', 'marker-end'
    ];

    const live = document.querySelector(__GRAPH_SELECTOR__);
    if (!live) { return ''; }
    const clone = live.cloneNode(true);
    clone.setAttribute('xmlns', 'http://www.w3.org/2000/svg');
    clone.setAttribute('xmlns:xlink', 'http://www.w3.org/1999/xlink');
    if (!clone.getAttribute('viewBox')) {
        const box = live.getBoundingClientRect();
        clone.setAttribute('width', Math.ceil(box.width));
        clone.setAttribute('height', Math.ceil(box.height));
        clone.setAttribute('viewBox', `0 0 ${Math.ceil(box.width)} ${Math.ceil(box.height)}`);
    }

    const toDataUri = async (url) => {
        const resp = await fetch(url);
        const blob = await resp.blob();
        return await new Promise((resolve, reject) => {
            const reader = new FileReader();
            reader.onload = () => resolve(reader.result);
            reader.onerror = reject;
            reader.readAsDataURL(blob);
        });
    };

    // Walk live and clone in lockstep; indices line up because cloneNode
    // preserves child order.
    const inlineStyles = (src, dst) => {
        if (src.nodeType !== Node.ELEMENT_NODE) { return; }
        if (src.tagName && src.tagName.toLowerCase() === 'defs') { return; }
        const computed = window.getComputedStyle(src);
        for (const prop of PROPS) {
            const value = computed.getPropertyValue(prop);
            if (value) { dst.setAttribute(prop, value); }
        }
        dst.removeAttribute('class');
        for (let i = 0; i < src.children.length && i < dst.children.length; i++) {
            inlineStyles(src.children[i], dst.children[i]);
        }
    };
    inlineStyles(live, clone);

    // Embedded raster images become data URIs so the file stands alone.
    for (const image of clone.querySelectorAll('image')) {
        const href = image.getAttribute('href') || image.getAttribute('xlink:href');
        if (href && !href.startsWith('data:')) {
            try {
                const uri = await toDataUri(new URL(href, location.href).href);
                image.setAttribute('href', uri);
                image.removeAttribute('xlink:href');
            } catch (_) {}
        }
    }

    // Fonts the graphic uses, inlined into a <defs><style> block.
    let fontCss = '';
    for (const sheet of document.styleSheets) {
        let rules;
        try { rules = sheet.cssRules; } catch (_) { continue; }
        if (!rules) { continue; }
        for (const rule of rules) {
            if (rule.type !== CSSRule.FONT_FACE_RULE) { continue; }
            let text = rule.cssText;
            const matches = text.match(/url\(["']?([^"')]+)["']?\)/g) || [];
            for (const m of matches) {
                const raw = m.replace(/^url\(["']?/, '').replace(/["']?\)$/, '');
                if (raw.startsWith('data:')) { continue; }
                try {
                    const uri = await toDataUri(new URL(raw, sheet.href || location.href).href);
                    text = text.replace(raw, uri);
                } catch (_) {}
            }
            fontCss += text + '\n';
        }
    }
    if (fontCss) {
        const defs = document.createElementNS('http://www.w3.org/2000/svg', 'defs');
        const style = document.createElementNS('http://www.w3.org/2000/svg', 'style');
        style.textContent = fontCss;
        defs.appendChild(style);
        clone.insertBefore(defs, clone.firstChild);
    }

    return new XMLSerializer().serializeToString(clone);
})()
"#;

fn export_script(selector: &str) -> String {
    EXPORT_TEMPLATE.replace(
        "__GRAPH_SELECTOR__",
        &serde_json::to_string(selector).unwrap_or_else(|_| "\"svg\"".into()),
    )
}

pub async fn run(
    settings: &Arc<Settings>,
    session: &Arc<Session>,
    url: &str,
) -> Result<GraphicCapture, ScrapeError> {
    if !settings.same_origin(url) {
        return Err(ScrapeError::BadUrl(format!(
            "{} is not on the configured portal origin",
            url
        )));
    }

    let policy = RetryPolicy::new(settings.max_retries);
    run_with_recovery(
        policy,
        "graphic-export",
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
) -> Result<GraphicCapture, ScrapeError> {
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
) -> Result<GraphicCapture, ScrapeError> {
    session.ensure_authenticated(page).await?;

    info!("graphic export: {}", url);
    page.goto(url).await?;
    page.wait_for_navigation().await?;
    settle_after_load(settings, page).await;

    // Unlike the HTML captures, a missing graphic is an error: the caller
    // asked for this page specifically because it carries one.
    let timeout_ms = settings.navigation_timeout.as_millis() as u64;
    wait::wait_for_selector(page, GRAPHIC_SELECTOR, timeout_ms).await?;
    wait::wait_for_graphic_ready(
        page,
        GRAPHIC_SELECTOR,
        GRAPHIC_NODE_GROUP,
        GRAPHIC_EDGE_GROUP,
        timeout_ms,
    )
    .await?;

    let params = EvaluateParams::builder()
        .expression(export_script(GRAPHIC_SELECTOR))
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(ScrapeError::Browser)?;
    let svg = page
        .evaluate(params)
        .await?
        .into_value::<String>()
        .unwrap_or_default();
    if svg.trim().is_empty() {
        return Err(ScrapeError::ExtractionEmpty(format!(
            "graphic at {} produced no SVG",
            url
        )));
    }

    Ok(GraphicCapture {
        svg,
        url: current_url(page).await,
        fetched_at: now_rfc3339(),
    })
}
