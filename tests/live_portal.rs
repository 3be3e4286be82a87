//! Live integration tests against a real portal deployment.
//!
//! These drive an actual browser and need PORTAL_BASE_URL, PORTAL_USERNAME
//! and PORTAL_PASSWORD (or a portal-scout.json) plus an installed Chromium.
//! Run with: cargo test --test live_portal -- --ignored --nocapture

use std::sync::Arc;

use portal_scout::browser::Session;
use portal_scout::{load_portal_config, Scout};

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn create_scout() -> Scout {
    let settings = load_portal_config()
        .resolve()
        .expect("live tests need base_url and credentials configured");
    Scout::new(settings)
}

#[tokio::test]
#[ignore]
async fn live_search_returns_sanitized_results() {
    init_logger();
    let scout = create_scout();

    let capture = scout.search("acme", false).await.expect("search failed");
    println!("search html bytes: {}", capture.html.len());
    println!("landed on: {}", capture.url);

    assert!(!capture.fetched_at.is_empty());
    // Sanitized output never carries scripts or anchors.
    assert!(!capture.html.contains("<script"));
    assert!(!capture.html.contains("<a "));
}

#[tokio::test]
#[ignore]
async fn live_interactive_search_matches_direct() {
    init_logger();
    let scout = create_scout();

    let direct = scout.search("acme", false).await.expect("direct failed");
    let interactive = scout
        .search("acme", true)
        .await
        .expect("interactive failed");
    println!(
        "direct {} bytes, interactive {} bytes",
        direct.html.len(),
        interactive.html.len()
    );
    // Same query should land on comparable result pages; exact equality is
    // too strict because of server-rendered timestamps.
    assert_eq!(direct.html.is_empty(), interactive.html.is_empty());
}

#[tokio::test]
#[ignore]
async fn live_suggest_parses_json() {
    init_logger();
    let scout = create_scout();

    let capture = scout.suggest("ac").await.expect("suggest failed");
    println!("suggest payload: {}", capture.json);
    assert!(capture.json.is_array() || capture.json.is_object());
}

#[tokio::test]
#[ignore]
async fn live_content_rejects_foreign_origin() {
    init_logger();
    let scout = create_scout();

    let err = scout
        .page_content("https://example.org/not-the-portal")
        .await
        .expect_err("foreign origin must be rejected");
    let msg = err.to_string();
    println!("rejected with: {}", msg);
    assert!(msg.contains("not allowed"));
}

#[tokio::test]
#[ignore]
async fn live_graphic_export_is_self_contained() {
    init_logger();
    let scout = create_scout();

    let page_url = std::env::var("PORTAL_GRAPHIC_URL")
        .expect("set PORTAL_GRAPHIC_URL to a portal page with a network graphic");
    let capture = scout
        .network_graphic(&page_url)
        .await
        .expect("graphic export failed");

    println!("svg bytes: {}", capture.svg.len());
    assert!(capture.svg.starts_with("<svg"));
    assert!(capture.svg.contains("xmlns"));
    // Computed styles must be inlined, not referenced.
    assert!(!capture.svg.contains("class=\""));
}

#[tokio::test]
#[ignore]
async fn live_login_runs_once_per_session() {
    init_logger();
    let settings = load_portal_config()
        .resolve()
        .expect("live tests need base_url and credentials configured");
    let session = Session::new(Arc::new(settings));
    session.initialize().await.expect("launch failed");

    let page = session.new_page().await.expect("tab failed");
    session
        .ensure_authenticated(&page)
        .await
        .expect("first login failed");
    assert!(session.is_authenticated().await);
    assert_eq!(session.login_count(), 1);

    // A second call on a live session must return without navigating.
    session
        .ensure_authenticated(&page)
        .await
        .expect("second call failed");
    assert_eq!(session.login_count(), 1);

    // Recycling resets the flag; the next login navigates again.
    session.recycle().await.expect("recycle failed");
    assert!(!session.is_authenticated().await);
    let page = session.new_page().await.expect("tab after recycle failed");
    session
        .ensure_authenticated(&page)
        .await
        .expect("relogin failed");
    assert_eq!(session.login_count(), 2);

    session.close().await;
}

#[tokio::test]
#[ignore]
async fn live_health_reports_idle_queues_after_work() {
    init_logger();
    let scout = create_scout();

    let _ = scout.search("acme", false).await;
    let report = scout.health().await;
    println!(
        "authenticated={} search queue size={}",
        report.authenticated, report.search.size
    );
    assert_eq!(report.search.size, 0);
    assert!(!report.search.processing);
}
