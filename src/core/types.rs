use serde::Serialize;

/// Sanitized markup captured from a live page (search results or page
/// content). `html` may be empty when the expected subtree was absent;
/// an empty result is a valid outcome on HTML paths.
#[derive(Debug, Clone, Serialize)]
pub struct HtmlCapture {
    pub html: String,
    pub url: String,
    pub fetched_at: String,
}

/// Parsed autocomplete payload.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestCapture {
    pub json: serde_json::Value,
    pub url: String,
    pub fetched_at: String,
}

/// Self-contained vector-graphic fragment, renderable without the portal's
/// stylesheets.
#[derive(Debug, Clone, Serialize)]
pub struct GraphicCapture {
    pub svg: String,
    pub url: String,
    pub fetched_at: String,
}

/// Point-in-time observation of one category queue.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub size: usize,
    pub processing: bool,
}

/// Liveness snapshot served on `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub search: QueueStats,
    pub suggest: QueueStats,
    pub content: QueueStats,
    pub graphic: QueueStats,
    pub authenticated: bool,
}

/// RFC 3339 capture timestamp shared by all result objects.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
