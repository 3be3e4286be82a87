use thiserror::Error;

/// Failure kinds surfaced by the scrape pipeline.
///
/// Every operation catches exactly one of these at its boundary; the retry
/// driver recycles the session and re-runs the attempt until the configured
/// ceiling, after which the last error reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("portal rejected the login: {0}")]
    Authentication(String),

    #[error("timed out waiting for {0}")]
    NavigationTimeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("expected content missing: {0}")]
    ExtractionEmpty(String),

    #[error("url not allowed: {0}")]
    BadUrl(String),

    #[error("browser error: {0}")]
    Browser(String),
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser(e.to_string())
    }
}
