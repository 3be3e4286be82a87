use std::time::Duration;

use crate::core::portal;

// ---------------------------------------------------------------------------
// PortalConfig: file-based config loader (portal-scout.json) with env-var
// fallback per field.
// ---------------------------------------------------------------------------

/// Browser tuning sub-config (mirrors the `browser` key in portal-scout.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct BrowserTuning {
    /// Per-step navigation / launch timeout. Default: 30 000 ms.
    pub navigation_timeout_ms: Option<u64>,
    /// Throttle delay applied after every extraction, before the page is
    /// released. Default: 1 000 ms.
    pub per_request_delay_ms: Option<u64>,
    /// Retry ceiling per operation (counted in attempts). Default: 3.
    pub max_retries: Option<u32>,
    /// Headless unless explicitly set to `false`.
    pub headless: Option<bool>,
    /// Inter-keystroke delay bounds for humanized typing. Defaults: 60–180 ms.
    pub typing_delay_min_ms: Option<u64>,
    pub typing_delay_max_ms: Option<u64>,
    /// Whether to wait for the network-idle heuristic before extraction.
    /// Default: `false`; the loading-marker wait is usually enough.
    pub wait_for_network_idle: Option<bool>,
    /// Upper bound for the network-idle wait. Default: 8 000 ms.
    pub network_idle_timeout_ms: Option<u64>,
}

impl BrowserTuning {
    fn env_u64(key: &str) -> Option<u64> {
        std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
    }

    pub fn resolve_navigation_timeout(&self) -> Duration {
        Duration::from_millis(
            self.navigation_timeout_ms
                .or_else(|| Self::env_u64("PORTAL_SCOUT_NAVIGATION_TIMEOUT_MS"))
                .unwrap_or(30_000),
        )
    }

    pub fn resolve_per_request_delay(&self) -> Duration {
        Duration::from_millis(
            self.per_request_delay_ms
                .or_else(|| Self::env_u64("PORTAL_SCOUT_PER_REQUEST_DELAY_MS"))
                .unwrap_or(1_000),
        )
    }

    pub fn resolve_max_retries(&self) -> u32 {
        self.max_retries
            .or_else(|| {
                std::env::var("PORTAL_SCOUT_MAX_RETRIES")
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
            })
            .unwrap_or(3)
            .max(1)
    }

    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        std::env::var("PORTAL_SCOUT_HEADLESS")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true)
    }

    pub fn resolve_typing_delay(&self) -> (Duration, Duration) {
        let min = self
            .typing_delay_min_ms
            .or_else(|| Self::env_u64("PORTAL_SCOUT_TYPING_DELAY_MIN_MS"))
            .unwrap_or(60);
        let max = self
            .typing_delay_max_ms
            .or_else(|| Self::env_u64("PORTAL_SCOUT_TYPING_DELAY_MAX_MS"))
            .unwrap_or(180)
            .max(min);
        (Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn resolve_wait_for_network_idle(&self) -> bool {
        if let Some(b) = self.wait_for_network_idle {
            return b;
        }
        std::env::var("PORTAL_SCOUT_WAIT_FOR_NETWORK_IDLE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }

    pub fn resolve_network_idle_timeout(&self) -> Duration {
        Duration::from_millis(
            self.network_idle_timeout_ms
                .or_else(|| Self::env_u64("PORTAL_SCOUT_NETWORK_IDLE_TIMEOUT_MS"))
                .unwrap_or(8_000),
        )
    }
}

/// Credentials sub-config. Both fields are required at startup; resolution
/// fails fast when neither the file nor the environment provides them.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Top-level config loaded from `portal-scout.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct PortalConfig {
    /// Origin of the target portal, e.g. `https://portal.example.com`.
    pub base_url: Option<String>,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub browser: BrowserTuning,
    /// Overrides the built-in blocked-origin list when present.
    pub blocked_origins: Option<Vec<String>>,
}

/// Load `portal-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `PORTAL_SCOUT_CONFIG` env var path
/// 2. `./portal-scout.json` (process cwd)
/// 3. `../portal-scout.json` (repo root when running from a subdir)
///
/// Missing file → `PortalConfig::default()` (env-var fallbacks apply).
/// Parse error → log a warning, return defaults.
pub fn load_portal_config() -> PortalConfig {
    let mut candidates = vec![
        std::path::PathBuf::from("portal-scout.json"),
        std::path::PathBuf::from("../portal-scout.json"),
    ];
    if let Ok(env_path) = std::env::var("PORTAL_SCOUT_CONFIG") {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PortalConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("portal-scout.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "portal-scout.json parse error at {}: {}; using defaults",
                        path.display(),
                        e
                    );
                    return PortalConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    PortalConfig::default()
}

// ---------------------------------------------------------------------------
// Resolved runtime settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Fully-resolved settings, produced once at startup so the hot path never
/// re-reads the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub base_url: url::Url,
    pub credentials: Credentials,
    pub navigation_timeout: Duration,
    pub per_request_delay: Duration,
    pub max_retries: u32,
    pub headless: bool,
    pub typing_delay_min: Duration,
    pub typing_delay_max: Duration,
    pub wait_for_network_idle: bool,
    pub network_idle_timeout: Duration,
    pub blocked_origins: Vec<String>,
}

impl PortalConfig {
    /// Resolve into runtime [`Settings`], failing fast on missing credentials
    /// or base URL.
    pub fn resolve(&self) -> anyhow::Result<Settings> {
        let base_url = self
            .base_url
            .clone()
            .or_else(|| std::env::var("PORTAL_BASE_URL").ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("base_url missing: set it in portal-scout.json or PORTAL_BASE_URL")
            })?;
        let base_url = url::Url::parse(base_url.trim())
            .map_err(|e| anyhow::anyhow!("base_url is not a valid URL: {}", e))?;

        let username = self
            .credentials
            .username
            .clone()
            .or_else(|| std::env::var("PORTAL_USERNAME").ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("credentials.username missing (PORTAL_USERNAME unset)"))?;
        let password = self
            .credentials
            .password
            .clone()
            .or_else(|| std::env::var("PORTAL_PASSWORD").ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("credentials.password missing (PORTAL_PASSWORD unset)"))?;

        let (typing_delay_min, typing_delay_max) = self.browser.resolve_typing_delay();
        let blocked_origins = self.blocked_origins.clone().unwrap_or_else(|| {
            portal::DEFAULT_BLOCKED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect()
        });

        Ok(Settings {
            base_url,
            credentials: Credentials { username, password },
            navigation_timeout: self.browser.resolve_navigation_timeout(),
            per_request_delay: self.browser.resolve_per_request_delay(),
            max_retries: self.browser.resolve_max_retries(),
            headless: self.browser.resolve_headless(),
            typing_delay_min,
            typing_delay_max,
            wait_for_network_idle: self.browser.resolve_wait_for_network_idle(),
            network_idle_timeout: self.browser.resolve_network_idle_timeout(),
            blocked_origins,
        })
    }
}

impl Settings {
    /// Join a portal-relative path onto the configured origin.
    pub fn portal_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `true` when `url` shares the portal's scheme and host.
    pub fn same_origin(&self, url: &str) -> bool {
        match url::Url::parse(url) {
            Ok(u) => {
                u.scheme() == self.base_url.scheme() && u.host_str() == self.base_url.host_str()
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        let cfg: PortalConfig = serde_json::from_str(
            r#"{
                "base_url": "https://portal.example.com",
                "credentials": {"username": "u", "password": "p"}
            }"#,
        )
        .unwrap();
        cfg.resolve().unwrap()
    }

    #[test]
    fn defaults_apply_when_tuning_absent() {
        let s = test_settings();
        assert_eq!(s.navigation_timeout, Duration::from_millis(30_000));
        assert_eq!(s.per_request_delay, Duration::from_millis(1_000));
        assert_eq!(s.max_retries, 3);
        assert!(s.headless);
        assert!(!s.wait_for_network_idle);
        assert!(s.typing_delay_min <= s.typing_delay_max);
        assert!(!s.blocked_origins.is_empty());
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let cfg: PortalConfig =
            serde_json::from_str(r#"{"base_url": "https://portal.example.com"}"#).unwrap();
        // Only meaningful when the env fallbacks are unset, as in CI.
        if std::env::var("PORTAL_USERNAME").is_err() {
            assert!(cfg.resolve().is_err());
        }
    }

    #[test]
    fn portal_url_joins_cleanly() {
        let s = test_settings();
        assert_eq!(s.portal_url("/search"), "https://portal.example.com/search");
        assert_eq!(s.portal_url("search"), "https://portal.example.com/search");
    }

    #[test]
    fn same_origin_guard() {
        let s = test_settings();
        assert!(s.same_origin("https://portal.example.com/page/42"));
        assert!(!s.same_origin("https://elsewhere.example.com/page"));
        assert!(!s.same_origin("http://portal.example.com/page"));
        assert!(!s.same_origin("not a url"));
    }

    #[test]
    fn typing_delay_bounds_may_coincide() {
        let cfg: PortalConfig = serde_json::from_str(
            r#"{
                "base_url": "https://portal.example.com",
                "credentials": {"username": "u", "password": "p"},
                "browser": {"typing_delay_min_ms": 50, "typing_delay_max_ms": 50}
            }"#,
        )
        .unwrap();
        let s = cfg.resolve().unwrap();
        assert_eq!(s.typing_delay_min, s.typing_delay_max);
        assert_eq!(s.typing_delay_min, Duration::from_millis(50));
    }

    #[test]
    fn tuning_overrides_parse() {
        let cfg: PortalConfig = serde_json::from_str(
            r#"{
                "base_url": "https://portal.example.com",
                "credentials": {"username": "u", "password": "p"},
                "browser": {"max_retries": 5, "headless": false, "typing_delay_min_ms": 10, "typing_delay_max_ms": 20}
            }"#,
        )
        .unwrap();
        let s = cfg.resolve().unwrap();
        assert_eq!(s.max_retries, 5);
        assert!(!s.headless);
        assert_eq!(s.typing_delay_min, Duration::from_millis(10));
        assert_eq!(s.typing_delay_max, Duration::from_millis(20));
    }
}
