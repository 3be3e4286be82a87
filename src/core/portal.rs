//! Fixed page structure of the target portal.
//!
//! This crate is not a general crawler: every selector, path and marker below
//! encodes the one site it drives. When the portal ships a layout change,
//! this is the only module that should need touching.

/// Login form lives here, relative to the configured base URL.
pub const LOGIN_PATH: &str = "/login";

/// Query-encoded search results page.
pub const SEARCH_PATH: &str = "/search";

/// Autocomplete endpoint returning a JSON payload.
pub const SUGGEST_PATH: &str = "/suggest.json";

/// Query parameter name shared by search and suggest.
pub const QUERY_PARAM: &str = "query";

/// Structural child-index paths from `<body>` to the credential fields.
///
/// The portal randomizes classes and ids on the login form, so the fields
/// are located positionally instead of by name.
pub const USERNAME_FIELD_PATH: &[usize] = &[1, 0, 0, 1, 0];
pub const PASSWORD_FIELD_PATH: &[usize] = &[1, 0, 0, 1, 1];

/// Submit button inside the login form.
pub const LOGIN_SUBMIT_SELECTOR: &str = "form button[type=submit]";

/// Visible error indicator the portal renders after a rejected login.
pub const LOGIN_ERROR_SELECTOR: &str = ".alert-danger, .login-error";

/// Search box used by the interactive (type-and-submit) search variant.
pub const SEARCH_BOX_SELECTOR: &str = "input[type=search], input[name=query]";

/// Text marker the portal shows while result panes hydrate.
pub const LOADING_MARKER: &str = "Loading";

/// Container holding the search result list.
pub const RESULTS_SELECTOR: &str = "#results, main .results";

/// Main content container on detail pages.
pub const CONTENT_SELECTOR: &str = "main article, #content";

/// The labeled network-graphic element and its node/edge groups.
pub const GRAPHIC_SELECTOR: &str = "svg[aria-label=network], svg.network-graph";
pub const GRAPHIC_NODE_GROUP: &str = "g.nodes";
pub const GRAPHIC_EDGE_GROUP: &str = "g.edges";

/// Bounded wait for the loading marker to disappear; extraction proceeds
/// regardless once this expires.
pub const LOADING_WAIT_MS: u64 = 5_000;

/// Fixed settle delay applied after a readiness wait, before extraction.
pub const SETTLE_DELAY_MS: u64 = 750;

/// Third-party analytics / bot-detection beacons aborted by the network
/// filter. Matched as substrings against outgoing request hosts.
pub const DEFAULT_BLOCKED_ORIGINS: &[&str] = &[
    "datadome.co",
    "google-analytics.com",
    "analytics.google.com",
    "googletagmanager.com",
    "bat.bing.com",
    "hotjar.com",
];
