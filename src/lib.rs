//! portal-scout: authenticated browser-based capture service for a single
//! web portal.
//!
//! One stealth-configured browser session serves four operation categories
//! (search, suggest, page content, graphic export), each behind its own
//! FIFO queue so same-category work never overlaps. Captured HTML passes
//! through a pure sanitization transform; graphics come back as
//! self-contained SVG.

pub mod browser;
pub mod core;
pub mod error;
pub mod http;
pub mod ops;
pub mod queue;
pub mod sanitize;

pub use crate::core::config::{load_portal_config, PortalConfig, Settings};
pub use crate::core::types::{GraphicCapture, HealthReport, HtmlCapture, SuggestCapture};
pub use crate::error::ScrapeError;
pub use crate::ops::Scout;
