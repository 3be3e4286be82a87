//! Browser layer: process launch, session lifecycle, humanized input,
//! request filtering, and page-readiness waits.

pub mod input;
pub mod launch;
pub mod netfilter;
pub mod session;
pub mod wait;

pub use session::Session;
