//! Page fetching and plain-text extraction.
//!
//! This crate provides:
//! - [`ContentExtractor`] — the "one URL in, bounded text or nothing out" seam
//! - [`HttpExtractor`] — reqwest-backed implementation with a fixed User-Agent
//! - [`html_to_text`] / [`truncate_chars`] — markup stripping and bounding

mod cleanup;
pub mod fetcher;
pub mod text;

use async_trait::async_trait;

pub use fetcher::HttpExtractor;
pub use text::{html_to_text, truncate_chars};

/// Fetches one URL and reduces it to bounded plain text.
///
/// Implementations never fail past this boundary: every network, status or
/// parse problem becomes `None` so one bad page cannot abort a batch.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Option<String>;
}
