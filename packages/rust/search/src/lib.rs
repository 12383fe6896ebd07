//! Web search: turns a query into an ordered list of candidate URLs.
//!
//! This crate provides:
//! - [`SearchProvider`] — the provider seam (inject fakes in tests)
//! - [`DuckDuckGoSearch`] — scrapes the DuckDuckGo HTML endpoint
//! - [`rank_urls`] — filters raw provider output into ranked [`SearchResult`]s

pub mod duckduckgo;

use async_trait::async_trait;

use terminalplex_shared::SearchResult;

pub use duckduckgo::DuckDuckGoSearch;

/// Issues a search query and returns candidate URLs in relevance order.
///
/// Retrieval failure is not fatal to a turn, so implementations return an
/// empty list instead of an error when the provider fails.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for tracing.
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult>;
}

/// Drop missing/blank/duplicate entries, keep provider order, cap at
/// `max_results` and assign 0-based ranks.
pub fn rank_urls<I>(raw: I, max_results: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut seen: Vec<String> = Vec::new();
    for url in raw.into_iter().flatten() {
        if seen.len() >= max_results {
            break;
        }
        let url = url.trim();
        if url.is_empty() || seen.iter().any(|s| s == url) {
            continue;
        }
        seen.push(url.to_string());
    }

    seen.into_iter()
        .enumerate()
        .map(|(rank, url)| SearchResult { url, rank })
        .collect()
}
