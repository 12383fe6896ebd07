//! Context assembly: concurrent extraction, failure filtering, numbering.
//!
//! Every candidate is fetched concurrently (bounded by a semaphore). Each
//! outcome carries the index of the candidate it came from, so the order in
//! which fetches finish never affects which citation number a page gets.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use terminalplex_extract::ContentExtractor;
use terminalplex_shared::{ContextBlock, ExtractedPage, SearchResult};

/// Builds the citation-numbered context block for one turn.
pub struct ContextAssembler {
    extractor: Arc<dyn ContentExtractor>,
    concurrency: usize,
}

impl ContextAssembler {
    /// `concurrency` caps simultaneous extractions (clamped to at least 1).
    pub fn new(extractor: Arc<dyn ContentExtractor>, concurrency: usize) -> Self {
        Self {
            extractor,
            concurrency: concurrency.max(1),
        }
    }

    /// Extract all candidates and number the survivors `1..=k` in rank order.
    ///
    /// Failed extractions are dropped without leaving a gap. An all-failed
    /// (or empty) candidate list yields an empty block.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn assemble(&self, candidates: &[SearchResult]) -> ContextBlock {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        // Dropping the set aborts any fetch still running.
        let mut tasks = JoinSet::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let extractor = Arc::clone(&self.extractor);
            let sem = Arc::clone(&semaphore);
            let url = candidate.url.clone();

            tasks.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return (index, None);
                };
                (index, extractor.extract(&url).await)
            });
        }

        let mut pages = Vec::with_capacity(candidates.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(text))) => {
                    let candidate = &candidates[index];
                    pages.push(ExtractedPage {
                        url: candidate.url.clone(),
                        text,
                        source_rank: candidate.rank,
                    });
                }
                Ok((index, None)) => {
                    let candidate = &candidates[index];
                    debug!(url = %candidate.url, rank = candidate.rank, "no text, skipping");
                }
                Err(e) => {
                    warn!(error = %e, "extraction task failed");
                }
            }
        }

        let context = ContextBlock::from_pages(pages);

        info!(
            citations = context.len(),
            dropped = candidates.len() - context.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "context assembled"
        );

        context
    }
}
