//! In-memory fakes for the search, extraction and completion seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use terminalplex_extract::ContentExtractor;
use terminalplex_llm::{ChatCompletion, ChatRequest, DeltaStream};
use terminalplex_search::{SearchProvider, rank_urls};
use terminalplex_shared::{ContextBlock, Result, SearchResult, TerminalplexError};

use crate::observer::TurnObserver;

/// Ranked candidates in the given order.
pub fn candidates(urls: &[&str]) -> Vec<SearchResult> {
    rank_urls(urls.iter().map(|u| Some(u.to_string())), urls.len())
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeExtractor {
    pages: HashMap<String, (u64, Option<String>)>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `url` to resolve after `delay_ms` with `text` (`None` = failure).
    pub fn page(mut self, url: &str, delay_ms: u64, text: Option<&str>) -> Self {
        self.pages
            .insert(url.to_string(), (delay_ms, text.map(str::to_string)));
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Extractions that ran to the end.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract(&self, url: &str) -> Option<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let (delay_ms, text) = self.pages.get(url).cloned().unwrap_or((0, None));
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        text
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub struct FakeSearch {
    urls: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        self.queries.lock().unwrap().push(query.to_string());
        rank_urls(self.urls.iter().cloned().map(Some), max_results)
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Scripted completion service.
///
/// Non-streaming calls return `search_query` (reformulation); streaming calls
/// return the next scripted answer, split into 5-char deltas.
#[derive(Default)]
pub struct FakeCompletion {
    search_query: String,
    answers: Mutex<Vec<String>>,
    fail_complete: bool,
    fail_stream_after: Option<usize>,
    requests: Mutex<Vec<(ChatRequest, bool)>>,
}

impl FakeCompletion {
    pub fn new(search_query: &str, answers: &[&str]) -> Self {
        Self {
            search_query: search_query.to_string(),
            answers: Mutex::new(answers.iter().rev().map(|a| a.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    /// Inject a transport error after `deltas` successful deltas.
    pub fn failing_stream_after(mut self, deltas: usize) -> Self {
        self.fail_stream_after = Some(deltas);
        self
    }

    /// Every request seen, with `true` for streaming calls.
    pub fn requests(&self) -> Vec<(ChatRequest, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for FakeCompletion {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push((request, false));
        if self.fail_complete {
            return Err(TerminalplexError::completion_status(503, "unavailable"));
        }
        Ok(format!("  {}\n", self.search_query))
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<DeltaStream> {
        self.requests.lock().unwrap().push((request, true));
        let answer = self.answers.lock().unwrap().pop().unwrap_or_default();

        let chars: Vec<char> = answer.chars().collect();
        let mut items: Vec<Result<String>> = chars
            .chunks(5)
            .map(|c| Ok(c.iter().collect::<String>()))
            .collect();
        if let Some(after) = self.fail_stream_after {
            items.truncate(after);
            items.push(Err(TerminalplexError::completion("stream read failed: reset")));
        }

        Ok(futures::stream::iter(items).boxed())
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Records every callback as a `kind:payload` string.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn streamed(&self) -> String {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("delta:"))
            .collect()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl TurnObserver for RecordingObserver {
    fn phase(&self, name: &str) {
        self.push(format!("phase:{name}"));
    }

    fn search_query(&self, query: &str) {
        self.push(format!("query:{query}"));
    }

    fn sources(&self, context: &ContextBlock) {
        let listing: Vec<String> = context
            .sources()
            .iter()
            .map(|(n, url)| format!("{n}={url}"))
            .collect();
        self.push(format!("sources:{}", listing.join(",")));
    }

    fn delta(&self, text: &str) {
        self.push(format!("delta:{text}"));
    }
}
