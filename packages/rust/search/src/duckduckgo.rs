//! DuckDuckGo HTML search backend.
//!
//! POSTs the query to the HTML endpoint and reads result anchors in document
//! order. Redirect links (`//duckduckgo.com/l/?uddg=<encoded>`) are unwrapped
//! to their destination.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use terminalplex_shared::{Result, SearchResult, SearchSettings, TerminalplexError};

use crate::{SearchProvider, rank_urls};

/// Pause between search attempts, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Search provider backed by `html.duckduckgo.com`.
pub struct DuckDuckGoSearch {
    client: Client,
    settings: SearchSettings,
}

impl DuckDuckGoSearch {
    /// Create a provider. `user_agent` is sent with every search request.
    pub fn new(settings: SearchSettings, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| {
                TerminalplexError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, settings })
    }

    /// One search request; raw hrefs in result order.
    async fn fetch_results(&self, query: &str) -> Result<Vec<Option<String>>> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .form(&[("q", query)])
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| TerminalplexError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TerminalplexError::Search(format!(
                "DuckDuckGo HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TerminalplexError::Search(format!("body read failed: {e}")))?;

        Ok(parse_result_links(&body))
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    #[instrument(skip(self), fields(provider = "duckduckgo"))]
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let mut attempt: u32 = 0;
        loop {
            match self.fetch_results(query).await {
                Ok(raw) => {
                    let results = rank_urls(raw, max_results);
                    info!(results = results.len(), "search complete");
                    return results;
                }
                Err(e) if attempt < self.settings.retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "search failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => {
                    warn!(error = %e, "search failed, continuing without sources");
                    return Vec::new();
                }
            }
        }
    }
}

/// Extract destination URLs from a DuckDuckGo HTML results page.
///
/// Sponsored results are skipped. Entries that do not resolve to an http(s)
/// URL come back as `None`.
fn parse_result_links(body: &str) -> Vec<Option<String>> {
    let doc = Html::parse_document(body);
    let result_sel = Selector::parse(".result").unwrap();
    let link_sel = Selector::parse("a.result__a").unwrap();

    doc.select(&result_sel)
        .filter(|result| !result.value().classes().any(|c| c == "result--ad"))
        .filter_map(|result| result.select(&link_sel).next())
        .map(|link| link.value().attr("href").and_then(resolve_href))
        .collect()
}

/// Turn a result href into a destination URL.
fn resolve_href(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    let url = Url::parse(&absolute).ok()?;

    let is_redirect = url
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && url.path().starts_with("/l/");
    if is_redirect {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        return resolve_href(&target);
    }

    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="result results_links result--ad">
            <a class="result__a" href="https://duckduckgo.com/y.js?ad_domain=ads.example">Ad</a>
        </div>
        <div class="result results_links">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FQuantum_computing&amp;rut=abc">Quantum computing - Wikipedia</a>
            <a class="result__snippet">A quantum computer is ...</a>
        </div>
        <div class="result results_links">
            <a class="result__a" href="https://www.ibm.com/topics/quantum-computing">What is quantum computing? | IBM</a>
        </div>
        <div class="result results_links">
            <a class="result__a" href="">Broken</a>
        </div>
        <div class="result results_links">
            <a class="result__a" href="javascript:void(0)">Script</a>
        </div>
        <div class="result results_links">
            <a class="result__a" href="https://www.nature.com/subjects/quantum-computing">Nature</a>
        </div>
    </body></html>"#;

    fn settings(endpoint: String, retries: u32) -> SearchSettings {
        SearchSettings {
            endpoint,
            max_results: 4,
            retries,
        }
    }

    #[test]
    fn resolves_redirect_links() {
        assert_eq!(
            resolve_href("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3Dc&rut=x"),
            Some("https://example.com/a?b=c".to_string())
        );
        assert_eq!(
            resolve_href("https://example.com/page"),
            Some("https://example.com/page".to_string())
        );
        assert_eq!(resolve_href("javascript:void(0)"), None);
        assert_eq!(resolve_href("//duckduckgo.com/l/?rut=x"), None);
    }

    #[test]
    fn parses_results_in_document_order() {
        let links = parse_result_links(RESULTS_PAGE);
        assert_eq!(
            links,
            vec![
                Some("https://en.wikipedia.org/wiki/Quantum_computing".to_string()),
                Some("https://www.ibm.com/topics/quantum-computing".to_string()),
                None,
                None,
                Some("https://www.nature.com/subjects/quantum-computing".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn search_posts_query_and_ranks_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/html/"))
            .and(body_string_contains("q=quantum+computing"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(RESULTS_PAGE, "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = DuckDuckGoSearch::new(
            settings(format!("{}/html/", server.uri()), 0),
            terminalplex_shared::DEFAULT_USER_AGENT,
        )
        .unwrap();

        let results = provider.search("quantum computing", 2).await;
        assert_eq!(
            results,
            vec![
                SearchResult {
                    url: "https://en.wikipedia.org/wiki/Quantum_computing".into(),
                    rank: 0,
                },
                SearchResult {
                    url: "https://www.ibm.com/topics/quantum-computing".into(),
                    rank: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn provider_failure_yields_empty_list() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let provider = DuckDuckGoSearch::new(
            settings(format!("{}/html/", server.uri()), 0),
            terminalplex_shared::DEFAULT_USER_AGENT,
        )
        .unwrap();

        assert!(provider.search("anything", 4).await.is_empty());
    }

    #[tokio::test]
    async fn retries_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(RESULTS_PAGE, "text/html"))
            .mount(&server)
            .await;

        let provider = DuckDuckGoSearch::new(
            settings(format!("{}/html/", server.uri()), 1),
            terminalplex_shared::DEFAULT_USER_AGENT,
        )
        .unwrap();

        assert_eq!(provider.search("quantum computing", 4).await.len(), 3);
    }

    #[tokio::test]
    async fn empty_results_page_yields_empty_list() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>No results.</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let provider = DuckDuckGoSearch::new(
            settings(format!("{}/html/", server.uri()), 0),
            terminalplex_shared::DEFAULT_USER_AGENT,
        )
        .unwrap();

        assert!(provider.search("zzzz", 4).await.is_empty());
    }
}
