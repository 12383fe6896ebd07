//! HTTP-backed [`ContentExtractor`].
//!
//! One GET per URL with a fixed browser User-Agent, HTML reduced to plain
//! text and truncated to `max_chars`. Every failure is logged and mapped to
//! `None`.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use terminalplex_shared::{FetchSettings, Result, TerminalplexError};

use crate::ContentExtractor;
use crate::text::{html_to_text, truncate_chars};

/// Outcome of a single fetch attempt that did not produce text.
enum AttemptError {
    /// Worth another attempt (transport error, 429, 5xx).
    Transient(TerminalplexError),
    /// Retrying cannot help (4xx, unusable body).
    Permanent(TerminalplexError),
}

/// Fetches pages over HTTP and extracts their text.
pub struct HttpExtractor {
    client: Client,
    settings: FetchSettings,
}

impl HttpExtractor {
    /// Create an extractor with the given fetch settings.
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                TerminalplexError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, settings })
    }

    /// Fetch and extract with up to `settings.retries` extra attempts on
    /// transient failures.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| TerminalplexError::parse(format!("invalid URL '{url}': {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(TerminalplexError::parse(format!(
                "unsupported scheme '{}' in {url}",
                parsed.scheme()
            )));
        }

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(&parsed).await {
                Ok(text) => return Ok(text),
                Err(AttemptError::Transient(e)) if attempt < self.settings.retries => {
                    attempt += 1;
                    debug!(%url, attempt, error = %e, "transient fetch failure, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(AttemptError::Transient(e)) | Err(AttemptError::Permanent(e)) => {
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<String, AttemptError> {
        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            AttemptError::Transient(TerminalplexError::Network(format!("{url}: {e}")))
        })?;

        let status = response.status();
        if !status.is_success() {
            let err = TerminalplexError::Network(format!("{url}: HTTP {status}"));
            return Err(if is_transient_status(status) {
                AttemptError::Transient(err)
            } else {
                AttemptError::Permanent(err)
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        let kind = match content_type.as_deref() {
            None => BodyKind::Html,
            Some(ct) => body_kind(ct).ok_or_else(|| {
                AttemptError::Permanent(TerminalplexError::parse(format!(
                    "{url}: unsupported content type '{ct}'"
                )))
            })?,
        };

        let max_bytes = self.settings.max_body_bytes;
        if let Some(len) = response.content_length() {
            if len > max_bytes as u64 {
                return Err(AttemptError::Permanent(TerminalplexError::validation(
                    format!("{url}: response too large ({len} bytes, max {max_bytes})"),
                )));
            }
        }

        let bytes = read_capped(response.bytes_stream(), max_bytes)
            .await
            .map_err(|e| {
                AttemptError::Transient(TerminalplexError::Network(format!(
                    "{url}: body read failed: {e}"
                )))
            })?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        let text = match kind {
            BodyKind::Html => html_to_text(&body),
            BodyKind::Plain => body,
        };

        Ok(truncate_chars(&text, self.settings.max_chars).to_string())
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Option<String> {
        match self.fetch_text(url).await {
            Ok(text) => {
                debug!(chars = text.chars().count(), "page extracted");
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "extraction failed, dropping page");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Html,
    Plain,
}

/// Classify a (lowercased) content type; `None` means not text.
fn body_kind(content_type: &str) -> Option<BodyKind> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "text/html" | "application/xhtml+xml" | "" => Some(BodyKind::Html),
        "text/plain" | "text/markdown" => Some(BodyKind::Plain),
        m if m.starts_with("text/") || m.ends_with("+xml") || m == "application/xml" => {
            Some(BodyKind::Html)
        }
        _ => None,
    }
}

/// Collect at most `max_bytes` from a body stream, stopping early once the
/// cap is reached.
async fn read_capped<S, B, E>(mut stream: S, max_bytes: usize) -> std::result::Result<Vec<u8>, E>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        if bytes.len().saturating_add(chunk.len()) > max_bytes {
            let can_take = max_bytes.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..can_take]);
            debug!(max_bytes, "body cut off at size cap");
            break;
        }
        bytes.extend_from_slice(chunk);
    }
    Ok(bytes)
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
