//! Client for OpenAI-compatible `/chat/completions` endpoints.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use terminalplex_shared::{ChatMessage, LlmSettings, Result, TerminalplexError};

use crate::sse::{self, SseEvent};
use crate::{ChatCompletion, ChatRequest, DeltaStream};

/// Longest error body excerpt kept in a [`TerminalplexError::Completion`].
const ERROR_BODY_PREVIEW: usize = 300;

/// Chat-completion client for OpenAI-compatible APIs (OpenAI, Groq,
/// OpenRouter, Ollama, vLLM, ...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    /// Build a client from runtime LLM settings.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                TerminalplexError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// POST the request and fail on any non-2xx status.
    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let body = ChatCompletionsRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            stream,
        };

        let mut rb = self.client.post(self.endpoint_chat_completions()).json(&body);
        if let Some(key) = &self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| TerminalplexError::completion(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(TerminalplexError::completion_status(
                status.as_u16(),
                format!("chat.completions HTTP {status}: {}", detail.trim()),
            ));
        }

        Ok(resp)
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompatClient {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let resp = self.send(&request, false).await?;

        let parsed: ChatCompletionsResponse = resp.json().await.map_err(|e| {
            TerminalplexError::completion(format!("malformed completion response: {e}"))
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            TerminalplexError::completion("completion response contained no choices")
        })?;

        let content = choice.message.content.unwrap_or_default();
        debug!(chars = content.len(), "completion received");
        Ok(content)
    }

    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete_stream(&self, request: ChatRequest) -> Result<DeltaStream> {
        let resp = self.send(&request, true).await?;

        // A close before `[DONE]` is only clean once a choice has finished.
        let mut finished = false;
        let deltas = sse::events(Box::pin(resp.bytes_stream())).filter_map(move |event| {
            let item = match event {
                Ok(SseEvent::Data(data)) => match parse_chunk(&data) {
                    Ok(chunk) => {
                        finished |= chunk.finished;
                        chunk.content.map(Ok)
                    }
                    Err(e) => Some(Err(e)),
                },
                Ok(SseEvent::Closed) if finished => None,
                Ok(SseEvent::Closed) => Some(Err(TerminalplexError::completion(
                    "stream closed before the completion finished",
                ))),
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(item)
        });

        Ok(deltas.boxed())
    }
}

/// What one streamed chunk carried.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedChunk {
    content: Option<String>,
    finished: bool,
}

/// Content delta and finish flag of one streamed chunk.
///
/// A chunk that is not valid JSON, or that carries an `error` object, fails
/// the stream.
fn parse_chunk(data: &str) -> Result<ParsedChunk> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
        let preview: String = data.chars().take(100).collect();
        warn!(error = %e, data_preview = %preview, "malformed stream chunk");
        TerminalplexError::completion(format!("malformed stream chunk: {e}"))
    })?;

    if let Some(err) = chunk.error {
        return Err(TerminalplexError::completion(format!(
            "stream error: {}",
            err.message
        )));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(ParsedChunk::default());
    };

    Ok(ParsedChunk {
        content: choice.delta.content.filter(|content| !content.is_empty()),
        finished: choice.finish_reason.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}
