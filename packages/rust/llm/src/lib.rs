//! Chat-completion service client.
//!
//! This crate provides:
//! - [`ChatCompletion`] — the completion-service seam (non-streaming + streaming)
//! - [`OpenAiCompatClient`] — client for any OpenAI-compatible `/chat/completions` API
//! - [`sse`] — Server-Sent Events line parsing for streamed responses

pub mod client;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

use terminalplex_shared::{ChatMessage, Result};

pub use client::OpenAiCompatClient;

/// Ordered incremental content deltas of one streamed completion.
pub type DeltaStream = BoxStream<'static, Result<String>>;

/// One chat-completion request. The model identifier belongs to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// A chat-completion service.
///
/// Concatenating every delta of [`complete_stream`](Self::complete_stream)
/// must reproduce what [`complete`](Self::complete) returns for the same
/// request.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Content of the first completion choice.
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Stream the first choice's content as it is generated.
    async fn complete_stream(&self, request: ChatRequest) -> Result<DeltaStream>;
}
