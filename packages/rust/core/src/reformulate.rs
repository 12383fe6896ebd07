//! Query reformulation: rewrite the user's query as a standalone search query.

use std::sync::Arc;

use tracing::{debug, instrument};

use terminalplex_llm::{ChatCompletion, ChatRequest};
use terminalplex_shared::{ChatMessage, ConversationState, Result};

use crate::prompts::{REFORMULATE_SYSTEM, reformulate_prompt};

/// Rewrites a (possibly context-dependent) query into a search query,
/// resolving references like "it" against the conversation history.
pub struct QueryReformulator {
    completion: Arc<dyn ChatCompletion>,
    max_tokens: u32,
    history_window: Option<usize>,
}

impl QueryReformulator {
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        max_tokens: u32,
        history_window: Option<usize>,
    ) -> Self {
        Self {
            completion,
            max_tokens,
            history_window,
        }
    }

    /// One non-streaming completion; the first choice, trimmed.
    ///
    /// The history is read, never modified.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn reformulate(&self, query: &str, history: &ConversationState) -> Result<String> {
        let request = ChatRequest {
            messages: self.messages(query, history),
            max_tokens: self.max_tokens,
        };

        let raw = self.completion.complete(request).await?;
        let search_query = raw.trim().to_string();

        debug!(%search_query, "query reformulated");
        Ok(search_query)
    }

    fn messages(&self, query: &str, history: &ConversationState) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(REFORMULATE_SYSTEM)];
        messages.extend(history.as_messages_window(self.history_window));
        messages.push(ChatMessage::user(reformulate_prompt(query)));
        messages
    }
}
