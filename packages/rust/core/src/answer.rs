//! Cited answer synthesis over a numbered context block.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, instrument};

use terminalplex_llm::{ChatCompletion, ChatRequest};
use terminalplex_shared::{ChatMessage, ContextBlock, ConversationState, Result};

use crate::observer::TurnObserver;
use crate::prompts::{ANSWER_SYSTEM, answer_prompt};

/// A finished answer and the history extended by this turn.
#[derive(Debug, Clone)]
pub struct CitedAnswer {
    pub text: String,
    pub history: ConversationState,
}

/// Streams an answer that cites the context block by number.
pub struct CitedAnswerSynthesizer {
    completion: Arc<dyn ChatCompletion>,
    max_tokens: u32,
    history_window: Option<usize>,
}

impl CitedAnswerSynthesizer {
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

    /// Stream the answer, forwarding each delta to `observer` as it arrives.
    ///
    /// History gains the user query and the full answer only once the stream
    /// has completed; any stream error fails the call and leaves `history`
    /// as it was.
    #[instrument(skip_all, fields(citations = context.len(), history = history.len()))]
    pub async fn answer(
        &self,
        query: &str,
        context: &ContextBlock,
        history: &ConversationState,
        observer: &dyn TurnObserver,
    ) -> Result<CitedAnswer> {
        let mut messages = vec![ChatMessage::system(ANSWER_SYSTEM)];
        messages.extend(history.as_messages_window(self.history_window));
        messages.push(ChatMessage::user(answer_prompt(query, &context.render())));

        let request = ChatRequest {
            messages,
            max_tokens: self.max_tokens,
        };

        let mut deltas = self.completion.complete_stream(request).await?;
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            observer.delta(&delta);
            text.push_str(&delta);
        }

        debug!(chars = text.len(), "answer complete");

        let history = history.with_user(query).with_assistant(text.clone());
        Ok(CitedAnswer { text, history })
    }
}
