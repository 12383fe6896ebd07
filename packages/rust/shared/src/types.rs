//! Core domain types: conversation history, search candidates, citations.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `{role, content}` message as sent to the chat-completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One recorded turn of the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered, append-only conversation history.
///
/// Every `with_*` call returns a new state containing all prior turns plus
/// the new one; existing turns are never mutated or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
}

impl ConversationState {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// New state with a user turn appended.
    pub fn with_user(&self, content: impl Into<String>) -> Self {
        self.with_turn(Role::User, content.into())
    }

    /// New state with an assistant turn appended.
    pub fn with_assistant(&self, content: impl Into<String>) -> Self {
        self.with_turn(Role::Assistant, content.into())
    }

    fn with_turn(&self, role: Role, content: String) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(ConversationTurn { role, content });
        Self { turns }
    }

    /// All turns, oldest first, as request messages.
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        self.as_messages_window(None)
    }

    /// At most the `window` most recent turns (all of them when `None`),
    /// oldest first.
    ///
    /// The window never opens on an assistant turn whose question fell
    /// outside it, so an odd `window` may yield one turn fewer.
    pub fn as_messages_window(&self, window: Option<usize>) -> Vec<ChatMessage> {
        let mut skip = window
            .map(|w| self.turns.len().saturating_sub(w))
            .unwrap_or(0);
        if skip > 0 && self.turns.get(skip).is_some_and(|t| t.role == Role::Assistant) {
            skip += 1;
        }
        self.turns[skip..]
            .iter()
            .map(|t| ChatMessage {
                role: t.role,
                content: t.content.clone(),
            })
            .collect()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// A candidate URL returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    /// 0-based position in the provider's result order.
    pub rank: usize,
}

/// Plain text extracted from one candidate page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub url: String,
    pub text: String,
    pub source_rank: usize,
}

/// A numbered, source-attributed excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// 1-based citation number referenced as `[n]` in the answer.
    pub number: usize,
    pub url: String,
    pub text: String,
}

/// The citations assembled for one turn.
///
/// Numbers always form the contiguous run `1..=len()` in rank order of the
/// pages that survived extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextBlock {
    citations: Vec<Citation>,
}

impl ContextBlock {
    /// Number surviving pages `1..=k` by ascending source rank.
    pub fn from_pages(mut pages: Vec<ExtractedPage>) -> Self {
        pages.sort_by_key(|p| p.source_rank);
        let citations = pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| Citation {
                number: i + 1,
                url: page.url,
                text: page.text,
            })
            .collect();
        Self { citations }
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn into_citations(self) -> Vec<Citation> {
        self.citations
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// `(number, url)` pairs for a sources listing.
    pub fn sources(&self) -> Vec<(usize, &str)> {
        self.citations
            .iter()
            .map(|c| (c.number, c.url.as_str()))
            .collect()
    }

    /// Grounding text: one `/n/. /url/ /text/` entry per citation.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, c) in self.citations.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            let _ = write!(out, "/{}/. /{}/ /{}/", c.number, c.url, c.text);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, rank: usize) -> ExtractedPage {
        ExtractedPage {
            url: url.into(),
            text: format!("text of {url}"),
            source_rank: rank,
        }
    }

    #[test]
    fn state_is_append_only() {
        let empty = ConversationState::new();
        let one = empty.with_user("Q1");
        let two = one.with_assistant("R1");

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert_eq!(
            two.as_messages(),
            vec![ChatMessage::user("Q1"), ChatMessage::assistant("R1")]
        );
        // Earlier snapshots are unaffected.
        assert_eq!(one.as_messages(), vec![ChatMessage::user("Q1")]);
    }

    #[test]
    fn window_keeps_most_recent_turns() {
        let state = ConversationState::new()
            .with_user("Q1")
            .with_assistant("R1")
            .with_user("Q2")
            .with_assistant("R2");

        let recent = state.as_messages_window(Some(2));
        assert_eq!(
            recent,
            vec![ChatMessage::user("Q2"), ChatMessage::assistant("R2")]
        );
        assert_eq!(state.as_messages_window(Some(10)).len(), 4);
        assert_eq!(state.as_messages_window(Some(0)).len(), 0);
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn odd_window_starts_on_a_user_turn() {
        let state = ConversationState::new()
            .with_user("Q1")
            .with_assistant("R1")
            .with_user("Q2")
            .with_assistant("R2");

        assert_eq!(
            state.as_messages_window(Some(3)),
            vec![ChatMessage::user("Q2"), ChatMessage::assistant("R2")]
        );
        assert!(state.as_messages_window(Some(1)).is_empty());

        let pending = state.with_user("Q3");
        assert_eq!(
            pending.as_messages_window(Some(3)),
            vec![
                ChatMessage::user("Q2"),
                ChatMessage::assistant("R2"),
                ChatMessage::user("Q3")
            ]
        );
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).expect("serialize");
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn context_block_numbers_by_rank() {
        let block = ContextBlock::from_pages(vec![page("d", 3), page("a", 0), page("b", 1)]);

        let numbered: Vec<(usize, &str)> = block.sources();
        assert_eq!(numbered, vec![(1, "a"), (2, "b"), (3, "d")]);
    }

    #[test]
    fn context_block_render() {
        let block = ContextBlock::from_pages(vec![page("https://a.example", 0)]);
        assert_eq!(
            block.render(),
            "/1/. /https://a.example/ /text of https://a.example/"
        );
        assert_eq!(ContextBlock::default().render(), "");
    }
}
