//! Progress callbacks for a running turn.

use terminalplex_shared::ContextBlock;

/// Receives progress from a turn as it runs.
pub trait TurnObserver: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called with the reformulated search query.
    fn search_query(&self, query: &str);
    /// Called once the context block is numbered, before the answer starts.
    fn sources(&self, context: &ContextBlock);
    /// Called for every streamed answer delta, in arrival order.
    fn delta(&self, text: &str);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl TurnObserver for SilentObserver {
    fn phase(&self, _name: &str) {}
    fn search_query(&self, _query: &str) {}
    fn sources(&self, _context: &ContextBlock) {}
    fn delta(&self, _text: &str) {}
}
