//! Shared types, error model, and configuration for Terminalplex.
//!
//! This crate is the foundation depended on by all other Terminalplex crates.
//! It provides:
//! - [`TerminalplexError`] — the unified error type
//! - Domain types ([`ConversationState`], [`SearchResult`], [`ContextBlock`], [`Citation`])
//! - Configuration ([`AppConfig`], runtime settings, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_USER_AGENT, FetchConfig, FetchSettings, HistoryConfig, LlmConfig,
    LlmSettings, SearchConfig, SearchSettings, apply_env_overrides, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{Result, TerminalplexError};
pub use types::{
    ChatMessage, Citation, ContextBlock, ConversationState, ConversationTurn, ExtractedPage, Role,
    SearchResult,
};
