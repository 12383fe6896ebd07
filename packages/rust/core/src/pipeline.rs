//! One conversational turn end to end, and a session that owns history.
//!
//! A turn runs reformulate → search → assemble → answer. History is only
//! extended when the whole turn succeeds.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use terminalplex_extract::{ContentExtractor, HttpExtractor};
use terminalplex_llm::{ChatCompletion, OpenAiCompatClient};
use terminalplex_search::{DuckDuckGoSearch, SearchProvider};
use terminalplex_shared::{
    AppConfig, Citation, ConversationState, FetchSettings, LlmSettings, Result, SearchSettings,
    TerminalplexError,
};

use crate::answer::CitedAnswerSynthesizer;
use crate::assembler::ContextAssembler;
use crate::observer::TurnObserver;
use crate::reformulate::QueryReformulator;

/// Tunables for a pipeline, derived from runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_results: usize,
    pub concurrency: usize,
    pub reformulate_max_tokens: u32,
    pub answer_max_tokens: u32,
    pub history_window: Option<usize>,
}

impl PipelineOptions {
    pub fn from_settings(llm: &LlmSettings, search: &SearchSettings, fetch: &FetchSettings) -> Self {
        Self {
            max_results: search.max_results,
            concurrency: fetch.concurrency,
            reformulate_max_tokens: llm.reformulate_max_tokens,
            answer_max_tokens: llm.max_tokens,
            history_window: llm.history_window,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let config = AppConfig::default();
        Self::from_settings(
            &LlmSettings::from(&config),
            &SearchSettings::from(&config),
            &FetchSettings::from(&config),
        )
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub search_query: String,
    pub citations: Vec<Citation>,
    pub answer: String,
    /// Prior history plus this turn's user query and answer.
    pub history: ConversationState,
}

/// The retrieval-augmented answering loop.
pub struct AnswerPipeline {
    search: Arc<dyn SearchProvider>,
    reformulator: QueryReformulator,
    assembler: ContextAssembler,
    synthesizer: CitedAnswerSynthesizer,
    max_results: usize,
}

impl AnswerPipeline {
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        search: Arc<dyn SearchProvider>,
        extractor: Arc<dyn ContentExtractor>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            search,
            reformulator: QueryReformulator::new(
                Arc::clone(&completion),
                options.reformulate_max_tokens,
                options.history_window,
            ),
            assembler: ContextAssembler::new(extractor, options.concurrency),
            synthesizer: CitedAnswerSynthesizer::new(
                completion,
                options.answer_max_tokens,
                options.history_window,
            ),
            max_results: options.max_results,
        }
    }

    /// Wire the HTTP-backed components from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = LlmSettings::from(config);
        let search = SearchSettings::from(config);
        let fetch = FetchSettings::from(config);
        let options = PipelineOptions::from_settings(&llm, &search, &fetch);

        let completion = OpenAiCompatClient::new(&llm)?;
        let provider = DuckDuckGoSearch::new(search, &fetch.user_agent)?;
        let extractor = HttpExtractor::new(fetch)?;

        info!(model = completion.model(), provider = provider.name(), "pipeline ready");

        Ok(Self::new(
            Arc::new(completion),
            Arc::new(provider),
            Arc::new(extractor),
            options,
        ))
    }

    /// Run one turn against `history`, which is left untouched.
    ///
    /// Search and extraction failures degrade to fewer (or zero) citations;
    /// completion failures fail the turn.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn run_turn(
        &self,
        query: &str,
        history: &ConversationState,
        observer: &dyn TurnObserver,
    ) -> Result<TurnOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TerminalplexError::validation("query must not be empty"));
        }

        let start = Instant::now();

        observer.phase("reformulating");
        let search_query = self.reformulator.reformulate(query, history).await?;
        observer.search_query(&search_query);

        observer.phase("searching");
        let candidates = self.search.search(&search_query, self.max_results).await;

        observer.phase("reading sources");
        let context = self.assembler.assemble(&candidates).await;
        observer.sources(&context);

        observer.phase("answering");
        let answer = self
            .synthesizer
            .answer(query, &context, history, observer)
            .await?;

        info!(
            candidates = candidates.len(),
            citations = context.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "turn complete"
        );

        Ok(TurnOutcome {
            search_query,
            citations: context.into_citations(),
            answer: answer.text,
            history: answer.history,
        })
    }
}

/// A conversation: a pipeline plus the history it accumulates.
pub struct Session {
    pipeline: AnswerPipeline,
    history: ConversationState,
}

impl Session {
    pub fn new(pipeline: AnswerPipeline) -> Self {
        Self {
            pipeline,
            history: ConversationState::new(),
        }
    }

    /// Run a turn; on success the session adopts the extended history.
    pub async fn ask(&mut self, query: &str, observer: &dyn TurnObserver) -> Result<TurnOutcome> {
        let outcome = self.pipeline.run_turn(query, &self.history, observer).await?;
        self.history = outcome.history.clone();
        Ok(outcome)
    }

    /// Start over with an empty history.
    pub fn reset(&mut self) {
        self.history = ConversationState::new();
    }

    pub fn history(&self) -> &ConversationState {
        &self.history
    }
}
