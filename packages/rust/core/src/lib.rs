//! Retrieval-augmented answering loop for Terminalplex.
//!
//! This crate ties together search, extraction and chat completion into one
//! conversational turn: reformulate the query against history, search, fetch
//! and number the surviving pages, then stream a cited answer.

pub mod answer;
pub mod assembler;
pub mod observer;
pub mod pipeline;
pub mod prompts;
pub mod reformulate;

#[cfg(test)]
pub(crate) mod testing;

pub use answer::{CitedAnswer, CitedAnswerSynthesizer};
pub use assembler::ContextAssembler;
pub use observer::{SilentObserver, TurnObserver};
pub use pipeline::{AnswerPipeline, PipelineOptions, Session, TurnOutcome};
pub use reformulate::QueryReformulator;
