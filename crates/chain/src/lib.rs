//! Conversational retrieval chain for PaperChat.
//!
//! [`ChainOrchestrator`] runs a chat turn through the
//! [`QueryReformulator`], [`Retriever`] and [`AnswerSynthesizer`], then
//! persists the turn to conversation memory.

pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod reformulator;
pub mod retriever;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use generator::Generator;
pub use orchestrator::{ChainOrchestrator, ChatRequest, TurnOutcome, TurnStage};
pub use reformulator::QueryReformulator;
pub use retriever::Retriever;
pub use synthesizer::AnswerSynthesizer;
