//! Answer Synthesizer.

use std::sync::Arc;

use paperchat_core::{GenerationError, Message, ScoredChunk};

use crate::generator::Generator;
use crate::prompts;

/// Produces the final answer from retrieved chunks, the standalone query
/// and the conversation so far. All chunks it is given go into the prompt.
pub struct AnswerSynthesizer {
    generator: Arc<Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self { generator }
    }

    pub async fn synthesize(
        &self,
        standalone_query: &str,
        chunks: &[ScoredChunk],
        history: &[Message],
    ) -> Result<String, GenerationError> {
        self.generator
            .generate(prompts::answer_messages(standalone_query, chunks, history))
            .await
    }
}
