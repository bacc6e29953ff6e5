//! Prompt construction for the reformulation and answer steps.

use paperchat_core::{Message, PromptMessage, ScoredChunk};

pub const REFORMULATE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which can \
be understood without the chat history. Do NOT answer the question, just reformulate it if \
needed and otherwise return it as is.";

pub const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. If you don't know the \
answer, just say that you don't know. Use three sentences maximum and keep the answer concise.";

/// System prompt, prior turns, then the raw question.
pub fn reformulation_messages(raw_query: &str, history: &[Message]) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(REFORMULATE_SYSTEM_PROMPT));
    messages.extend(history.iter().map(PromptMessage::from));
    messages.push(PromptMessage::user(raw_query));
    messages
}

/// System prompt with the retrieved context, prior turns, then the
/// standalone question.
pub fn answer_messages(
    standalone_query: &str,
    chunks: &[ScoredChunk],
    history: &[Message],
) -> Vec<PromptMessage> {
    let system = format!(
        "{ANSWER_SYSTEM_PROMPT}\n\n{}",
        format_context(chunks)
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system));
    messages.extend(history.iter().map(PromptMessage::from));
    messages.push(PromptMessage::user(standalone_query));
    messages
}

/// Retrieved chunks as a numbered context block.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    if chunks.is_empty() {
        return "Context: (no matching passages were found)".to_string();
    }

    let mut out = String::from("Context:");
    for (i, hit) in chunks.iter().enumerate() {
        let meta = &hit.chunk.metadata;
        let location = match meta.page {
            Some(page) => format!("{}, page {page}", meta.source),
            None => meta.source.clone(),
        };
        out.push_str(&format!("\n\n[{}] ({location})\n{}", i + 1, hit.chunk.text));
    }
    out
}
