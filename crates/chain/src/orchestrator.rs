//! Chain Orchestrator: one chat turn as an explicit sequence of stages.
//!
//! ```text
//! START → REFORMULATING → RETRIEVING → SYNTHESIZING → PERSISTING → DONE
//!              └─────────────┴─────────────┴──────────────┴──→ FAILED
//! ```
//!
//! Stages run strictly in order with no internal retries. A failure while
//! persisting still returns the answer, with the failure reported as a
//! warning on the outcome.

use std::sync::Arc;

use paperchat_core::{Error, Message, Result, ScoredChunk, SessionId};
use paperchat_index::{CollectionName, IndexManager};
use paperchat_memory::ConversationMemory;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::generator::Generator;
use crate::reformulator::QueryReformulator;
use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;

/// Where a turn is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Start,
    Reformulating,
    Retrieving,
    Synthesizing,
    Persisting,
    Done,
    Failed,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Reformulating => "reformulating",
            Self::Retrieving => "retrieving",
            Self::Synthesizing => "synthesizing",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for TurnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to one chat turn.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub query: String,
    /// Generated when absent.
    pub session_id: Option<SessionId>,
    /// Default collection when absent.
    pub collection: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

/// Result of a turn that produced an answer.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub session_id: SessionId,
    pub collection: String,
    pub standalone_query: String,
    pub sources: Vec<ScoredChunk>,
    /// `Done`, or `Failed` when the answer could not be persisted
    pub stage: TurnStage,
    /// Why persisting the turn failed, if it did
    pub persistence_warning: Option<String>,
}

/// Working state of one turn. Never outlives [`ChainOrchestrator::run`].
struct ChatTurn<'a> {
    session_id: &'a SessionId,
    stage: TurnStage,
}

impl ChatTurn<'_> {
    fn advance(&mut self, next: TurnStage) {
        debug!(session_id = %self.session_id, from = %self.stage, to = %next, "Turn stage");
        self.stage = next;
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(
            session_id = %self.session_id,
            stage = %self.stage,
            kind = err.kind().as_str(),
            error = %err,
            "Turn failed"
        );
        self.stage = TurnStage::Failed;
        err
    }
}

pub struct ChainOrchestrator {
    memory: Arc<ConversationMemory>,
    index: Arc<IndexManager>,
    reformulator: QueryReformulator,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl ChainOrchestrator {
    pub fn new(
        generator: Arc<Generator>,
        index: Arc<IndexManager>,
        memory: Arc<ConversationMemory>,
    ) -> Self {
        Self {
            reformulator: QueryReformulator::new(generator.clone()),
            retriever: Retriever::new(index.clone()),
            synthesizer: AnswerSynthesizer::new(generator),
            memory,
            index,
            top_k: 4,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }

    /// Drive one chat turn to completion.
    pub async fn run(&self, request: ChatRequest) -> Result<TurnOutcome> {
        let raw_query = request.query.trim();
        if raw_query.is_empty() {
            return Err(Error::invalid_input("query must not be empty"));
        }
        let collection = self.index.resolve(request.collection.as_deref())?;
        let session_id = request.session_id.unwrap_or_default();
        let human = Message::human(raw_query);

        let mut turn = ChatTurn {
            session_id: &session_id,
            stage: TurnStage::Start,
        };

        self.memory
            .get_or_create(&session_id)
            .await
            .map_err(|e| turn.fail(e))?;
        let history = self
            .memory
            .history(&session_id)
            .await
            .map_err(|e| turn.fail(e))?;

        turn.advance(TurnStage::Reformulating);
        let standalone_query = self
            .reformulator
            .reformulate(raw_query, &history)
            .await
            .map_err(|e| turn.fail(e.into()))?;

        turn.advance(TurnStage::Retrieving);
        let sources = self
            .retrieve(&collection, &standalone_query)
            .await
            .map_err(|e| turn.fail(e))?;

        turn.advance(TurnStage::Synthesizing);
        let answer = self
            .synthesizer
            .synthesize(&standalone_query, &sources, &history)
            .await
            .map_err(|e| turn.fail(e.into()))?;

        turn.advance(TurnStage::Persisting);
        let persistence_warning = match self
            .memory
            .append_turn(&session_id, human, Message::assistant(answer.clone()))
            .await
        {
            Ok(()) => {
                turn.advance(TurnStage::Done);
                None
            }
            Err(e) => Some(turn.fail(e).to_string()),
        };

        info!(
            session_id = %session_id,
            collection = %collection,
            chunks = sources.len(),
            reformulated = !history.is_empty(),
            persisted = persistence_warning.is_none(),
            "Chat turn complete"
        );

        Ok(TurnOutcome {
            answer,
            collection: collection.as_str().to_string(),
            standalone_query,
            sources,
            stage: turn.stage,
            persistence_warning,
            session_id,
        })
    }

    async fn retrieve(&self, collection: &CollectionName, query: &str) -> Result<Vec<ScoredChunk>> {
        self.retriever.retrieve(collection, query, self.top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ReadOnlyHistory, RecordingEmbedder, SequentialMockProvider};
    use paperchat_core::{Chunk, ErrorKind, ProviderError, Role};
    use paperchat_memory::InMemoryHistory;

    struct Fixture {
        _dir: tempfile::TempDir,
        provider: Arc<SequentialMockProvider>,
        embedder: Arc<RecordingEmbedder>,
        chain: ChainOrchestrator,
    }

    async fn fixture(responses: Vec<std::result::Result<String, ProviderError>>) -> Fixture {
        fixture_with_memory(responses, ConversationMemory::new(Arc::new(InMemoryHistory::new()))).await
    }

    async fn fixture_with_memory(
        responses: Vec<std::result::Result<String, ProviderError>>,
        memory: ConversationMemory,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(responses));
        let embedder = Arc::new(RecordingEmbedder::new());
        let index = Arc::new(IndexManager::new(dir.path(), embedder.clone()));

        index
            .create(
                &CollectionName::parse("docs").unwrap(),
                vec![
                    Chunk::new("Ferris is the Rust mascot, a friendly crab.", "rust.txt"),
                    Chunk::new("Sourdough needs a starter and patience.", "bread.txt"),
                ],
            )
            .await
            .unwrap();

        let generator = Arc::new(Generator::new(provider.clone(), "mock-model"));
        Fixture {
            _dir: dir,
            provider,
            embedder,
            chain: ChainOrchestrator::new(generator, index, Arc::new(memory)),
        }
    }

    fn ok(text: &str) -> std::result::Result<String, ProviderError> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn first_turn_skips_reformulation_and_persists_two_messages() {
        let f = fixture(vec![ok("Ferris is a crab.")]).await;

        let outcome = f
            .chain
            .run(ChatRequest::new("Who is Ferris?").with_collection("docs"))
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Ferris is a crab.");
        assert_eq!(outcome.standalone_query, "Who is Ferris?");
        assert_eq!(outcome.collection, "docs");
        assert_eq!(outcome.stage, TurnStage::Done);
        assert!(outcome.persistence_warning.is_none());
        assert!(outcome.session_id.is_valid());
        assert_eq!(outcome.sources[0].chunk.metadata.source, "rust.txt");
        assert_eq!(f.provider.call_count(), 1);

        let history = f.chain.memory().history(&outcome.session_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::Human);
        assert_eq!(history[0].content, "Who is Ferris?");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Ferris is a crab.");
    }

    #[tokio::test]
    async fn follow_up_retrieves_with_rewritten_query() {
        let f = fixture(vec![
            ok("Ferris is the Rust mascot."),
            ok("What kind of animal is Ferris the Rust mascot?"),
            ok("A crab."),
        ])
        .await;
        let session = SessionId::from("follow-up");

        f.chain
            .run(ChatRequest::new("Who is Ferris?").with_session(session.clone()).with_collection("docs"))
            .await
            .unwrap();
        let second = f
            .chain
            .run(ChatRequest::new("What animal is it?").with_session(session.clone()).with_collection("docs"))
            .await
            .unwrap();

        assert_eq!(f.provider.call_count(), 3);
        assert_eq!(second.standalone_query, "What kind of animal is Ferris the Rust mascot?");

        let embedded = f.embedder.seen();
        assert_eq!(embedded.last().unwrap(), "What kind of animal is Ferris the Rust mascot?");
        assert!(!embedded.iter().any(|t| t == "What animal is it?"));

        assert_eq!(f.chain.memory().history(&session).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_collection_is_index_not_found_and_nothing_persisted() {
        let f = fixture(vec![]).await;
        let session = SessionId::from("s");

        let err = f
            .chain
            .run(ChatRequest::new("hello").with_session(session.clone()).with_collection("never-uploaded"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IndexNotFound);
        assert!(err.to_string().contains("ingest a document first"));
        assert!(f.chain.memory().history(&session).await.unwrap().is_empty());
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn synthesis_failure_is_generation_error() {
        let f = fixture(vec![Err(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        })])
        .await;
        let session = SessionId::from("s");

        let err = f
            .chain
            .run(ChatRequest::new("Who is Ferris?").with_session(session.clone()).with_collection("docs"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(f.chain.memory().history(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reformulation_failure_propagates() {
        let f = fixture(vec![ok("first answer"), Err(ProviderError::Network("reset".into()))]).await;
        let session = SessionId::from("s");

        f.chain
            .run(ChatRequest::new("q1").with_session(session.clone()).with_collection("docs"))
            .await
            .unwrap();
        let err = f
            .chain
            .run(ChatRequest::new("q2").with_session(session.clone()).with_collection("docs"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Generation);
        assert_eq!(f.chain.memory().history(&session).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_answer() {
        let memory = ConversationMemory::new(Arc::new(ReadOnlyHistory));
        let f = fixture_with_memory(vec![ok("Ferris is a crab.")], memory).await;

        let outcome = f
            .chain
            .run(ChatRequest::new("Who is Ferris?").with_collection("docs"))
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Ferris is a crab.");
        assert_eq!(outcome.stage, TurnStage::Failed);
        assert!(outcome.persistence_warning.unwrap().contains("read-only"));
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let f = fixture(vec![]).await;
        let err = f.chain.run(ChatRequest::new("   ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn invalid_session_id_rejected() {
        let f = fixture(vec![]).await;
        let err = f
            .chain
            .run(ChatRequest::new("q").with_session(SessionId::from("bad\nid")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn top_k_limits_sources() {
        let f = fixture(vec![ok("answer")]).await;
        let chain = f.chain.with_top_k(1);
        let outcome = chain
            .run(ChatRequest::new("Ferris crab").with_collection("docs"))
            .await
            .unwrap();
        assert_eq!(outcome.sources.len(), 1);
    }

    #[test]
    fn terminal_stages() {
        assert!(TurnStage::Done.is_terminal());
        assert!(TurnStage::Failed.is_terminal());
        assert!(!TurnStage::Persisting.is_terminal());
        assert_eq!(TurnStage::Reformulating.to_string(), "reformulating");
    }
}
