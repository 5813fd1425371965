use async_trait::async_trait;
use legal_rag::external::ExternalError;
use legal_rag::prompt::FALLBACK_ANSWER;
use legal_rag::{
    ChatSession, Chunker, DirectorySource, Embedder, Generator, IngestPipeline, RagChain,
    RagError, Retriever, VectorIndex,
};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mock! {
    pub Generator {}

    #[async_trait]
    impl Generator for Generator {
        async fn generate(&self, prompt: &str) -> Result<String, ExternalError>;
    }
}

const VOCABULARY: &[&str] = &["helmet", "insurance", "licence", "speed", "pollution"];

/// Counts vocabulary terms. Questions mentioning "outage" fail and questions
/// mentioning "slow" are delayed.
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCABULARY
            .iter()
            .map(|term| lower.matches(term).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ExternalError> {
        if text.contains("outage") {
            return Err(ExternalError::ConnectionError("connection refused".to_string()));
        }
        if text.contains("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(Self::vectorize(text))
    }

    fn model(&self) -> String {
        "keyword-test".to_string()
    }
}

/// Answers with the top passage from the prompt's context.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
        let context = prompt
            .split("CONTEXT:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nQUESTION:").next())
            .unwrap_or("");
        let top = context.split("\n\n").next().unwrap_or("");
        if top.is_empty() {
            Ok(format!("\n{}\n", FALLBACK_ANSWER))
        } else {
            Ok(format!("  {}  \n", top))
        }
    }
}

fn write_corpus(dir: &TempDir) {
    let files = [
        ("helmets.txt", "Section 129: every rider shall wear a protective helmet. Helmet rules apply to pillion riders."),
        ("insurance.txt", "Section 146: no vehicle shall be used without third-party insurance."),
        ("licence.txt", "Section 3: no person shall drive without an effective driving licence."),
        ("notes.md", "A valid **pollution** under control certificate is required."),
    ];
    for (name, text) in files {
        std::fs::write(dir.path().join(name), text).unwrap();
    }
}

async fn ingest_and_load(docs: &TempDir, store: &TempDir) -> Arc<VectorIndex> {
    let pipeline = IngestPipeline::new(
        Chunker::default(),
        Arc::new(KeywordEmbedder),
        2,
        store.path(),
    )
    .unwrap();
    let source = DirectorySource::new(docs.path(), "**/*.{txt,md}").unwrap();

    let report = pipeline.run(&source).await.unwrap();
    assert_eq!(report.documents, 4);
    assert_eq!(report.chunks, 4);
    assert_eq!(report.dimension, VOCABULARY.len());

    Arc::new(VectorIndex::load(store.path()).unwrap())
}

#[tokio::test]
async fn test_ingest_then_answer() {
    let docs = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_corpus(&docs);

    let index = ingest_and_load(&docs, &store).await;
    assert_eq!(index.embedding_model(), "keyword-test");

    let retriever = Retriever::new(Arc::new(KeywordEmbedder), index, 4);
    let chain = RagChain::new(retriever, Arc::new(EchoGenerator));

    let answer = chain.invoke("Do I need a helmet on a scooter?").await.unwrap();
    assert!(answer.starts_with("Section 129"), "answer: {}", answer);
    assert_eq!(answer, answer.trim());

    let answer = chain.invoke("Is insurance mandatory?").await.unwrap();
    assert!(answer.starts_with("Section 146"), "answer: {}", answer);
}

#[tokio::test]
async fn test_prompt_carries_ranked_context() {
    let docs = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_corpus(&docs);
    let index = ingest_and_load(&docs, &store).await;

    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .withf(|prompt: &str| {
            let context = prompt
                .split("CONTEXT:\n")
                .nth(1)
                .and_then(|rest| rest.split("\n\nQUESTION:").next())
                .unwrap_or("");
            let passages: Vec<&str> = context.split("\n\n").collect();
            passages.len() == 2
                && passages[0].contains("pollution")
                && prompt.contains("QUESTION:\nWhat about pollution certificates?")
        })
        .times(1)
        .returning(|_| Ok("A PUC certificate is required.".to_string()));

    let retriever = Retriever::new(Arc::new(KeywordEmbedder), index, 2);
    let chain = RagChain::new(retriever, Arc::new(generator));

    let answer = chain.invoke("What about pollution certificates?").await.unwrap();
    assert_eq!(answer, "A PUC certificate is required.");
}

#[tokio::test]
async fn test_concurrent_queries_are_isolated() {
    let docs = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_corpus(&docs);
    let index = ingest_and_load(&docs, &store).await;

    let retriever = Retriever::new(Arc::new(KeywordEmbedder), index.clone(), 4);
    let chain = Arc::new(RagChain::new(retriever, Arc::new(EchoGenerator)));

    let questions = [
        "slow question about helmet rules",
        "outage while asking about insurance",
        "licence requirements?",
        "insurance cover",
    ];
    let handles: Vec<_> = questions
        .iter()
        .map(|q| {
            let chain = Arc::clone(&chain);
            let question = q.to_string();
            tokio::spawn(async move { chain.invoke(&question).await })
        })
        .collect();

    let results: Vec<Result<String, RagError>> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert!(results[0].as_ref().unwrap().starts_with("Section 129"));
    assert!(matches!(results[1], Err(RagError::Embedding(_))));
    assert!(results[2].as_ref().unwrap().starts_with("Section 3"));
    assert!(results[3].as_ref().unwrap().starts_with("Section 146"));

    // The shared index is untouched by the failed request
    assert_eq!(index.len(), 4);
    assert!(chain.invoke("helmet").await.is_ok());
}

#[tokio::test]
async fn test_chat_session_survives_failures() {
    let docs = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_corpus(&docs);
    let index = ingest_and_load(&docs, &store).await;

    let retriever = Retriever::new(Arc::new(KeywordEmbedder), index, 4);
    let chain = RagChain::new(retriever, Arc::new(EchoGenerator));
    let mut session = ChatSession::new();

    assert!(session.ask(&chain, "outage").await.is_err());
    let answer = session.ask(&chain, "helmet?").await.unwrap();
    assert!(answer.starts_with("Section 129"));
    assert_eq!(session.messages().len(), 4);
}

#[tokio::test]
async fn test_failed_reingest_keeps_existing_index() {
    let docs = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_corpus(&docs);
    ingest_and_load(&docs, &store).await;

    let empty = TempDir::new().unwrap();
    let pipeline = IngestPipeline::new(
        Chunker::default(),
        Arc::new(KeywordEmbedder),
        2,
        store.path(),
    )
    .unwrap();
    let source = DirectorySource::new(empty.path(), "**/*.txt").unwrap();

    assert!(matches!(
        pipeline.run(&source).await,
        Err(RagError::Load(_))
    ));
    assert_eq!(VectorIndex::load(store.path()).unwrap().len(), 4);
}
