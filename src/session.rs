use serde::Serialize;
use std::fmt;

use crate::chain::RagChain;
use crate::error::RagError;

pub const GREETING: &str = "Hello! I’m your AI legal assistant. How can I help you today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Transcript of one chat. History is kept for display only; every question
/// is answered on its own.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    messages: Vec<Message>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Start a session seeded with the assistant greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![Message {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Record the question, answer it and record the answer. A failed request
    /// leaves the question in the transcript without an answer.
    pub async fn ask(&mut self, chain: &RagChain, question: &str) -> Result<String, RagError> {
        self.messages.push(Message {
            role: Role::User,
            content: question.to_string(),
        });

        let answer = chain.invoke(question).await?;
        self.messages.push(Message {
            role: Role::Assistant,
            content: answer.clone(),
        });

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;
    use crate::external::{ExternalError, MockEmbedder, MockGenerator};
    use crate::index::VectorIndex;
    use crate::retriever::Retriever;
    use mockall::Sequence;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn chain(generator: MockGenerator) -> RagChain {
        let index = VectorIndex::build(
            "mock",
            vec![(
                vec![1.0],
                Chunk::new("Section 129".to_string(), PathBuf::from("a.pdf"), 0, 0),
            )],
        )
        .unwrap();
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed_query().returning(|_| Ok(vec![1.0]));

        RagChain::new(
            Retriever::new(Arc::new(embedder), Arc::new(index), 4),
            Arc::new(generator),
        )
    }

    #[test]
    fn test_new_session_has_greeting() {
        let session = ChatSession::new();
        assert_eq!(
            session.messages(),
            &[Message {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_ask_records_turns() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Ok("Yes.".to_string()));
        let chain = chain(generator);

        let mut session = ChatSession::new();
        let answer = session.ask(&chain, "Is a helmet required?").await.unwrap();

        assert_eq!(answer, "Yes.");
        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_history_is_not_fed_back() {
        let mut seq = Sequence::new();
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("First answer".to_string()));
        generator
            .expect_generate()
            .withf(|prompt: &str| !prompt.contains("First") && !prompt.contains("first question"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Second answer".to_string()));
        let chain = chain(generator);

        let mut session = ChatSession::new();
        session.ask(&chain, "first question").await.unwrap();
        session.ask(&chain, "second question").await.unwrap();
        assert_eq!(session.messages().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_request_keeps_session_usable() {
        let mut seq = Sequence::new();
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ExternalError::Timeout(std::time::Duration::from_secs(30))));
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Recovered".to_string()));
        let chain = chain(generator);

        let mut session = ChatSession::new();
        assert!(session.ask(&chain, "q1").await.is_err());
        assert_eq!(session.ask(&chain, "q2").await.unwrap(), "Recovered");

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![GREETING, "q1", "q2", "Recovered"]);
    }
}
