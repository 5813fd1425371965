use std::sync::Arc;
use tracing::{debug, info};

use crate::error::RagError;
use crate::external::Generator;
use crate::prompt;
use crate::retriever::{format_context, RetrievedPassage, Retriever};

/// An answer together with the passages it was conditioned on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub passages: Vec<RetrievedPassage>,
}

/// Question answering pipeline:
/// retrieve, format context, render prompt, generate, parse output.
///
/// Holds only shared read-only handles, so one chain can serve any number of
/// concurrent requests.
#[derive(Clone)]
pub struct RagChain {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl RagChain {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn invoke(&self, question: &str) -> Result<String, RagError> {
        Ok(self.answer(question).await?.text)
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        info!("Answering question ({} chars)", question.chars().count());

        let passages = self.retriever.retrieve(question).await?;
        let context = format_context(&passages);
        let prompt = prompt::render(&context, question);
        debug!(
            "Rendered prompt with {} passages ({} chars)",
            passages.len(),
            prompt.chars().count()
        );

        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(RagError::Synthesis)?;

        Ok(Answer {
            text: prompt::parse_output(&raw),
            passages,
        })
    }
}
