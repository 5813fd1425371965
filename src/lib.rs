pub mod chain;
pub mod chunker;
pub mod config;
pub mod datasource;
pub mod document;
pub mod error;
pub mod external;
pub mod index;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod session;

pub use chain::{Answer, RagChain};
pub use chunker::Chunker;
pub use config::Config;
pub use datasource::{DataSource, DirectorySource};
pub use document::{Chunk, Document};
pub use error::RagError;
pub use external::{Embedder, ExternalError, Generator, RetryPolicy};
pub use index::{IndexEntry, SearchHit, VectorIndex};
pub use pipeline::{IngestPipeline, IngestReport};
pub use retriever::{RetrievedPassage, Retriever};
pub use session::{ChatSession, Message, Role};
