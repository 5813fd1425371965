use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use legal_rag::external::{build_embedder, build_generator, EmbeddingConfig, Provider};
use legal_rag::{
    ChatSession, Config, DirectorySource, IngestPipeline, RagChain, Retriever, VectorIndex,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Question answering over a corpus of legal documents", long_about = None)]
struct Args {
    /// Directory holding the persisted vector index
    #[arg(short = 's', long, global = true)]
    vector_store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the vector index from the documents directory
    Ingest {
        /// Directory to read documents from
        #[arg(short = 'd', long)]
        documents_dir: Option<PathBuf>,

        /// Glob matched against paths relative to the documents directory
        #[arg(short = 'p', long)]
        pattern: Option<String>,

        #[arg(long)]
        chunk_size: Option<usize>,

        #[arg(long)]
        chunk_overlap: Option<usize>,

        #[arg(long, value_enum)]
        embedding_provider: Option<Provider>,
    },
    /// Answer a single question
    Ask {
        question: String,

        /// Print the passages the answer was based on
        #[arg(long)]
        show_sources: bool,
    },
    /// Start an interactive chat session
    Chat,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_ingest(config: &Config) -> Result<()> {
    config.validate_common()?;

    let chunker = config.chunking.chunker()?;
    let embedder = build_embedder(
        &config.embedding,
        config.processing.retry_policy(),
        config.processing.max_concurrent_requests,
    )?;
    let pipeline = IngestPipeline::new(
        chunker,
        embedder,
        config.processing.batch_size,
        &config.storage.vector_store_path,
    )?;
    let source = DirectorySource::new(
        &config.storage.documents_dir,
        &config.storage.document_pattern,
    )?;

    info!(
        "Ingesting {} from {}",
        config.storage.document_pattern,
        config.storage.documents_dir.display()
    );
    let report = pipeline.run(&source).await?;
    println!("{}", report);

    Ok(())
}

fn load_chain(config: &Config) -> Result<RagChain> {
    config.validate()?;

    let index = VectorIndex::load(&config.storage.vector_store_path).with_context(|| {
        format!(
            "Could not load vector store at {}. Run `legal_rag ingest` first",
            config.storage.vector_store_path.display()
        )
    })?;

    let policy = config.processing.retry_policy();
    let embedder = build_embedder(
        &config.embedding,
        policy.clone(),
        config.processing.max_concurrent_requests,
    )?;
    if embedder.model() != index.embedding_model() {
        warn!(
            "Index was built with {} but queries use {}; results may be meaningless",
            index.embedding_model(),
            embedder.model()
        );
    }
    let generator = build_generator(&config.llm, policy)?;

    let retriever = Retriever::new(embedder, Arc::new(index), config.retrieval.top_k)
        .with_min_score(config.retrieval.min_score);

    Ok(RagChain::new(retriever, generator))
}

async fn run_ask(chain: &RagChain, question: &str, show_sources: bool) -> Result<()> {
    let answer = chain.answer(question).await?;
    println!("{}", answer.text);

    if show_sources {
        println!("\nSources:");
        for (i, passage) in answer.passages.iter().enumerate() {
            println!(
                "  [{}] {} (chunk {}, score {:.3})",
                i + 1,
                passage.chunk.source.display(),
                passage.chunk.index,
                passage.score
            );
        }
    }

    Ok(())
}

async fn run_chat(chain: &RagChain) -> Result<()> {
    let mut session = ChatSession::new();
    for message in session.messages() {
        println!("{}", message.content);
    }
    println!("(type 'exit' or 'quit' to leave)");

    let mut buffer = String::new();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        buffer.clear();
        if io::stdin().read_line(&mut buffer)? == 0 {
            println!();
            break;
        }

        let input = buffer.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        match session.ask(chain, input).await {
            Ok(answer) => println!("\n{}", answer),
            Err(e) => {
                error!("Request failed: {}", e);
                println!("\nError generating response: {}", e);
            }
        }
    }

    info!("Chat ended after {} messages", session.messages().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_env()?;
    init_logging(&config.processing.log_level);

    if let Some(path) = args.vector_store {
        config.storage.vector_store_path = path;
    }

    match args.command {
        Command::Ingest {
            documents_dir,
            pattern,
            chunk_size,
            chunk_overlap,
            embedding_provider,
        } => {
            if let Some(dir) = documents_dir {
                config.storage.documents_dir = dir;
            }
            if let Some(pattern) = pattern {
                config.storage.document_pattern = pattern;
            }
            if let Some(size) = chunk_size {
                config.chunking.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                config.chunking.chunk_overlap = overlap;
            }
            if let Some(provider) = embedding_provider {
                if provider != config.embedding.provider
                    && std::env::var("EMBEDDING_MODEL").is_err()
                {
                    config.embedding.model = EmbeddingConfig::default_model(provider).to_string();
                }
                config.embedding.provider = provider;
            }

            run_ingest(&config).await
        }
        Command::Ask {
            question,
            show_sources,
        } => {
            let chain = load_chain(&config)?;
            run_ask(&chain, &question, show_sources).await
        }
        Command::Chat => {
            let chain = load_chain(&config)?;
            run_chat(&chain).await
        }
    }
}
