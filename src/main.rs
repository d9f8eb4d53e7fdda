use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemo_core::Config;
use mnemo_embed::Embedder;
use mnemo_index::{QdrantIndex, VectorIndex};
use mnemo_rag::{DocumentDescriptor, RagEngine, RecursiveSplitter, SplitterConfig};

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Study-material ingestion and retrieval")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "mnemo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a plain-text file as one document.
    Ingest {
        file: PathBuf,
        #[arg(long)]
        document_id: String,
        #[arg(long)]
        user: String,
        /// Defaults to the file extension.
        #[arg(long)]
        file_type: Option<String>,
    },
    /// Retrieve the chunks most relevant to a question.
    Query {
        text: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Restrict the search to these document ids (repeatable).
        #[arg(long = "document")]
        documents: Vec<String>,
    },
    /// Delete every chunk of a document.
    Delete { document_id: String },
    /// Show index totals.
    Stats,
}

#[cfg(feature = "candle")]
fn build_embedder(config: &Config) -> impl Embedder + use<> {
    use mnemo_embed::LazyEmbedder;
    use mnemo_embed::candle::{CandleEmbedder, Device};

    let repo = config.embedding.model.clone();
    LazyEmbedder::new(move || CandleEmbedder::load(&repo, &Device::Cpu))
}

#[cfg(all(not(feature = "candle"), feature = "mock"))]
fn build_embedder(config: &Config) -> impl Embedder + use<> {
    use mnemo_embed::mock::MockEmbedder;

    let dimension = usize::try_from(config.embedding.dimension).unwrap_or(usize::MAX);
    MockEmbedder::with_dimension(dimension)
}

#[cfg(all(not(feature = "candle"), not(feature = "mock")))]
compile_error!("enable the `candle` feature (or `mock` for development builds)");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let index = QdrantIndex::new(&config.index.qdrant_url, config.index.collection.clone())
        .context("failed to connect to Qdrant")?;
    index
        .open(config.embedding.dimension)
        .await
        .context("failed to open index collection")?;

    let splitter = RecursiveSplitter::new(SplitterConfig {
        chunk_size: config.rag.chunk_size,
        overlap: config.rag.chunk_overlap,
    })?;
    let engine = RagEngine::new(build_embedder(&config), index, splitter, config.rag.top_k);

    match cli.command {
        Command::Ingest {
            file,
            document_id,
            user,
            file_type,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_type = file_type.unwrap_or_else(|| {
                file.extension()
                    .map_or_else(|| "txt".to_owned(), |e| e.to_string_lossy().into_owned())
            });
            let filename = file
                .file_name()
                .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());

            let doc = DocumentDescriptor {
                document_id,
                user_id: user,
                filename,
                file_type,
            };
            let count = engine.ingest_document(&text, &doc).await?;
            println!("ingested {count} chunk(s) from {}", doc.filename);
        }
        Command::Query {
            text,
            user,
            top_k,
            documents,
        } => {
            let document_ids = (!documents.is_empty()).then_some(documents);
            let result = engine
                .retrieve_context(&text, &user, top_k, document_ids.as_deref())
                .await?;
            if result.sources.is_empty() {
                println!("no matching chunks");
            }
            for source in &result.sources {
                println!(
                    "[{:.3}] {} ({})",
                    source.score, source.filename, source.document_id
                );
                println!("    {}", source.content.replace('\n', "\n    "));
            }
        }
        Command::Delete { document_id } => {
            engine.delete_document_chunks(&document_id).await?;
            println!("deleted chunks of {document_id}");
        }
        Command::Stats => {
            let stats = engine.index_stats().await?;
            println!("total entries: {}", stats.total_entries);
        }
    }

    Ok(())
}
