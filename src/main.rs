//! RAG Sweep CLI
//!
//! Benchmarks a retrieval-augmented QA backend against SQuAD across every
//! configuration of the sweep.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rag_sweep::{
    backend::{BackendSettings, HttpBackend, QaBackend},
    config::Config,
    configuration::{ChunkGeometry, ConfigurationTuple},
    dataset::{Dataset, create_sample_dataset, load_squad_dataset},
    models::{ChunkModel, CompletionModel, EmbeddingModel, KnnAlgorithm},
    orchestrator::EvaluationOrchestrator,
    poll::TokioClock,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// RAG Sweep - benchmark a RAG pipeline against SQuAD
#[derive(Parser)]
#[command(name = "rag-sweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep every configuration over a SQuAD dataset
    Evaluate {
        /// SQuAD JSON file, or a directory of them
        dataset: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Sweep every configuration over the built-in sample dataset
    Sample {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Delete every index the vector database lists
    Cleanup,

    /// List the indices the vector database reports
    Indexes,

    /// Ask a question against an existing index
    Query {
        /// Index name
        index: String,

        /// The question
        question: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show the chunks closest to a query
    Nearest {
        /// Index name
        index: String,

        /// The query text
        query: String,

        /// Number of chunks to return
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Chunk, embed and store text in an existing index
    Embed {
        /// Index name
        index: String,

        /// File whose contents are stored
        file: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Only evaluate the first N paragraphs
    #[arg(long)]
    max_paragraphs: Option<usize>,

    /// Write the CSV report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the report and raw score records as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Log question, answer and retrieved context for every miss
    #[arg(long)]
    log_misses: bool,
}

/// The configuration a diagnostic command talks to the backend with.
#[derive(Args)]
struct TargetArgs {
    #[arg(long, default_value = "open-ai")]
    embedding: EmbeddingModel,

    #[arg(long, default_value = "open-ai")]
    completion: CompletionModel,

    #[arg(long, default_value = "cosine")]
    knn: KnnAlgorithm,

    #[arg(long, default_value = "sentences")]
    chunk: ChunkModel,

    /// Chunk size, arbitrary chunking only
    #[arg(long, default_value_t = 0)]
    chunk_size: u32,

    /// Chunk overlap, arbitrary chunking only
    #[arg(long, default_value_t = 0)]
    chunk_overlap: u32,

    /// Chunks retrieved to ground the answer
    #[arg(short, long, default_value_t = 3)]
    k: u32,
}

impl TargetArgs {
    fn settings(&self, config: &Config) -> BackendSettings {
        let configuration = ConfigurationTuple::new(
            self.embedding,
            self.completion,
            self.knn,
            self.chunk,
            ChunkGeometry::new(self.chunk_size, self.chunk_overlap),
            self.k,
        );
        BackendSettings::for_configuration(&configuration, &config.keys)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Evaluate { dataset, run } => {
            let dataset = load_squad_dataset(&dataset)
                .with_context(|| format!("Failed to load dataset from {}", dataset.display()))?;
            cmd_evaluate(config, dataset, run).await
        }
        Commands::Sample { run } => cmd_evaluate(config, create_sample_dataset(), run).await,
        Commands::Cleanup => cmd_cleanup(config).await,
        Commands::Indexes => cmd_indexes(config).await,
        Commands::Query {
            index,
            question,
            target,
        } => cmd_query(config, index, question, target).await,
        Commands::Nearest {
            index,
            query,
            count,
            target,
        } => cmd_nearest(config, index, query, count, target).await,
        Commands::Embed {
            index,
            file,
            target,
        } => cmd_embed(config, index, file, target).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn connect(config: &Config) -> Result<HttpBackend> {
    HttpBackend::new(
        &config.backend,
        &config.vector_db,
        config.keys.vector_database.clone(),
    )
    .context("Failed to create backend client")
}

async fn cmd_evaluate(mut config: Config, dataset: Dataset, run: RunArgs) -> Result<()> {
    config.evaluation.log_misses |= run.log_misses;
    config.validate().context("Invalid configuration")?;

    let dataset = match run.max_paragraphs {
        Some(max) => dataset.take_paragraphs(max),
        None => dataset,
    };
    info!(
        "Dataset: {} ({} paragraphs, {} questions)",
        dataset.name,
        dataset.paragraph_count(),
        dataset.question_count()
    );

    let backend = connect(&config)?;
    let clock = TokioClock;
    let orchestrator = EvaluationOrchestrator::new(&backend, &clock, &config);
    let result = orchestrator.run(&dataset).await.context("Evaluation failed")?;

    let csv = result.report.to_csv();
    match &run.output {
        Some(path) => {
            write_file(path, &csv)?;
            info!("Report saved to {}", path.display());
        }
        None => print!("{}", csv),
    }

    if let Some(path) = &run.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize results")?;
        write_file(path, &json)?;
        info!("Results saved to {}", path.display());
    }

    // stdout may carry the CSV
    eprint!("{}", result.report.summary());
    Ok(())
}

async fn cmd_cleanup(config: Config) -> Result<()> {
    config.validate_connection().context("Invalid configuration")?;

    let backend = connect(&config)?;
    let clock = TokioClock;
    let deleted = EvaluationOrchestrator::new(&backend, &clock, &config)
        .clear_stale_indices()
        .await;

    if deleted.is_empty() {
        println!("No indices deleted.");
    } else {
        for name in &deleted {
            println!("Deleted {}", name);
        }
    }
    Ok(())
}

async fn cmd_indexes(config: Config) -> Result<()> {
    config.validate_connection().context("Invalid configuration")?;

    let backend = connect(&config)?;
    let names = backend
        .list_active_index_names()
        .await
        .context("Failed to list indices")?;

    if names.is_empty() {
        println!("No active indices.");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn cmd_query(config: Config, index: String, question: String, target: TargetArgs) -> Result<()> {
    config.validate_connection().context("Invalid configuration")?;

    let backend = connect(&config)?;
    let answer = backend
        .query(&index, &question, &target.settings(&config))
        .await
        .context("Query failed")?;

    println!("{}", answer);
    Ok(())
}

async fn cmd_nearest(
    config: Config,
    index: String,
    query: String,
    count: u32,
    target: TargetArgs,
) -> Result<()> {
    config.validate_connection().context("Invalid configuration")?;

    let backend = connect(&config)?;
    let chunks = backend
        .find_k_nearest(&index, &query, count, &target.settings(&config))
        .await
        .context("Nearest-neighbor lookup failed")?;

    if chunks.is_empty() {
        println!("No chunks found.");
    }
    for (i, chunk) in chunks.iter().enumerate() {
        match chunk.score {
            Some(score) => println!("{:>2}. ({:.3}) {}", i + 1, score, chunk.text),
            None => println!("{:>2}. {}", i + 1, chunk.text),
        }
    }
    Ok(())
}

async fn cmd_embed(config: Config, index: String, file: PathBuf, target: TargetArgs) -> Result<()> {
    config.validate_connection().context("Invalid configuration")?;

    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let backend = connect(&config)?;
    backend
        .create_embeddings(&index, &text, &target.settings(&config))
        .await
        .context("Failed to store embeddings")?;

    println!("Stored {} bytes in {}", text.len(), index);
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
