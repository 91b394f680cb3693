//! Thin CLI driver wiring the retrieval core together for manual operation:
//! `linearrag index <documents-file>` builds (or incrementally extends) a
//! corpus on disk, `linearrag query <question>` runs the hybrid retriever
//! against it and, when an LM endpoint is wired in, parses its answer
//! through the MCQ/Yes-No/Yes-No-Maybe contract.
//!
//! The NER model, the embedding backend, and the language model are all
//! out-of-scope external collaborators (see the core's trait boundaries);
//! this binary supplies only the deterministic reference implementations
//! (`linearrag_ner::DictionaryNer`, `DeterministicEmbeddings`, `EchoLm`)
//! needed to run the pipeline end to end without a live model deployment.

mod lm;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use linearrag_core::config::RetrievalConfig;
use linearrag_core::embedding::{DeterministicEmbeddings, ResilientEmbeddings};
use linearrag_core::index::Indexer;
use linearrag_core::retrieval::answer::{parse_answer, AnswerFormat, INVALID};
use linearrag_core::retrieval::HybridRetriever;
use linearrag_ner::DictionaryNer;

use lm::{EchoLm, LmCaller};

#[derive(Parser, Debug)]
#[command(author, version, about = "Hybrid biomedical retrieval core — reference CLI driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index (or incrementally extend) a corpus of passages.
    Index(IndexArgs),
    /// Run the hybrid retriever against an already-indexed corpus and,
    /// if an LM is configured, produce a parsed answer.
    Query(QueryArgs),
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Path to a newline-delimited file of passages. A passage not already
    /// prefixed with "<int>: " is auto-numbered by line position, so the
    /// graph builder's sequential-adjacency edges line up with file order.
    documents: PathBuf,

    #[arg(long, default_value = "import")]
    working_dir: String,
    #[arg(long, default_value = "default")]
    dataset_name: String,
    #[arg(long, default_value_t = 16)]
    embedding_dim: usize,
}

#[derive(Args, Debug)]
struct QueryArgs {
    question: String,

    #[arg(long, default_value = "import")]
    working_dir: String,
    #[arg(long, default_value = "default")]
    dataset_name: String,
    #[arg(long, default_value_t = 16)]
    embedding_dim: usize,
    #[arg(long, value_enum, default_value_t = AnswerFormatArg::Mcq)]
    answer_format: AnswerFormatArg,
    /// Skip the LM call and print retrieved passages only.
    #[arg(long, default_value_t = false)]
    retrieve_only: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AnswerFormatArg {
    Mcq,
    YesNo,
    YesNoMaybe,
}

impl From<AnswerFormatArg> for AnswerFormat {
    fn from(value: AnswerFormatArg) -> Self {
        match value {
            AnswerFormatArg::Mcq => AnswerFormat::Mcq,
            AnswerFormatArg::YesNo => AnswerFormat::YesNo,
            AnswerFormatArg::YesNoMaybe => AnswerFormat::YesNoMaybe,
        }
    }
}

fn base_config(working_dir: String, dataset_name: String) -> RetrievalConfig {
    let mut config = RetrievalConfig::default();
    config.working_dir = working_dir;
    config.dataset_name = dataset_name;
    config
}

/// Numbers bare lines `"<position>: <line>"` so they carry the sequential
/// prefix the graph builder's adjacency pass expects; lines already
/// prefixed (e.g. re-fed output of a previous export) are left untouched.
fn load_documents(path: &PathBuf) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading documents file {}", path.display()))?;
    let documents = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            if has_sequence_prefix(line) {
                line.to_string()
            } else {
                format!("{i}: {line}")
            }
        })
        .collect();
    Ok(documents)
}

fn has_sequence_prefix(line: &str) -> bool {
    match line.split_once(':') {
        Some((head, _)) => !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

async fn run_index(args: IndexArgs) -> Result<()> {
    let config = base_config(args.working_dir, args.dataset_name);
    let documents = load_documents(&args.documents)?;
    let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(args.embedding_dim));
    let ner = DictionaryNer::new();

    let corpus = Indexer::index(&documents, &config, &generator, &ner).await?;
    println!(
        "indexed {} passages into {}",
        corpus.passages.len(),
        config.namespace_dir().display()
    );
    Ok(())
}

async fn run_query(args: QueryArgs) -> Result<()> {
    let config = base_config(args.working_dir, args.dataset_name);
    let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(args.embedding_dim));
    let ner = DictionaryNer::new();

    // Reopens the persisted corpus without indexing new documents.
    let corpus = Indexer::index(&[], &config, &generator, &ner).await?;

    let result = HybridRetriever::retrieve(
        &args.question,
        &config,
        &corpus.stores,
        &corpus.ner,
        &corpus.graph,
        &corpus.hypergraph,
        &corpus.hyperedge_embeddings,
        &generator,
        &ner,
    )
    .await?;

    println!("question: {}", result.question);
    println!("entities matched: {}", result.has_entities);
    println!("hyperedge context injected: {}", result.has_hyperedge_context);
    for (rank, (passage, score)) in result
        .sorted_passages
        .iter()
        .zip(result.sorted_scores.iter())
        .enumerate()
    {
        println!("  [{}] score={:.4}  {}", rank + 1, score, passage);
    }

    if args.retrieve_only {
        return Ok(());
    }

    let context: String = result.sorted_passages.join("\n\n");
    let prompt = format!(
        "Context:\n{context}\n\nQuestion: {}\n\nAnswer:",
        args.question
    );

    let lm = EchoLm::default();
    let timeout = Duration::from_secs(config.lm_timeout_secs);
    let raw_answer = match tokio::time::timeout(timeout, lm.call(&prompt)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "LM call failed");
            INVALID.to_string()
        }
        Err(_) => {
            tracing::warn!(timeout_secs = config.lm_timeout_secs, "LM call timed out");
            INVALID.to_string()
        }
    };

    let parsed = parse_answer(args.answer_format.into(), &raw_answer);
    println!("answer: {parsed}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Index(args) => run_index(args).await,
        Command::Query(args) => run_query(args).await,
    }
}
