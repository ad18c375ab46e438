use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hybrid_core::evaluation::{evaluate, GoldenSet};
use hybrid_core::fusion::normalize;
use hybrid_core::hybrid::{bm25_results, HybridSearch};
use hybrid_core::persist::{load_index, save_index, IndexPaths};
use hybrid_core::semantic::{ChunkStore, ChunkedSemanticSearch, QueryVector};
use hybrid_core::{Bm25Params, DocId, IndexBuilder, InvertedIndex, SearchConfig, SearchError, SearchResult};
use tracing_subscriber::{fmt, EnvFilter};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

mod corpus;

#[derive(Parser)]
#[command(name = "hybrid")]
#[command(about = "Build a BM25 index and run lexical, weighted and RRF hybrid searches", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, global = true, default_value = "./index")]
    index: PathBuf,
    /// Optional TOML file with search tuning
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Chunk embeddings (JSONL of {doc_id, chunk_idx, vector}) to store alongside
        #[arg(long)]
        embeddings: Option<PathBuf>,
    },
    /// Raw term frequency of a term in a document
    Tf { doc_id: DocId, term: String },
    /// Classic IDF: ln((N + 1) / (df + 1))
    Idf { term: String },
    /// tf * classic IDF
    Tfidf { doc_id: DocId, term: String },
    /// BM25 IDF: ln((N - df + 0.5) / (df + 0.5) + 1)
    Bm25idf { term: String },
    /// BM25 saturated term frequency
    Bm25tf {
        doc_id: DocId,
        term: String,
        #[arg(long)]
        k1: Option<f64>,
        #[arg(long)]
        b: Option<f64>,
    },
    /// Rank documents with BM25
    Bm25search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Documents containing any query token, in posting order
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Min-max normalize a list of scores
    Normalize {
        #[arg(required = true, allow_negative_numbers = true)]
        scores: Vec<f64>,
    },
    /// Weighted fusion of normalized BM25 and semantic scores
    WeightedSearch {
        query: String,
        /// JSON array holding the query embedding
        #[arg(long)]
        query_vector: PathBuf,
        /// 1.0 = all BM25, 0.0 = all semantic
        #[arg(long)]
        alpha: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Reciprocal rank fusion of BM25 and semantic rankings
    RrfSearch {
        query: String,
        #[arg(long)]
        query_vector: PathBuf,
        #[arg(short)]
        k: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Precision and recall against a golden dataset
    Evaluate {
        #[arg(long)]
        golden: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
        /// Use RRF with each case's `vector` instead of BM25 alone
        #[arg(long, default_value_t = false)]
        hybrid: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = SearchConfig::load(cli.config.as_deref())?;
    let paths = IndexPaths::new(&cli.index);

    match cli.command {
        Commands::Build { input, embeddings } => build(&paths, &input, embeddings.as_deref()),
        Commands::Normalize { scores } => {
            for score in normalize(&scores) {
                println!("* {score:.4}");
            }
            Ok(())
        }
        Commands::Tf { doc_id, term } => {
            let idx = open(&paths)?;
            println!("Term frequency of '{term}' in document {doc_id}: {}", idx.term_frequency(doc_id, &term)?);
            Ok(())
        }
        Commands::Idf { term } => {
            let idx = open(&paths)?;
            println!("Inverse document frequency of '{term}': {:.2}", idx.idf(&term)?);
            Ok(())
        }
        Commands::Tfidf { doc_id, term } => {
            let idx = open(&paths)?;
            println!("TF-IDF score of '{term}' in document '{doc_id}': {:.2}", idx.tfidf(doc_id, &term)?);
            Ok(())
        }
        Commands::Bm25idf { term } => {
            let idx = open(&paths)?;
            println!("BM25 IDF score of '{term}': {:.2}", idx.inverse_document_frequency(&term)?);
            Ok(())
        }
        Commands::Bm25tf { doc_id, term, k1, b } => {
            let idx = open(&paths)?;
            let params = Bm25Params { k1: k1.unwrap_or(config.bm25.k1), b: b.unwrap_or(config.bm25.b) };
            println!("BM25 TF score of '{term}' in document '{doc_id}': {:.2}", idx.term_saturation(doc_id, &term, params)?);
            Ok(())
        }
        Commands::Bm25search { query, limit } => {
            let idx = open(&paths)?;
            let results = bm25_results(&idx, &query, limit.unwrap_or(config.default_limit), &config);
            for (i, res) in results.iter().enumerate() {
                println!("{}. ({}) {} - Score: {:.2}", i + 1, res.id, res.title, res.score);
            }
            Ok(())
        }
        Commands::Search { query, limit } => {
            let idx = open(&paths)?;
            println!("Searching for: {query}");
            for (i, doc) in idx.keyword_search(&query, limit.unwrap_or(config.default_limit)).iter().enumerate() {
                println!("{}. {}", i + 1, doc.title);
            }
            Ok(())
        }
        Commands::WeightedSearch { query, query_vector, alpha, limit } => {
            let idx = open(&paths)?;
            let chunks = ChunkStore::load(&paths.chunk_embeddings())?;
            let embedder = QueryVector(read_query_vector(&query_vector)?);
            let semantic = ChunkedSemanticSearch::new(&embedder, &chunks, &idx).with_snippet_chars(config.snippet_chars);
            let alpha = alpha.unwrap_or(config.alpha);
            let limit = limit.unwrap_or(config.default_limit);
            let hybrid = HybridSearch::new(&idx, &semantic, config);
            let results = hybrid.weighted_search(&query, alpha, limit)?;
            println!("Weighted Hybrid Search Results for '{query}' (alpha={alpha}):");
            println!("  Alpha {alpha}: {}% Keyword, {}% Semantic", (alpha * 100.0) as i64, ((1.0 - alpha) * 100.0) as i64);
            for (i, res) in results.iter().enumerate() {
                println!("{}. {}", i + 1, res.title);
                println!("   Hybrid Score: {:.3}", res.score);
                if let (Some(lex), Some(sem)) = (metadata_f64(res, "bm25_score"), metadata_f64(res, "semantic_score")) {
                    println!("   BM25: {lex:.3}, Semantic: {sem:.3}");
                }
                println!("   {}...", res.document);
                println!();
            }
            Ok(())
        }
        Commands::RrfSearch { query, query_vector, k, limit } => {
            let idx = open(&paths)?;
            let chunks = ChunkStore::load(&paths.chunk_embeddings())?;
            let embedder = QueryVector(read_query_vector(&query_vector)?);
            let semantic = ChunkedSemanticSearch::new(&embedder, &chunks, &idx).with_snippet_chars(config.snippet_chars);
            let k = k.unwrap_or(config.rrf_k);
            let limit = limit.unwrap_or(config.default_limit);
            let hybrid = HybridSearch::new(&idx, &semantic, config);
            let results = hybrid.rrf_search(&query, k, limit)?;
            println!("Reciprocal Rank Fusion Results for '{query}' (k={k}):");
            for (i, res) in results.iter().enumerate() {
                println!("{}. {}", i + 1, res.title);
                println!("   RRF Score: {:.3}", res.score);
                let mut ranks = Vec::new();
                if let Some(r) = res.metadata.get("bm25_rank").and_then(|v| v.as_u64()) {
                    ranks.push(format!("BM25 Rank: {r}"));
                }
                if let Some(r) = res.metadata.get("semantic_rank").and_then(|v| v.as_u64()) {
                    ranks.push(format!("Semantic Rank: {r}"));
                }
                if !ranks.is_empty() {
                    println!("   {}", ranks.join(", "));
                }
                println!("   {}...", res.document);
                println!();
            }
            Ok(())
        }
        Commands::Evaluate { golden, limit, hybrid } => run_evaluation(&paths, &config, &golden, limit, hybrid),
    }
}

fn open(paths: &IndexPaths) -> Result<InvertedIndex> {
    load_index(paths).with_context(|| format!("loading index from {} (run `hybrid build` first)", paths.root.display()))
}

fn build(paths: &IndexPaths, input: &Path, embeddings: Option<&Path>) -> Result<()> {
    let docs = corpus::load_corpus(input)?;
    tracing::info!(num_docs = docs.len(), input = %input.display(), "ingested documents");
    let index = IndexBuilder::from_documents(docs)?;
    // Embeddings are validated here and land in the same swap as the index.
    let chunks = match embeddings {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Some(ChunkStore::from_jsonl(BufReader::new(f))?)
        }
        None => None,
    };
    save_index(paths, &index, chunks.as_ref())?;
    println!("Index built and saved to {}: {} documents, {} terms", paths.root.display(), index.len(), index.vocabulary_size());
    Ok(())
}

fn read_query_vector(path: &Path) -> Result<Vec<f32>> {
    let buf = std::fs::read_to_string(path).with_context(|| format!("reading query vector {}", path.display()))?;
    let vector: Vec<f32> = serde_json::from_str(&buf).with_context(|| format!("parsing query vector {}", path.display()))?;
    Ok(vector)
}

fn metadata_f64(res: &SearchResult, key: &str) -> Option<f64> {
    res.metadata.get(key).and_then(|v| v.as_f64())
}

fn run_evaluation(paths: &IndexPaths, config: &SearchConfig, golden: &Path, limit: Option<usize>, hybrid: bool) -> Result<()> {
    let idx = open(paths)?;
    let golden = GoldenSet::load(golden)?;
    let limit = limit.unwrap_or(config.default_limit);
    let chunks = if hybrid { Some(ChunkStore::load(&paths.chunk_embeddings())?) } else { None };

    let reports = evaluate(&golden, limit, |case, k| match &chunks {
        None => Ok(bm25_results(&idx, &case.query, k, config)),
        Some(chunks) => {
            let vector = case.vector.clone().ok_or_else(|| {
                SearchError::InvalidParameter(format!("golden case {:?} has no query vector", case.query))
            })?;
            let embedder = QueryVector(vector);
            let semantic = ChunkedSemanticSearch::new(&embedder, chunks, &idx).with_snippet_chars(config.snippet_chars);
            HybridSearch::new(&idx, &semantic, config.clone()).rrf_search(&case.query, config.rrf_k, k)
        }
    })?;

    println!("k={limit}\n");
    for r in &reports {
        println!("- Query: {}", r.query);
        println!("    - Precision@{limit}: {:.4}", r.precision);
        println!("    - Recall@{limit}: {:.4}", r.recall);
        println!("    - Retrieved: {}", r.retrieved.join(", "));
        println!("    - Relevant: {}", r.relevant.join(", "));
    }
    Ok(())
}
