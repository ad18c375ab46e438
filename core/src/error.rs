use std::path::PathBuf;
use thiserror::Error;

use crate::DocId;

#[derive(Debug, Error)]
pub enum SearchError {
    /// A term argument did not normalize to exactly one token.
    #[error("term {term:?} must normalize to exactly one token, got {tokens}")]
    InvalidTerm { term: String, tokens: usize },

    #[error("index not found: missing {path}")]
    IndexNotFound { path: PathBuf },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("input text cannot be empty")]
    EmptyInput,

    #[error("unknown document id {0}")]
    UnknownDocument(DocId),

    #[error("duplicate document id {0} in corpus")]
    DuplicateDocument(DocId),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("semantic search unavailable: {0}")]
    SemanticUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for SearchError {
    fn from(e: figment::Error) -> Self {
        SearchError::Config(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
