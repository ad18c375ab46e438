pub mod config;
pub mod error;
pub mod evaluation;
pub mod fusion;
pub mod hybrid;
pub mod index;
pub mod persist;
pub mod result;
pub mod semantic;
pub mod tokenizer;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use index::{Bm25Params, DocId, Document, IndexBuilder, InvertedIndex};
pub use result::{ScoredDocument, SearchResult};
