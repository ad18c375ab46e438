use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Result, SearchError};
use crate::index::rank_order;
use crate::persist::{read_bin, write_bin};
use crate::result::{ScoredDocument, DOCUMENT_PREVIEW_LENGTH};
use crate::{DocId, InvertedIndex};

/// Text to vector. Nothing in this crate computes embeddings; [`QueryVector`]
/// hands back one computed elsewhere.
pub trait Embedder {
    /// Embed `text`. Blank input is rejected with [`SearchError::EmptyInput`].
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub trait SemanticSearch {
    /// Up to `limit` documents, best first, one entry per document.
    fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>>;
}

/// A query embedding computed outside this process.
#[derive(Debug, Clone)]
pub struct QueryVector(pub Vec<f32>);

impl Embedder for QueryVector {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SearchError::EmptyInput);
        }
        if self.0.is_empty() {
            return Err(SearchError::InvalidEmbedding("query vector is empty".into()));
        }
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    pub doc_id: DocId,
    pub chunk_idx: u32,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkMatch {
    pub doc_id: DocId,
    pub chunk_idx: u32,
    pub score: f64,
}

/// Cosine similarity in f64. Zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(SearchError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    let mut dot = 0.0f64;
    let mut mag_a = 0.0f64;
    let mut mag_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (mag_a.sqrt() * mag_b.sqrt()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStore {
    dimension: usize,
    chunks: Vec<ChunkEmbedding>,
}

impl ChunkStore {
    pub fn new(chunks: Vec<ChunkEmbedding>) -> Result<Self> {
        let dimension = chunks.first().map_or(0, |c| c.vector.len());
        if chunks.is_empty() || dimension == 0 {
            return Err(SearchError::InvalidEmbedding("no chunk vectors supplied".into()));
        }
        for c in &chunks {
            if c.vector.len() != dimension {
                return Err(SearchError::DimensionMismatch { expected: dimension, actual: c.vector.len() });
            }
            if c.vector.iter().any(|v| !v.is_finite()) {
                return Err(SearchError::InvalidEmbedding(format!("doc {} chunk {} has a non-finite value", c.doc_id, c.chunk_idx)));
            }
        }
        Ok(Self { dimension, chunks })
    }

    /// One `ChunkEmbedding` JSON object per line; blank lines are skipped.
    pub fn from_jsonl<R: BufRead>(reader: R) -> Result<Self> {
        let mut chunks = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            chunks.push(serde_json::from_str::<ChunkEmbedding>(&line)?);
        }
        Self::new(chunks)
    }

    pub fn dimension(&self) -> usize { self.dimension }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("bin.tmp");
        write_bin(&tmp, self)?;
        fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), chunks = self.len(), dimension = self.dimension, "saved chunk embeddings");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SearchError::SemanticUnavailable(format!("no chunk embeddings at {}", path.display())));
        }
        let store: ChunkStore = read_bin(path)?;
        // re-run validation on whatever came off disk
        Self::new(store.chunks)
    }

    /// Best-scoring chunk per document, ordered by descending similarity then
    /// ascending document id.
    pub fn best_matches(&self, query: &[f32]) -> Result<Vec<ChunkMatch>> {
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch { expected: self.dimension, actual: query.len() });
        }
        let mut best: HashMap<DocId, ChunkMatch> = HashMap::new();
        for c in &self.chunks {
            let score = cosine_similarity(query, &c.vector)?;
            let candidate = ChunkMatch { doc_id: c.doc_id, chunk_idx: c.chunk_idx, score };
            best.entry(c.doc_id)
                .and_modify(|m| if score > m.score { *m = candidate })
                .or_insert(candidate);
        }
        let mut matches: Vec<ChunkMatch> = best.into_values().collect();
        matches.sort_by(|a, b| rank_order(a.score, a.doc_id, b.score, b.doc_id));
        Ok(matches)
    }
}

/// Semantic search over chunk embeddings, hydrating hits from the index docmap.
pub struct ChunkedSemanticSearch<'a, E: Embedder> {
    embedder: &'a E,
    chunks: &'a ChunkStore,
    index: &'a InvertedIndex,
    snippet_chars: usize,
}

impl<'a, E: Embedder> ChunkedSemanticSearch<'a, E> {
    pub fn new(embedder: &'a E, chunks: &'a ChunkStore, index: &'a InvertedIndex) -> Self {
        Self { embedder, chunks, index, snippet_chars: DOCUMENT_PREVIEW_LENGTH }
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }
}

impl<E: Embedder> SemanticSearch for ChunkedSemanticSearch<'_, E> {
    fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let vector = self.embedder.embed(query)?;
        let mut out = Vec::new();
        for m in self.chunks.best_matches(&vector)? {
            if out.len() >= limit {
                break;
            }
            match self.index.document(m.doc_id) {
                Some(doc) => out.push(ScoredDocument::from_document(doc, m.score, self.snippet_chars)),
                None => tracing::warn!(doc_id = m.doc_id, "chunk embedding for a document missing from the index"),
            }
        }
        tracing::debug!(query, hits = out.len(), "semantic search");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, IndexBuilder};

    fn chunk(doc_id: DocId, chunk_idx: u32, vector: &[f32]) -> ChunkEmbedding {
        ChunkEmbedding { doc_id, chunk_idx, vector: vector.to_vec() }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert!(matches!(cosine_similarity(&[1.0], &[1.0, 2.0]), Err(SearchError::DimensionMismatch { .. })));
    }

    #[test]
    fn query_vector_rejects_blank_text() {
        let q = QueryVector(vec![1.0, 0.0]);
        assert!(matches!(q.embed("   "), Err(SearchError::EmptyInput)));
        assert_eq!(q.embed("bear").unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn store_validates_dimensions() {
        assert!(ChunkStore::new(vec![]).is_err());
        let err = ChunkStore::new(vec![chunk(1, 0, &[1.0, 0.0]), chunk(2, 0, &[1.0])]).unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn keeps_best_chunk_per_document() {
        let store = ChunkStore::new(vec![
            chunk(1, 0, &[0.0, 1.0]),
            chunk(1, 1, &[1.0, 0.0]),
            chunk(2, 0, &[1.0, 1.0]),
        ])
        .unwrap();
        let matches = store.best_matches(&[1.0, 0.0]).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].doc_id, 1);
        assert_eq!(matches[0].chunk_idx, 1);
        assert_eq!(matches[1].doc_id, 2);
    }

    #[test]
    fn parses_jsonl() {
        let input = "{\"doc_id\":1,\"chunk_idx\":0,\"vector\":[0.5,0.5]}\n\n{\"doc_id\":2,\"chunk_idx\":0,\"vector\":[1,0]}\n";
        let store = ChunkStore::from_jsonl(input.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.dimension(), 2);
    }

    #[test]
    fn chunked_search_hydrates_and_limits() {
        let index = IndexBuilder::from_documents(vec![
            Document { id: 1, title: "Bear".into(), description: "A bear".into() },
            Document { id: 2, title: "Space".into(), description: "Rockets".into() },
        ])
        .unwrap();
        let store = ChunkStore::new(vec![
            chunk(1, 0, &[1.0, 0.0]),
            chunk(2, 0, &[0.6, 0.8]),
            chunk(3, 0, &[1.0, 0.1]),
        ])
        .unwrap();
        let q = QueryVector(vec![1.0, 0.0]);
        let search = ChunkedSemanticSearch::new(&q, &store, &index);
        let hits = search.search_chunks("bear", 5).unwrap();
        // doc 3 has no docmap entry and is skipped
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(hits[0].title, "Bear");
        assert_eq!(search.search_chunks("bear", 1).unwrap().len(), 1);
        assert!(matches!(search.search_chunks("", 1), Err(SearchError::EmptyInput)));
    }
}
