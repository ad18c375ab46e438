use crate::config::SearchConfig;
use crate::error::Result;
use crate::fusion::{reciprocal_rank_fusion, validate_alpha, validate_rrf_k, weighted_fusion};
use crate::result::{ScoredDocument, SearchResult};
use crate::semantic::SemanticSearch;
use crate::InvertedIndex;

/// Lexical + semantic search over one loaded index.
pub struct HybridSearch<'a, S: SemanticSearch> {
    index: &'a InvertedIndex,
    semantic: &'a S,
    config: SearchConfig,
}

impl<'a, S: SemanticSearch> HybridSearch<'a, S> {
    pub fn new(index: &'a InvertedIndex, semantic: &'a S, config: SearchConfig) -> Self {
        Self { index, semantic, config }
    }

    pub fn config(&self) -> &SearchConfig { &self.config }

    /// BM25 hits hydrated from the docmap, raw scores kept.
    pub fn lexical(&self, query: &str, limit: usize) -> Vec<ScoredDocument> {
        lexical_hits(self.index, query, limit, &self.config)
    }

    pub fn weighted_search(&self, query: &str, alpha: f64, limit: usize) -> Result<Vec<SearchResult>> {
        validate_alpha(alpha)?;
        let fetch = self.config.overfetch(limit);
        let lexical = self.lexical(query, fetch);
        let semantic = self.semantic.search_chunks(query, fetch)?;
        let mut fused = weighted_fusion(&lexical, &semantic, alpha)?;
        fused.truncate(limit);
        tracing::debug!(query, alpha, lexical = lexical.len(), semantic = semantic.len(), "weighted search");
        Ok(fused)
    }

    pub fn rrf_search(&self, query: &str, k: f64, limit: usize) -> Result<Vec<SearchResult>> {
        validate_rrf_k(k)?;
        let fetch = self.config.overfetch(limit);
        let lexical = self.lexical(query, fetch);
        let semantic = self.semantic.search_chunks(query, fetch)?;
        let mut fused = reciprocal_rank_fusion(&lexical, &semantic, k)?;
        fused.truncate(limit);
        tracing::debug!(query, k, lexical = lexical.len(), semantic = semantic.len(), "rrf search");
        Ok(fused)
    }
}

pub fn lexical_hits(index: &InvertedIndex, query: &str, limit: usize, config: &SearchConfig) -> Vec<ScoredDocument> {
    index
        .bm25_search_with(query, limit, config.bm25)
        .into_iter()
        .filter_map(|(id, score)| index.document(id).map(|doc| ScoredDocument::from_document(doc, score, config.snippet_chars)))
        .collect()
}

/// BM25-only results in the canonical record shape.
pub fn bm25_results(index: &InvertedIndex, query: &str, limit: usize, config: &SearchConfig) -> Vec<SearchResult> {
    lexical_hits(index, query, limit, config)
        .iter()
        .map(|hit| SearchResult::from_scored(hit).with_metadata("bm25_score", hit.score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::{DocId, Document, IndexBuilder};

    /// Fixed semantic ranking, truncated to the requested limit.
    struct Fixed(Vec<ScoredDocument>);

    impl SemanticSearch for Fixed {
        fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
            if query.trim().is_empty() {
                return Err(SearchError::EmptyInput);
            }
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn corpus() -> InvertedIndex {
        IndexBuilder::from_documents(vec![
            Document { id: 1, title: "The Bear Attacks".into(), description: "".into() },
            Document { id: 2, title: "A Bear in London".into(), description: "".into() },
            Document { id: 3, title: "Space Adventure".into(), description: "".into() },
        ])
        .unwrap()
    }

    fn semantic(ids: &[DocId]) -> Fixed {
        Fixed(ids.iter().enumerate().map(|(i, &id)| ScoredDocument {
            id,
            title: format!("semantic {id}"),
            document: String::new(),
            score: 0.9 - i as f64 * 0.1,
        }).collect())
    }

    #[test]
    fn rrf_example_truncates() {
        let index = corpus();
        let sem = semantic(&[2, 3]);
        let hybrid = HybridSearch::new(&index, &sem, SearchConfig::default());
        let results = hybrid.rrf_search("bear", 60.0, 2).unwrap();
        assert_eq!(results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(results[0].score, 0.033);
        assert_eq!(results[1].score, 0.016);
        // title from the lexical list, which is visited first
        assert_eq!(results[0].title, "A Bear in London");
    }

    #[test]
    fn weighted_alpha_extremes() {
        let index = corpus();
        let sem = semantic(&[3, 2]);
        let hybrid = HybridSearch::new(&index, &sem, SearchConfig::default());
        let lexical_first = hybrid.weighted_search("bear london", 1.0, 3).unwrap();
        assert_eq!(lexical_first[0].id, 2);
        let semantic_first = hybrid.weighted_search("bear london", 0.0, 3).unwrap();
        assert_eq!(semantic_first[0].id, 3);
        assert_eq!(semantic_first.len(), 3);
    }

    #[test]
    fn propagates_collaborator_errors() {
        let index = corpus();
        let sem = semantic(&[1]);
        let hybrid = HybridSearch::new(&index, &sem, SearchConfig::default());
        assert!(matches!(hybrid.rrf_search("  ", 60.0, 2), Err(SearchError::EmptyInput)));
        assert!(matches!(hybrid.weighted_search("bear", -0.1, 2), Err(SearchError::InvalidParameter(_))));
    }

    #[test]
    fn bm25_results_are_formatted() {
        let index = corpus();
        let results = bm25_results(&index, "bear", 5, &SearchConfig::default());
        assert_eq!(results.len(), 2);
        assert!(results[0].metadata.contains_key("bm25_score"));
    }
}
