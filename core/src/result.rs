use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{DocId, Document};

pub const SCORE_PRECISION: i32 = 3;
pub const DOCUMENT_PREVIEW_LENGTH: usize = 100;

/// A hit from a single ranked source, with its unrounded score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: DocId,
    pub title: String,
    pub document: String,
    pub score: f64,
}

impl ScoredDocument {
    pub fn from_document(doc: &Document, score: f64, snippet_chars: usize) -> Self {
        Self { id: doc.id, title: doc.title.clone(), document: snippet(&doc.description, snippet_chars), score }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocId,
    pub title: String,
    pub document: String,
    /// Rounded to [`SCORE_PRECISION`] decimal places.
    pub score: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl SearchResult {
    pub fn new(id: DocId, title: impl Into<String>, document: impl Into<String>, score: f64) -> Self {
        Self { id, title: title.into(), document: document.into(), score: round_score(score), metadata: BTreeMap::new() }
    }

    pub fn from_scored(hit: &ScoredDocument) -> Self {
        Self::new(hit.id, hit.title.clone(), hit.document.clone(), hit.score)
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

pub fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_PRECISION);
    (score * factor).round() / factor
}

/// First `max_chars` characters of `text`.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_score_but_not_metadata() {
        let r = SearchResult::new(1, "t", "d", 0.0163934).with_metadata("rrf_score", 0.0163934);
        assert_eq!(r.score, 0.016);
        assert_eq!(r.metadata["rrf_score"], serde_json::json!(0.0163934));
    }

    #[test]
    fn none_metadata_serializes_as_null() {
        let r = SearchResult::new(1, "t", "d", 1.0).with_metadata("semantic_rank", Option::<usize>::None);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["metadata"]["semantic_rank"].is_null());
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo wörld", 4), "héll");
        assert_eq!(snippet("short", 100), "short");
        assert_eq!(snippet("", 3), "");
    }
}
