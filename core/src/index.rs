use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, SearchError};
use crate::tokenizer::{single_term, tokenize};

pub type DocId = u32;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub description: String,
}

impl Document {
    /// Text fed to the tokenizer: title and description joined by a space.
    pub fn indexed_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: BM25_K1, b: BM25_B }
    }
}

/// Mutable accumulator used only while building. Consumed by [`IndexBuilder::finish`].
#[derive(Default)]
pub struct IndexBuilder {
    docs: BTreeMap<DocId, (Document, HashMap<String, u32>, u32)>,
}

impl IndexBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        if self.docs.contains_key(&doc.id) {
            return Err(SearchError::DuplicateDocument(doc.id));
        }
        // Lengths and frequencies come from the same token stream.
        let tokens = tokenize(&doc.indexed_text());
        let length = tokens.len() as u32;
        let mut tf: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *tf.entry(token).or_insert(0) += 1;
        }
        self.docs.insert(doc.id, (doc, tf, length));
        Ok(())
    }

    pub fn from_documents<I: IntoIterator<Item = Document>>(corpus: I) -> Result<InvertedIndex> {
        let mut builder = Self::new();
        for doc in corpus {
            builder.add_document(doc)?;
        }
        Ok(builder.finish())
    }

    pub fn finish(self) -> InvertedIndex {
        let mut index = InvertedIndex::default();
        for (ordinal, (id, (doc, tf, length))) in self.docs.into_iter().enumerate() {
            let ordinal = ordinal as u32;
            index.ordinals.insert(id, ordinal);
            for token in tf.keys() {
                index.postings.entry(token.clone()).or_default().push(ordinal);
            }
            index.docs.push(doc);
            index.doc_lengths.push(length);
            index.term_frequencies.push(tf);
        }
        // Ordinals were pushed in ascending order, so every list is already sorted.
        tracing::info!(num_docs = index.len(), num_terms = index.vocabulary_size(), "built inverted index");
        index
    }
}

/// Immutable BM25 inverted index.
///
/// Documents live in parallel arrays indexed by an internal ordinal; ordinals
/// follow ascending document id. Postings map a token to the ordinals of the
/// documents containing it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvertedIndex {
    pub(crate) docs: Vec<Document>,
    pub(crate) doc_lengths: Vec<u32>,
    pub(crate) term_frequencies: Vec<HashMap<String, u32>>,
    pub(crate) postings: HashMap<String, Vec<u32>>,
    pub(crate) ordinals: HashMap<DocId, u32>,
}

impl InvertedIndex {
    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn vocabulary_size(&self) -> usize { self.postings.len() }

    /// Documents in ascending id order.
    pub fn documents_iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.docs.iter()
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.ordinals.get(&doc_id).map(|&o| &self.docs[o as usize])
    }

    fn ordinal(&self, doc_id: DocId) -> Result<usize> {
        self.ordinals
            .get(&doc_id)
            .map(|&o| o as usize)
            .ok_or(SearchError::UnknownDocument(doc_id))
    }

    pub fn document_length(&self, doc_id: DocId) -> Result<u32> {
        Ok(self.doc_lengths[self.ordinal(doc_id)?])
    }

    pub fn average_document_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: u64 = self.doc_lengths.iter().map(|&l| l as u64).sum();
        total as f64 / self.doc_lengths.len() as f64
    }

    /// Ascending ids of the documents containing `term`.
    pub fn documents(&self, term: &str) -> Result<Vec<DocId>> {
        let token = single_term(term)?;
        Ok(self.posting_ids(&token))
    }

    fn posting_ids(&self, token: &str) -> Vec<DocId> {
        self.postings
            .get(token)
            .map(|list| list.iter().map(|&o| self.docs[o as usize].id).collect())
            .unwrap_or_default()
    }

    pub fn term_frequency(&self, doc_id: DocId, term: &str) -> Result<u32> {
        let token = single_term(term)?;
        self.token_frequency(doc_id, &token)
    }

    fn token_frequency(&self, doc_id: DocId, token: &str) -> Result<u32> {
        let ordinal = self.ordinal(doc_id)?;
        Ok(self.term_frequencies[ordinal].get(token).copied().unwrap_or(0))
    }

    pub fn document_frequency(&self, term: &str) -> Result<usize> {
        let token = single_term(term)?;
        Ok(self.token_document_frequency(&token))
    }

    fn token_document_frequency(&self, token: &str) -> usize {
        self.postings.get(token).map_or(0, Vec::len)
    }

    /// BM25 IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`.
    pub fn inverse_document_frequency(&self, term: &str) -> Result<f64> {
        let token = single_term(term)?;
        Ok(self.token_bm25_idf(&token))
    }

    fn token_bm25_idf(&self, token: &str) -> f64 {
        let n = self.len() as f64;
        let df = self.token_document_frequency(token) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Classic smoothed IDF: `ln((N + 1) / (df + 1))`.
    pub fn idf(&self, term: &str) -> Result<f64> {
        let token = single_term(term)?;
        let n = self.len() as f64;
        let df = self.token_document_frequency(&token) as f64;
        Ok(((n + 1.0) / (df + 1.0)).ln())
    }

    pub fn tfidf(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let tf = self.term_frequency(doc_id, term)?;
        Ok(tf as f64 * self.idf(term)?)
    }

    /// BM25 saturated term frequency with length normalization.
    pub fn term_saturation(&self, doc_id: DocId, term: &str, params: Bm25Params) -> Result<f64> {
        let token = single_term(term)?;
        self.token_saturation(doc_id, &token, params)
    }

    fn token_saturation(&self, doc_id: DocId, token: &str, params: Bm25Params) -> Result<f64> {
        let tf = self.token_frequency(doc_id, token)? as f64;
        let doc_len = self.document_length(doc_id)? as f64;
        let avg = self.average_document_length();
        let ratio = if avg > 0.0 { doc_len / avg } else { 1.0 };
        let length_norm = 1.0 - params.b + params.b * ratio;
        let denom = tf + params.k1 * length_norm;
        if denom == 0.0 {
            return Ok(0.0);
        }
        Ok((tf * (params.k1 + 1.0)) / denom)
    }

    pub fn score(&self, doc_id: DocId, term: &str) -> Result<f64> {
        self.score_with(doc_id, term, Bm25Params::default())
    }

    pub fn score_with(&self, doc_id: DocId, term: &str, params: Bm25Params) -> Result<f64> {
        let token = single_term(term)?;
        Ok(self.token_bm25_idf(&token) * self.token_saturation(doc_id, &token, params)?)
    }

    pub fn bm25_search(&self, query: &str, limit: usize) -> Vec<(DocId, f64)> {
        self.bm25_search_with(query, limit, Bm25Params::default())
    }

    /// Score every document against the query tokens, keep positive totals,
    /// order by descending score then ascending document id.
    pub fn bm25_search_with(&self, query: &str, limit: usize, params: Bm25Params) -> Vec<(DocId, f64)> {
        let tokens = tokenize(query);
        if tokens.is_empty() || limit == 0 || self.is_empty() {
            return Vec::new();
        }
        let avg = self.average_document_length();
        let mut totals = vec![0.0f64; self.len()];
        for token in &tokens {
            let Some(list) = self.postings.get(token) else { continue };
            let idf = self.token_bm25_idf(token);
            for &ordinal in list {
                let o = ordinal as usize;
                let tf = self.term_frequencies[o].get(token).copied().unwrap_or(0) as f64;
                let ratio = if avg > 0.0 { self.doc_lengths[o] as f64 / avg } else { 1.0 };
                let saturation = (tf * (params.k1 + 1.0)) / (tf + params.k1 * (1.0 - params.b + params.b * ratio));
                totals[o] += idf * saturation;
            }
        }
        let mut scored: Vec<(DocId, f64)> = totals
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .map(|(o, s)| (self.docs[o].id, s))
            .collect();
        scored.sort_by(|a, b| rank_order(a.1, a.0, b.1, b.0));
        scored.truncate(limit);
        tracing::debug!(query, tokens = tokens.len(), hits = scored.len(), "bm25 search");
        scored
    }

    /// Boolean keyword match: walk query tokens in order and each posting list
    /// ascending, collecting distinct documents up to `limit`.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Vec<&Document> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for token in tokenize(query) {
            for id in self.posting_ids(&token) {
                if out.len() >= limit {
                    return out;
                }
                if seen.insert(id) {
                    if let Some(doc) = self.document(id) {
                        out.push(doc);
                    }
                }
            }
        }
        out
    }
}

/// Descending score, then ascending document id.
pub(crate) fn rank_order(score_a: f64, id_a: DocId, score_b: f64, id_b: DocId) -> Ordering {
    score_b.total_cmp(&score_a).then(id_a.cmp(&id_b))
}
