use std::collections::HashMap;

use crate::error::{Result, SearchError};
use crate::index::rank_order;
use crate::result::{ScoredDocument, SearchResult};
use crate::DocId;

pub const DEFAULT_ALPHA: f64 = 0.5;
pub const RRF_K: f64 = 60.0;

/// Min-max normalize into `[0, 1]`. A list whose scores are all equal maps to all `1.0`.
pub fn normalize(scores: &[f64]) -> Vec<f64> {
    let Some((min, max)) = min_max(scores) else { return Vec::new() };
    if max == min {
        return vec![1.0; scores.len()];
    }
    let range = max - min;
    scores.iter().map(|s| (s - min) / range).collect()
}

fn min_max(scores: &[f64]) -> Option<(f64, f64)> {
    let first = *scores.first()?;
    Some(scores.iter().fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s))))
}

/// Per-document accumulator; title and snippet come from the first source that listed it.
struct Fused {
    id: DocId,
    title: String,
    document: String,
    lexical: f64,
    semantic: f64,
    lexical_rank: Option<usize>,
    semantic_rank: Option<usize>,
}

#[derive(Default)]
struct FusionTable {
    entries: Vec<Fused>,
    slots: HashMap<DocId, usize>,
}

impl FusionTable {
    fn entry(&mut self, hit: &ScoredDocument) -> &mut Fused {
        let next = self.entries.len();
        let slot = *self.slots.entry(hit.id).or_insert(next);
        if slot == next {
            self.entries.push(Fused {
                id: hit.id,
                title: hit.title.clone(),
                document: hit.document.clone(),
                lexical: 0.0,
                semantic: 0.0,
                lexical_rank: None,
                semantic_rank: None,
            });
        }
        &mut self.entries[slot]
    }

    fn ranked(self, score: impl Fn(&Fused) -> f64) -> Vec<(f64, Fused)> {
        let mut scored: Vec<(f64, Fused)> = self.entries.into_iter().map(|f| (score(&f), f)).collect();
        scored.sort_by(|a, b| rank_order(a.0, a.1.id, b.0, b.1.id));
        scored
    }
}

pub fn validate_alpha(alpha: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(SearchError::InvalidParameter(format!("alpha must be within [0, 1], got {alpha}")));
    }
    Ok(())
}

pub fn validate_rrf_k(k: f64) -> Result<()> {
    if !k.is_finite() || k < 0.0 {
        return Err(SearchError::InvalidParameter(format!("rrf k must be a finite value >= 0, got {k}")));
    }
    Ok(())
}

/// Weighted fusion of min-max normalized scores. Returns every candidate, best first.
pub fn weighted_fusion(lexical: &[ScoredDocument], semantic: &[ScoredDocument], alpha: f64) -> Result<Vec<SearchResult>> {
    validate_alpha(alpha)?;
    let lex_norm = normalize(&lexical.iter().map(|h| h.score).collect::<Vec<_>>());
    let sem_norm = normalize(&semantic.iter().map(|h| h.score).collect::<Vec<_>>());

    let mut table = FusionTable::default();
    for (hit, norm) in lexical.iter().zip(lex_norm) {
        let e = table.entry(hit);
        e.lexical = e.lexical.max(norm);
    }
    for (hit, norm) in semantic.iter().zip(sem_norm) {
        let e = table.entry(hit);
        e.semantic = e.semantic.max(norm);
    }

    let results = table
        .ranked(|f| hybrid_score(f.lexical, f.semantic, alpha))
        .into_iter()
        .map(|(score, f)| {
            SearchResult::new(f.id, f.title, f.document, score)
                .with_metadata("bm25_score", f.lexical)
                .with_metadata("semantic_score", f.semantic)
        })
        .collect();
    Ok(results)
}

pub fn hybrid_score(lexical: f64, semantic: f64, alpha: f64) -> f64 {
    alpha * lexical + (1.0 - alpha) * semantic
}

pub fn rrf_score(rank: usize, k: f64) -> f64 {
    1.0 / (k + rank as f64)
}

/// Reciprocal rank fusion over 1-based ranks. Only the first appearance of a
/// document within one list counts. Returns every candidate, best first.
pub fn reciprocal_rank_fusion(lexical: &[ScoredDocument], semantic: &[ScoredDocument], k: f64) -> Result<Vec<SearchResult>> {
    validate_rrf_k(k)?;
    let mut table = FusionTable::default();
    for (i, hit) in lexical.iter().enumerate() {
        let e = table.entry(hit);
        if e.lexical_rank.is_none() {
            e.lexical_rank = Some(i + 1);
            e.lexical = rrf_score(i + 1, k);
        }
    }
    for (i, hit) in semantic.iter().enumerate() {
        let e = table.entry(hit);
        if e.semantic_rank.is_none() {
            e.semantic_rank = Some(i + 1);
            e.semantic = rrf_score(i + 1, k);
        }
    }

    let results = table
        .ranked(|f| f.lexical + f.semantic)
        .into_iter()
        .map(|(score, f)| {
            SearchResult::new(f.id, f.title, f.document, score)
                .with_metadata("rrf_score", score)
                .with_metadata("bm25_rank", f.lexical_rank)
                .with_metadata("semantic_rank", f.semantic_rank)
        })
        .collect();
    Ok(results)
}
