use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;
use crate::result::SearchResult;

#[derive(Debug, Clone, Deserialize)]
pub struct GoldenSet {
    pub test_cases: Vec<GoldenCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoldenCase {
    pub query: String,
    pub relevant_docs: Vec<String>,
    /// Query embedding, needed only for hybrid evaluation.
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

impl GoldenSet {
    pub fn load(path: &Path) -> Result<Self> {
        let buf = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&buf)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub query: String,
    pub precision: f64,
    pub recall: f64,
    pub retrieved: Vec<String>,
    pub relevant: Vec<String>,
}

/// Relevant titles among the retrieved results, divided by `k`.
pub fn precision_at_k(results: &[SearchResult], relevant: &[String], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits(results, relevant, k) as f64 / k as f64
}

pub fn recall_at_k(results: &[SearchResult], relevant: &[String], k: usize) -> f64 {
    let wanted: BTreeSet<&str> = relevant.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return 0.0;
    }
    hits(results, relevant, k) as f64 / wanted.len() as f64
}

fn hits(results: &[SearchResult], relevant: &[String], k: usize) -> usize {
    let wanted: BTreeSet<&str> = relevant.iter().map(String::as_str).collect();
    let got: BTreeSet<&str> = results.iter().take(k).map(|r| r.title.as_str()).collect();
    got.intersection(&wanted).count()
}

/// Run `search` for every case with limit `k` and score the output.
pub fn evaluate<F>(golden: &GoldenSet, k: usize, mut search: F) -> Result<Vec<CaseReport>>
where
    F: FnMut(&GoldenCase, usize) -> Result<Vec<SearchResult>>,
{
    let mut reports = Vec::with_capacity(golden.test_cases.len());
    for case in &golden.test_cases {
        let results = search(case, k)?;
        let report = CaseReport {
            query: case.query.clone(),
            precision: precision_at_k(&results, &case.relevant_docs, k),
            recall: recall_at_k(&results, &case.relevant_docs, k),
            retrieved: results.iter().take(k).map(|r| r.title.clone()).collect(),
            relevant: case.relevant_docs.clone(),
        };
        tracing::debug!(query = %report.query, precision = report.precision, recall = report.recall, "evaluated case");
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(titles: &[&str]) -> Vec<SearchResult> {
        titles.iter().enumerate().map(|(i, t)| SearchResult::new(i as u32, *t, "", 1.0)).collect()
    }

    #[test]
    fn precision_divides_by_k() {
        let results = titled(&["Paddington", "Grizzly Man", "Alien"]);
        let relevant = vec!["Paddington".to_string(), "Brother Bear".to_string()];
        assert!((precision_at_k(&results, &relevant, 5) - 0.2).abs() < 1e-12);
        assert!((recall_at_k(&results, &relevant, 5) - 0.5).abs() < 1e-12);
        assert_eq!(precision_at_k(&results, &relevant, 0), 0.0);
    }

    #[test]
    fn evaluate_runs_every_case() {
        let golden: GoldenSet = serde_json::from_str(
            r#"{"test_cases":[{"query":"bear","relevant_docs":["Paddington"]},{"query":"space","relevant_docs":["Alien"],"vector":[1.0]}]}"#,
        )
        .unwrap();
        let reports = evaluate(&golden, 2, |case, _| {
            Ok(if case.query == "bear" { titled(&["Paddington", "Alien"]) } else { titled(&["Paddington"]) })
        })
        .unwrap();
        assert_eq!(reports.len(), 2);
        assert!((reports[0].precision - 0.5).abs() < 1e-12);
        assert_eq!(reports[1].recall, 0.0);
        assert!(golden.test_cases[1].vector.is_some());
    }
}
