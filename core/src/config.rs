use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SearchError};
use crate::fusion::{validate_alpha, validate_rrf_k, DEFAULT_ALPHA, RRF_K};
use crate::index::Bm25Params;
use crate::result::DOCUMENT_PREVIEW_LENGTH;

pub const DEFAULT_SEARCH_LIMIT: usize = 5;
/// Candidates fetched per source for every requested fused result.
pub const OVERFETCH_MULTIPLIER: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bm25: Bm25Params,
    pub alpha: f64,
    pub rrf_k: f64,
    pub default_limit: usize,
    pub overfetch_multiplier: usize,
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            alpha: DEFAULT_ALPHA,
            rrf_k: RRF_K,
            default_limit: DEFAULT_SEARCH_LIMIT,
            overfetch_multiplier: OVERFETCH_MULTIPLIER,
            snippet_chars: DOCUMENT_PREVIEW_LENGTH,
        }
    }
}

impl SearchConfig {
    /// Defaults, then the optional TOML file, then `HYBRID_*` env vars
    /// (`HYBRID_BM25__K1=1.2`).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(SearchConfig::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        let config: SearchConfig = figment.merge(Env::prefixed("HYBRID_").split("__")).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        validate_rrf_k(self.rrf_k)?;
        if self.bm25.k1 < 0.0 || !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(SearchError::InvalidParameter(format!(
                "bm25 needs k1 >= 0 and b within [0, 1], got k1={} b={}",
                self.bm25.k1, self.bm25.b
            )));
        }
        if self.overfetch_multiplier == 0 {
            return Err(SearchError::InvalidParameter("overfetch_multiplier must be positive".into()));
        }
        Ok(())
    }

    /// Candidates to request from each source for a fused list of `limit`.
    pub fn overfetch(&self, limit: usize) -> usize {
        limit.saturating_mul(self.overfetch_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = SearchConfig::default();
        assert_eq!(c.bm25, Bm25Params { k1: 1.5, b: 0.75 });
        assert_eq!(c.rrf_k, 60.0);
        assert_eq!(c.overfetch(5), 2500);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha = 0.25\n[bm25]\nk1 = 1.2\nb = 0.5").unwrap();
        let c = SearchConfig::load(Some(file.path())).unwrap();
        assert_eq!(c.alpha, 0.25);
        assert_eq!(c.bm25, Bm25Params { k1: 1.2, b: 0.5 });
        assert_eq!(c.rrf_k, 60.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let c = SearchConfig { alpha: 2.0, ..SearchConfig::default() };
        assert!(matches!(c.validate(), Err(SearchError::InvalidParameter(_))));
    }
}
